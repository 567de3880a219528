//! Execution shell: attach, inject, exchange messages, tear down.

mod backend;
mod execution;
mod message;
mod signal;

#[cfg(test)]
pub mod mock;

pub use backend::*;
pub use execution::*;
pub use message::*;
pub use signal::*;

#[cfg(test)]
pub use mock::{MockBackend, MockBackendBuilder};
