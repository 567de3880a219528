//! Per-game address tables.
//!
//! A game config names the main executable, the sub-binary modules, shared
//! constants and one [`PatchVariant`] per known build of the executable.

mod address;
mod consistency;
mod entry;
mod loader;
mod types;

pub use address::*;
pub use consistency::*;
pub use entry::*;
pub use loader::*;
pub use types::*;

#[cfg(test)]
pub(crate) use entry::fixtures;
