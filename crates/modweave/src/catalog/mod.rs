//! Mod catalog: discovers mod files and turns them into declarations.

mod file;
mod store;

pub use file::*;
pub use store::*;
