//! Address resolver: game catalog, binary fingerprinting and patch selection.

mod catalog;
mod fingerprint;
mod patch;

pub use catalog::*;
pub use fingerprint::*;
pub use patch::*;
