//! Declaration model: what a mod wants done, captured as validated data.

mod builder;
mod callback;
mod hook;
mod patch;
mod task;
mod variable;

pub use builder::*;
pub use callback::*;
pub use hook::*;
pub use patch::*;
pub use task::LoopSpec;
pub(crate) use task::is_identifier;
pub use variable::*;
