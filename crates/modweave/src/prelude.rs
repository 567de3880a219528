//! Prelude module for convenient imports
//!
//! ```ignore
//! use modweave::prelude::*;
//! ```
//!
//! Brings the declaration builders, the catalogs, the synthesizer entry point
//! and `Error`/`Result` into scope.

// Declaring mods
pub use crate::declaration::{
    Callback, HookSpec, LogLevel, LoopSpec, ModBuilder, ModDeclaration, VariableSpec,
};

// Error handling
pub use crate::error::{Error, Result};

// Catalogs
pub use crate::catalog::ModCatalog;
pub use crate::resolver::GameCatalog;

// Tables
pub use crate::table::{NativeType, VarType};

// Synthesis
pub use crate::synth::synthesize;
