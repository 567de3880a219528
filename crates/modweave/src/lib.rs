//! # modweave
//!
//! Turns declarative game mods into instrumentation scripts.
//!
//! This crate provides:
//! - A declaration model for mods (variables, hooks, loops, instruction
//!   patches, receivers, event handlers)
//! - Per-game address tables with patch variants, hotfix inheritance and an
//!   offline consistency check
//! - Patch detection by SHA-256 fingerprint of the game executable
//! - The script synthesizer and its embedded runtime support
//! - An execution shell that drives an instrumentation backend through
//!   attach, injection, messaging and teardown
//! - A catalog of TOML mod files

pub mod catalog;
pub mod config;
pub mod declaration;
pub mod error;
pub mod prelude;
pub mod resolver;
pub mod shell;
pub mod synth;
pub mod table;

pub use catalog::{ModCatalog, ModFile, ModSummary, load_mod_file};
pub use config::{Config, ShellConfig, ShellSettings, ShellSettingsBuilder};
pub use declaration::{
    Callback, EventHandler, HookAction, HookSpec, InstructionPatchSpec, LogLevel, LoopSpec,
    ModBuilder, ModDeclaration, VariableSpec,
};
pub use error::{Error, Result};
pub use resolver::{GameCatalog, ResolvedPatch, fingerprint_bytes, fingerprint_file};
pub use shell::{
    AttachOutcome, CancelSignal, ExecutionShell, InstrumentationBackend, InstrumentedSession,
    ShellEvent, ShellStatus,
};
pub use synth::{HookTarget, ScriptSynthesizer, synthesize};
pub use table::{
    Address, ConsistencyIssue, GameConfig, HookDef, ModuleTable, NativeType, PatchVariant,
    VarType, VariableDef, check_game, load_game, load_games_dir,
};
