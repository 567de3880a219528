use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "modweave")]
#[command(version)]
#[command(about = "Generate instrumentation scripts from declarative game mods")]
pub struct Args {
    /// Config file; relative directories in it resolve against its location
    #[arg(short, long, default_value = "modweave.toml", env = "MODWEAVE_CONFIG")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List loadable mods and their target executables
    List,

    /// Synthesize the script of a mod
    Generate {
        /// Mod id (`default` for mod.toml)
        id: String,

        /// Patch variant key; defaults to the game's default patch
        #[arg(short, long, conflicts_with = "binary")]
        patch: Option<String>,

        /// Detect the patch variant from this executable
        #[arg(short, long)]
        binary: Option<PathBuf>,

        /// Write the script here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show where each hook of a mod would be installed
    Targets {
        /// Mod id (`default` for mod.toml)
        id: String,

        /// Patch variant key; defaults to the game's default patch
        #[arg(short, long)]
        patch: Option<String>,
    },

    /// Check address tables for inconsistencies between patch variants
    Validate {
        /// Only check this game
        #[arg(short, long)]
        game: Option<String>,
    },

    /// Print the SHA-256 fingerprint of an executable
    Fingerprint { path: PathBuf },
}
