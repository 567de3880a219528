mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Args, Command};
use crate::commands::Context;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("modweave=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Command::List => commands::list::run(&Context::load(&args.config)?),
        Command::Generate {
            id,
            patch,
            binary,
            output,
        } => commands::generate::run(
            &Context::load(&args.config)?,
            &id,
            patch.as_deref(),
            binary.as_deref(),
            output.as_deref(),
        ),
        Command::Targets { id, patch } => {
            commands::targets::run(&Context::load(&args.config)?, &id, patch.as_deref())
        }
        Command::Validate { game } => {
            commands::validate::run(&Context::load(&args.config)?, game.as_deref())
        }
        Command::Fingerprint { path } => commands::fingerprint::run(&path),
    }
}
