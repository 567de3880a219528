//! Generate command for writing a mod's script.

use std::fs;
use std::path::Path;

use anyhow::Result;

use super::Context;

pub fn run(
    ctx: &Context,
    id: &str,
    patch: Option<&str>,
    binary: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    let script = match binary {
        Some(binary) => {
            let declaration = ctx.mods.load(id)?;
            let resolved = ctx.games.resolve_binary(declaration.game(), binary)?;
            eprintln!("Detected patch: {} ({})", resolved.variant.name, resolved.key);
            modweave::synthesize(&declaration, resolved.game, resolved.variant)?
        }
        None => {
            let (declaration, game, variant) = ctx.mod_with_patch(id, patch)?;
            eprintln!("Using patch: {}", variant.name);
            modweave::synthesize(&declaration, game, variant)?
        }
    };

    if let Some(output) = output {
        fs::write(output, &script)?;
        eprintln!("Wrote {} bytes to {}", script.len(), output.display());
    } else {
        print!("{}", script);
    }
    Ok(())
}
