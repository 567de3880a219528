//! List command for showing available mods.

use anyhow::Result;

use super::Context;

pub fn run(ctx: &Context) -> Result<()> {
    let summaries = ctx.mods.summaries(&ctx.games);
    if summaries.is_empty() {
        eprintln!("No mods found in {}", ctx.config.mods_dir.display());
        return Ok(());
    }

    let width = summaries.iter().map(|s| s.id.len()).max().unwrap_or(0);
    for summary in summaries {
        println!(
            "{:<width$}  {} ({})",
            summary.id,
            summary.name,
            summary.executable,
            width = width
        );
    }
    Ok(())
}
