//! Targets command for showing resolved hook locations.

use anyhow::Result;
use modweave::ScriptSynthesizer;

use super::Context;

pub fn run(ctx: &Context, id: &str, patch: Option<&str>) -> Result<()> {
    let (declaration, game, variant) = ctx.mod_with_patch(id, patch)?;
    println!("{} on {} ({})", declaration.name(), game.name, variant.name);

    let synthesizer = ScriptSynthesizer::new(&declaration, game, variant);
    for (hook, targets) in synthesizer.hook_targets() {
        if targets.is_empty() {
            println!("  {}: not in any table, skipped at runtime", hook.name());
            continue;
        }
        println!("  {}:", hook.name());
        for target in targets {
            println!("    {}", target);
        }
    }
    Ok(())
}
