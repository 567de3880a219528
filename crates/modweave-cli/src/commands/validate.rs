//! Validate command for checking address tables.

use anyhow::{Result, bail};
use modweave::check_game;

use super::Context;

pub fn run(ctx: &Context, game: Option<&str>) -> Result<()> {
    let games = match game {
        Some(id) => vec![ctx.games.get(id)?],
        None => ctx.games.games(),
    };

    let mut total = 0;
    for game in games {
        let issues = check_game(game);
        if issues.is_empty() {
            println!("{}: ok ({} patch variant(s))", game.id, game.patches.len());
            continue;
        }
        println!("{}: {} issue(s)", game.id, issues.len());
        for issue in &issues {
            println!("  - {}", issue);
        }
        total += issues.len();
    }

    if total > 0 {
        bail!("{} consistency issue(s) found", total);
    }
    Ok(())
}
