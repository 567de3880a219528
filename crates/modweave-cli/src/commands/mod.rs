pub mod fingerprint;
pub mod generate;
pub mod list;
pub mod targets;
pub mod validate;

use std::path::Path;

use anyhow::{Context as _, Result};
use modweave::{Config, GameCatalog, GameConfig, ModCatalog, ModDeclaration, PatchVariant};
use tracing::debug;

/// Config plus both catalogs, loaded once per invocation.
pub struct Context {
    pub config: Config,
    pub games: GameCatalog,
    pub mods: ModCatalog,
}

impl Context {
    pub fn load(config_path: &Path) -> Result<Self> {
        let base = config_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let config = Config::load_or_default(config_path).relative_to(base);
        debug!("Using config {:?}", config);

        let games = GameCatalog::load(&config.games_dir)
            .with_context(|| format!("failed to load games from {}", config.games_dir.display()))?;
        let mods = ModCatalog::scan(&config.mods_dir)
            .with_context(|| format!("failed to scan mods in {}", config.mods_dir.display()))?;

        Ok(Self { config, games, mods })
    }

    /// Load mod `id` and pick its patch variant by key, or the default.
    pub fn mod_with_patch(
        &self,
        id: &str,
        patch: Option<&str>,
    ) -> Result<(ModDeclaration, &GameConfig, &PatchVariant)> {
        let declaration = self.mods.load(id)?;
        let game = self.games.get(declaration.game())?;
        let variant = match patch {
            Some(key) => game.patch(key)?,
            None => game.default_variant()?,
        };
        Ok((declaration, game, variant))
    }
}
