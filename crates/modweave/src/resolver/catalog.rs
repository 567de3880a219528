use std::collections::HashMap;
use std::path::Path;

use tracing::info;

use crate::error::{Error, Result};
use crate::table::{GameConfig, load_games_dir};

/// Every known game, keyed by id. Read-only once loaded.
#[derive(Debug, Clone, Default)]
pub struct GameCatalog {
    games: HashMap<String, GameConfig>,
}

impl GameCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every game under `dir`.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let catalog = Self::from_games(load_games_dir(dir.as_ref())?);
        info!(
            "Loaded {} game(s) from {}",
            catalog.len(),
            dir.as_ref().display()
        );
        Ok(catalog)
    }

    pub fn from_games(games: impl IntoIterator<Item = GameConfig>) -> Self {
        Self {
            games: games
                .into_iter()
                .map(|game| (game.id.clone(), game))
                .collect(),
        }
    }

    pub fn insert(&mut self, game: GameConfig) {
        self.games.insert(game.id.clone(), game);
    }

    pub fn get(&self, id: &str) -> Result<&GameConfig> {
        self.games
            .get(id)
            .ok_or_else(|| Error::UnknownGame(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.games.contains_key(id)
    }

    /// Games sorted by id.
    pub fn games(&self) -> Vec<&GameConfig> {
        let mut games: Vec<&GameConfig> = self.games.values().collect();
        games.sort_by(|a, b| a.id.cmp(&b.id));
        games
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }
}
