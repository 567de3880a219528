//! Game config loading.
//!
//! A game lives in `<games_dir>/<id>/<id>.json`. Each patch maps module file
//! names to tables that are either inline or stored in separate JSON files
//! relative to the game directory. A table may inherit the same module's
//! table from another patch and override individual entries, which is how
//! hotfix variants are described.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::entry::{GameConfig, HookDef, ModuleInfo, ModuleTable, PatchVariant, VariableDef};
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GameFile {
    id: String,
    name: String,
    executable: String,
    modules: IndexMap<String, ModuleInfo>,
    #[serde(default)]
    constants: IndexMap<String, Value>,
    patches: IndexMap<String, PatchFile>,
    default_patch: String,
}

#[derive(Debug, Deserialize)]
struct PatchFile {
    name: String,
    patch: String,
    #[serde(default)]
    memory: IndexMap<String, TableSource>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TableSource {
    File(PathBuf),
    Inline(ModuleTableFile),
}

#[derive(Debug, Default, Deserialize)]
struct ModuleTableFile {
    #[serde(default)]
    inherits: Option<String>,
    #[serde(default)]
    constants: IndexMap<String, Value>,
    #[serde(default)]
    variables: IndexMap<String, VariableDef>,
    #[serde(default)]
    hooks: IndexMap<String, HookDef>,
}

/// Load one game config file, resolving table files and inheritance.
pub fn load_game<P: AsRef<Path>>(path: P) -> Result<GameConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let file: GameFile = serde_json::from_str(&content)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut raw: IndexMap<String, IndexMap<String, ModuleTableFile>> = IndexMap::new();
    let mut patches_meta = Vec::with_capacity(file.patches.len());
    for (patch_key, patch) in file.patches {
        let mut tables = IndexMap::new();
        for (module, source) in patch.memory {
            let table = match source {
                TableSource::Inline(table) => table,
                TableSource::File(relative) => read_table_file(&base_dir.join(relative))?,
            };
            tables.insert(module, table);
        }
        raw.insert(patch_key.clone(), tables);
        patches_meta.push((patch_key, patch.name, patch.patch));
    }

    let mut resolver = InheritanceResolver {
        raw: &raw,
        resolved: HashMap::new(),
        visiting: Vec::new(),
    };

    let mut patches = IndexMap::new();
    for (patch_key, name, fingerprint) in patches_meta {
        let mut memory = IndexMap::new();
        if let Some(tables) = raw.get(&patch_key) {
            for module in tables.keys() {
                let table = resolver.resolve(&patch_key, module)?;
                memory.insert(module.clone(), table);
            }
        }
        patches.insert(
            patch_key,
            PatchVariant {
                name,
                fingerprint,
                memory,
            },
        );
    }

    let game = GameConfig {
        id: file.id,
        name: file.name,
        executable: file.executable,
        modules: file.modules,
        constants: file.constants,
        patches,
        default_patch: file.default_patch,
    };
    game.validate()?;

    debug!(
        "Loaded game {} with {} patch variant(s) from {:?}",
        game.id,
        game.patches.len(),
        path
    );
    Ok(game)
}

/// Load every `<dir>/<id>/<id>.json` under `dir`.
///
/// Directories without a matching config file are skipped.
pub fn load_games_dir<P: AsRef<Path>>(dir: P) -> Result<Vec<GameConfig>> {
    let mut games = Vec::new();
    let mut entries: Vec<_> = fs::read_dir(dir.as_ref())?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    entries.sort();

    for game_dir in entries {
        let Some(id) = game_dir.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let config_path = game_dir.join(format!("{}.json", id));
        if !config_path.is_file() {
            warn!("Skipping {:?}: no {}.json", game_dir, id);
            continue;
        }
        games.push(load_game(&config_path)?);
    }

    Ok(games)
}

fn read_table_file(path: &Path) -> Result<ModuleTableFile> {
    let content = fs::read_to_string(path)?;
    let table = serde_json::from_str(&content)?;
    Ok(table)
}

struct InheritanceResolver<'a> {
    raw: &'a IndexMap<String, IndexMap<String, ModuleTableFile>>,
    resolved: HashMap<(String, String), ModuleTable>,
    visiting: Vec<String>,
}

impl InheritanceResolver<'_> {
    fn resolve(&mut self, patch: &str, module: &str) -> Result<ModuleTable> {
        let key = (patch.to_string(), module.to_string());
        if let Some(table) = self.resolved.get(&key) {
            return Ok(table.clone());
        }

        if self.visiting.iter().any(|p| p == patch) {
            let mut chain = self.visiting.clone();
            chain.push(patch.to_string());
            return Err(Error::InheritanceCycle(format!(
                "{} ({})",
                chain.join(" -> "),
                module
            )));
        }

        let file = self
            .raw
            .get(patch)
            .ok_or_else(|| Error::InvalidGameConfig(format!("unknown patch '{}'", patch)))?
            .get(module)
            .ok_or_else(|| {
                Error::InvalidGameConfig(format!(
                    "patch '{}' has no table for {}",
                    patch, module
                ))
            })?;

        self.visiting.push(patch.to_string());
        let mut table = match &file.inherits {
            Some(parent) => self.resolve(parent, module)?,
            None => ModuleTable::default(),
        };
        self.visiting.pop();

        table.constants.extend(file.constants.clone());
        table.variables.extend(file.variables.clone());
        table.hooks.extend(file.hooks.clone());

        self.resolved.insert(key, table.clone());
        Ok(table)
    }
}
