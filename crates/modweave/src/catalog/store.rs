use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::{debug, error};

use super::file::ModFile;
use crate::declaration::ModDeclaration;
use crate::error::{Error, Result};
use crate::resolver::GameCatalog;

/// Id of the mod stored in plain `mod.toml`.
pub const DEFAULT_MOD_ID: &str = "default";

/// One entry of the mod list shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModSummary {
    pub id: String,
    pub name: String,
    pub game: String,
    /// Process name of the target game.
    pub executable: String,
}

/// Mod files found in a mods directory.
///
/// `mod.toml` has id `default`; `mod.<id>.toml` has id `<id>`.
#[derive(Debug, Clone, Default)]
pub struct ModCatalog {
    files: IndexMap<String, PathBuf>,
}

/// Mod id for a file name, if it is a mod file.
pub fn mod_id(file_name: &str) -> Option<&str> {
    if file_name == "mod.toml" {
        return Some(DEFAULT_MOD_ID);
    }
    let id = file_name.strip_prefix("mod.")?.strip_suffix(".toml")?;
    if id.is_empty() { None } else { Some(id) }
}

impl ModCatalog {
    /// Scan `dir` for mod files. A missing directory yields an empty catalog.
    pub fn scan<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Mods directory {:?} does not exist", dir);
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        let mut found: Vec<(String, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter_map(|path| {
                let id = path.file_name()?.to_str().and_then(mod_id)?.to_string();
                Some((id, path))
            })
            .collect();
        found.sort();

        debug!("Found {} mod file(s) in {:?}", found.len(), dir);
        Ok(Self {
            files: found.into_iter().collect(),
        })
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn path(&self, id: &str) -> Option<&Path> {
        self.files.get(id).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Parse and validate the mod stored under `id`.
    pub fn load(&self, id: &str) -> Result<ModDeclaration> {
        let path = self
            .path(id)
            .ok_or_else(|| Error::ModNotFound(id.to_string()))?;
        load_mod_file(path)
    }

    /// Summaries of every loadable mod. Files that fail to load are skipped.
    pub fn summaries(&self, games: &GameCatalog) -> Vec<ModSummary> {
        let mut summaries = Vec::with_capacity(self.files.len());
        for id in self.files.keys() {
            let summary = self.load(id).and_then(|decl| {
                let game = games.get(decl.game())?;
                Ok(ModSummary {
                    id: id.clone(),
                    name: decl.name().to_string(),
                    game: game.id.clone(),
                    executable: game.executable.clone(),
                })
            });
            match summary {
                Ok(summary) => summaries.push(summary),
                Err(e) => error!("Failed to load mod {}: {}", id, e),
            }
        }
        summaries
    }
}

/// Parse one mod file, reporting any failure against its path.
pub fn load_mod_file<P: AsRef<Path>>(path: P) -> Result<ModDeclaration> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    ModFile::parse(&content)
        .and_then(ModFile::into_declaration)
        .map_err(|e| Error::InvalidModFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}
