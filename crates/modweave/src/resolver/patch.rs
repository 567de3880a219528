//! Patch variant selection.
//!
//! Selection never fails for data-availability reasons: an unknown or
//! unreadable fingerprint falls back to the game's default patch. Only an
//! unknown game id is an error.

use std::path::Path;

use tracing::{info, warn};

use super::catalog::GameCatalog;
use super::fingerprint::fingerprint_file;
use crate::error::Result;
use crate::table::{GameConfig, PatchVariant};

/// Patch variant selected for one attach.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedPatch<'a> {
    pub game: &'a GameConfig,
    pub key: &'a str,
    pub variant: &'a PatchVariant,
    /// Whether the fingerprint matched, as opposed to a default fallback.
    pub matched: bool,
}

impl GameCatalog {
    /// Select the patch variant of `game` matching `fingerprint`.
    pub fn resolve_patch(&self, game: &str, fingerprint: Option<&str>) -> Result<ResolvedPatch<'_>> {
        let config = self.get(game)?;

        if let Some(fingerprint) = fingerprint {
            if let Some((key, variant)) = config.find_by_fingerprint(fingerprint) {
                info!("Detected {} {} ({})", config.name, variant.name, key);
                return Ok(ResolvedPatch {
                    game: config,
                    key,
                    variant,
                    matched: true,
                });
            }
            warn!(
                "Unknown {} binary (fingerprint {}), using default patch {}",
                config.id, fingerprint, config.default_patch
            );
        }

        let key = config.default_patch.as_str();
        let variant = config.patch(key)?;
        Ok(ResolvedPatch {
            game: config,
            key,
            variant,
            matched: false,
        })
    }

    /// Fingerprint the binary at `path` and select its patch variant.
    ///
    /// A binary that cannot be read is logged and resolves to the default.
    pub fn resolve_binary<P: AsRef<Path>>(&self, game: &str, path: P) -> Result<ResolvedPatch<'_>> {
        let path = path.as_ref();
        match fingerprint_file(path) {
            Ok(fingerprint) => self.resolve_patch(game, Some(&fingerprint)),
            Err(e) => {
                warn!("Could not fingerprint {}: {}", path.display(), e);
                self.resolve_patch(game, None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::resolver::fingerprint_bytes;
    use crate::table::fixtures::sample_game;
    use std::fs;
    use tempfile::TempDir;

    fn catalog() -> GameCatalog {
        let mut game = sample_game();
        let mut hotfix = game.patches["patch4"].clone();
        hotfix.name = "Patch 4.1".to_string();
        hotfix.fingerprint = fingerprint_bytes(b"tomb123 patch 4.1");
        game.patches.insert("patch4.1".to_string(), hotfix);
        GameCatalog::from_games([game])
    }

    #[test]
    fn test_matching_fingerprint_selects_variant() {
        let catalog = catalog();
        let fingerprint = fingerprint_bytes(b"tomb123 patch 4.1");
        let resolved = catalog.resolve_patch("tomb123", Some(&fingerprint)).unwrap();
        assert_eq!(resolved.key, "patch4.1");
        assert_eq!(resolved.variant.name, "Patch 4.1");
        assert!(resolved.matched);
    }

    #[test]
    fn test_unknown_fingerprint_falls_back_to_default() {
        let catalog = catalog();
        let resolved = catalog.resolve_patch("tomb123", Some("ffff")).unwrap();
        assert_eq!(resolved.key, "patch4");
        assert!(!resolved.matched);
    }

    #[test]
    fn test_unknown_game_is_the_only_failure() {
        let err = catalog().resolve_patch("tomb999", Some("aa11")).unwrap_err();
        assert!(matches!(err, Error::UnknownGame(_)));
    }

    #[test]
    fn test_resolve_binary_hashes_file() {
        let dir = TempDir::new().unwrap();
        let exe = dir.path().join("tomb123.exe");
        fs::write(&exe, b"tomb123 patch 4.1").unwrap();

        let catalog = catalog();
        let resolved = catalog.resolve_binary("tomb123", &exe).unwrap();
        assert_eq!(resolved.key, "patch4.1");
    }

    #[test]
    fn test_unreadable_binary_falls_back_to_default() {
        let dir = TempDir::new().unwrap();
        let catalog = catalog();
        let resolved = catalog
            .resolve_binary("tomb123", dir.path().join("missing.exe"))
            .unwrap();
        assert_eq!(resolved.key, "patch4");
        assert!(!resolved.matched);
    }
}
