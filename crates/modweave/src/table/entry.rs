use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::address::Address;
use super::types::{NativeType, VarType};
use crate::error::{Error, Result};

/// A named variable in a module's address table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VariableDef {
    pub address: Address,
    #[serde(rename = "Type")]
    pub kind: VarType,
    /// Pointer-chase offset applied after dereferencing `address`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pointer: Option<Address>,
    /// Byte length, required for `Block`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// A named native function in a module's address table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HookDef {
    pub address: Address,
    #[serde(default)]
    pub params: Vec<NativeType>,
    #[serde(default, rename = "Return")]
    pub returns: NativeType,
}

/// Variables, hooks and constants of one binary module in one patch variant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleTable {
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub constants: IndexMap<String, Value>,
    #[serde(default)]
    pub variables: IndexMap<String, VariableDef>,
    #[serde(default)]
    pub hooks: IndexMap<String, HookDef>,
}

impl ModuleTable {
    pub fn variable(&self, name: &str) -> Option<&VariableDef> {
        self.variables.get(name)
    }

    pub fn hook(&self, name: &str) -> Option<&HookDef> {
        self.hooks.get(name)
    }

    pub fn constant(&self, name: &str) -> Option<&Value> {
        self.constants.get(name)
    }
}

/// One versioned snapshot of a game's memory layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchVariant {
    pub name: String,
    /// Hex-encoded SHA-256 of the game executable
    #[serde(rename = "patch")]
    pub fingerprint: String,
    pub memory: IndexMap<String, ModuleTable>,
}

impl PatchVariant {
    pub fn module(&self, name: &str) -> Option<&ModuleTable> {
        self.memory.get(name)
    }

    pub fn matches(&self, fingerprint: &str) -> bool {
        self.fingerprint == fingerprint
    }
}

/// Display metadata of one game module (a sub-binary of the family).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub id: String,
    pub name: String,
}

/// Static configuration of one game: modules, constants and every known patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameConfig {
    pub id: String,
    pub name: String,
    pub executable: String,
    /// Module file name -> metadata, in `GameVersion` index order
    pub modules: IndexMap<String, ModuleInfo>,
    #[serde(default)]
    pub constants: IndexMap<String, Value>,
    pub patches: IndexMap<String, PatchVariant>,
    pub default_patch: String,
}

impl GameConfig {
    /// Check structural invariants that every consumer relies on.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() || self.executable.is_empty() {
            return Err(Error::InvalidGameConfig(
                "id and executable must be non-empty".to_string(),
            ));
        }
        if self.patches.is_empty() {
            return Err(Error::InvalidGameConfig(format!(
                "game {} declares no patches",
                self.id
            )));
        }
        if !self.patches.contains_key(&self.default_patch) {
            return Err(Error::InvalidGameConfig(format!(
                "defaultPatch '{}' not found in patches of {}",
                self.default_patch, self.id
            )));
        }
        Ok(())
    }

    pub fn patch(&self, key: &str) -> Result<&PatchVariant> {
        self.patches.get(key).ok_or_else(|| Error::UnknownPatch {
            game: self.id.clone(),
            patch: key.to_string(),
        })
    }

    pub fn default_variant(&self) -> Result<&PatchVariant> {
        self.patch(&self.default_patch)
    }

    /// Find the patch whose fingerprint matches, returning its key.
    pub fn find_by_fingerprint(&self, fingerprint: &str) -> Option<(&str, &PatchVariant)> {
        self.patches
            .iter()
            .find(|(_, variant)| variant.matches(fingerprint))
            .map(|(key, variant)| (key.as_str(), variant))
    }

    /// Module selected by a `GameVersion` value, if in range.
    pub fn module_at(&self, index: usize) -> Option<&str> {
        self.modules.get_index(index).map(|(name, _)| name.as_str())
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::sample_game;
    use super::*;

    #[test]
    fn test_variable_def_table_format() {
        let def: VariableDef =
            serde_json::from_str(r#"{ "Address": "0x25FA74", "Type": "Block", "Size": 16 }"#)
                .unwrap();
        assert_eq!(def.address, Address(0x25fa74));
        assert_eq!(def.kind, VarType::Block);
        assert_eq!(def.size, Some(16));
        assert_eq!(def.pointer, None);

        let json = serde_json::to_string(&def).unwrap();
        assert_eq!(json, r#"{"Address":"0x25fa74","Type":"Block","Size":16}"#);
    }

    #[test]
    fn test_hook_def_defaults() {
        let def: HookDef = serde_json::from_str(r#"{ "Address": "0x1930" }"#).unwrap();
        assert!(def.params.is_empty());
        assert_eq!(def.returns, NativeType::Void);
    }

    #[test]
    fn test_sample_game_is_valid() {
        let game = sample_game();
        game.validate().unwrap();
        assert_eq!(game.default_variant().unwrap().name, "Patch 4");
        assert_eq!(game.module_at(1), Some("tomb2.dll"));
        assert_eq!(game.module_at(2), None);
    }

    #[test]
    fn test_validate_rejects_missing_default_patch() {
        let mut game = sample_game();
        game.default_patch = "patch9".to_string();
        assert!(matches!(game.validate(), Err(Error::InvalidGameConfig(_))));
    }

    #[test]
    fn test_find_by_fingerprint_is_verbatim() {
        let game = sample_game();
        let (key, _) = game.find_by_fingerprint("aa11").unwrap();
        assert_eq!(key, "patch4");
        assert!(game.find_by_fingerprint("AA11").is_none());
        assert!(game.find_by_fingerprint("bb22").is_none());
    }
}
