//! Offline consistency check across the patch variants of one game.
//!
//! Every variant of a game is expected to expose the same names with the same
//! types and signatures. Divergence is a data defect reported here, not a
//! condition the synthesizer or the generated script handles.

use std::collections::BTreeSet;
use std::fmt;

use super::entry::{GameConfig, ModuleTable};
use super::types::{NativeType, VarType};
use crate::synth::is_valid_constant_name;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyIssue {
    MissingExecutableTable {
        patch: String,
    },
    ModuleMissing {
        module: String,
        patches: Vec<String>,
    },
    ConstantMissing {
        module: String,
        name: String,
        patches: Vec<String>,
    },
    VariableMissing {
        module: String,
        name: String,
        patches: Vec<String>,
    },
    HookMissing {
        module: String,
        name: String,
        patches: Vec<String>,
    },
    VariableTypeMismatch {
        module: String,
        name: String,
        base: (String, VarType),
        other: (String, VarType),
    },
    HookReturnMismatch {
        module: String,
        name: String,
        base: (String, NativeType),
        other: (String, NativeType),
    },
    HookParamsMismatch {
        module: String,
        name: String,
        base: String,
        other: String,
    },
    BlockWithoutSize {
        patch: String,
        module: String,
        name: String,
    },
    VoidParameter {
        patch: String,
        module: String,
        name: String,
    },
    NonNumericConstant {
        scope: String,
        name: String,
    },
    InvalidConstantName {
        scope: String,
        name: String,
    },
}

impl fmt::Display for ConsistencyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingExecutableTable { patch } => {
                write!(f, "patch {} has no table for the executable", patch)
            }
            Self::ModuleMissing { module, patches } => {
                write!(f, "{} missing from patches: {}", module, patches.join(", "))
            }
            Self::ConstantMissing {
                module,
                name,
                patches,
            } => write!(
                f,
                "{}: constant \"{}\" missing from patches: {}",
                module,
                name,
                patches.join(", ")
            ),
            Self::VariableMissing {
                module,
                name,
                patches,
            } => write!(
                f,
                "{}: variable \"{}\" missing from patches: {}",
                module,
                name,
                patches.join(", ")
            ),
            Self::HookMissing {
                module,
                name,
                patches,
            } => write!(
                f,
                "{}: hook \"{}\" missing from patches: {}",
                module,
                name,
                patches.join(", ")
            ),
            Self::VariableTypeMismatch {
                module,
                name,
                base,
                other,
            } => write!(
                f,
                "{}: {} type mismatch: {} has {}, {} has {}",
                module, name, base.0, base.1, other.0, other.1
            ),
            Self::HookReturnMismatch {
                module,
                name,
                base,
                other,
            } => write!(
                f,
                "{}: {} return type mismatch: {} has {}, {} has {}",
                module, name, base.0, base.1, other.0, other.1
            ),
            Self::HookParamsMismatch {
                module,
                name,
                base,
                other,
            } => write!(
                f,
                "{}: {} params mismatch: {} vs {}",
                module, name, base, other
            ),
            Self::BlockWithoutSize {
                patch,
                module,
                name,
            } => write!(f, "{}/{}: Block variable {} has no Size", patch, module, name),
            Self::VoidParameter {
                patch,
                module,
                name,
            } => write!(f, "{}/{}: hook {} uses void as a parameter", patch, module, name),
            Self::NonNumericConstant { scope, name } => {
                write!(f, "{}: constant {} is not a number", scope, name)
            }
            Self::InvalidConstantName { scope, name } => write!(
                f,
                "{}: constant name {:?} is not a usable script identifier",
                scope, name
            ),
        }
    }
}

/// Run every check for one game.
pub fn check_game(game: &GameConfig) -> Vec<ConsistencyIssue> {
    let mut issues = Vec::new();

    for name in non_numeric(&game.constants) {
        issues.push(ConsistencyIssue::NonNumericConstant {
            scope: game.id.clone(),
            name,
        });
    }
    for name in invalid_names(&game.constants) {
        issues.push(ConsistencyIssue::InvalidConstantName {
            scope: game.id.clone(),
            name,
        });
    }

    for (patch_key, patch) in &game.patches {
        if patch.module(&game.executable).is_none() {
            issues.push(ConsistencyIssue::MissingExecutableTable {
                patch: patch_key.clone(),
            });
        }
        for (module, table) in &patch.memory {
            check_table_entries(patch_key, module, table, &mut issues);
        }
    }

    if game.patches.len() > 1 {
        check_parity(game, &mut issues);
    }

    issues
}

fn check_table_entries(
    patch: &str,
    module: &str,
    table: &ModuleTable,
    issues: &mut Vec<ConsistencyIssue>,
) {
    for name in non_numeric(&table.constants) {
        issues.push(ConsistencyIssue::NonNumericConstant {
            scope: format!("{}/{}", patch, module),
            name,
        });
    }
    for name in invalid_names(&table.constants) {
        issues.push(ConsistencyIssue::InvalidConstantName {
            scope: format!("{}/{}", patch, module),
            name,
        });
    }
    for (name, def) in &table.variables {
        if def.kind.requires_size() && def.size.is_none() {
            issues.push(ConsistencyIssue::BlockWithoutSize {
                patch: patch.to_string(),
                module: module.to_string(),
                name: name.clone(),
            });
        }
    }
    for (name, def) in &table.hooks {
        if def.params.iter().any(NativeType::is_void) {
            issues.push(ConsistencyIssue::VoidParameter {
                patch: patch.to_string(),
                module: module.to_string(),
                name: name.clone(),
            });
        }
    }
}

fn non_numeric(constants: &indexmap::IndexMap<String, serde_json::Value>) -> Vec<String> {
    constants
        .iter()
        .filter(|(_, value)| !value.is_number())
        .map(|(name, _)| name.clone())
        .collect()
}

fn invalid_names(constants: &indexmap::IndexMap<String, serde_json::Value>) -> Vec<String> {
    constants
        .keys()
        .filter(|name| !is_valid_constant_name(name))
        .cloned()
        .collect()
}

fn check_parity(game: &GameConfig, issues: &mut Vec<ConsistencyIssue>) {
    let patch_names: Vec<&String> = game.patches.keys().collect();

    let mut modules = BTreeSet::new();
    for patch in game.patches.values() {
        modules.extend(patch.memory.keys().cloned());
    }

    for module in &modules {
        let missing: Vec<String> = game
            .patches
            .iter()
            .filter(|(_, patch)| patch.module(module).is_none())
            .map(|(key, _)| key.clone())
            .collect();
        if !missing.is_empty() {
            issues.push(ConsistencyIssue::ModuleMissing {
                module: module.clone(),
                patches: missing,
            });
        }

        check_names(game, module, issues);

        // Types and signatures are compared against the first patch
        let Some(base) = game.patches.get_index(0).and_then(|(_, p)| p.module(module)) else {
            continue;
        };
        let base_key = patch_names[0];
        for (other_key, other_patch) in game.patches.iter().skip(1) {
            let Some(other) = other_patch.module(module) else {
                continue;
            };
            for (name, base_var) in &base.variables {
                if let Some(other_var) = other.variable(name) {
                    if base_var.kind != other_var.kind {
                        issues.push(ConsistencyIssue::VariableTypeMismatch {
                            module: module.clone(),
                            name: name.clone(),
                            base: (base_key.clone(), base_var.kind),
                            other: (other_key.clone(), other_var.kind),
                        });
                    }
                }
            }
            for (name, base_hook) in &base.hooks {
                let Some(other_hook) = other.hook(name) else {
                    continue;
                };
                if base_hook.returns != other_hook.returns {
                    issues.push(ConsistencyIssue::HookReturnMismatch {
                        module: module.clone(),
                        name: name.clone(),
                        base: (base_key.clone(), base_hook.returns),
                        other: (other_key.clone(), other_hook.returns),
                    });
                }
                if base_hook.params != other_hook.params {
                    issues.push(ConsistencyIssue::HookParamsMismatch {
                        module: module.clone(),
                        name: name.clone(),
                        base: format!("{} {}", base_key, format_params(&base_hook.params)),
                        other: format!("{} {}", other_key, format_params(&other_hook.params)),
                    });
                }
            }
        }
    }
}

fn check_names(game: &GameConfig, module: &str, issues: &mut Vec<ConsistencyIssue>) {
    let tables: Vec<(&String, Option<&ModuleTable>)> = game
        .patches
        .iter()
        .map(|(key, patch)| (key, patch.module(module)))
        .collect();

    let mut constants = BTreeSet::new();
    let mut variables = BTreeSet::new();
    let mut hooks = BTreeSet::new();
    for table in tables.iter().filter_map(|(_, table)| *table) {
        constants.extend(table.constants.keys().cloned());
        variables.extend(table.variables.keys().cloned());
        hooks.extend(table.hooks.keys().cloned());
    }

    for name in constants {
        let patches = missing_from(&tables, |t| t.constants.contains_key(&name));
        if !patches.is_empty() {
            issues.push(ConsistencyIssue::ConstantMissing {
                module: module.to_string(),
                name,
                patches,
            });
        }
    }
    for name in variables {
        let patches = missing_from(&tables, |t| t.variables.contains_key(&name));
        if !patches.is_empty() {
            issues.push(ConsistencyIssue::VariableMissing {
                module: module.to_string(),
                name,
                patches,
            });
        }
    }
    for name in hooks {
        let patches = missing_from(&tables, |t| t.hooks.contains_key(&name));
        if !patches.is_empty() {
            issues.push(ConsistencyIssue::HookMissing {
                module: module.to_string(),
                name,
                patches,
            });
        }
    }
}

fn missing_from<F>(tables: &[(&String, Option<&ModuleTable>)], has: F) -> Vec<String>
where
    F: Fn(&ModuleTable) -> bool,
{
    tables
        .iter()
        .filter(|(_, table)| !table.is_some_and(|t| has(t)))
        .map(|(key, _)| (*key).clone())
        .collect()
}

fn format_params(params: &[NativeType]) -> String {
    let names: Vec<&str> = params.iter().map(|p| p.name()).collect();
    format!("[{}]", names.join(", "))
}
