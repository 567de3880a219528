use std::fmt;

use crate::declaration::HookSpec;
use crate::table::{Address, NativeType, PatchVariant};

/// One concrete interception point for a hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookTarget {
    pub module: String,
    pub address: Address,
    pub params: Vec<NativeType>,
    pub returns: NativeType,
}

impl fmt::Display for HookTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<&str> = self.params.iter().map(NativeType::name).collect();
        write!(
            f,
            "{}+{} ({}) -> {}",
            self.module,
            self.address,
            params.join(", "),
            self.returns
        )
    }
}

/// Resolve the interception points of `hook`.
///
/// An explicit location is the only target. Otherwise every module in
/// `modules` that defines the hook contributes a target, in order, followed by
/// `executable`. Declared params and return type override the table's.
pub fn resolve_hook_targets(
    hook: &HookSpec,
    modules: &[String],
    executable: &str,
    patch: &PatchVariant,
) -> Vec<HookTarget> {
    if let Some((module, address)) = hook.location() {
        return vec![HookTarget {
            module: module.to_string(),
            address,
            params: hook.declared_params().map(<[_]>::to_vec).unwrap_or_default(),
            returns: hook.declared_return().unwrap_or_default(),
        }];
    }

    let mut searched: Vec<&str> = Vec::with_capacity(modules.len() + 1);
    for module in modules.iter().map(String::as_str).chain([executable]) {
        if !searched.contains(&module) {
            searched.push(module);
        }
    }

    searched
        .into_iter()
        .filter_map(|module| {
            let def = patch.module(module)?.hook(hook.name())?;
            Some(HookTarget {
                module: module.to_string(),
                address: def.address,
                params: hook
                    .declared_params()
                    .map(<[_]>::to_vec)
                    .unwrap_or_else(|| def.params.clone()),
                returns: hook.declared_return().unwrap_or(def.returns),
            })
        })
        .collect()
}
