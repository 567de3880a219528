//! Script synthesis.
//!
//! Blocks are emitted in a fixed order and joined by blank lines. Later blocks
//! refer to names defined by earlier ones, and `__init();` is always the last
//! statement.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, warn};

use super::hooks::{HookTarget, resolve_hook_targets};
use super::render::{callback_expr, constant_literal, js_string};
use super::runtime::{is_valid_constant_name, runtime_source};
use crate::config::timing::MODULE_POLL_INTERVAL_MS;
use crate::declaration::{Callback, HookAction, HookSpec, ModDeclaration};
use crate::error::Result;
use crate::table::{Conversion, GameConfig, ModuleTable, NativeType, PatchVariant};

#[derive(Serialize)]
struct Manifest<'a> {
    executable: &'a str,
    modules: IndexMap<&'a str, &'a str>,
}

/// Turns a mod declaration and one patch variant into script text.
pub struct ScriptSynthesizer<'a> {
    declaration: &'a ModDeclaration,
    game: &'a GameConfig,
    patch: &'a PatchVariant,
}

impl<'a> ScriptSynthesizer<'a> {
    pub fn new(declaration: &'a ModDeclaration, game: &'a GameConfig, patch: &'a PatchVariant) -> Self {
        Self {
            declaration,
            game,
            patch,
        }
    }

    /// Generate the complete script.
    pub fn synthesize(&self) -> Result<String> {
        let blocks = [
            runtime_source(),
            self.emit_manifest()?,
            self.emit_constants(),
            self.emit_address_table()?,
            self.emit_custom_variables()?,
            self.emit_init()?,
            self.emit_function_registrations()?,
            self.emit_hooks(),
            self.emit_loops(),
            self.emit_nops(),
            self.emit_exit(),
            self.emit_receivers(),
            self.emit_startup(),
        ];

        let script = blocks
            .iter()
            .filter(|block| !block.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n\n");

        debug!(
            "Synthesized {} bytes for mod {} ({})",
            script.len(),
            self.declaration.name(),
            self.patch.name
        );
        Ok(script + "\n")
    }

    /// The executable followed by the mod's modules, without repeats.
    pub fn dependency_modules(&self) -> Vec<&'a str> {
        let mut modules = vec![self.game.executable.as_str()];
        for module in self.declaration.modules() {
            if !modules.contains(&module.as_str()) {
                modules.push(module.as_str());
            }
        }
        modules
    }

    /// Every resolved target, per hook, in declaration order.
    pub fn hook_targets(&self) -> Vec<(&'a HookSpec, Vec<HookTarget>)> {
        self.declaration
            .hooks()
            .iter()
            .map(|hook| {
                let targets = resolve_hook_targets(
                    hook,
                    self.declaration.modules(),
                    &self.game.executable,
                    self.patch,
                );
                (hook, targets)
            })
            .collect()
    }

    fn emit_manifest(&self) -> Result<String> {
        let manifest = Manifest {
            executable: &self.game.executable,
            modules: self
                .game
                .modules
                .iter()
                .map(|(file, info)| (file.as_str(), info.name.as_str()))
                .collect(),
        };
        Ok(format!(
            "const manifest = {};\nconst _supportedModules = {};",
            serde_json::to_string_pretty(&manifest)?,
            serde_json::to_string(self.declaration.modules())?
        ))
    }

    fn emit_constants(&self) -> String {
        let mut constants = self.game.constants.clone();
        // Patch-level executable constants win over game-level ones
        if let Some(exe) = self.patch.module(&self.game.executable) {
            for (name, value) in &exe.constants {
                constants.insert(name.clone(), value.clone());
            }
        }

        constants
            .iter()
            .filter(|(name, _)| {
                let valid = is_valid_constant_name(name);
                if !valid {
                    warn!(
                        "Skipping constant {:?} of game {}: not a free script identifier",
                        name, self.game.id
                    );
                }
                valid
            })
            .map(|(name, value)| format!("const {} = {};", name, constant_literal(value)))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn emit_address_table(&self) -> Result<String> {
        let tables: IndexMap<&str, &ModuleTable> = self
            .dependency_modules()
            .into_iter()
            .filter_map(|module| self.patch.module(module).map(|table| (module, table)))
            .collect();
        Ok(format!(
            "const memoryAddresses = {};",
            serde_json::to_string_pretty(&tables)?
        ))
    }

    fn emit_custom_variables(&self) -> Result<String> {
        let mut lines = Vec::new();
        for variable in self.declaration.variables() {
            let Some((module, def)) = variable.explicit() else {
                continue;
            };
            let module = js_string(module);
            lines.push(format!(
                "if (!memoryAddresses[{0}]) memoryAddresses[{0}] = {{ variables: {{}}, hooks: {{}} }};",
                module
            ));
            lines.push(format!(
                "if (!memoryAddresses[{0}].variables) memoryAddresses[{0}].variables = {{}};",
                module
            ));
            lines.push(format!(
                "memoryAddresses[{}].variables[{}] = {};",
                module,
                js_string(variable.name()),
                serde_json::to_string(&def)?
            ));
        }
        Ok(lines.join("\n"))
    }

    fn emit_init(&self) -> Result<String> {
        let mut output = String::from("async function __init() {\n");
        output.push_str(&format!(
            "    const modulesToResolve = {};\n",
            serde_json::to_string(&self.dependency_modules())?
        ));
        output.push_str("    for (const modName of modulesToResolve) {\n");
        output.push_str("        let base = Module.findBaseAddress(modName);\n");
        output.push_str("        while (!base) {\n");
        output.push_str(&format!(
            "            await game.delay({});\n",
            MODULE_POLL_INTERVAL_MS
        ));
        output.push_str("            base = Module.findBaseAddress(modName);\n");
        output.push_str("        }\n");
        output.push_str("        __state.moduleBases[modName] = base;\n");
        output.push_str("    }\n\n");
        output.push_str("    __registerFunctions();\n");
        output.push_str("    __installHooks();\n");
        output.push_str("    __installLoops();\n");
        output.push_str("    __installNops();\n");

        if let Some(init) = self.declaration.init() {
            output.push('\n');
            output.push_str("    while (!game.isModuleSupported(game.module)) {\n");
            output.push_str(&format!(
                "        await game.delay({});\n",
                MODULE_POLL_INTERVAL_MS
            ));
            output.push_str("    }\n");
            output.push_str("    try {\n");
            output.push_str(&format!("        ({})();\n", callback_expr(init)));
            output.push_str("    } catch (e) { error('Init error:', e.stack); }\n");
        }

        output.push('\n');
        output.push_str("    send({ event: '__ready' });\n");
        output.push('}');
        Ok(output)
    }

    fn emit_function_registrations(&self) -> Result<String> {
        let mut lines = vec!["function __registerFunctions() {".to_string()];
        for module in self.dependency_modules() {
            let Some(table) = self.patch.module(module) else {
                continue;
            };
            for (name, def) in &table.hooks {
                lines.push("    try {".to_string());
                lines.push(format!(
                    "        game.registerFunction({}, {}, {}, {}, {});",
                    js_string(module),
                    js_string(name),
                    js_string(&def.address.to_string()),
                    js_string(def.returns.name()),
                    serde_json::to_string(&def.params)?
                ));
                lines.push(format!(
                    "    }} catch (e) {{ error({}, e.message); }}",
                    js_string(&format!("Failed to register {}:", name))
                ));
            }
        }
        lines.push("}".to_string());
        Ok(lines.join("\n"))
    }

    fn emit_hooks(&self) -> String {
        let mut lines = vec!["function __installHooks() {".to_string()];
        let dependencies = self.dependency_modules();
        for (hook, targets) in self.hook_targets() {
            if targets.is_empty() {
                warn!(
                    "Hook {} of mod {} not found in patch {}",
                    hook.name(),
                    self.declaration.name(),
                    self.patch.name
                );
                lines.push(format!(
                    "    error({});",
                    js_string(&format!("Hook not found in patch data: {}", hook.name()))
                ));
                continue;
            }
            for target in &targets {
                if !dependencies.contains(&target.module.as_str()) {
                    warn!(
                        "Hook {} of mod {} targets {}, which is not a dependency",
                        hook.name(),
                        self.declaration.name(),
                        target.module
                    );
                    lines.push(format!(
                        "    error({});",
                        js_string(&format!(
                            "Hook {}: module {} is not a dependency of this mod",
                            hook.name(),
                            target.module
                        ))
                    ));
                    continue;
                }
                match hook.action() {
                    HookAction::Replace(callback) => {
                        self.emit_replace(&mut lines, hook.name(), target, &callback)
                    }
                    HookAction::Attach { on_enter, on_leave } => self.emit_attach(
                        &mut lines,
                        hook.name(),
                        target,
                        on_enter.as_ref(),
                        on_leave.as_ref(),
                    ),
                }
            }
        }
        lines.push("}".to_string());
        lines.join("\n")
    }

    fn emit_replace(&self, lines: &mut Vec<String>, name: &str, target: &HookTarget, callback: &Callback) {
        let arg_names: Vec<String> = (0..target.params.len()).map(|i| format!("arg{}", i)).collect();
        let spread: String = arg_names.iter().map(|a| format!(", {}", a)).collect();
        let native_params: Vec<String> = target
            .params
            .iter()
            .map(|p| format!("'{}'", p.name()))
            .collect();
        let fallback = if target.returns.is_void() {
            "undefined"
        } else {
            "ptr(0x0)"
        };

        lines.push("    try {".to_string());
        lines.push(format!(
            "        const _hookAddr = __state.moduleBases[{}].add({});",
            js_string(&target.module),
            target.address
        ));
        lines.push("        Interceptor.replace(_hookAddr, new NativeCallback(".to_string());
        lines.push(format!("            function({}) {{", arg_names.join(", ")));
        lines.push("                try {".to_string());
        lines.push(format!(
            "                    return ({}).call(null{});",
            callback_expr(callback),
            spread
        ));
        lines.push(format!(
            "                }} catch (e) {{ error({}, e.stack); return {}; }}",
            js_string(&format!("Hook {} replace error:", name)),
            fallback
        ));
        lines.push("            },".to_string());
        lines.push(format!(
            "            '{}', [{}]",
            target.returns.name(),
            native_params.join(", ")
        ));
        lines.push("        ));".to_string());
        lines.push("        __state.replacedFunctions.push(_hookAddr);".to_string());
        lines.push(install_catch(name));
    }

    fn emit_attach(
        &self,
        lines: &mut Vec<String>,
        name: &str,
        target: &HookTarget,
        on_enter: Option<&Callback>,
        on_leave: Option<&Callback>,
    ) {
        let converted: Vec<String> = target
            .params
            .iter()
            .enumerate()
            .map(|(i, ty)| convert_native(&format!("args[{}]", i), *ty))
            .collect();
        let capture = on_leave.is_some() && !target.params.is_empty();

        lines.push("    try {".to_string());
        lines.push(format!(
            "        const _hookAddr = __state.moduleBases[{}].add({});",
            js_string(&target.module),
            target.address
        ));
        lines.push("        const _hook = Interceptor.attach(_hookAddr, {".to_string());

        if on_enter.is_some() || capture {
            lines.push("            onEnter: function(args) {".to_string());
            if capture {
                // Argument buffers are gone once the call returns
                lines.push(format!(
                    "                this.__args = [{}];",
                    converted.join(", ")
                ));
            }
            if let Some(callback) = on_enter {
                let spread: String = converted.iter().map(|a| format!(", {}", a)).collect();
                lines.push("                try {".to_string());
                lines.push(format!(
                    "                    ({}).call(this{});",
                    callback_expr(callback),
                    spread
                ));
                lines.push(format!(
                    "                }} catch (e) {{ error({}, e.stack); }}",
                    js_string(&format!("Hook {} onEnter error:", name))
                ));
            }
            lines.push("            },".to_string());
        }

        if let Some(callback) = on_leave {
            let retval = if target.returns.is_void() {
                "null".to_string()
            } else {
                convert_native("retval", target.returns)
            };
            let captured: String = (0..target.params.len())
                .map(|i| format!(", this.__args[{}]", i))
                .collect();
            lines.push("            onLeave: function(retval) {".to_string());
            lines.push("                try {".to_string());
            lines.push(format!(
                "                    const _r = ({}).call(this, {}{});",
                callback_expr(callback),
                retval,
                captured
            ));
            if !target.returns.is_void() {
                lines.push("                    if (_r !== undefined) retval.replace(ptr(_r));".to_string());
            }
            lines.push(format!(
                "                }} catch (e) {{ error({}, e.stack); }}",
                js_string(&format!("Hook {} onLeave error:", name))
            ));
            lines.push("            },".to_string());
        }

        lines.push("        });".to_string());
        lines.push("        __state.attachedHooks.push(_hook);".to_string());
        lines.push(install_catch(name));
    }

    fn emit_loops(&self) -> String {
        let mut lines = vec!["function __installLoops() {".to_string()];
        for task in self.declaration.loops() {
            let func = format!("_loop_{}", task.name());
            let interval = task.interval_ms();
            let handler = task.handler().map(callback_expr).unwrap_or_default();

            lines.push("    {".to_string());
            lines.push("        const _idx = __state.loopTimers.length;".to_string());
            lines.push("        __state.loopTimers.push(null);".to_string());
            lines.push(format!("        function {}() {{", func));
            lines.push("            try {".to_string());
            lines.push("                const _module = game.module;".to_string());
            lines.push("                if (game.isModuleSupported(_module)) {".to_string());
            lines.push(format!("                    ({})();", handler));
            lines.push("                }".to_string());
            lines.push(format!(
                "            }} catch (e) {{ error({}, e.stack); }}",
                js_string(&format!("Loop {} error:", task.name()))
            ));
            lines.push(format!(
                "            __state.loopTimers[_idx] = setTimeout({}, {});",
                func, interval
            ));
            lines.push("        }".to_string());
            lines.push(format!("        {}();", func));
            lines.push("    }".to_string());
        }
        lines.push("}".to_string());
        lines.join("\n")
    }

    fn emit_nops(&self) -> String {
        let mut lines = vec!["function __installNops() {".to_string()];
        let dependencies = self.dependency_modules();
        for nop in self.declaration.nops() {
            let location = format!("{}+{}", nop.module, nop.address);
            if !dependencies.contains(&nop.module.as_str()) {
                warn!(
                    "Nop {} of mod {} is on a module that is not a dependency",
                    location,
                    self.declaration.name()
                );
                lines.push(format!(
                    "    error({});",
                    js_string(&format!(
                        "Nop {}: module {} is not a dependency of this mod",
                        location, nop.module
                    ))
                ));
                continue;
            }
            lines.push(format!(
                "    try {{ game.deleteInstruction({}, {}, {}); }}",
                js_string(&nop.module),
                js_string(&nop.address.to_string()),
                nop.size
            ));
            lines.push(format!(
                "    catch (e) {{ error({}, e.stack); }}",
                js_string(&format!("Nop {} error:", location))
            ));
        }
        lines.push("}".to_string());
        lines.join("\n")
    }

    fn emit_exit(&self) -> String {
        match self.declaration.exit() {
            Some(exit) => format!("function __modExit() {{\n    ({})();\n}}", callback_expr(exit)),
            None => String::new(),
        }
    }

    fn emit_receivers(&self) -> String {
        let receivers = self.declaration.receivers();
        if receivers.is_empty() {
            return String::new();
        }

        let mut lines = vec![
            "recv('command', function _onCommand(msg) {".to_string(),
            "    recv('command', _onCommand);".to_string(),
        ];
        for (name, callback) in receivers {
            lines.push(format!("    if (msg.name === {}) {{", js_string(name)));
            lines.push(format!(
                "        try {{ ({})(msg.data); }} catch (e) {{ error({}, e.stack); }}",
                callback_expr(callback),
                js_string(&format!("Receiver {} error:", name))
            ));
            lines.push("    }".to_string());
        }
        lines.push("});".to_string());
        lines.join("\n")
    }

    fn emit_startup(&self) -> String {
        "__init();".to_string()
    }
}

/// Expression presenting a raw argument or return value to a callback.
/// Closes one hook's install block so a failed install leaves the rest running.
fn install_catch(name: &str) -> String {
    format!(
        "    }} catch (e) {{ error({}, e.stack); }}",
        js_string(&format!("Hook {} install error:", name))
    )
}

fn convert_native(expr: &str, ty: NativeType) -> String {
    match ty.conversion() {
        Conversion::Signed32 => format!("{}.toInt32()", expr),
        Conversion::Unsigned32 => format!("{}.toUInt32()", expr),
        Conversion::Signed64 => format!("int64({}.toString())", expr),
        Conversion::Unsigned64 => format!("uint64({}.toString())", expr),
        Conversion::Opaque => expr.to_string(),
    }
}

/// Synthesize the script for `declaration` against one patch variant.
pub fn synthesize(
    declaration: &ModDeclaration,
    game: &GameConfig,
    patch: &PatchVariant,
) -> Result<String> {
    ScriptSynthesizer::new(declaration, game, patch).synthesize()
}
