//! TOML mod file format.
//!
//! A mod file mirrors the builder one table per declaration kind:
//!
//! ```toml
//! name = "Super Jump"
//! game = "tomb123"
//! modules = ["tomb1.dll", "tomb2.dll"]
//!
//! [[hooks]]
//! name = "LaraInLevel"
//! on_enter = { kind = "emit", event = "inLevel" }
//!
//! [[loops]]
//! name = "superJump"
//! every_ms = 5
//! run = { kind = "script", source = "function () { /* ... */ }" }
//! ```

use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::declaration::{Callback, HookSpec, LoopSpec, ModBuilder, ModDeclaration, VariableSpec};
use crate::error::{Error, Result};
use crate::table::{Address, NativeType, VarType};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModFile {
    pub name: String,
    pub game: String,
    pub modules: Vec<String>,
    #[serde(default)]
    pub init: Option<Callback>,
    #[serde(default)]
    pub exit: Option<Callback>,
    #[serde(default)]
    pub variables: Vec<VariableEntry>,
    #[serde(default)]
    pub hooks: Vec<HookEntry>,
    #[serde(default)]
    pub loops: Vec<LoopEntry>,
    #[serde(default)]
    pub nops: Vec<NopEntry>,
    #[serde(default)]
    pub receivers: Vec<ReceiverEntry>,
    #[serde(default)]
    pub events: Vec<EventEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariableEntry {
    pub name: String,
    pub module: Option<String>,
    pub address: Option<Address>,
    pub pointer: Option<Address>,
    #[serde(rename = "type")]
    pub kind: Option<VarType>,
    pub size: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HookEntry {
    pub name: String,
    pub module: Option<String>,
    pub address: Option<Address>,
    pub params: Option<Vec<NativeType>>,
    pub returns: Option<NativeType>,
    pub on_enter: Option<Callback>,
    pub on_leave: Option<Callback>,
    pub replace: Option<Callback>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoopEntry {
    pub name: String,
    pub every_ms: u64,
    pub run: Option<Callback>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NopEntry {
    pub module: String,
    pub address: Address,
    pub size: usize,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReceiverEntry {
    pub name: String,
    pub callback: Callback,
}

/// An outbound event the host should log when the script sends it.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventEntry {
    pub name: String,
}

impl ModFile {
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Run the file through the builder so files and code share validation.
    pub fn into_declaration(self) -> Result<ModDeclaration> {
        let mut builder = ModBuilder::new(self.name, self.game, self.modules)?;

        for entry in self.variables {
            builder = builder.variable(entry.into_spec()?)?;
        }
        for entry in self.hooks {
            builder = builder.hook(entry.into_spec()?)?;
        }
        for entry in self.loops {
            let mut spec = LoopSpec::new(entry.name).every(Duration::from_millis(entry.every_ms));
            if let Some(run) = entry.run {
                spec = spec.run(run);
            }
            builder = builder.loop_task(spec)?;
        }
        for entry in self.nops {
            builder = builder.nop(entry.module, entry.address.value(), entry.size)?;
        }
        for entry in self.receivers {
            builder = builder.receive(entry.name, entry.callback)?;
        }
        for entry in self.events {
            let event = entry.name.clone();
            builder = builder.on(entry.name, move |data| {
                info!("[{}] {}", event, data);
                Ok(())
            })?;
        }
        if let Some(init) = self.init {
            builder = builder.init(init)?;
        }
        if let Some(exit) = self.exit {
            builder = builder.exit(exit)?;
        }

        Ok(builder.build())
    }
}

fn located(
    what: &str,
    name: &str,
    module: Option<String>,
    address: Option<Address>,
) -> Result<Option<(String, u64)>> {
    match (module, address) {
        (Some(module), Some(address)) => Ok(Some((module, address.value()))),
        (None, None) => Ok(None),
        _ => Err(Error::declaration(format!(
            "{} {}: module and address must be given together",
            what, name
        ))),
    }
}

impl VariableEntry {
    fn into_spec(self) -> Result<VariableSpec> {
        let mut spec = VariableSpec::new(self.name.as_str());
        if let Some((module, address)) = located("variable", &self.name, self.module, self.address)? {
            spec = spec.at(module, address);
        }
        if let Some(offset) = self.pointer {
            spec = spec.pointer(offset.value());
        }
        if let Some(kind) = self.kind {
            spec = spec.kind(kind);
        }
        if let Some(size) = self.size {
            spec = spec.size(size);
        }
        Ok(spec)
    }
}

impl HookEntry {
    fn into_spec(self) -> Result<HookSpec> {
        let mut spec = HookSpec::new(self.name.as_str());
        if let Some((module, address)) = located("hook", &self.name, self.module, self.address)? {
            spec = spec.at(module, address);
        }
        if let Some(params) = self.params {
            spec = spec.params(params);
        }
        if let Some(returns) = self.returns {
            spec = spec.returns(returns);
        }
        if let Some(callback) = self.on_enter {
            spec = spec.on_enter(callback);
        }
        if let Some(callback) = self.on_leave {
            spec = spec.on_leave(callback);
        }
        if let Some(callback) = self.replace {
            spec = spec.replace(callback);
        }
        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::HookAction;
    use serde_json::json;

    const SUPER_JUMP: &str = r#"
name = "Super Jump"
game = "tomb123"
modules = ["tomb1.dll", "tomb2.dll", "tomb3.dll"]
init = { kind = "script", source = "function () { game._lara = null; }" }

[[variables]]
name = "LaraBase"

[[variables]]
name = "JumpHeight"
module = "tomb1.dll"
address = "0x25FA74"
type = "Int16"

[[hooks]]
name = "InitializeLevelAI"
on_leave = { kind = "emit", event = "levelReady" }

[[hooks]]
name = "SoundEffect"
params = ["int", "pointer", "int"]
returns = "int"
replace = { kind = "return", value = 0 }

[[loops]]
name = "superJump"
every_ms = 5
run = { kind = "noop" }

[[nops]]
module = "tomb1.dll"
address = "0x4a2b0"
size = 6

[[receivers]]
name = "toggle"
callback = { kind = "write_var", name = "JumpHeight", value = 175 }

[[events]]
name = "levelReady"
"#;

    #[test]
    fn test_parse_full_file() {
        let decl = ModFile::parse(SUPER_JUMP)
            .unwrap()
            .into_declaration()
            .unwrap();

        assert_eq!(decl.name(), "Super Jump");
        assert_eq!(decl.modules().len(), 3);
        assert_eq!(decl.variables().len(), 2);
        let (module, def) = decl.variables()[1].explicit().unwrap();
        assert_eq!(module, "tomb1.dll");
        assert_eq!(def.address, Address(0x25fa74));
        assert_eq!(def.kind, VarType::Int16);

        assert!(matches!(
            decl.hooks()[1].action(),
            HookAction::Replace(Callback::Return { .. })
        ));
        assert_eq!(decl.hooks()[1].declared_return(), Some(NativeType::Int));
        assert_eq!(decl.loops()[0].interval_ms(), 5);
        assert_eq!(decl.nops()[0].address, Address(0x4a2b0));
        assert_eq!(
            decl.receivers()["toggle"],
            Callback::write_var("JumpHeight", json!(175))
        );
        assert!(decl.init().is_some());
    }

    #[test]
    fn test_file_events_get_logging_handler() {
        let decl = ModFile::parse(SUPER_JUMP)
            .unwrap()
            .into_declaration()
            .unwrap();
        let handler = decl.event_handler("levelReady").unwrap();
        handler(&json!({ "level": 3 })).unwrap();
        assert!(decl.event_handler("unknown").is_none());
    }

    #[test]
    fn test_builder_validation_applies_to_files() {
        let file = ModFile::parse(
            r#"
name = "Broken"
game = "tomb123"
modules = ["tomb1.dll"]

[[hooks]]
name = "LaraInLevel"
"#,
        )
        .unwrap();
        let err = file.into_declaration().unwrap_err();
        assert!(matches!(err, Error::Declaration(_)), "{err}");
    }

    #[test]
    fn test_half_located_variable_rejected() {
        let file = ModFile::parse(
            r#"
name = "Broken"
game = "tomb123"
modules = ["tomb1.dll"]

[[variables]]
name = "Lives"
module = "tomb1.dll"
type = "Int8"
"#,
        )
        .unwrap();
        let err = file.into_declaration().unwrap_err();
        assert!(err.to_string().contains("together"), "{err}");
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = ModFile::parse(
            r#"
name = "Typo"
game = "tomb123"
modules = ["tomb1.dll"]
hoks = []
"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Toml(_)));
    }
}
