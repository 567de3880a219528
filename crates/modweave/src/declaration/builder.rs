use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use super::callback::Callback;
use super::hook::HookSpec;
use super::patch::InstructionPatchSpec;
use super::task::LoopSpec;
use super::variable::VariableSpec;
use crate::error::{Error, Result};

/// Host-side handler for an outbound event sent by the script.
pub type EventHandler = Arc<dyn Fn(&Value) -> anyhow::Result<()> + Send + Sync>;

/// A frozen mod, ready for synthesis.
#[derive(Clone)]
pub struct ModDeclaration {
    name: String,
    game: String,
    modules: Vec<String>,
    variables: Vec<VariableSpec>,
    hooks: Vec<HookSpec>,
    loops: Vec<LoopSpec>,
    nops: Vec<InstructionPatchSpec>,
    receivers: IndexMap<String, Callback>,
    events: IndexMap<String, EventHandler>,
    init: Option<Callback>,
    exit: Option<Callback>,
}

impl ModDeclaration {
    pub fn builder(
        name: impl Into<String>,
        game: impl Into<String>,
        modules: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<ModBuilder> {
        ModBuilder::new(name, game, modules)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Target game id.
    pub fn game(&self) -> &str {
        &self.game
    }

    /// Game modules this mod supports, in declaration order.
    pub fn modules(&self) -> &[String] {
        &self.modules
    }

    pub fn variables(&self) -> &[VariableSpec] {
        &self.variables
    }

    pub fn hooks(&self) -> &[HookSpec] {
        &self.hooks
    }

    pub fn loops(&self) -> &[LoopSpec] {
        &self.loops
    }

    pub fn nops(&self) -> &[InstructionPatchSpec] {
        &self.nops
    }

    pub fn receivers(&self) -> &IndexMap<String, Callback> {
        &self.receivers
    }

    pub fn event_handler(&self, event: &str) -> Option<&EventHandler> {
        self.events.get(event)
    }

    pub fn event_names(&self) -> impl Iterator<Item = &str> {
        self.events.keys().map(String::as_str)
    }

    pub fn init(&self) -> Option<&Callback> {
        self.init.as_ref()
    }

    pub fn exit(&self) -> Option<&Callback> {
        self.exit.as_ref()
    }
}

impl fmt::Debug for ModDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModDeclaration")
            .field("name", &self.name)
            .field("game", &self.game)
            .field("modules", &self.modules)
            .field("variables", &self.variables)
            .field("hooks", &self.hooks)
            .field("loops", &self.loops)
            .field("nops", &self.nops)
            .field("receivers", &self.receivers)
            .field("events", &self.events.keys().collect::<Vec<_>>())
            .field("init", &self.init)
            .field("exit", &self.exit)
            .finish()
    }
}

/// Consuming builder for [`ModDeclaration`].
///
/// Every call validates its input immediately, so a declaration error points
/// at the offending call rather than surfacing during synthesis.
///
/// ```ignore
/// let decl = ModDeclaration::builder("Super Jump", "tomb123", ["tomb1.dll", "tomb2.dll"])?
///     .hook(HookSpec::new("InitializeLevelAI").on_leave(Callback::emit("level")))?
///     .loop_task(LoopSpec::new("superJump").every(Duration::from_millis(5)).run(jump))?
///     .build();
/// ```
pub struct ModBuilder {
    declaration: ModDeclaration,
    variable_names: HashSet<String>,
}

impl ModBuilder {
    pub fn new(
        name: impl Into<String>,
        game: impl Into<String>,
        modules: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self> {
        let name = name.into();
        let game = game.into();
        let modules: Vec<String> = modules.into_iter().map(Into::into).collect();

        if name.trim().is_empty() {
            return Err(Error::declaration("mod name must be non-empty"));
        }
        if game.trim().is_empty() {
            return Err(Error::declaration(format!("mod {}: game must be non-empty", name)));
        }
        if modules.is_empty() {
            return Err(Error::declaration(format!(
                "mod {}: at least one module is required",
                name
            )));
        }
        if let Some(empty) = modules.iter().position(String::is_empty) {
            return Err(Error::declaration(format!(
                "mod {}: module #{} is empty",
                name, empty
            )));
        }

        Ok(Self {
            declaration: ModDeclaration {
                name,
                game,
                modules,
                variables: Vec::new(),
                hooks: Vec::new(),
                loops: Vec::new(),
                nops: Vec::new(),
                receivers: IndexMap::new(),
                events: IndexMap::new(),
                init: None,
                exit: None,
            },
            variable_names: HashSet::new(),
        })
    }

    pub fn variable(mut self, spec: VariableSpec) -> Result<Self> {
        spec.validate()?;
        if !self.variable_names.insert(spec.name().to_string()) {
            return Err(Error::declaration(format!(
                "variable {} declared twice",
                spec.name()
            )));
        }
        self.declaration.variables.push(spec);
        Ok(self)
    }

    pub fn hook(mut self, spec: HookSpec) -> Result<Self> {
        spec.validate()?;
        self.declaration.hooks.push(spec);
        Ok(self)
    }

    /// Add a recurring loop. Named `loop_task` since `loop` is reserved.
    pub fn loop_task(mut self, spec: LoopSpec) -> Result<Self> {
        spec.validate()?;
        if self.declaration.loops.iter().any(|l| l.name() == spec.name()) {
            return Err(Error::declaration(format!(
                "loop {} declared twice",
                spec.name()
            )));
        }
        self.declaration.loops.push(spec);
        Ok(self)
    }

    pub fn nop(mut self, module: impl Into<String>, address: u64, size: usize) -> Result<Self> {
        let spec = InstructionPatchSpec::new(module, address, size)?;
        self.declaration.nops.push(spec);
        Ok(self)
    }

    /// Handle inbound `command` messages named `name`. Redeclaring a name
    /// replaces its callback.
    pub fn receive(mut self, name: impl Into<String>, callback: Callback) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::declaration("receiver name must be non-empty"));
        }
        callback
            .check(&format!("receiver {}", name))
            .map_err(Error::Declaration)?;
        self.declaration.receivers.insert(name, callback);
        Ok(self)
    }

    /// Handle outbound events named `event` on the host side.
    pub fn on<F>(mut self, event: impl Into<String>, handler: F) -> Result<Self>
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let event = event.into();
        if event.is_empty() {
            return Err(Error::declaration("event name must be non-empty"));
        }
        self.declaration.events.insert(event, Arc::new(handler));
        Ok(self)
    }

    pub fn init(mut self, callback: Callback) -> Result<Self> {
        callback.check("init").map_err(Error::Declaration)?;
        self.declaration.init = Some(callback);
        Ok(self)
    }

    pub fn exit(mut self, callback: Callback) -> Result<Self> {
        callback.check("exit").map_err(Error::Declaration)?;
        self.declaration.exit = Some(callback);
        Ok(self)
    }

    pub fn build(self) -> ModDeclaration {
        self.declaration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::VarType;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn builder() -> ModBuilder {
        ModBuilder::new("Super Jump", "tomb123", ["tomb1.dll", "tomb2.dll"]).unwrap()
    }

    #[test]
    fn test_builder_keeps_declaration_order() {
        let decl = builder()
            .variable(VariableSpec::new("LaraBase"))
            .unwrap()
            .hook(HookSpec::new("LaraInLevel").on_enter(Callback::Noop))
            .unwrap()
            .hook(HookSpec::new("SoundEffect").replace(Callback::returning(0)))
            .unwrap()
            .loop_task(
                LoopSpec::new("superJump")
                    .every(Duration::from_millis(5))
                    .run(Callback::Noop),
            )
            .unwrap()
            .nop("tomb1.dll", 0x4a2b0, 6)
            .unwrap()
            .build();

        assert_eq!(decl.game(), "tomb123");
        assert_eq!(decl.modules(), ["tomb1.dll", "tomb2.dll"]);
        let hooks: Vec<&str> = decl.hooks().iter().map(HookSpec::name).collect();
        assert_eq!(hooks, vec!["LaraInLevel", "SoundEffect"]);
        assert_eq!(decl.loops().len(), 1);
        assert_eq!(decl.nops()[0].size, 6);
    }

    #[test]
    fn test_new_requires_modules_and_game() {
        let no_modules: [&str; 0] = [];
        assert!(ModBuilder::new("Mod", "tomb123", no_modules).is_err());
        assert!(ModBuilder::new("Mod", "", ["tomb1.dll"]).is_err());
        assert!(ModBuilder::new("", "tomb123", ["tomb1.dll"]).is_err());
        assert!(ModBuilder::new("Mod", "tomb123", ["tomb1.dll", ""]).is_err());
    }

    #[test]
    fn test_duplicate_variable_rejected() {
        let err = builder()
            .variable(VariableSpec::new("Lives"))
            .unwrap()
            .variable(
                VariableSpec::new("Lives")
                    .at("tomb1.dll", 0x10)
                    .kind(VarType::Int8),
            )
            .err()
            .unwrap();
        assert!(err.to_string().contains("declared twice"));
    }

    #[test]
    fn test_duplicate_loop_rejected() {
        let tick = || {
            LoopSpec::new("tick")
                .every(Duration::from_millis(50))
                .run(Callback::Noop)
        };
        assert!(builder().loop_task(tick()).unwrap().loop_task(tick()).is_err());
    }

    #[test]
    fn test_receiver_redeclaration_replaces_in_place() {
        let decl = builder()
            .receive("toggle", Callback::Noop)
            .unwrap()
            .receive("reset", Callback::Noop)
            .unwrap()
            .receive("toggle", Callback::emit("toggled"))
            .unwrap()
            .build();

        let names: Vec<&String> = decl.receivers().keys().collect();
        assert_eq!(names, vec!["toggle", "reset"]);
        assert_eq!(decl.receivers()["toggle"], Callback::emit("toggled"));
    }

    #[test]
    fn test_event_handler_is_callable() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let decl = builder()
            .on("level", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap()
            .build();

        let handler = decl.event_handler("level").unwrap();
        handler(&Value::Null).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(decl.event_handler("other").is_none());
        assert!(format!("{:?}", decl).contains("level"));
    }

    #[test]
    fn test_invalid_hook_fails_at_declaration() {
        let result = builder().hook(HookSpec::new("LaraInLevel"));
        assert!(matches!(result, Err(Error::Declaration(_))));
    }
}
