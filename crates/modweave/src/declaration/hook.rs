use super::callback::Callback;
use crate::error::{Error, Result};
use crate::table::{Address, NativeType};

/// Callback stages attached to one hook.
#[derive(Debug, Clone, PartialEq)]
pub enum HookAction {
    /// Observe the call. At least one stage is present.
    Attach {
        on_enter: Option<Callback>,
        on_leave: Option<Callback>,
    },
    /// Replace the native function entirely.
    Replace(Callback),
}

/// Interception of a native function, by table name or explicit address.
#[derive(Debug, Clone, PartialEq)]
pub struct HookSpec {
    name: String,
    module: Option<String>,
    address: Option<Address>,
    params: Option<Vec<NativeType>>,
    returns: Option<NativeType>,
    on_enter: Option<Callback>,
    on_leave: Option<Callback>,
    replace: Option<Callback>,
}

impl HookSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module: None,
            address: None,
            params: None,
            returns: None,
            on_enter: None,
            on_leave: None,
            replace: None,
        }
    }

    /// Hook exactly this address, ignoring the address table.
    pub fn at(mut self, module: impl Into<String>, address: u64) -> Self {
        self.module = Some(module.into());
        self.address = Some(Address(address));
        self
    }

    pub fn params(mut self, params: Vec<NativeType>) -> Self {
        self.params = Some(params);
        self
    }

    pub fn returns(mut self, returns: NativeType) -> Self {
        self.returns = Some(returns);
        self
    }

    pub fn on_enter(mut self, callback: Callback) -> Self {
        self.on_enter = Some(callback);
        self
    }

    pub fn on_leave(mut self, callback: Callback) -> Self {
        self.on_leave = Some(callback);
        self
    }

    pub fn replace(mut self, callback: Callback) -> Self {
        self.replace = Some(callback);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Explicit `(module, address)`, if declared.
    pub fn location(&self) -> Option<(&str, Address)> {
        Some((self.module.as_deref()?, self.address?))
    }

    pub fn declared_params(&self) -> Option<&[NativeType]> {
        self.params.as_deref()
    }

    pub fn declared_return(&self) -> Option<NativeType> {
        self.returns
    }

    /// Callback stages. Only meaningful after validation.
    pub fn action(&self) -> HookAction {
        match &self.replace {
            Some(callback) => HookAction::Replace(callback.clone()),
            None => HookAction::Attach {
                on_enter: self.on_enter.clone(),
                on_leave: self.on_leave.clone(),
            },
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::declaration("hook name must be non-empty"));
        }
        if matches!(&self.module, Some(module) if module.is_empty()) {
            return Err(Error::declaration(format!(
                "hook {}: module must be non-empty",
                self.name
            )));
        }
        if let Some(params) = &self.params {
            if params.iter().any(NativeType::is_void) {
                return Err(Error::declaration(format!(
                    "hook {}: void is only valid as a return type",
                    self.name
                )));
            }
        }

        let observing = self.on_enter.is_some() || self.on_leave.is_some();
        if self.replace.is_some() && observing {
            return Err(Error::declaration(format!(
                "hook {}: replace cannot be combined with on_enter or on_leave",
                self.name
            )));
        }
        if self.replace.is_none() && !observing {
            return Err(Error::declaration(format!(
                "hook {}: needs on_enter, on_leave or replace",
                self.name
            )));
        }

        let context = format!("hook {}", self.name);
        for callback in [&self.on_enter, &self.on_leave, &self.replace]
            .into_iter()
            .flatten()
        {
            callback.check(&context).map_err(Error::Declaration)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enter_and_leave_combine() {
        let spec = HookSpec::new("SoundEffect")
            .on_enter(Callback::Noop)
            .on_leave(Callback::returning(0));
        spec.validate().unwrap();
        assert_eq!(
            spec.action(),
            HookAction::Attach {
                on_enter: Some(Callback::Noop),
                on_leave: Some(Callback::returning(0)),
            }
        );
    }

    #[test]
    fn test_replace_is_exclusive() {
        let err = HookSpec::new("SoundEffect")
            .on_enter(Callback::Noop)
            .replace(Callback::Noop)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("replace cannot be combined"));

        assert!(HookSpec::new("SoundEffect")
            .on_leave(Callback::Noop)
            .replace(Callback::Noop)
            .validate()
            .is_err());
    }

    #[test]
    fn test_hook_needs_a_callback() {
        assert!(HookSpec::new("LaraInLevel").validate().is_err());
    }

    #[test]
    fn test_void_param_rejected() {
        let spec = HookSpec::new("LaraInLevel")
            .params(vec![NativeType::Int, NativeType::Void])
            .on_enter(Callback::Noop);
        assert!(matches!(spec.validate(), Err(Error::Declaration(_))));
    }

    #[test]
    fn test_explicit_location() {
        let spec = HookSpec::new("Custom")
            .at("tomb1.dll", 0x1234)
            .replace(Callback::Noop);
        spec.validate().unwrap();
        assert_eq!(spec.location(), Some(("tomb1.dll", Address(0x1234))));
        assert!(HookSpec::new("Named").location().is_none());
    }
}
