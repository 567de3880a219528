use crate::error::{Error, Result};
use crate::table::{Address, VarType, VariableDef};

/// A named variable the mod reads or writes.
///
/// Without an explicit location the name is looked up in the address table
/// when the script runs. With one, the declared definition is merged into the
/// table and wins over a same-named table entry.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableSpec {
    name: String,
    module: Option<String>,
    address: Option<Address>,
    pointer: Option<Address>,
    kind: Option<VarType>,
    size: Option<u64>,
}

impl VariableSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module: None,
            address: None,
            pointer: None,
            kind: None,
            size: None,
        }
    }

    /// Place the variable at `address` relative to `module`'s base.
    pub fn at(mut self, module: impl Into<String>, address: u64) -> Self {
        self.module = Some(module.into());
        self.address = Some(Address(address));
        self
    }

    /// Dereference the located address once and add `offset`.
    pub fn pointer(mut self, offset: u64) -> Self {
        self.pointer = Some(Address(offset));
        self
    }

    pub fn kind(mut self, kind: VarType) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Module and table definition, if the variable was placed explicitly.
    pub fn explicit(&self) -> Option<(&str, VariableDef)> {
        let module = self.module.as_deref()?;
        let address = self.address?;
        let kind = self.kind?;
        Some((
            module,
            VariableDef {
                address,
                kind,
                pointer: self.pointer,
                size: self.size,
            },
        ))
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::declaration("variable name must be non-empty"));
        }
        if let Some(module) = &self.module {
            if module.is_empty() {
                return Err(Error::declaration(format!(
                    "variable {}: module must be non-empty",
                    self.name
                )));
            }
            let Some(kind) = self.kind else {
                return Err(Error::declaration(format!(
                    "variable {}: an explicit location needs a type",
                    self.name
                )));
            };
            if kind.requires_size() && !matches!(self.size, Some(size) if size > 0) {
                return Err(Error::declaration(format!(
                    "variable {}: Block needs a positive size",
                    self.name
                )));
            }
        } else if self.kind.is_some() || self.pointer.is_some() || self.size.is_some() {
            return Err(Error::declaration(format!(
                "variable {}: type, pointer and size need an explicit location",
                self.name
            )));
        }
        Ok(())
    }
}
