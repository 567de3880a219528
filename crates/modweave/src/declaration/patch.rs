use crate::error::{Error, Result};
use crate::table::Address;

/// Request to neutralize `size` bytes of code at `address` in `module`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionPatchSpec {
    pub module: String,
    pub address: Address,
    pub size: usize,
}

impl InstructionPatchSpec {
    pub fn new(module: impl Into<String>, address: u64, size: usize) -> Result<Self> {
        let module = module.into();
        if module.is_empty() {
            return Err(Error::declaration("nop module must be non-empty"));
        }
        if size == 0 {
            return Err(Error::declaration(format!(
                "nop at {}+{}: size must be positive",
                module,
                Address(address)
            )));
        }
        Ok(Self {
            module,
            address: Address(address),
            size,
        })
    }
}
