//! Script synthesizer: declaration + patch variant -> instrumentation script.

mod generator;
mod hooks;
mod render;
mod runtime;

pub use generator::*;
pub use hooks::*;
pub use render::{callback_expr, js_string};
pub use runtime::runtime_source;
pub(crate) use runtime::is_valid_constant_name;
