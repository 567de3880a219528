//! Literal and callback rendering in the target runtime's syntax.

use serde_json::Value;

use crate::declaration::Callback;

/// Quote `s` as a string literal.
pub fn js_string(s: &str) -> String {
    Value::from(s).to_string()
}

/// Render a constant: integers in hex, anything else as literal data.
pub fn constant_literal(value: &Value) -> String {
    if let Some(n) = value.as_u64() {
        return format!("0x{:x}", n);
    }
    if let Some(n) = value.as_i64() {
        return format!("-0x{:x}", n.unsigned_abs());
    }
    value.to_string()
}

/// Render a callback as a function expression.
pub fn callback_expr(callback: &Callback) -> String {
    match callback {
        Callback::Script { source } => source.trim().to_string(),
        Callback::Noop => "function () {}".to_string(),
        Callback::Log { level, message } => {
            format!("function () {{ {}({}); }}", level.helper(), js_string(message))
        }
        Callback::Emit { event } => format!(
            "function () {{ send({{ event: {}, data: Array.prototype.slice.call(arguments) }}); }}",
            js_string(event)
        ),
        Callback::WriteVar { name, value } => format!(
            "function () {{ game.writeVar(game.module, {}, {}); }}",
            js_string(name),
            value
        ),
        Callback::Return { value } => format!("function () {{ return {}; }}", value),
    }
}
