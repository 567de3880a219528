use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString, IntoStaticStr};

/// Log level understood by the generated script's logging helpers.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// Name of the runtime helper that logs at this level.
    pub fn helper(&self) -> &'static str {
        match self {
            Self::Info => "log",
            Self::Warning => "warn",
            Self::Error => "error",
        }
    }
}

/// A callback body captured as data.
///
/// The synthesizer renders every variant as a function expression in the
/// target runtime's syntax. Arguments are passed positionally, the same way
/// for every variant: hook stages get converted arguments (and the return
/// value first on leave), receivers get the command payload, everything else
/// gets nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Callback {
    /// Verbatim function expression, e.g. `function (ret) { return 1; }`.
    Script { source: String },
    /// Does nothing.
    Noop,
    /// Logs a fixed message through the runtime logging helpers.
    Log {
        #[serde(default)]
        level: LogLevel,
        message: String,
    },
    /// Forwards its arguments to the host as an outbound event.
    Emit { event: String },
    /// Writes a variable of the active game module.
    WriteVar { name: String, value: Value },
    /// Returns a fixed value. On a leave stage this replaces the native return.
    Return { value: Value },
}

impl Callback {
    pub fn script(source: impl Into<String>) -> Self {
        Self::Script {
            source: source.into(),
        }
    }

    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        Self::Log {
            level,
            message: message.into(),
        }
    }

    pub fn emit(event: impl Into<String>) -> Self {
        Self::Emit {
            event: event.into(),
        }
    }

    pub fn write_var(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::WriteVar {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn returning(value: impl Into<Value>) -> Self {
        Self::Return {
            value: value.into(),
        }
    }

    /// Reject callbacks that could never render to a usable function.
    pub(crate) fn check(&self, context: &str) -> Result<(), String> {
        match self {
            Self::Script { source } if source.trim().is_empty() => {
                Err(format!("{}: script callback is empty", context))
            }
            Self::Emit { event } if event.is_empty() => {
                Err(format!("{}: emit callback needs an event name", context))
            }
            Self::WriteVar { name, .. } if name.is_empty() => {
                Err(format!("{}: write_var callback needs a variable name", context))
            }
            _ => Ok(()),
        }
    }
}
