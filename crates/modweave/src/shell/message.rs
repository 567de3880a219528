//! Messages exchanged with the script, and events published to the host UI.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::IntoStaticStr;

/// Event names reserved by the runtime and the shell
pub mod events {
    pub const READY: &str = "__ready";
    pub const CLEANUP_DONE: &str = "__cleanupDone";
    pub const DETACHED: &str = "__detached";
    pub const ERROR: &str = "__error";
    pub const LOG: &str = "__log";
}

/// Shell -> script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Inbound {
    /// Dispatched to the receiver declared under `name`.
    Command { name: String, data: Value },
    /// Run teardown and answer with `__cleanupDone`.
    Cleanup,
}

/// `{event, data}` payload of a `send` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

/// Script -> shell, as delivered by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Outbound {
    Send {
        payload: Payload,
    },
    /// Uncaught script fault.
    Error {
        #[serde(default)]
        description: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stack: Option<String>,
    },
    /// Direct console output.
    Log {
        #[serde(default = "default_level")]
        level: String,
        payload: Value,
    },
}

fn default_level() -> String {
    "info".to_string()
}

impl Outbound {
    pub fn send(event: impl Into<String>, data: Value) -> Self {
        Self::Send {
            payload: Payload {
                event: event.into(),
                data,
            },
        }
    }

    /// The event name of a `send` message.
    pub fn event(&self) -> Option<&str> {
        match self {
            Self::Send { payload } => Some(&payload.event),
            _ => None,
        }
    }
}

/// Something the instrumented session reports asynchronously.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Message(Outbound),
    Detached { reason: String },
}

/// Lifecycle state of the execution shell.
#[derive(Debug, Clone, PartialEq, Eq, IntoStaticStr)]
pub enum ShellStatus {
    Idle,
    /// Waiting for the named process to appear.
    Waiting(String),
    Attaching,
    Injecting,
    Active,
    Error(String),
}

impl std::fmt::Display for ShellStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting(process) => write!(f, "waiting for {}", process),
            Self::Error(message) => write!(f, "error: {}", message),
            other => {
                let name: &'static str = other.into();
                f.write_str(&name.to_lowercase())
            }
        }
    }
}

/// Published to the host UI.
#[derive(Debug, Clone, PartialEq)]
pub enum ShellEvent {
    Status(ShellStatus),
    /// A script event, reserved ones included.
    Game { event: String, data: Value },
}
