use std::time::Duration;

use super::callback::Callback;
use crate::error::{Error, Result};

/// Recurring action, run only while the active game module is supported.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopSpec {
    name: String,
    interval: Duration,
    handler: Option<Callback>,
}

impl LoopSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            interval: Duration::ZERO,
            handler: None,
        }
    }

    pub fn every(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn run(mut self, handler: Callback) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Interval in whole milliseconds, as the timer is scheduled.
    pub fn interval_ms(&self) -> u128 {
        self.interval.as_millis()
    }

    pub fn handler(&self) -> Option<&Callback> {
        self.handler.as_ref()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !is_identifier(&self.name) {
            return Err(Error::declaration(format!(
                "loop name '{}' must be an identifier",
                self.name
            )));
        }
        if self.interval < Duration::from_millis(1) {
            return Err(Error::declaration(format!(
                "loop {}: interval must be at least 1ms",
                self.name
            )));
        }
        let Some(handler) = &self.handler else {
            return Err(Error::declaration(format!(
                "loop {}: needs a handler",
                self.name
            )));
        };
        handler
            .check(&format!("loop {}", self.name))
            .map_err(Error::Declaration)
    }
}

/// ASCII script identifier. Loop and constant names are emitted as bindings.
pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_loop() {
        let spec = LoopSpec::new("superJump")
            .every(Duration::from_millis(5))
            .run(Callback::Noop);
        spec.validate().unwrap();
        assert_eq!(spec.interval_ms(), 5);
    }

    #[test]
    fn test_interval_must_be_positive() {
        let spec = LoopSpec::new("tick").run(Callback::Noop);
        assert!(spec.validate().is_err());
        let spec = spec.every(Duration::from_micros(500));
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_handler_required() {
        let spec = LoopSpec::new("tick").every(Duration::from_millis(10));
        assert!(spec.validate().unwrap_err().to_string().contains("handler"));
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("superJump"));
        assert!(is_identifier("_tick2"));
        assert!(!is_identifier("2fast"));
        assert!(!is_identifier("super-jump"));
        assert!(!is_identifier(""));
    }
}
