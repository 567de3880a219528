//! Configuration file and fixed timing constants.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;

/// Timing constants baked into generated scripts
pub mod timing {
    /// Backoff between base-address and active-module polls in the script (ms)
    pub const MODULE_POLL_INTERVAL_MS: u64 = 100;
}

/// Top-level configuration, read from `modweave.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding `<id>/<id>.json` game configs
    pub games_dir: PathBuf,
    /// Directory holding `mod.toml` / `mod.<id>.toml` files
    pub mods_dir: PathBuf,
    pub shell: ShellConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            games_dir: PathBuf::from("games"),
            mods_dir: PathBuf::from("mods"),
            shell: ShellConfig::default(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load `path`, falling back to defaults when it is missing or invalid.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(e) if e.is_not_found() => Self::default(),
            Err(e) => {
                warn!("Ignoring config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Resolve relative directories against `base`.
    pub fn relative_to(mut self, base: &Path) -> Self {
        if self.games_dir.is_relative() {
            self.games_dir = base.join(&self.games_dir);
        }
        if self.mods_dir.is_relative() {
            self.mods_dir = base.join(&self.mods_dir);
        }
        self
    }
}

/// `[shell]` section of the config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    pub ready_timeout_secs: u64,
    pub cleanup_timeout_secs: u64,
    pub process_poll_ms: u64,
    pub spawn_grace_ms: u64,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            ready_timeout_secs: 30,
            cleanup_timeout_secs: 3,
            process_poll_ms: 1000,
            spawn_grace_ms: 2000,
        }
    }
}

impl ShellConfig {
    pub fn settings(&self) -> ShellSettings {
        ShellSettings::builder()
            .ready_timeout(Duration::from_secs(self.ready_timeout_secs))
            .cleanup_timeout(Duration::from_secs(self.cleanup_timeout_secs))
            .process_poll(Duration::from_millis(self.process_poll_ms))
            .spawn_grace(Duration::from_millis(self.spawn_grace_ms))
            .build()
    }
}

/// Attach lifecycle timeouts and polling intervals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShellSettings {
    /// How long to wait for the script's `__ready` event
    pub ready_timeout: Duration,
    /// How long to wait for `__cleanupDone` on stop
    pub cleanup_timeout: Duration,
    /// Interval between process lookups while waiting for the game
    pub process_poll: Duration,
    /// Delay after spawning the game before the first lookup
    pub spawn_grace: Duration,
}

impl Default for ShellSettings {
    fn default() -> Self {
        ShellConfig::default().settings()
    }
}

impl ShellSettings {
    pub fn builder() -> ShellSettingsBuilder {
        ShellSettingsBuilder::default()
    }
}

/// Builder for ShellSettings
#[derive(Debug, Clone, Default)]
pub struct ShellSettingsBuilder {
    ready_timeout: Option<Duration>,
    cleanup_timeout: Option<Duration>,
    process_poll: Option<Duration>,
    spawn_grace: Option<Duration>,
}

impl ShellSettingsBuilder {
    pub fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = Some(timeout);
        self
    }

    pub fn cleanup_timeout(mut self, timeout: Duration) -> Self {
        self.cleanup_timeout = Some(timeout);
        self
    }

    pub fn process_poll(mut self, interval: Duration) -> Self {
        self.process_poll = Some(interval);
        self
    }

    pub fn spawn_grace(mut self, delay: Duration) -> Self {
        self.spawn_grace = Some(delay);
        self
    }

    pub fn build(self) -> ShellSettings {
        ShellSettings {
            ready_timeout: self.ready_timeout.unwrap_or(Duration::from_secs(30)),
            cleanup_timeout: self.cleanup_timeout.unwrap_or(Duration::from_secs(3)),
            process_poll: self.process_poll.unwrap_or(Duration::from_millis(1000)),
            spawn_grace: self.spawn_grace.unwrap_or(Duration::from_millis(2000)),
        }
    }
}
