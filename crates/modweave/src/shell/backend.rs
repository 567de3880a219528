use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;

use super::message::{Inbound, SessionEvent};
use crate::error::Result;

/// A running process visible to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
}

/// Dynamic instrumentation engine: process discovery and attach.
pub trait InstrumentationBackend {
    fn find_process(&self, name: &str) -> Result<Option<ProcessInfo>>;

    /// Launch `path` with its directory as working directory.
    fn spawn(&self, path: &Path) -> Result<()>;

    fn attach(&self, pid: u32) -> Result<Box<dyn InstrumentedSession>>;
}

/// One attached process.
pub trait InstrumentedSession: Send {
    /// On-disk path of the process's main module, resolved inside the process.
    fn main_module_path(&mut self) -> Result<PathBuf>;

    fn load_script(&mut self, source: &str) -> Result<()>;

    fn unload_script(&mut self) -> Result<()>;

    fn post(&mut self, message: &Inbound) -> Result<()>;

    /// Take the stream of script messages and detach notifications, in
    /// arrival order. Only the first call succeeds.
    fn events(&mut self) -> Result<Receiver<SessionEvent>>;

    fn detach(&mut self) -> Result<()>;
}
