//! In-memory instrumentation backend for tests.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;

use super::backend::{InstrumentationBackend, InstrumentedSession, ProcessInfo};
use super::message::{Inbound, Outbound, SessionEvent, events};
use crate::error::{Error, Result};

/// Everything the mock was configured with and everything it observed.
#[derive(Debug, Default)]
pub struct MockState {
    pub processes: Vec<ProcessInfo>,
    /// Process that appears once `spawn` is called.
    pub spawned_process: Option<ProcessInfo>,
    pub module_path: Option<PathBuf>,
    pub answer_ready: bool,
    pub answer_cleanup: bool,
    pub fail_load: bool,
    /// Sent by the script on load, before `__ready`.
    pub on_load: Vec<Outbound>,

    pub spawned: Vec<PathBuf>,
    pub scripts: Vec<String>,
    pub posted: Vec<Inbound>,
    pub unloads: usize,
    pub detaches: usize,
    pub sender: Option<Sender<SessionEvent>>,
}

#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn builder() -> MockBackendBuilder {
        MockBackendBuilder::default()
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Deliver an event as if the attached script or engine produced it.
    pub fn emit(&self, event: SessionEvent) {
        let sender = self.state().sender.clone();
        if let Some(sender) = sender {
            sender.send(event).unwrap();
        }
    }
}

impl InstrumentationBackend for MockBackend {
    fn find_process(&self, name: &str) -> Result<Option<ProcessInfo>> {
        Ok(self.state().processes.iter().find(|p| p.name == name).cloned())
    }

    fn spawn(&self, path: &Path) -> Result<()> {
        let mut state = self.state();
        state.spawned.push(path.to_path_buf());
        if let Some(process) = state.spawned_process.take() {
            state.processes.push(process);
        }
        Ok(())
    }

    fn attach(&self, pid: u32) -> Result<Box<dyn InstrumentedSession>> {
        let mut state = self.state();
        if !state.processes.iter().any(|p| p.pid == pid) {
            return Err(Error::Backend(format!("no process {}", pid)));
        }
        let (sender, receiver) = mpsc::channel();
        state.sender = Some(sender.clone());
        Ok(Box::new(MockSession {
            state: Arc::clone(&self.state),
            sender,
            receiver: Some(receiver),
        }))
    }
}

struct MockSession {
    state: Arc<Mutex<MockState>>,
    sender: Sender<SessionEvent>,
    receiver: Option<Receiver<SessionEvent>>,
}

impl InstrumentedSession for MockSession {
    fn main_module_path(&mut self) -> Result<PathBuf> {
        self.state
            .lock()
            .unwrap()
            .module_path
            .clone()
            .ok_or_else(|| Error::Backend("module path unavailable".to_string()))
    }

    fn load_script(&mut self, source: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_load {
            return Err(Error::Backend("syntax error".to_string()));
        }
        state.scripts.push(source.to_string());
        for message in &state.on_load {
            self.sender.send(SessionEvent::Message(message.clone())).unwrap();
        }
        if state.answer_ready {
            self.sender
                .send(SessionEvent::Message(Outbound::send(events::READY, Value::Null)))
                .unwrap();
        }
        Ok(())
    }

    fn unload_script(&mut self) -> Result<()> {
        self.state.lock().unwrap().unloads += 1;
        Ok(())
    }

    fn post(&mut self, message: &Inbound) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.posted.push(message.clone());
        if *message == Inbound::Cleanup && state.answer_cleanup {
            self.sender
                .send(SessionEvent::Message(Outbound::send(
                    events::CLEANUP_DONE,
                    Value::Null,
                )))
                .unwrap();
        }
        Ok(())
    }

    fn events(&mut self) -> Result<Receiver<SessionEvent>> {
        self.receiver
            .take()
            .ok_or_else(|| Error::Backend("event stream already taken".to_string()))
    }

    fn detach(&mut self) -> Result<()> {
        self.state.lock().unwrap().detaches += 1;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MockBackendBuilder {
    state: MockState,
}

impl MockBackendBuilder {
    pub fn process(mut self, name: &str, pid: u32) -> Self {
        self.state.processes.push(ProcessInfo {
            pid,
            name: name.to_string(),
        });
        self
    }

    pub fn appears_on_spawn(mut self, name: &str, pid: u32) -> Self {
        self.state.spawned_process = Some(ProcessInfo {
            pid,
            name: name.to_string(),
        });
        self
    }

    pub fn module_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.state.module_path = Some(path.into());
        self
    }

    /// Script answers `__ready` on load and `__cleanupDone` on cleanup.
    pub fn responsive(mut self) -> Self {
        self.state.answer_ready = true;
        self.state.answer_cleanup = true;
        self
    }

    pub fn answer_ready(mut self, answer: bool) -> Self {
        self.state.answer_ready = answer;
        self
    }

    pub fn answer_cleanup(mut self, answer: bool) -> Self {
        self.state.answer_cleanup = answer;
        self
    }

    pub fn fail_load(mut self) -> Self {
        self.state.fail_load = true;
        self
    }

    pub fn on_load(mut self, message: Outbound) -> Self {
        self.state.on_load.push(message);
        self
    }

    pub fn build(self) -> MockBackend {
        MockBackend {
            state: Arc::new(Mutex::new(self.state)),
        }
    }
}
