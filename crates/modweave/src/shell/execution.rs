//! Attach lifecycle around one synthesized script.
//!
//! The shell runs on a single control thread. `start` blocks through process
//! discovery, attach, injection and the ready handshake; another thread can
//! abandon a pending attach through [`ExecutionShell::cancel_handle`].

use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

use super::backend::{InstrumentationBackend, InstrumentedSession};
use super::message::{Inbound, Outbound, SessionEvent, ShellEvent, ShellStatus, events};
use super::signal::CancelSignal;
use crate::config::ShellSettings;
use crate::declaration::ModDeclaration;
use crate::error::{Error, Result};
use crate::resolver::GameCatalog;
use crate::synth::synthesize;

/// How a `start` call ended without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachOutcome {
    /// The script reported ready against the named patch variant.
    Active { patch: String },
    /// Cancelled before the attach completed.
    Cancelled,
}

struct ActiveSession {
    session: Box<dyn InstrumentedSession>,
    events: Receiver<SessionEvent>,
    declaration: ModDeclaration,
}

/// What the ready/cleanup handshake is waiting for.
enum Wait {
    Found,
    TimedOut,
    Detached(String),
}

pub struct ExecutionShell<B: InstrumentationBackend> {
    backend: B,
    catalog: Arc<GameCatalog>,
    settings: ShellSettings,
    cancel: Arc<CancelSignal>,
    status: ShellStatus,
    ui: Sender<ShellEvent>,
    active: Option<ActiveSession>,
}

impl<B: InstrumentationBackend> ExecutionShell<B> {
    /// Create a shell publishing status and game events on `ui`.
    pub fn new(
        backend: B,
        catalog: Arc<GameCatalog>,
        settings: ShellSettings,
        ui: Sender<ShellEvent>,
    ) -> Self {
        Self {
            backend,
            catalog,
            settings,
            cancel: Arc::new(CancelSignal::new()),
            status: ShellStatus::Idle,
            ui,
            active: None,
        }
    }

    pub fn status(&self) -> &ShellStatus {
        &self.status
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Handle for abandoning a pending attach from another thread.
    pub fn cancel_handle(&self) -> Arc<CancelSignal> {
        Arc::clone(&self.cancel)
    }

    /// Attach `declaration` to its game, spawning `exe_path` if the game is
    /// not running yet.
    ///
    /// Any current attach is stopped first. On failure every partially
    /// established piece is unwound before the error is returned.
    pub fn start(
        &mut self,
        declaration: ModDeclaration,
        exe_path: Option<&Path>,
    ) -> Result<AttachOutcome> {
        if self.active.is_some() {
            self.stop();
        }
        self.cancel.reset();

        let catalog = Arc::clone(&self.catalog);
        let game = match catalog.get(declaration.game()) {
            Ok(game) => game,
            Err(e) => return Err(self.fail(e)),
        };
        let process_name = exe_path
            .and_then(|path| path.file_name())
            .and_then(|name| name.to_str())
            .unwrap_or(&game.executable)
            .to_string();

        self.set_status(ShellStatus::Waiting(process_name.clone()));
        let pid = match self.wait_for_process(&process_name, exe_path) {
            Ok(Some(pid)) => pid,
            Ok(None) => {
                self.set_status(ShellStatus::Idle);
                return Ok(AttachOutcome::Cancelled);
            }
            Err(e) => return Err(self.fail(e)),
        };

        self.set_status(ShellStatus::Attaching);
        let mut session = match self.backend.attach(pid) {
            Ok(session) => session,
            Err(e) => return Err(self.fail(Error::Attach(e.to_string()))),
        };
        info!("Attached to {} (pid {})", process_name, pid);

        if self.cancel.is_triggered() {
            detach_quietly(session.as_mut());
            self.set_status(ShellStatus::Idle);
            return Ok(AttachOutcome::Cancelled);
        }

        let events = match session.events() {
            Ok(events) => events,
            Err(e) => {
                detach_quietly(session.as_mut());
                return Err(self.fail(Error::Attach(e.to_string())));
            }
        };
        match self.inject(session.as_mut(), &events, &declaration) {
            Ok(patch) => {
                self.active = Some(ActiveSession {
                    session,
                    events,
                    declaration,
                });
                self.set_status(ShellStatus::Active);
                Ok(AttachOutcome::Active { patch })
            }
            Err((e, script_loaded)) => {
                if script_loaded {
                    if let Err(unload) = session.unload_script() {
                        debug!("Unload after failed attach: {}", unload);
                    }
                }
                detach_quietly(session.as_mut());
                Err(self.fail(e))
            }
        }
    }

    /// Tear down the current attach. Always completes.
    pub fn stop(&mut self) {
        self.cancel.trigger();

        if let Some(mut active) = self.active.take() {
            match active.session.post(&Inbound::Cleanup) {
                Ok(()) => {
                    let timeout = self.settings.cleanup_timeout;
                    let done = self.wait_for_event(
                        &active.events,
                        &active.declaration,
                        events::CLEANUP_DONE,
                        timeout,
                    );
                    match done {
                        Wait::Found => debug!("Script cleanup done"),
                        Wait::TimedOut => warn!("Script cleanup timed out after {:?}", timeout),
                        Wait::Detached(reason) => debug!("Detached during cleanup: {}", reason),
                    }
                }
                Err(e) => warn!("Failed to request cleanup: {}", e),
            }
            if let Err(e) = active.session.unload_script() {
                debug!("Unload failed: {}", e);
            }
            self.set_status(ShellStatus::Idle);
            detach_quietly(active.session.as_mut());
        } else {
            self.set_status(ShellStatus::Idle);
        }
    }

    /// Post a command to the receiver declared under `name`.
    pub fn send(&mut self, name: &str, data: Value) -> Result<()> {
        let Some(active) = self.active.as_mut() else {
            return Err(Error::Backend(format!(
                "cannot send '{}': no active session",
                name
            )));
        };
        active.session.post(&Inbound::Command {
            name: name.to_string(),
            data,
        })
    }

    /// Dispatch pending session events, waiting up to `timeout` for the first.
    ///
    /// Returns the number of events handled.
    pub fn pump(&mut self, timeout: Duration) -> usize {
        let mut handled = 0;
        loop {
            let Some(active) = self.active.as_ref() else {
                break;
            };
            let next = if handled == 0 {
                active.events.recv_timeout(timeout).ok()
            } else {
                active.events.try_recv().ok()
            };
            let Some(event) = next else {
                break;
            };

            handled += 1;
            match event {
                SessionEvent::Message(message) => self.dispatch(&active.declaration, &message),
                SessionEvent::Detached { reason } => {
                    self.handle_detached(&reason);
                    break;
                }
            }
        }
        handled
    }

    fn wait_for_process(&self, name: &str, exe_path: Option<&Path>) -> Result<Option<u32>> {
        let mut spawned = false;
        loop {
            if self.cancel.is_triggered() {
                return Ok(None);
            }
            match self.backend.find_process(name) {
                Ok(Some(process)) => return Ok(Some(process.pid)),
                Ok(None) => {}
                Err(e) => debug!("Process lookup failed: {}", e),
            }

            if let (Some(path), false) = (exe_path, spawned) {
                info!("Starting {}", path.display());
                self.backend.spawn(path)?;
                spawned = true;
                if self.cancel.wait(self.settings.spawn_grace) {
                    return Ok(None);
                }
                continue;
            }

            if self.cancel.wait(self.settings.process_poll) {
                return Ok(None);
            }
        }
    }

    /// Detect the patch, synthesize, load and await `__ready`.
    ///
    /// On error, also reports whether the script got loaded.
    fn inject(
        &mut self,
        session: &mut dyn InstrumentedSession,
        receiver: &Receiver<SessionEvent>,
        declaration: &ModDeclaration,
    ) -> std::result::Result<String, (Error, bool)> {
        let catalog = Arc::clone(&self.catalog);
        let resolved = match session.main_module_path() {
            Ok(path) => catalog.resolve_binary(declaration.game(), &path),
            Err(e) => {
                warn!("Patch detection failed, falling back to default: {}", e);
                catalog.resolve_patch(declaration.game(), None)
            }
        }
        .map_err(|e| (e, false))?;

        self.set_status(ShellStatus::Injecting);
        let script =
            synthesize(declaration, resolved.game, resolved.variant).map_err(|e| (e, false))?;

        session
            .load_script(&script)
            .map_err(|e| (Error::ScriptLoad(e.to_string()), false))?;

        let timeout = self.settings.ready_timeout;
        match self.wait_for_event(receiver, declaration, events::READY, timeout) {
            Wait::Found => Ok(resolved.key.to_string()),
            Wait::TimedOut => Err((Error::ReadyTimeout(timeout), true)),
            Wait::Detached(reason) => Err((
                Error::Attach(format!("detached before ready: {}", reason)),
                true,
            )),
        }
    }

    /// Dispatch messages until `event` arrives or `timeout` elapses.
    fn wait_for_event(
        &self,
        receiver: &Receiver<SessionEvent>,
        declaration: &ModDeclaration,
        event: &str,
        timeout: Duration,
    ) -> Wait {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match receiver.recv_timeout(remaining) {
                Ok(SessionEvent::Message(message)) => {
                    let found = message.event() == Some(event);
                    self.dispatch(declaration, &message);
                    if found {
                        return Wait::Found;
                    }
                }
                Ok(SessionEvent::Detached { reason }) => return Wait::Detached(reason),
                Err(RecvTimeoutError::Timeout) => return Wait::TimedOut,
                Err(RecvTimeoutError::Disconnected) => {
                    return Wait::Detached("event channel closed".to_string());
                }
            }
        }
    }

    fn dispatch(&self, declaration: &ModDeclaration, message: &Outbound) {
        match message {
            Outbound::Send { payload } => {
                if payload.event == events::LOG {
                    mirror_script_log(&payload.data);
                }
                if let Some(handler) = declaration.event_handler(&payload.event) {
                    if let Err(e) = handler(&payload.data) {
                        error!("Event handler error ({}): {:#}", payload.event, e);
                    }
                }
                self.publish(ShellEvent::Game {
                    event: payload.event.clone(),
                    data: payload.data.clone(),
                });
            }
            Outbound::Error { description, stack } => {
                let message = stack.as_deref().unwrap_or(description);
                error!("Script error: {}", message);
                self.publish(ShellEvent::Game {
                    event: events::ERROR.to_string(),
                    data: json!({ "message": message }),
                });
            }
            Outbound::Log { level, payload } => {
                let text = match payload {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                let data = json!({ "level": level, "message": text });
                mirror_script_log(&data);
                self.publish(ShellEvent::Game {
                    event: events::LOG.to_string(),
                    data,
                });
            }
        }
    }

    fn handle_detached(&mut self, reason: &str) {
        self.active = None;
        if self.status != ShellStatus::Idle {
            info!("Detached: {}", reason);
            self.set_status(ShellStatus::Idle);
            self.publish(ShellEvent::Game {
                event: events::DETACHED.to_string(),
                data: json!({ "reason": reason }),
            });
        }
    }

    fn fail(&mut self, e: Error) -> Error {
        error!("Attach failed: {}", e);
        self.set_status(ShellStatus::Error(e.to_string()));
        e
    }

    fn set_status(&mut self, status: ShellStatus) {
        if self.status != status {
            debug!("Status: {} -> {}", self.status, status);
            self.status = status.clone();
            self.publish(ShellEvent::Status(status));
        }
    }

    fn publish(&self, event: ShellEvent) {
        // UI receiver may be gone
        let _ = self.ui.send(event);
    }
}

impl<B: InstrumentationBackend> Drop for ExecutionShell<B> {
    fn drop(&mut self) {
        if self.active.is_some() {
            self.stop();
        }
    }
}

fn detach_quietly(session: &mut dyn InstrumentedSession) {
    if let Err(e) = session.detach() {
        debug!("Detach failed: {}", e);
    }
}

fn mirror_script_log(data: &Value) {
    let level = data.get("level").and_then(Value::as_str).unwrap_or("info");
    let message = data.get("message").and_then(Value::as_str).unwrap_or_default();
    match level {
        "error" => error!(target: "modweave::script", "{}", message),
        "warning" => warn!(target: "modweave::script", "{}", message),
        _ => info!(target: "modweave::script", "{}", message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::{Callback, HookSpec};
    use crate::resolver::fingerprint_bytes;
    use crate::shell::mock::MockBackend;
    use crate::table::fixtures::sample_game;
    use std::sync::mpsc;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use tempfile::TempDir;

    fn catalog() -> Arc<GameCatalog> {
        let mut game = sample_game();
        let mut hotfix = game.patches["patch4"].clone();
        hotfix.name = "Patch 4.1".to_string();
        hotfix.fingerprint = fingerprint_bytes(b"tomb123 patch 4.1");
        game.patches.insert("patch4.1".to_string(), hotfix);
        Arc::new(GameCatalog::from_games([game]))
    }

    fn settings() -> ShellSettings {
        ShellSettings::builder()
            .ready_timeout(Duration::from_millis(100))
            .cleanup_timeout(Duration::from_millis(100))
            .process_poll(Duration::from_millis(10))
            .spawn_grace(Duration::from_millis(10))
            .build()
    }

    fn declaration() -> ModDeclaration {
        ModDeclaration::builder("Super Jump", "tomb123", ["tomb1.dll"])
            .unwrap()
            .hook(HookSpec::new("LaraInLevel").on_enter(Callback::emit("inLevel")))
            .unwrap()
            .build()
    }

    fn new_shell(backend: MockBackend) -> (ExecutionShell<MockBackend>, Receiver<ShellEvent>) {
        let (sender, ui) = mpsc::channel();
        (ExecutionShell::new(backend, catalog(), settings(), sender), ui)
    }

    fn statuses(ui: &Receiver<ShellEvent>) -> Vec<ShellStatus> {
        ui
            .try_iter()
            .filter_map(|event| match event {
                ShellEvent::Status(status) => Some(status),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_start_reaches_active() {
        let backend = MockBackend::builder()
            .process("tomb123.exe", 42)
            .responsive()
            .build();
        let (mut shell, ui) = new_shell(backend.clone());

        let outcome = shell.start(declaration(), None).unwrap();
        assert_eq!(
            outcome,
            AttachOutcome::Active {
                patch: "patch4".to_string()
            }
        );
        assert!(shell.is_active());
        assert_eq!(
            statuses(&ui),
            vec![
                ShellStatus::Waiting("tomb123.exe".to_string()),
                ShellStatus::Attaching,
                ShellStatus::Injecting,
                ShellStatus::Active,
            ]
        );

        let state = backend.state();
        assert_eq!(state.scripts.len(), 1);
        assert!(state.scripts[0].trim_end().ends_with("__init();"));
    }

    #[test]
    fn test_start_detects_patch_from_main_module() {
        let dir = TempDir::new().unwrap();
        let exe = dir.path().join("tomb123.exe");
        fs::write(&exe, b"tomb123 patch 4.1").unwrap();

        let backend = MockBackend::builder()
            .process("tomb123.exe", 42)
            .module_path(&exe)
            .responsive()
            .build();
        let (mut shell, _ui) = new_shell(backend);

        let outcome = shell.start(declaration(), None).unwrap();
        assert_eq!(
            outcome,
            AttachOutcome::Active {
                patch: "patch4.1".to_string()
            }
        );
    }

    #[test]
    fn test_ready_timeout_unwinds() {
        let backend = MockBackend::builder()
            .process("tomb123.exe", 42)
            .answer_ready(false)
            .build();
        let (mut shell, _ui) = new_shell(backend.clone());

        let err = shell.start(declaration(), None).unwrap_err();
        assert!(matches!(err, Error::ReadyTimeout(_)), "{err}");
        assert!(!shell.is_active());
        assert!(matches!(shell.status(), ShellStatus::Error(_)));

        let state = backend.state();
        assert_eq!(state.unloads, 1);
        assert_eq!(state.detaches, 1);
    }

    #[test]
    fn test_load_failure_detaches_without_unload() {
        let backend = MockBackend::builder()
            .process("tomb123.exe", 42)
            .fail_load()
            .build();
        let (mut shell, _ui) = new_shell(backend.clone());

        let err = shell.start(declaration(), None).unwrap_err();
        assert!(matches!(err, Error::ScriptLoad(_)), "{err}");
        let state = backend.state();
        assert_eq!(state.unloads, 0);
        assert_eq!(state.detaches, 1);
    }

    #[test]
    fn test_unknown_game_fails_before_waiting() {
        let backend = MockBackend::builder().responsive().build();
        let (mut shell, ui) = new_shell(backend);
        let decl = ModDeclaration::builder("Mod", "tomb999", ["x.dll"])
            .unwrap()
            .build();

        let err = shell.start(decl, None).unwrap_err();
        assert!(matches!(err, Error::UnknownGame(_)));
        let seen = statuses(&ui);
        assert_eq!(seen.len(), 1);
        assert!(matches!(seen[0], ShellStatus::Error(_)));
    }

    #[test]
    fn test_missing_process_is_spawned_once() {
        let backend = MockBackend::builder()
            .appears_on_spawn("tomb123.exe", 7)
            .responsive()
            .build();
        let (mut shell, _ui) = new_shell(backend.clone());

        let exe = Path::new("/games/tomb123/tomb123.exe");
        shell.start(declaration(), Some(exe)).unwrap();
        assert_eq!(backend.state().spawned, vec![exe.to_path_buf()]);
    }

    #[test]
    fn test_cancel_while_waiting() {
        let backend = MockBackend::builder().responsive().build();
        let (mut shell, ui) = new_shell(backend.clone());
        let cancel = shell.cancel_handle();

        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            cancel.trigger();
        });
        let outcome = shell.start(declaration(), None).unwrap();
        canceller.join().unwrap();

        assert_eq!(outcome, AttachOutcome::Cancelled);
        assert_eq!(shell.status(), &ShellStatus::Idle);
        assert_eq!(statuses(&ui).last(), Some(&ShellStatus::Idle));
        assert!(backend.state().scripts.is_empty());
    }

    #[test]
    fn test_stop_requests_cleanup() {
        let backend = MockBackend::builder()
            .process("tomb123.exe", 42)
            .responsive()
            .build();
        let (mut shell, _ui) = new_shell(backend.clone());
        shell.start(declaration(), None).unwrap();

        shell.stop();
        assert!(!shell.is_active());
        assert_eq!(shell.status(), &ShellStatus::Idle);
        let state = backend.state();
        assert_eq!(state.posted, vec![Inbound::Cleanup]);
        assert_eq!(state.unloads, 1);
        assert_eq!(state.detaches, 1);
    }

    #[test]
    fn test_stop_completes_when_script_never_answers() {
        let backend = MockBackend::builder()
            .process("tomb123.exe", 42)
            .answer_cleanup(false)
            .answer_ready(true)
            .build();
        let (mut shell, _ui) = new_shell(backend.clone());
        shell.start(declaration(), None).unwrap();

        let started = Instant::now();
        shell.stop();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(backend.state().detaches, 1);
    }

    #[test]
    fn test_send_posts_command() {
        let backend = MockBackend::builder()
            .process("tomb123.exe", 42)
            .responsive()
            .build();
        let (mut shell, _ui) = new_shell(backend.clone());
        assert!(shell.send("toggle", Value::Null).is_err());

        shell.start(declaration(), None).unwrap();
        shell.send("toggle", json!({ "on": true })).unwrap();
        assert_eq!(
            backend.state().posted,
            vec![Inbound::Command {
                name: "toggle".to_string(),
                data: json!({ "on": true })
            }]
        );
    }

    #[test]
    fn test_pump_dispatches_to_handlers_and_ui() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let decl = ModDeclaration::builder("Super Jump", "tomb123", ["tomb1.dll"])
            .unwrap()
            .hook(HookSpec::new("LaraInLevel").on_enter(Callback::emit("inLevel")))
            .unwrap()
            .on("inLevel", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap()
            .on("broken", |_| anyhow::bail!("handler failed"))
            .unwrap()
            .build();

        let backend = MockBackend::builder()
            .process("tomb123.exe", 42)
            .responsive()
            .build();
        let (mut shell, ui) = new_shell(backend.clone());
        shell.start(decl, None).unwrap();
        ui.try_iter().for_each(drop);

        backend.emit(SessionEvent::Message(Outbound::send("inLevel", json!(3))));
        backend.emit(SessionEvent::Message(Outbound::send("broken", Value::Null)));
        assert_eq!(shell.pump(Duration::from_millis(100)), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let published: Vec<ShellEvent> = ui.try_iter().collect();
        assert_eq!(
            published,
            vec![
                ShellEvent::Game {
                    event: "inLevel".to_string(),
                    data: json!(3)
                },
                ShellEvent::Game {
                    event: "broken".to_string(),
                    data: Value::Null
                },
            ]
        );
        assert!(shell.is_active());
    }

    #[test]
    fn test_script_log_and_error_are_published() {
        let backend = MockBackend::builder()
            .process("tomb123.exe", 42)
            .on_load(Outbound::Log {
                level: "info".to_string(),
                payload: json!("console line"),
            })
            .on_load(Outbound::Error {
                description: "TypeError".to_string(),
                stack: None,
            })
            .responsive()
            .build();
        let (mut shell, ui) = new_shell(backend);
        shell.start(declaration(), None).unwrap();

        let games: Vec<(String, Value)> = ui
            .try_iter()
            .filter_map(|event| match event {
                ShellEvent::Game { event, data } => Some((event, data)),
                _ => None,
            })
            .collect();
        assert_eq!(games[0].0, events::LOG);
        assert_eq!(games[0].1["message"], "console line");
        assert_eq!(games[1].0, events::ERROR);
        assert_eq!(games[1].1["message"], "TypeError");
        assert_eq!(games[2].0, events::READY);
    }

    #[test]
    fn test_detach_returns_to_idle() {
        let backend = MockBackend::builder()
            .process("tomb123.exe", 42)
            .responsive()
            .build();
        let (mut shell, ui) = new_shell(backend.clone());
        shell.start(declaration(), None).unwrap();
        ui.try_iter().for_each(drop);

        backend.emit(SessionEvent::Detached {
            reason: "process-terminated".to_string(),
        });
        assert_eq!(shell.pump(Duration::from_millis(100)), 1);

        assert!(!shell.is_active());
        assert_eq!(
            ui.try_iter().collect::<Vec<_>>(),
            vec![
                ShellEvent::Status(ShellStatus::Idle),
                ShellEvent::Game {
                    event: events::DETACHED.to_string(),
                    data: json!({ "reason": "process-terminated" })
                },
            ]
        );
    }
}
