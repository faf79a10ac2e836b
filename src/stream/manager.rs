//! Session runner: orchestrates the event stream and the session dispatcher.
//!
//! Tasks:
//! - SSE client: connection loop, forwards frames
//! - dispatcher: sole owner of the `Session`; applies frames, timer and poll
//!   commands one at a time, executes the resulting actions, publishes status
//! - status poller (optional): `GET /api/status` on an interval
//!
//! Resolution reports and display timers are short detached tasks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::engine::session::{Session, SessionAction};
use crate::reporter::api_client::{ApiError, SignalApiClient};
use crate::stream::client::{ClientEvent, SseClient};
use crate::stream::parser;
use crate::types::config::SessionSettings;
use crate::types::event::{SessionEvent, SessionStatus};

/// Internal commands fed back into the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    DisplayTimeout(String),
    /// Result of a status poll (`wsConnected`).
    ServerStatus(bool),
}

pub struct SessionRunner {
    /// Shutdown signal sender.
    shutdown_tx: watch::Sender<bool>,

    /// Latest snapshot published by the dispatcher.
    status_rx: watch::Receiver<SessionStatus>,

    /// Whether the runner is running.
    is_running: Arc<AtomicBool>,

    /// Join handles for the long-lived tasks.
    task_handles: Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl SessionRunner {
    /// Start all session tasks. Must be called inside the tokio runtime.
    ///
    /// Session events are delivered in order on `event_tx`.
    pub fn start(
        settings: SessionSettings,
        event_tx: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<Self, ApiError> {
        let api = Arc::new(SignalApiClient::new(&settings)?);
        let client = SseClient::new(
            settings.events_url(),
            settings.auth_token.clone(),
            settings.reconnect_delay_ms,
            settings.max_reconnect_attempts,
        )
        .map_err(|e| ApiError::Client(e.to_string()))?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (client_tx, client_rx) = mpsc::unbounded_channel::<ClientEvent>();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<Command>();

        let poll_interval_ms = settings.status_poll_interval_ms;
        let session = Session::new(settings);
        let (status_tx, status_rx) = watch::channel(session.status());

        let mut handles = Vec::with_capacity(3);

        // SSE read loop
        let client_shutdown = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            client.run(client_tx, client_shutdown).await;
        }));

        // Dispatcher
        let ctx = ActionContext {
            event_tx,
            cmd_tx: cmd_tx.clone(),
            api: api.clone(),
        };
        let dispatcher = Dispatcher::new(session);
        handles.push(tokio::spawn(dispatch_loop(
            dispatcher,
            client_rx,
            cmd_rx,
            ctx,
            status_tx,
            shutdown_rx.clone(),
        )));

        // Status poller
        if poll_interval_ms > 0 {
            handles.push(tokio::spawn(poll_status(
                api,
                poll_interval_ms,
                cmd_tx,
                shutdown_rx,
            )));
        }

        info!(tasks = handles.len(), "Session runner started");

        Ok(Self {
            shutdown_tx,
            status_rx,
            is_running: Arc::new(AtomicBool::new(true)),
            task_handles: Mutex::new(handles),
        })
    }

    /// Latest session snapshot.
    pub fn status(&self) -> SessionStatus {
        let mut status = self.status_rx.borrow().clone();
        status.running = self.is_running.load(Ordering::Relaxed);
        status
    }

    /// Graceful shutdown: stop every task and wait for them.
    pub async fn shutdown(&self) {
        info!("Shutting down session runner");
        let _ = self.shutdown_tx.send(true);
        self.is_running.store(false, Ordering::Relaxed);

        let mut handles = self.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        info!("Session runner shutdown complete");
    }
}

// =============================================================================
// DISPATCHER
// =============================================================================

/// Owns the `Session` and the transport flag used to gate poll results.
pub struct Dispatcher {
    session: Session,
    transport_up: bool,
}

impl Dispatcher {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            transport_up: false,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn on_client_event(&mut self, event: ClientEvent, now_ms: i64) -> Vec<SessionAction> {
        match event {
            ClientEvent::Connected => {
                self.transport_up = true;
                self.session.set_connected(true, now_ms)
            }
            ClientEvent::Disconnected => {
                self.transport_up = false;
                self.session.set_connected(false, now_ms)
            }
            ClientEvent::Frame(frame) => match parser::parse_sse_event(&frame.event, &frame.data) {
                Ok(Some(event)) => self.session.handle_event(event, now_ms),
                Ok(None) => {
                    debug!(event = %frame.event, "Ignoring unconsumed event");
                    Vec::new()
                }
                Err(e) => {
                    warn!(event = %frame.event, error = %e, "Dropping malformed event");
                    self.session.record_malformed();
                    Vec::new()
                }
            },
        }
    }

    pub fn on_command(&mut self, command: Command, now_ms: i64) -> Vec<SessionAction> {
        match command {
            Command::DisplayTimeout(signal_id) => {
                self.session.handle_display_timeout(&signal_id, now_ms)
            }
            // A healthy server means nothing while our own stream is down.
            Command::ServerStatus(ws_connected) => self
                .session
                .set_connected(self.transport_up && ws_connected, now_ms),
        }
    }
}

struct ActionContext {
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    cmd_tx: mpsc::UnboundedSender<Command>,
    api: Arc<SignalApiClient>,
}

impl ActionContext {
    fn execute(&self, actions: Vec<SessionAction>) {
        for action in actions {
            match action {
                SessionAction::Emit(event) => {
                    if self.event_tx.send(event).is_err() {
                        debug!("Event listener gone, dropping session event");
                    }
                }
                SessionAction::Report(report) => {
                    let api = self.api.clone();
                    tokio::spawn(async move {
                        if let Err(e) = api.report_resolution(&report).await {
                            warn!(signal_id = %report.id, error = %e, "Resolution report failed");
                        }
                    });
                }
                SessionAction::ScheduleDisplayTimeout {
                    signal_id,
                    delay_ms,
                } => {
                    let cmd_tx = self.cmd_tx.clone();
                    tokio::spawn(async move {
                        sleep(Duration::from_millis(delay_ms)).await;
                        let _ = cmd_tx.send(Command::DisplayTimeout(signal_id));
                    });
                }
            }
        }
    }
}

async fn dispatch_loop(
    mut dispatcher: Dispatcher,
    mut client_rx: mpsc::UnboundedReceiver<ClientEvent>,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    ctx: ActionContext,
    status_tx: watch::Sender<SessionStatus>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let actions = tokio::select! {
            Some(event) = client_rx.recv() => dispatcher.on_client_event(event, now_ms()),
            Some(command) = cmd_rx.recv() => dispatcher.on_command(command, now_ms()),
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
            else => break,
        };

        ctx.execute(actions);
        status_tx.send_replace(dispatcher.session().status());
    }
    info!("Session dispatcher stopped");
}

async fn poll_status(
    api: Arc<SignalApiClient>,
    interval_ms: u64,
    cmd_tx: mpsc::UnboundedSender<Command>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(Duration::from_millis(interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match api.fetch_status().await {
                    Ok(ws_connected) => {
                        if cmd_tx.send(Command::ServerStatus(ws_connected)).is_err() {
                            break;
                        }
                    }
                    Err(e) => debug!(error = %e, "Status poll failed"),
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::sse::SseFrame;
    use crate::types::config::SessionConfig;

    fn dispatcher() -> Dispatcher {
        let settings = SessionConfig {
            base_url: "http://localhost:3001".to_string(),
            ..Default::default()
        }
        .validate()
        .unwrap();
        Dispatcher::new(Session::new(settings))
    }

    fn frame(event: &str, data: &str) -> ClientEvent {
        ClientEvent::Frame(SseFrame {
            event: event.to_string(),
            data: data.to_string(),
            id: None,
        })
    }

    fn kinds(actions: &[SessionAction]) -> Vec<&str> {
        actions
            .iter()
            .filter_map(|a| match a {
                SessionAction::Emit(e) => Some(e.kind.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_frames_drive_the_session() {
        let mut d = dispatcher();
        assert_eq!(kinds(&d.on_client_event(ClientEvent::Connected, 1)), vec!["connection"]);

        let result = r#"{"type":"double_result","data":{"color":"red","number":4}}"#;
        d.on_client_event(frame("double_result", result), 2);
        d.on_client_event(frame("double_result", result), 3);
        let actions = d.on_client_event(frame("double_result", result), 4);
        assert_eq!(kinds(&actions), vec!["result", "signal"]);
        assert_eq!(d.session().status().round, 3);
    }

    #[test]
    fn test_malformed_frame_is_counted_and_dropped() {
        let mut d = dispatcher();
        let actions = d.on_client_event(frame("double_result", "{oops"), 1);
        assert!(actions.is_empty());
        let status = d.session().status();
        assert_eq!(status.malformed_events, 1);
        assert_eq!(status.round, 0);

        assert!(d.on_client_event(frame("message", "{}"), 2).is_empty());
    }

    #[test]
    fn test_server_status_gated_by_transport() {
        let mut d = dispatcher();
        assert!(d.on_command(Command::ServerStatus(true), 1).is_empty());
        assert!(!d.session().status().connected);

        d.on_client_event(ClientEvent::Connected, 2);
        let actions = d.on_command(Command::ServerStatus(false), 3);
        assert_eq!(kinds(&actions), vec!["connection"]);
        assert!(!d.session().status().connected);

        d.on_command(Command::ServerStatus(true), 4);
        assert!(d.session().status().connected);

        d.on_client_event(ClientEvent::Disconnected, 5);
        assert!(!d.session().status().connected);
    }

    #[tokio::test]
    async fn test_runner_start_and_shutdown() {
        let settings = SessionConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            reconnect_delay_ms: Some(60_000),
            status_poll_interval_ms: Some(0),
            ..Default::default()
        }
        .validate()
        .unwrap();
        let (event_tx, _event_rx) = mpsc::unbounded_channel();

        let runner = SessionRunner::start(settings, event_tx).unwrap();
        assert!(runner.status().running);

        tokio::time::timeout(Duration::from_secs(5), runner.shutdown())
            .await
            .unwrap();
        assert!(!runner.status().running);
    }
}
