//! N-API exported functions: the public API surface for Node.js.
//!
//! These functions are callable from JavaScript via the native module.
//! They manage the lifecycle of one dashboard session: event stream,
//! signal tracking, cooldown and resolution accounting all run in Rust.
//!
//! Callback policy: only `onSessionEvent` calls back into Node.js.

use crate::bridge::callbacks::get_registry;
use crate::stream::manager::SessionRunner;
use crate::types::config::SessionConfig;
use crate::types::event::{SessionEvent, SessionStatus};
use napi::bindgen_prelude::*;
use napi::threadsafe_function::{ErrorStrategy, ThreadsafeFunction};
use napi_derive::napi;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

// =============================================================================
// GLOBAL STATE
// =============================================================================

/// Global session runner wrapped in Arc<Mutex> for thread-safe access.
static RUNNER: std::sync::OnceLock<Arc<tokio::sync::Mutex<Option<SessionRunner>>>> =
    std::sync::OnceLock::new();

fn get_runner() -> &'static Arc<tokio::sync::Mutex<Option<SessionRunner>>> {
    RUNNER.get_or_init(|| Arc::new(tokio::sync::Mutex::new(None)))
}

/// Global tokio runtime for the session tasks.
static RUNTIME: std::sync::OnceLock<tokio::runtime::Runtime> = std::sync::OnceLock::new();

pub fn get_runtime() -> &'static tokio::runtime::Runtime {
    RUNTIME.get_or_init(|| {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2) // Stream + dispatcher
            .thread_name("double-signal-core")
            .enable_all()
            .build()
            .expect("Failed to create tokio runtime")
    })
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    // Only once; later calls are ignored.
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .try_init();
}

// =============================================================================
// SESSION N-API FUNCTIONS
// =============================================================================

/// Start a dashboard session with the given configuration.
///
/// Validates the config, connects to the event stream and starts tracking.
/// An already running session is shut down first.
#[napi]
pub fn init_session(config: SessionConfig) -> Result<()> {
    let settings = config
        .validate()
        .map_err(|e| napi::Error::from_reason(format!("Invalid session config: {}", e)))?;

    init_tracing(settings.verbose);
    info!(
        url = %settings.events_url(),
        max_attempts = settings.default_max_attempts,
        local_detection = settings.local_detection,
        "Initializing session"
    );

    let runtime = get_runtime();

    runtime.block_on(async {
        let mut runner = get_runner().lock().await;
        if let Some(ref previous) = *runner {
            info!("Replacing running session");
            previous.shutdown().await;
        }
        *runner = None;

        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<SessionEvent>();
        let started = SessionRunner::start(settings, event_tx)
            .map_err(|e| napi::Error::from_reason(format!("Failed to start session: {}", e)))?;
        *runner = Some(started);

        let registry = get_registry().clone();
        if !registry.has_on_session_event().await {
            warn!("No onSessionEvent callback registered yet, events are dropped until one is");
        }

        // Forward session events to Node.js in order.
        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                registry.emit_session_event(event).await;
            }
        });

        Ok::<(), napi::Error>(())
    })?;

    info!("Session initialized");
    Ok(())
}

/// Register the callback receiving every session event.
#[napi(ts_args_type = "callback: (event: SessionEvent) => void")]
pub fn on_session_event(callback: JsFunction) -> Result<()> {
    let tsfn: ThreadsafeFunction<SessionEvent, ErrorStrategy::Fatal> = callback
        .create_threadsafe_function(0, |ctx| Ok(vec![ctx.value]))?;

    let runtime = get_runtime();
    let registry = get_registry().clone();

    runtime.block_on(async {
        registry.set_on_session_event(tsfn).await;
    });

    info!("onSessionEvent callback registered");
    Ok(())
}

/// Get the current session snapshot (connectivity, stats, governor, pending signal).
#[napi]
pub fn get_session_status() -> Result<SessionStatus> {
    let runtime = get_runtime();

    let status = runtime.block_on(async {
        let runner = get_runner().lock().await;
        match *runner {
            Some(ref r) => r.status(),
            None => SessionStatus {
                display_state: "searching".to_string(),
                ..Default::default()
            },
        }
    });

    Ok(status)
}

/// Gracefully shut down the session.
#[napi]
pub fn shutdown_session() -> Result<()> {
    let runtime = get_runtime();

    runtime.block_on(async {
        let mut runner = get_runner().lock().await;
        if let Some(ref r) = *runner {
            r.shutdown().await;
        }
        *runner = None;
    });

    info!("Session shut down");
    Ok(())
}
