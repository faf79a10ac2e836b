//! Callback helpers for Rust → Node.js communication.
//!
//! A single `on_session_event` callback carries every session event
//! (connection, result, signal, attempt, resolution, ...) to the host.

use crate::types::event::SessionEvent;
use napi::threadsafe_function::{
    ErrorStrategy, ThreadsafeFunction, ThreadsafeFunctionCallMode,
};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Stores the registered Node.js callback.
pub struct CallbackRegistry {
    on_session_event: Mutex<Option<ThreadsafeFunction<SessionEvent, ErrorStrategy::Fatal>>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self {
            on_session_event: Mutex::new(None),
        }
    }

    /// Register (or replace) the session event callback.
    pub async fn set_on_session_event(
        &self,
        callback: ThreadsafeFunction<SessionEvent, ErrorStrategy::Fatal>,
    ) {
        let mut cb = self.on_session_event.lock().await;
        *cb = Some(callback);
    }

    /// Invoke the callback. Events are dropped while none is registered.
    pub async fn emit_session_event(&self, event: SessionEvent) {
        let cb = self.on_session_event.lock().await;
        if let Some(ref tsfn) = *cb {
            tsfn.call(event, ThreadsafeFunctionCallMode::NonBlocking);
        }
    }

    pub async fn has_on_session_event(&self) -> bool {
        let cb = self.on_session_event.lock().await;
        cb.is_some()
    }
}

/// Get a reference to the global callback registry.
pub fn get_registry() -> &'static Arc<CallbackRegistry> {
    use std::sync::OnceLock;
    static REGISTRY: OnceLock<Arc<CallbackRegistry>> = OnceLock::new();
    REGISTRY.get_or_init(|| Arc::new(CallbackRegistry::new()))
}
