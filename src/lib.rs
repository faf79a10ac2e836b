//! # double-signal-core: Signal Tracking Engine for the Double Dashboard
//!
//! This crate provides a native N-API module for the Node.js/Electron
//! dashboard host that handles the full signal lifecycle:
//!
//! - **Event stream ingestion** over SSE via `reqwest`
//! - **Pending signal tracking** with bounded attempts and white protection
//! - **Alert cooldown governor** (decaying cooldown, stop mode, window cap)
//! - **Idempotent resolution accounting** keyed by signal id, reconciled
//!   against the server's authoritative `bet_result`
//! - **Multi-threaded async runtime** via `tokio`
//!
//! ## Architecture
//!
//! ```text
//! Server SSE → [SSE Client] → [Dispatcher: Session] → onSessionEvent → Node.js
//!                                   │        ↑
//!                                   ↓        │ display timers / status poll
//!                        POST /api/signals/resolution
//! ```
//!
//! ## Usage from Node.js
//!
//! ```javascript
//! const core = require('./double-signal-core');
//!
//! core.onSessionEvent((event) => render(event));
//! core.initSession({ baseUrl: 'http://localhost:3001', cooldownProfile: 'blaze' });
//!
//! const status = core.getSessionStatus();
//! core.shutdownSession();
//! ```

pub mod bridge;
pub mod engine;
pub mod reporter;
pub mod stream;
pub mod types;

// N-API functions are registered by napi_derive from bridge/napi_exports.rs.
