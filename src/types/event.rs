use napi_derive::napi;
use serde::{Deserialize, Serialize};

use crate::types::outcome::{Color, Outcome, Resolution};
use crate::types::signal::Signal;

// =============================================================================
// N-API EXPORTED STRUCTS (Rust → Node.js)
// =============================================================================

/// Session event pushed to the `onSessionEvent` callback.
///
/// Flat layout for N-API serialization; `kind` selects which fields are set:
/// - `connection`       : `connected`
/// - `result`           : `color`, `number`, `timestamp_ms`, `round`
/// - `signal`           : signal fields, `max_attempts`, `attempt`
/// - `signal_suppressed`: `signal_id`, `color`, `reason`
/// - `attempt`          : `signal_id`, `attempt`, `max_attempts`
/// - `resolution`       : `signal_id`, `color`, `result`, `attempts_used`, `max_attempts`, `wins`, `losses`
/// - `reconciled`       : `signal_id`, `result`, `attempts_used`, `wins`, `losses`, `reason` ("loss->win")
/// - `searching`        : nothing
#[napi(object)]
#[derive(Debug, Clone, Default)]
pub struct SessionEvent {
    pub kind: String,
    pub timestamp_ms: i64,

    // ── Connectivity ──
    pub connected: Option<bool>,

    // ── Round ──
    pub round: Option<i64>,
    pub color: Option<String>,
    pub number: Option<i32>,

    // ── Signal ──
    pub signal_id: Option<String>,
    pub signal_type: Option<String>,
    pub origin: Option<String>,
    pub confidence: Option<f64>,
    pub description: Option<String>,
    pub pattern_key: Option<String>,
    pub numbers: Option<Vec<i32>>,
    pub probability: Option<String>,
    pub reasons: Option<Vec<String>>,
    pub protect_white: Option<bool>,
    pub after_number: Option<i32>,
    pub reason: Option<String>,

    // ── Attempt / resolution ──
    pub attempt: Option<i32>,
    pub max_attempts: Option<i32>,
    pub result: Option<String>,
    pub attempts_used: Option<i32>,
    pub wins: Option<i64>,
    pub losses: Option<i64>,
}

impl SessionEvent {
    pub fn new(kind: &str, timestamp_ms: i64) -> Self {
        Self {
            kind: kind.to_string(),
            timestamp_ms,
            ..Default::default()
        }
    }

    pub fn connection(connected: bool, timestamp_ms: i64) -> Self {
        Self {
            connected: Some(connected),
            ..Self::new("connection", timestamp_ms)
        }
    }

    pub fn result(outcome: &Outcome, round: u64) -> Self {
        Self {
            round: Some(round as i64),
            color: Some(outcome.color.as_str().to_string()),
            number: Some(outcome.number),
            ..Self::new("result", outcome.timestamp_ms)
        }
    }

    pub fn signal(signal: &Signal, timestamp_ms: i64) -> Self {
        Self {
            signal_id: Some(signal.id.clone()),
            signal_type: Some(signal.tier.as_str().to_string()),
            origin: Some(signal.origin.as_str().to_string()),
            color: Some(signal.expected_color.as_str().to_string()),
            confidence: Some(signal.confidence),
            description: Some(signal.description.clone()),
            pattern_key: Some(signal.pattern_key.clone()),
            numbers: Some(signal.numbers.clone()),
            probability: Some(signal.probability.clone()),
            reasons: Some(signal.reasons.clone()),
            protect_white: Some(signal.protect_white),
            after_number: signal.after_number,
            attempt: Some(1),
            max_attempts: Some(signal.max_attempts as i32),
            ..Self::new("signal", timestamp_ms)
        }
    }
}

/// Session status snapshot returned by `getSessionStatus()`.
#[napi(object)]
#[derive(Debug, Clone, Default)]
pub struct SessionStatus {
    pub running: bool,
    pub connected: bool,
    pub events_received: i64,
    pub malformed_events: i64,
    pub last_event_at_ms: Option<i64>,
    pub round: i64,

    // ── Recent results ──
    pub results_total: i32,
    pub red: i32,
    pub black: i32,
    pub white: i32,
    pub streak_color: Option<String>,
    pub streak_length: i32,

    // ── Accounting ──
    pub wins: i64,
    pub losses: i64,
    pub consecutive_losses: i32,
    pub last_win_at_ms: Option<i64>,
    pub last_loss_at_ms: Option<i64>,

    // ── Governor ──
    pub cooldown_remaining: i32,
    pub stop_mode: bool,
    pub stop_remaining: i32,
    pub alerts_in_window: i32,

    // ── Pending ──
    pub pending_signal_id: Option<String>,
    pub pending_attempt: Option<i32>,
    pub pending_max_attempts: Option<i32>,
    pub display_state: String,
}

// =============================================================================
// INTERNAL EVENTS (Rust-only, parser → session)
// =============================================================================

/// Suggested bet carried by a server signal.
#[derive(Debug, Clone)]
pub struct SuggestedBet {
    pub color: Color,
    pub numbers: Vec<i32>,
    pub protect_white: bool,
}

/// Server-detected signal, as parsed from a `signal` event.
#[derive(Debug, Clone)]
pub struct ServerSignal {
    pub id: Option<String>,
    pub signal_type: String,
    pub confidence: f64,
    pub description: String,
    pub pattern_key: String,
    pub suggested_bet: SuggestedBet,
    pub probability: String,
    pub reasons: Vec<String>,
    pub max_attempts: Option<u32>,
    pub after_number: Option<i32>,
}

/// Authoritative resolution pushed by the server (`bet_result`).
#[derive(Debug, Clone)]
pub struct BetResult {
    pub id: String,
    pub result: Resolution,
    pub attempts_used: u32,
    pub color: Option<Color>,
    pub resolved_at_ms: Option<i64>,
}

/// Parsed push-channel event, dispatched internally from parser → session.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Server connectivity to the game feed (`event: status`).
    Status { connected: bool },
    /// New game round (`event: double_result`).
    DoubleResult(Outcome),
    /// Server-detected signal (`event: signal`).
    Signal(ServerSignal),
    /// Authoritative resolution (`event: bet_result`).
    BetResult(BetResult),
    /// Heartbeat (`event: ping`).
    Ping,
}

// =============================================================================
// OUTBOUND PAYLOADS (Rust → server)
// =============================================================================

/// Locally detected resolution reported to the server for authoritative accounting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionReport {
    pub id: String,
    pub result: String,
    pub attempts_used: u32,
    pub color: String,
    pub resolved_at: i64,
}

// =============================================================================
// SERDE STRUCTS (for serde_json deserialization)
// =============================================================================

/// `{ "type": ..., "data": {...} }` wrapper the server puts around most payloads.
#[derive(Debug, Deserialize)]
pub(crate) struct RawEnvelope {
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawStatus {
    pub connected: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawDoubleResult {
    pub color: Option<String>,
    pub number: Option<serde_json::Value>,
    pub timestamp: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawSignal {
    pub id: Option<serde_json::Value>,
    #[serde(rename = "type")]
    pub signal_type: Option<String>,
    pub confidence: Option<f64>,
    pub description: Option<String>,
    pub pattern_key: Option<String>,
    pub suggested_bet: Option<RawSuggestedBet>,
    pub probability: Option<serde_json::Value>,
    pub calibrated_probability: Option<f64>,
    pub reasons: Option<Vec<String>>,
    pub max_attempts: Option<u32>,
    pub after_number: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawSuggestedBet {
    pub color: Option<String>,
    pub numbers: Option<Vec<i32>>,
    pub protect_white: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawBetResult {
    pub id: Option<serde_json::Value>,
    pub result: Option<String>,
    pub attempts_used: Option<u32>,
    pub color: Option<String>,
    pub resolved_at: Option<serde_json::Value>,
}
