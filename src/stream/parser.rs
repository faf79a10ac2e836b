//! Push-channel payload parser.
//!
//! Turns a decoded SSE frame (event name + JSON data) into a `StreamEvent`.
//! `double_result`, `signal` and `bet_result` arrive wrapped as
//! `{ "type": <name>, "data": {...} }`; bare payloads are accepted too.
//! Unknown event names are ignored, malformed payloads are errors.

use serde_json::Value;

use crate::types::event::{
    BetResult, RawBetResult, RawDoubleResult, RawEnvelope, RawSignal, RawStatus, ServerSignal,
    StreamEvent, SuggestedBet,
};
use crate::types::outcome::{Color, Outcome, Resolution};

// =============================================================================
// PUBLIC API
// =============================================================================

/// Parse one SSE frame. `Ok(None)` for event names this crate does not consume.
pub fn parse_sse_event(event: &str, data: &str) -> Result<Option<StreamEvent>, ProtocolError> {
    match event {
        "ping" => Ok(Some(StreamEvent::Ping)),
        "status" => parse_status(data).map(Some),
        "double_result" => {
            let raw: RawDoubleResult = decode_payload(event, data)?;
            convert_double_result(raw).map(|o| Some(StreamEvent::DoubleResult(o)))
        }
        "signal" => {
            let raw: RawSignal = decode_payload(event, data)?;
            convert_signal(raw).map(|s| Some(StreamEvent::Signal(s)))
        }
        "bet_result" => {
            let raw: RawBetResult = decode_payload(event, data)?;
            convert_bet_result(raw).map(|b| Some(StreamEvent::BetResult(b)))
        }
        _ => Ok(None),
    }
}

/// Parse the `GET /api/status` body (`{ ok, wsConnected }`).
pub fn parse_server_status(body: &[u8]) -> Result<bool, ProtocolError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;
    value
        .get("wsConnected")
        .and_then(Value::as_bool)
        .ok_or(ProtocolError::MissingField("wsConnected"))
}

// =============================================================================
// INTERNAL HELPERS
// =============================================================================

/// `status` carries `connected` at the top level.
fn parse_status(data: &str) -> Result<StreamEvent, ProtocolError> {
    let raw: RawStatus =
        serde_json::from_str(data).map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;
    let connected = raw.connected.ok_or(ProtocolError::MissingField("connected"))?;
    Ok(StreamEvent::Status { connected })
}

/// Unwrap the `{type, data}` envelope when present and deserialize the payload.
fn decode_payload<T: serde::de::DeserializeOwned>(
    event: &str,
    data: &str,
) -> Result<T, ProtocolError> {
    let value: Value =
        serde_json::from_str(data).map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;
    if !value.is_object() {
        return Err(ProtocolError::InvalidStructure(format!(
            "{} payload is not an object",
            event
        )));
    }

    let payload = if value.get("data").is_some() {
        let envelope: RawEnvelope = serde_json::from_value(value)
            .map_err(|e| ProtocolError::InvalidStructure(e.to_string()))?;
        if let Some(ref t) = envelope.event_type {
            if t != event {
                return Err(ProtocolError::InvalidStructure(format!(
                    "envelope type {} on {} event",
                    t, event
                )));
            }
        }
        envelope.data.unwrap_or(Value::Null)
    } else {
        value
    };

    serde_json::from_value(payload).map_err(|e| ProtocolError::InvalidStructure(e.to_string()))
}

fn convert_double_result(raw: RawDoubleResult) -> Result<Outcome, ProtocolError> {
    let color = parse_color(raw.color.as_deref(), "color")?;
    let number = raw
        .number
        .as_ref()
        .and_then(value_as_i64)
        .ok_or(ProtocolError::MissingField("number"))?;
    let timestamp = raw
        .timestamp
        .as_ref()
        .and_then(value_as_i64)
        .map(normalize_timestamp_ms)
        .unwrap_or(0);
    Ok(Outcome::new(color, number as i32, timestamp))
}

fn convert_signal(raw: RawSignal) -> Result<ServerSignal, ProtocolError> {
    let bet = raw
        .suggested_bet
        .ok_or(ProtocolError::MissingField("suggestedBet"))?;
    let color = parse_color(bet.color.as_deref(), "suggestedBet.color")?;

    let probability = match raw.probability {
        Some(Value::String(s)) if !s.is_empty() => s,
        Some(Value::Number(n)) => format!("{}%", n),
        _ => match raw.calibrated_probability {
            Some(p) if p.is_finite() => format!("{}%", (p * 100.0).round() as i64),
            _ => "~60%".to_string(),
        },
    };

    Ok(ServerSignal {
        id: raw.id.as_ref().and_then(value_as_id),
        signal_type: raw
            .signal_type
            .unwrap_or_else(|| "MEDIUM_SIGNAL".to_string()),
        confidence: raw.confidence.filter(|c| c.is_finite()).unwrap_or(7.0),
        description: raw
            .description
            .unwrap_or_else(|| "Pattern detected".to_string()),
        pattern_key: raw.pattern_key.unwrap_or_else(|| "unknown".to_string()),
        suggested_bet: SuggestedBet {
            color,
            numbers: bet.numbers.unwrap_or_default(),
            protect_white: bet.protect_white.unwrap_or(false),
        },
        probability,
        reasons: raw.reasons.unwrap_or_default(),
        max_attempts: raw.max_attempts,
        after_number: raw.after_number,
    })
}

fn convert_bet_result(raw: RawBetResult) -> Result<BetResult, ProtocolError> {
    let id = raw
        .id
        .as_ref()
        .and_then(value_as_id)
        .ok_or(ProtocolError::MissingField("id"))?;
    let result_str = raw.result.ok_or(ProtocolError::MissingField("result"))?;
    let result =
        Resolution::from_str(&result_str).ok_or(ProtocolError::UnknownResult(result_str))?;

    Ok(BetResult {
        id,
        result,
        attempts_used: raw.attempts_used.unwrap_or(0),
        color: raw.color.as_deref().and_then(Color::from_str),
        resolved_at_ms: raw
            .resolved_at
            .as_ref()
            .and_then(value_as_i64)
            .map(normalize_timestamp_ms),
    })
}

fn parse_color(value: Option<&str>, field: &'static str) -> Result<Color, ProtocolError> {
    let s = value.ok_or(ProtocolError::MissingField(field))?;
    Color::from_str(s).ok_or_else(|| ProtocolError::UnknownColor(s.to_string()))
}

/// Number or numeric string.
fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Correlation ids may be sent as strings or numbers.
fn value_as_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Seconds (< 1e12) → milliseconds.
fn normalize_timestamp_ms(ts: i64) -> i64 {
    if ts > 0 && ts < 1_000_000_000_000 {
        ts * 1000
    } else {
        ts
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    InvalidJson(String),
    InvalidStructure(String),
    UnknownColor(String),
    UnknownResult(String),
    MissingField(&'static str),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::InvalidJson(msg) => write!(f, "Invalid JSON: {}", msg),
            ProtocolError::InvalidStructure(msg) => write!(f, "Invalid structure: {}", msg),
            ProtocolError::UnknownColor(c) => write!(f, "Unknown color: {}", c),
            ProtocolError::UnknownResult(r) => write!(f, "Unknown result: {}", r),
            ProtocolError::MissingField(field) => write!(f, "Missing field: {}", field),
        }
    }
}

impl std::error::Error for ProtocolError {}

// =============================================================================
// TESTS
// =============================================================================
