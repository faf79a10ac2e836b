//! Signal: a proposed bet suggestion derived from a detected pattern.
//!
//! Signals come from two places: the local detector running over the recent
//! history, and the server's `signal` event. Both carry one correlation id that
//! is used end to end (tracker, ledger, resolution report, `bet_result`).

use rand::Rng;

use crate::types::outcome::Color;

/// Display tier, as sent by the server (`type` field).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalTier {
    Strong,
    Medium,
    Weak,
}

impl SignalTier {
    pub fn from_str(s: &str) -> Self {
        match s {
            "STRONG_SIGNAL" => SignalTier::Strong,
            "WEAK_SIGNAL" => SignalTier::Weak,
            _ => SignalTier::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalTier::Strong => "STRONG_SIGNAL",
            SignalTier::Medium => "MEDIUM_SIGNAL",
            SignalTier::Weak => "WEAK_SIGNAL",
        }
    }
}

/// Where a signal was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOrigin {
    Local,
    Server,
}

impl SignalOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalOrigin::Local => "local",
            SignalOrigin::Server => "server",
        }
    }
}

/// A bet suggestion. `max_attempts` is 2 or 3.
#[derive(Debug, Clone)]
pub struct Signal {
    pub id: String,
    pub expected_color: Color,
    pub max_attempts: u32,
    pub protect_white: bool,

    // ── Display metadata ──
    pub tier: SignalTier,
    pub confidence: f64,
    pub description: String,
    pub pattern_key: String,
    pub numbers: Vec<i32>,
    pub probability: String,
    pub reasons: Vec<String>,
    pub after_number: Option<i32>,
    pub origin: SignalOrigin,
}

/// Generate a correlation id for a locally detected signal.
///
/// Format: `local-<ms>-<6 base36 chars>`.
pub fn generate_signal_id(now_ms: i64) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("local-{}-{}", now_ms, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_parsing_defaults_to_medium() {
        assert_eq!(SignalTier::from_str("STRONG_SIGNAL"), SignalTier::Strong);
        assert_eq!(SignalTier::from_str("WEAK_SIGNAL"), SignalTier::Weak);
        assert_eq!(SignalTier::from_str("whatever"), SignalTier::Medium);
    }

    #[test]
    fn test_generated_ids_are_distinct() {
        let a = generate_signal_id(1_700_000_000_000);
        let b = generate_signal_id(1_700_000_000_000);
        assert!(a.starts_with("local-1700000000000-"));
        assert_eq!(a.len(), "local-1700000000000-".len() + 6);
        assert_ne!(a, b);
    }
}
