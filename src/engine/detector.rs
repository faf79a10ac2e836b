//! Local pattern detector: proposes a signal from the recent history.
//!
//! Patterns, checked in order:
//! - `triple_repeat`: three newest share one non-white color → bet the opposite
//! - `streak_break`: newest streak of 4+ of one non-white color → bet the opposite.
//!   Shadowed: any such streak already matches `triple_repeat`.
//! - `red_black_balance`: |red − black| >= 4 among the newest 10 → bet the minority

use crate::engine::history::RecentResults;
use crate::types::outcome::Color;
use crate::types::signal::{Signal, SignalOrigin, SignalTier};

const MIN_RESULTS: usize = 3;
const STREAK_MIN_LEN: usize = 4;
const BALANCE_WINDOW: usize = 10;
const BALANCE_MIN_DIFF: usize = 4;

/// A detected pattern, before it gets a correlation id.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub pattern_key: &'static str,
    pub tier: SignalTier,
    pub confidence: f64,
    pub color: Color,
    pub description: String,
    pub probability: &'static str,
    pub reasons: Vec<String>,
    pub after_number: Option<i32>,
}

impl Detection {
    /// Local signals always protect white.
    pub fn into_signal(self, id: String, max_attempts: u32) -> Signal {
        Signal {
            id,
            expected_color: self.color,
            max_attempts,
            protect_white: true,
            tier: self.tier,
            confidence: self.confidence,
            description: self.description,
            pattern_key: self.pattern_key.to_string(),
            numbers: self.color.numbers(),
            probability: self.probability.to_string(),
            reasons: self.reasons,
            after_number: self.after_number,
            origin: SignalOrigin::Local,
        }
    }
}

pub fn detect(history: &RecentResults) -> Option<Detection> {
    if history.len() < MIN_RESULTS {
        return None;
    }
    let after_number = history.latest().map(|o| o.number);

    let newest = history.newest_colors(MIN_RESULTS);
    if newest[0] == newest[1] && newest[1] == newest[2] {
        if let Some(opposite) = newest[0].opposite() {
            return Some(Detection {
                pattern_key: "triple_repeat",
                tier: SignalTier::Medium,
                confidence: 7.5,
                color: opposite,
                description: "Triple repeat detected, bet the opposite color".to_string(),
                probability: "~65%",
                reasons: vec![
                    "Three of the same color in a row".to_string(),
                    "Reversal tendency".to_string(),
                ],
                after_number,
            });
        }
    }

    if let Some(streak) = history.streak() {
        if streak.length >= STREAK_MIN_LEN {
            if let Some(opposite) = streak.color.opposite() {
                return Some(Detection {
                    pattern_key: "streak_break",
                    tier: SignalTier::Strong,
                    confidence: 8.0,
                    color: opposite,
                    description: format!(
                        "Streak of {} {}, break likely",
                        streak.length, streak.color
                    ),
                    probability: "~70%",
                    reasons: vec![
                        format!("Long streak of {}", streak.length),
                        "Reversal tendency after streak".to_string(),
                    ],
                    after_number,
                });
            }
        }
    }

    let window = history.newest_colors(BALANCE_WINDOW);
    let red = window.iter().filter(|c| **c == Color::Red).count();
    let black = window.iter().filter(|c| **c == Color::Black).count();
    if red.abs_diff(black) >= BALANCE_MIN_DIFF {
        let dominant = if red > black { Color::Red } else { Color::Black };
        if let Some(opposite) = dominant.opposite() {
            return Some(Detection {
                pattern_key: "red_black_balance",
                tier: SignalTier::Medium,
                confidence: 7.0,
                color: opposite,
                description: format!("Imbalance detected, {} dominating", dominant),
                probability: "~60%",
                reasons: vec![
                    format!("Imbalance in the last {}", window.len()),
                    "Correction tendency".to_string(),
                ],
                after_number,
            });
        }
    }

    None
}
