//! Pending signal tracker.
//!
//! Holds at most one open signal and classifies it against each new outcome:
//! WIN when the expected color (or white, if protected) lands, LOSS once the
//! attempts run out. A classified entry leaves the active set in the same pass,
//! so it can never be evaluated twice.
//!
//! Also remembers the ids of signals that were emitted but never opened, so a
//! late authoritative resolution for one of them is ignored instead of being
//! attributed to whatever is open now.

use std::collections::{HashSet, VecDeque};

use crate::types::outcome::{Color, Outcome, Resolution};
use crate::types::signal::{Signal, SignalOrigin};

/// Suppressed ids remembered.
const SUPPRESSED_CAP: usize = 200;

/// Resolution progress of one open signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub signal_id: String,
    pub expected_color: Color,
    pub protect_white: bool,
    pub evaluated_rounds: u32,
    pub max_attempts: u32,
    pub resolved: bool,
    pub attempts_used: u32,
    pub origin: SignalOrigin,
}

impl PendingEntry {
    pub fn from_signal(signal: &Signal) -> Self {
        Self {
            signal_id: signal.id.clone(),
            expected_color: signal.expected_color,
            protect_white: signal.protect_white,
            evaluated_rounds: 0,
            max_attempts: signal.max_attempts,
            resolved: false,
            attempts_used: 0,
            origin: signal.origin,
        }
    }

    /// Consume one outcome. Returns the classification once terminal.
    pub fn evaluate(&mut self, outcome: &Outcome) -> Option<Resolution> {
        if self.resolved {
            return None;
        }
        self.evaluated_rounds += 1;

        let win = outcome.color == self.expected_color
            || (self.protect_white && outcome.color == Color::White);

        let resolution = if win {
            Resolution::Win
        } else if self.evaluated_rounds >= self.max_attempts {
            Resolution::Loss
        } else {
            return None;
        };

        self.resolved = true;
        self.attempts_used = self.evaluated_rounds;
        Some(resolution)
    }

    /// The attempt the next outcome will count as (1-based).
    pub fn next_attempt(&self) -> u32 {
        self.evaluated_rounds + 1
    }
}

/// A classification produced by the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedResolution {
    pub signal_id: String,
    pub expected_color: Color,
    pub resolution: Resolution,
    pub attempts_used: u32,
    pub max_attempts: u32,
    pub origin: SignalOrigin,
}

/// What an outcome did to the open entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluationOutcome {
    /// Nothing was open.
    Idle,
    /// Still open; `next_attempt` of `max_attempts` comes next.
    Pending {
        signal_id: String,
        next_attempt: u32,
        max_attempts: u32,
    },
    Resolved(TrackedResolution),
}

/// Result of applying an authoritative resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalResolution {
    /// The id belonged to a suppressed signal; ignored.
    Suppressed,
    /// Closed the open entry.
    Closed(TrackedResolution),
    /// The id is not open (already resolved locally, or never seen).
    NotOpen,
}

#[derive(Debug, Default)]
pub struct PendingTracker {
    active: Vec<PendingEntry>,
    suppressed: HashSet<String>,
    suppressed_order: VecDeque<String>,
}

impl PendingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_pending(&self) -> bool {
        !self.active.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.active.len()
    }

    pub fn current(&self) -> Option<&PendingEntry> {
        self.active.last()
    }

    pub fn is_open(&self, signal_id: &str) -> bool {
        self.active.iter().any(|p| p.signal_id == signal_id)
    }

    /// `(attempt, max_attempts)` for the "Attempt X/N" indicator.
    pub fn progress(&self) -> Option<(u32, u32)> {
        self.current().map(|p| (p.next_attempt(), p.max_attempts))
    }

    /// Open an entry for an admitted signal.
    ///
    /// Refused while another entry is pending: at most one signal is active.
    pub fn open(&mut self, signal: &Signal) -> bool {
        if self.has_pending() {
            tracing::debug!(
                signal_id = %signal.id,
                pending = self.active.len(),
                "Tracker busy, signal not opened"
            );
            return false;
        }
        self.active.push(PendingEntry::from_signal(signal));
        true
    }

    /// Evaluate every open entry against `outcome`, dropping classified ones.
    pub fn evaluate(&mut self, outcome: &Outcome) -> EvaluationOutcome {
        if self.active.is_empty() {
            return EvaluationOutcome::Idle;
        }

        let mut resolved = None;
        for entry in self.active.iter_mut() {
            if let Some(resolution) = entry.evaluate(outcome) {
                resolved = Some(TrackedResolution {
                    signal_id: entry.signal_id.clone(),
                    expected_color: entry.expected_color,
                    resolution,
                    attempts_used: entry.attempts_used,
                    max_attempts: entry.max_attempts,
                    origin: entry.origin,
                });
            }
        }
        self.active.retain(|p| !p.resolved);

        match resolved {
            Some(r) => EvaluationOutcome::Resolved(r),
            None => match self.current() {
                Some(p) => EvaluationOutcome::Pending {
                    signal_id: p.signal_id.clone(),
                    next_attempt: p.next_attempt(),
                    max_attempts: p.max_attempts,
                },
                None => EvaluationOutcome::Idle,
            },
        }
    }

    /// Apply an authoritative resolution for `signal_id`.
    pub fn resolve_external(
        &mut self,
        signal_id: &str,
        resolution: Resolution,
        attempts_used: u32,
    ) -> ExternalResolution {
        if self.suppressed.remove(signal_id) {
            self.suppressed_order.retain(|id| id != signal_id);
            return ExternalResolution::Suppressed;
        }

        let idx = match self.active.iter().position(|p| p.signal_id == signal_id) {
            Some(i) => i,
            None => return ExternalResolution::NotOpen,
        };

        let entry = self.active.remove(idx);
        let attempts_used = if attempts_used > 0 {
            attempts_used.min(entry.max_attempts)
        } else {
            entry.evaluated_rounds.max(1)
        };
        ExternalResolution::Closed(TrackedResolution {
            signal_id: entry.signal_id,
            expected_color: entry.expected_color,
            resolution,
            attempts_used,
            max_attempts: entry.max_attempts,
            origin: entry.origin,
        })
    }

    /// Remember a signal id that was emitted but not opened.
    ///
    /// An id that is currently open is never marked, so its own
    /// authoritative result still closes it.
    pub fn mark_suppressed(&mut self, signal_id: &str) {
        if signal_id.is_empty() || self.is_open(signal_id) {
            return;
        }
        if !self.suppressed.insert(signal_id.to_string()) {
            return;
        }
        self.suppressed_order.push_back(signal_id.to_string());
        while self.suppressed_order.len() > SUPPRESSED_CAP {
            if let Some(old) = self.suppressed_order.pop_front() {
                self.suppressed.remove(&old);
            }
        }
    }

    #[cfg(test)]
    pub fn is_suppressed(&self, signal_id: &str) -> bool {
        self.suppressed.contains(signal_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::signal::SignalTier;

    fn signal(id: &str, color: Color, max_attempts: u32, protect_white: bool) -> Signal {
        Signal {
            id: id.to_string(),
            expected_color: color,
            max_attempts,
            protect_white,
            tier: SignalTier::Medium,
            confidence: 7.0,
            description: String::new(),
            pattern_key: "test".to_string(),
            numbers: color.numbers(),
            probability: "~60%".to_string(),
            reasons: vec![],
            after_number: None,
            origin: SignalOrigin::Local,
        }
    }

    fn outcome(color: Color) -> Outcome {
        Outcome::new(color, 0, 0)
    }

    #[test]
    fn test_win_on_first_attempt() {
        let mut tracker = PendingTracker::new();
        assert!(tracker.open(&signal("s1", Color::Black, 3, true)));

        match tracker.evaluate(&outcome(Color::Black)) {
            EvaluationOutcome::Resolved(r) => {
                assert_eq!(r.resolution, Resolution::Win);
                assert_eq!(r.attempts_used, 1);
            }
            other => panic!("expected resolution, got {:?}", other),
        }
        assert!(!tracker.has_pending());
    }

    #[test]
    fn test_protect_white_wins_on_round_one() {
        let mut tracker = PendingTracker::new();
        tracker.open(&signal("s1", Color::Black, 3, true));

        let first = tracker.evaluate(&outcome(Color::White));
        assert_eq!(
            first,
            EvaluationOutcome::Resolved(TrackedResolution {
                signal_id: "s1".to_string(),
                expected_color: Color::Black,
                resolution: Resolution::Win,
                attempts_used: 1,
                max_attempts: 3,
                origin: SignalOrigin::Local,
            })
        );

        // Remaining outcomes of the sequence find nothing open.
        assert_eq!(tracker.evaluate(&outcome(Color::White)), EvaluationOutcome::Idle);
        assert_eq!(tracker.evaluate(&outcome(Color::Red)), EvaluationOutcome::Idle);
    }

    #[test]
    fn test_white_without_protection_counts_as_miss() {
        let mut tracker = PendingTracker::new();
        tracker.open(&signal("s1", Color::Red, 2, false));

        assert_eq!(
            tracker.evaluate(&outcome(Color::White)),
            EvaluationOutcome::Pending {
                signal_id: "s1".to_string(),
                next_attempt: 2,
                max_attempts: 2,
            }
        );
        match tracker.evaluate(&outcome(Color::White)) {
            EvaluationOutcome::Resolved(r) => {
                assert_eq!(r.resolution, Resolution::Loss);
                assert_eq!(r.attempts_used, 2);
            }
            other => panic!("expected loss, got {:?}", other),
        }
    }

    #[test]
    fn test_loss_after_max_attempts() {
        let mut tracker = PendingTracker::new();
        tracker.open(&signal("s1", Color::Red, 3, true));

        assert!(matches!(
            tracker.evaluate(&outcome(Color::Black)),
            EvaluationOutcome::Pending { next_attempt: 2, .. }
        ));
        assert_eq!(tracker.progress(), Some((2, 3)));
        assert!(matches!(
            tracker.evaluate(&outcome(Color::Black)),
            EvaluationOutcome::Pending { next_attempt: 3, .. }
        ));
        match tracker.evaluate(&outcome(Color::Black)) {
            EvaluationOutcome::Resolved(r) => {
                assert_eq!(r.resolution, Resolution::Loss);
                assert_eq!(r.attempts_used, 3);
            }
            other => panic!("expected loss, got {:?}", other),
        }
        assert!(tracker.progress().is_none());
    }

    #[test]
    fn test_only_one_entry_open() {
        let mut tracker = PendingTracker::new();
        assert!(tracker.open(&signal("s1", Color::Red, 3, true)));
        assert!(!tracker.open(&signal("s2", Color::Black, 3, true)));
        assert_eq!(tracker.pending_count(), 1);
        assert!(tracker.is_open("s1"));
        assert!(!tracker.is_open("s2"));
    }

    #[test]
    fn test_resolved_entry_is_never_reevaluated() {
        let mut entry = PendingEntry::from_signal(&signal("s1", Color::Red, 3, false));
        assert_eq!(entry.evaluate(&outcome(Color::Red)), Some(Resolution::Win));
        assert_eq!(entry.evaluate(&outcome(Color::Black)), None);
        assert_eq!(entry.evaluated_rounds, 1);
    }

    #[test]
    fn test_external_resolution_closes_open_entry() {
        let mut tracker = PendingTracker::new();
        tracker.open(&signal("srv-1", Color::Red, 3, true));
        tracker.evaluate(&outcome(Color::Black));

        match tracker.resolve_external("srv-1", Resolution::Loss, 0) {
            ExternalResolution::Closed(r) => {
                assert_eq!(r.resolution, Resolution::Loss);
                assert_eq!(r.attempts_used, 1);
            }
            other => panic!("expected closed, got {:?}", other),
        }
        assert!(!tracker.has_pending());
        assert_eq!(
            tracker.resolve_external("srv-1", Resolution::Loss, 2),
            ExternalResolution::NotOpen
        );
    }

    #[test]
    fn test_external_resolution_clamps_attempts() {
        let mut tracker = PendingTracker::new();
        tracker.open(&signal("srv-1", Color::Red, 2, true));
        match tracker.resolve_external("srv-1", Resolution::Loss, 9) {
            ExternalResolution::Closed(r) => assert_eq!(r.attempts_used, 2),
            other => panic!("expected closed, got {:?}", other),
        }
    }

    #[test]
    fn test_suppressed_resolution_is_ignored_once() {
        let mut tracker = PendingTracker::new();
        tracker.mark_suppressed("srv-9");
        tracker.open(&signal("srv-10", Color::Red, 3, true));

        assert_eq!(
            tracker.resolve_external("srv-9", Resolution::Win, 1),
            ExternalResolution::Suppressed
        );
        // The open signal is untouched.
        assert!(tracker.is_open("srv-10"));
        assert!(!tracker.is_suppressed("srv-9"));
        assert_eq!(
            tracker.resolve_external("srv-9", Resolution::Win, 1),
            ExternalResolution::NotOpen
        );
    }

    #[test]
    fn test_open_id_is_never_marked_suppressed() {
        let mut tracker = PendingTracker::new();
        tracker.open(&signal("srv-1", Color::Red, 3, true));
        tracker.mark_suppressed("srv-1");
        assert!(!tracker.is_suppressed("srv-1"));
        assert!(matches!(
            tracker.resolve_external("srv-1", Resolution::Loss, 3),
            ExternalResolution::Closed(_)
        ));
    }

    #[test]
    fn test_suppressed_ids_are_bounded() {
        let mut tracker = PendingTracker::new();
        for i in 0..250 {
            tracker.mark_suppressed(&format!("id-{}", i));
        }
        assert!(!tracker.is_suppressed("id-0"));
        assert!(!tracker.is_suppressed("id-49"));
        assert!(tracker.is_suppressed("id-50"));
        assert!(tracker.is_suppressed("id-249"));
    }
}
