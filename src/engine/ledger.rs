//! Win/loss ledger with idempotent, reconciling resolution accounting.
//!
//! A signal can be classified twice: speculatively by the local tracker and
//! authoritatively by the server's `bet_result`. Both carry the same
//! correlation id. The ledger counts an id once; when the server disagrees with
//! a local classification still inside the dedup window, the totals move to the
//! server's classification instead of counting a second time.

use std::collections::{HashMap, VecDeque};

use crate::types::outcome::{Color, Resolution};

/// Counted ids remembered for idempotence.
const COUNTED_IDS_CAP: usize = 1_000;

/// Outcome history length (consecutive-loss streak).
const OUTCOME_HISTORY_CAP: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    /// Local tracker evaluation (speculative).
    Local,
    /// Server `bet_result` (authoritative).
    Server,
}

/// Short-lived record used for reconciliation inside the dedup window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionRecord {
    pub id: String,
    pub color: Option<Color>,
    pub outcome: Resolution,
    pub source: ResolutionSource,
    pub timestamp_ms: i64,
}

/// Effect of `record()` on the totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerUpdate {
    /// First resolution for this id; totals incremented.
    Counted,
    /// Server agreed with an earlier local classification.
    Confirmed,
    /// Server overrode an earlier local classification; totals moved.
    Reconciled { from: Resolution, to: Resolution },
    /// Already counted; totals unchanged.
    Duplicate,
}

#[derive(Debug, Clone, Copy)]
struct CountedEntry {
    outcome: Resolution,
    source: ResolutionSource,
}

#[derive(Debug, Clone)]
struct OutcomeEntry {
    id: String,
    outcome: Resolution,
}

#[derive(Debug)]
pub struct ResolutionLedger {
    dedup_window_ms: i64,
    wins: u64,
    losses: u64,
    last_win_at_ms: Option<i64>,
    last_loss_at_ms: Option<i64>,
    counted: HashMap<String, CountedEntry>,
    counted_order: VecDeque<String>,
    recent: VecDeque<ResolutionRecord>,
    /// Newest first.
    history: VecDeque<OutcomeEntry>,
}

impl ResolutionLedger {
    pub fn new(dedup_window_ms: i64) -> Self {
        Self {
            dedup_window_ms,
            wins: 0,
            losses: 0,
            last_win_at_ms: None,
            last_loss_at_ms: None,
            counted: HashMap::new(),
            counted_order: VecDeque::new(),
            recent: VecDeque::new(),
            history: VecDeque::with_capacity(OUTCOME_HISTORY_CAP),
        }
    }

    /// Record a resolution for `id` observed at `now_ms`.
    pub fn record(
        &mut self,
        id: &str,
        outcome: Resolution,
        color: Option<Color>,
        source: ResolutionSource,
        resolved_at_ms: i64,
        now_ms: i64,
    ) -> LedgerUpdate {
        self.prune(now_ms);

        let previous = self.counted.get(id).copied();
        let update = match previous {
            None => {
                self.increment(outcome, resolved_at_ms);
                self.remember_counted(id, outcome, source);
                self.push_history(id, outcome);
                LedgerUpdate::Counted
            }
            Some(prev) if prev.source == ResolutionSource::Local && source == ResolutionSource::Server => {
                if prev.outcome == outcome {
                    self.counted.insert(id.to_string(), CountedEntry { outcome, source });
                    LedgerUpdate::Confirmed
                } else if self.recent.iter().any(|r| r.id == id) {
                    self.decrement(prev.outcome);
                    self.increment(outcome, resolved_at_ms);
                    self.counted.insert(id.to_string(), CountedEntry { outcome, source });
                    if let Some(entry) = self.history.iter_mut().find(|e| e.id == id) {
                        entry.outcome = outcome;
                    }
                    LedgerUpdate::Reconciled {
                        from: prev.outcome,
                        to: outcome,
                    }
                } else {
                    tracing::debug!(
                        signal_id = %id,
                        local = prev.outcome.as_str(),
                        server = outcome.as_str(),
                        "Server correction arrived after dedup window, ignored"
                    );
                    LedgerUpdate::Duplicate
                }
            }
            Some(_) => {
                tracing::debug!(signal_id = %id, "Resolution already counted, skipping");
                LedgerUpdate::Duplicate
            }
        };

        if update != LedgerUpdate::Duplicate {
            self.recent.push_back(ResolutionRecord {
                id: id.to_string(),
                color,
                outcome,
                source,
                timestamp_ms: now_ms,
            });
        }
        update
    }

    pub fn is_counted(&self, id: &str) -> bool {
        self.counted.contains_key(id)
    }

    pub fn wins(&self) -> u64 {
        self.wins
    }

    pub fn losses(&self) -> u64 {
        self.losses
    }

    pub fn last_win_at_ms(&self) -> Option<i64> {
        self.last_win_at_ms
    }

    pub fn last_loss_at_ms(&self) -> Option<i64> {
        self.last_loss_at_ms
    }

    /// Losses since the most recent win.
    pub fn consecutive_losses(&self) -> u32 {
        self.history
            .iter()
            .take_while(|e| e.outcome == Resolution::Loss)
            .count() as u32
    }

    /// Records still inside the dedup window.
    #[cfg(test)]
    pub fn recent(&self) -> impl Iterator<Item = &ResolutionRecord> {
        self.recent.iter()
    }

    fn prune(&mut self, now_ms: i64) {
        let window = self.dedup_window_ms;
        self.recent.retain(|r| now_ms - r.timestamp_ms <= window);
    }

    fn increment(&mut self, outcome: Resolution, at_ms: i64) {
        match outcome {
            Resolution::Win => {
                self.wins += 1;
                self.last_win_at_ms = Some(at_ms);
            }
            Resolution::Loss => {
                self.losses += 1;
                self.last_loss_at_ms = Some(at_ms);
            }
        }
    }

    fn decrement(&mut self, outcome: Resolution) {
        match outcome {
            Resolution::Win => self.wins = self.wins.saturating_sub(1),
            Resolution::Loss => self.losses = self.losses.saturating_sub(1),
        }
    }

    fn remember_counted(&mut self, id: &str, outcome: Resolution, source: ResolutionSource) {
        self.counted
            .insert(id.to_string(), CountedEntry { outcome, source });
        self.counted_order.push_back(id.to_string());
        while self.counted_order.len() > COUNTED_IDS_CAP {
            if let Some(old) = self.counted_order.pop_front() {
                self.counted.remove(&old);
            }
        }
    }

    fn push_history(&mut self, id: &str, outcome: Resolution) {
        self.history.push_front(OutcomeEntry {
            id: id.to_string(),
            outcome,
        });
        self.history.truncate(OUTCOME_HISTORY_CAP);
    }
}
