//! Alert cooldown governor.
//!
//! Gates whether a detected pattern may become a user-visible alert:
//! - a decaying cooldown counter set after every alert and every loss
//! - a hard stop after consecutive losses, which overrides the counter
//! - a sliding window capping alerts per N rounds
//!
//! Every operation is total. Parameters come from a validated `CooldownProfile`.

use std::collections::VecDeque;

use crate::types::config::CooldownProfile;

/// Alerts kept for the window count.
const ALERT_HISTORY_CAP: usize = 100;

/// Consecutive losses that trigger stop mode.
const LOSSES_BEFORE_STOP: u32 = 3;

/// Governor state captured by the latest `record_outcome`, kept so a
/// server override can replay that outcome the other way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LastOutcome {
    won: bool,
    losses_before: u32,
    armed_stop: bool,
}

/// One admitted alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertRecord {
    pub timestamp_ms: i64,
    pub round: u64,
}

/// Why `admission()` refused a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    StopMode { remaining: u32 },
    Cooldown { remaining: u32 },
    WindowLimit { count: u32, max: u32 },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed)
    }

    /// Short machine-readable reason forwarded to the host.
    pub fn reason(&self) -> &'static str {
        match self {
            Admission::Allowed => "allowed",
            Admission::StopMode { .. } => "stop_mode",
            Admission::Cooldown { .. } => "cooldown",
            Admission::WindowLimit { .. } => "window_limit",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CooldownGovernor {
    profile: CooldownProfile,
    cooldown_counter: u32,
    consecutive_losses: u32,
    stop_mode: bool,
    stop_counter: u32,
    alert_history: VecDeque<AlertRecord>,
    last_outcome: Option<LastOutcome>,
}

impl CooldownGovernor {
    pub fn new(profile: CooldownProfile) -> Self {
        Self {
            profile,
            cooldown_counter: 0,
            consecutive_losses: 0,
            stop_mode: false,
            stop_counter: 0,
            alert_history: VecDeque::with_capacity(ALERT_HISTORY_CAP),
            last_outcome: None,
        }
    }

    /// Decay once per received round.
    ///
    /// While in stop mode only the stop counter moves; the round that ends the
    /// stop does not also decay the cooldown.
    pub fn tick(&mut self) {
        if self.stop_mode {
            self.stop_counter = self.stop_counter.saturating_sub(1);
            if self.stop_counter == 0 {
                self.stop_mode = false;
                self.consecutive_losses = 0;
                tracing::info!("Cooldown: stop finished, detection resumed");
            }
            return;
        }

        if self.cooldown_counter > 0 {
            self.cooldown_counter -= 1;
        }
    }

    /// Record an admitted alert and arm the basic cooldown.
    pub fn record_alert(&mut self, round: u64, timestamp_ms: i64) {
        self.alert_history.push_back(AlertRecord {
            timestamp_ms,
            round,
        });
        while self.alert_history.len() > ALERT_HISTORY_CAP {
            self.alert_history.pop_front();
        }
        self.cooldown_counter = self.profile.basic_rounds;
    }

    /// Feed back the classification of a resolved signal.
    pub fn record_outcome(&mut self, won: bool) {
        let losses_before = self.consecutive_losses;
        let was_stopped = self.stop_mode;
        self.apply_outcome(won);
        self.last_outcome = Some(LastOutcome {
            won,
            losses_before,
            armed_stop: !was_stopped && self.stop_mode,
        });
    }

    /// Re-classify the most recent outcome after an authoritative override.
    ///
    /// Returns false when there is nothing to correct. A loss turned into a
    /// win lifts the stop that loss armed; a win turned into a loss counts
    /// toward the streak it had reset.
    pub fn correct_last_outcome(&mut self, won: bool) -> bool {
        let last = match self.last_outcome {
            Some(last) if last.won != won => last,
            _ => return false,
        };

        if last.armed_stop && self.stop_mode {
            self.stop_mode = false;
            self.stop_counter = 0;
        }
        let was_stopped = self.stop_mode;
        self.consecutive_losses = last.losses_before;
        self.apply_outcome(won);
        self.last_outcome = Some(LastOutcome {
            won,
            losses_before: last.losses_before,
            armed_stop: !was_stopped && self.stop_mode,
        });

        tracing::info!(
            won,
            losses = self.consecutive_losses,
            stop_mode = self.stop_mode,
            "Cooldown: last outcome corrected"
        );
        true
    }

    fn apply_outcome(&mut self, won: bool) {
        if won {
            self.cooldown_counter = std::cmp::max(
                self.profile.min_after_win_rounds,
                self.cooldown_counter / 2,
            );
            self.consecutive_losses = 0;
            return;
        }

        self.consecutive_losses += 1;
        self.cooldown_counter = self.profile.after_loss_rounds;

        if self.consecutive_losses >= LOSSES_BEFORE_STOP {
            self.stop_mode = true;
            self.stop_counter = self.profile.stop_rounds;
            self.cooldown_counter = 0;
            tracing::info!(
                losses = self.consecutive_losses,
                stop_rounds = self.stop_counter,
                "Cooldown: stop activated after consecutive losses"
            );
        }
    }

    /// Detailed admission check for `current_round`.
    pub fn admission(&self, current_round: u64) -> Admission {
        if self.stop_mode {
            return Admission::StopMode {
                remaining: self.stop_counter,
            };
        }
        if self.cooldown_counter > 0 {
            return Admission::Cooldown {
                remaining: self.cooldown_counter,
            };
        }
        let count = self.alerts_in_window(current_round);
        if count >= self.profile.max_alerts_per_window {
            return Admission::WindowLimit {
                count,
                max: self.profile.max_alerts_per_window,
            };
        }
        Admission::Allowed
    }

    pub fn can_emit(&self, current_round: u64) -> bool {
        self.admission(current_round).is_allowed()
    }

    /// Alerts whose round lies within the last `window_rounds` rounds.
    pub fn alerts_in_window(&self, current_round: u64) -> u32 {
        let min_round = (current_round + 1).saturating_sub(self.profile.window_rounds as u64);
        self.alert_history
            .iter()
            .filter(|a| a.round >= min_round)
            .count() as u32
    }

    pub fn cooldown_remaining(&self) -> u32 {
        self.cooldown_counter
    }

    pub fn consecutive_losses(&self) -> u32 {
        self.consecutive_losses
    }

    pub fn is_stopped(&self) -> bool {
        self.stop_mode
    }

    pub fn stop_remaining(&self) -> u32 {
        self.stop_counter
    }

    #[cfg(test)]
    pub fn alert_history(&self) -> &VecDeque<AlertRecord> {
        &self.alert_history
    }
}
