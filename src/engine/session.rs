//! Session controller: the signal lifecycle state machine.
//!
//! Owns all per-session state (recent results, round index, cooldown governor,
//! pending tracker, resolution ledger, display state) and is driven by a single
//! dispatcher task. Inputs are parsed stream events and display timeouts;
//! outputs are `SessionAction`s the runtime executes. No I/O happens here.
//!
//! Per round:
//!   round += 1 → governor tick → push history → evaluate pending
//!   → (nothing pending) detect → admission → open or suppress
//!
//! Display:
//!   Searching ──signal──▶ Active ──resolution──▶ ResolvedDisplay ──timeout──▶ Searching
//!   A new admitted signal preempts ResolvedDisplay; the stale timeout is ignored.

use tracing::{debug, info, warn};

use crate::engine::cooldown::CooldownGovernor;
use crate::engine::detector::detect;
use crate::engine::history::RecentResults;
use crate::engine::ledger::{LedgerUpdate, ResolutionLedger, ResolutionSource};
use crate::engine::tracker::{EvaluationOutcome, ExternalResolution, PendingTracker, TrackedResolution};
use crate::types::config::SessionSettings;
use crate::types::event::{
    BetResult, ResolutionReport, ServerSignal, SessionEvent, SessionStatus, StreamEvent,
};
use crate::types::outcome::{Outcome, Resolution};
use crate::types::signal::{generate_signal_id, Signal, SignalOrigin, SignalTier};

// =============================================================================
// DISPLAY STATE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayState {
    Searching,
    Active { signal_id: String },
    ResolvedDisplay { signal_id: String, resolution: Resolution },
}

impl DisplayState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayState::Searching => "searching",
            DisplayState::Active { .. } => "active",
            DisplayState::ResolvedDisplay { .. } => "resolved",
        }
    }
}

// =============================================================================
// ACTIONS (session → runtime)
// =============================================================================

#[derive(Debug, Clone)]
pub enum SessionAction {
    /// Push an event to the host callback.
    Emit(SessionEvent),
    /// POST a locally detected resolution (fire-and-forget).
    Report(ResolutionReport),
    /// Call `handle_display_timeout(signal_id)` after `delay_ms`.
    ScheduleDisplayTimeout { signal_id: String, delay_ms: u64 },
}

// =============================================================================
// SESSION
// =============================================================================

pub struct Session {
    settings: SessionSettings,
    history: RecentResults,
    round: u64,
    governor: CooldownGovernor,
    tracker: PendingTracker,
    ledger: ResolutionLedger,
    display: DisplayState,
    connected: bool,
    events_received: u64,
    malformed_events: u64,
    last_event_at_ms: Option<i64>,
}

impl Session {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            history: RecentResults::new(settings.history_capacity),
            round: 0,
            governor: CooldownGovernor::new(settings.cooldown),
            tracker: PendingTracker::new(),
            ledger: ResolutionLedger::new(settings.dedup_window_ms),
            display: DisplayState::Searching,
            connected: false,
            events_received: 0,
            malformed_events: 0,
            last_event_at_ms: None,
            settings,
        }
    }

    /// Apply one parsed stream event.
    pub fn handle_event(&mut self, event: StreamEvent, now_ms: i64) -> Vec<SessionAction> {
        self.events_received += 1;
        self.last_event_at_ms = Some(now_ms);

        let mut actions = Vec::new();
        match event {
            StreamEvent::Status { connected } => {
                self.update_connected(connected, now_ms, &mut actions)
            }
            StreamEvent::DoubleResult(outcome) => self.on_result(outcome, now_ms, &mut actions),
            StreamEvent::Signal(signal) => self.on_server_signal(signal, now_ms, &mut actions),
            StreamEvent::BetResult(bet) => self.on_bet_result(bet, now_ms, &mut actions),
            StreamEvent::Ping => {}
        }
        actions
    }

    /// Transport-level connectivity change (stream opened / dropped).
    pub fn set_connected(&mut self, connected: bool, now_ms: i64) -> Vec<SessionAction> {
        let mut actions = Vec::new();
        self.update_connected(connected, now_ms, &mut actions);
        actions
    }

    /// A payload that could not be parsed. Counted, never applied.
    pub fn record_malformed(&mut self) {
        self.malformed_events += 1;
    }

    /// Fired by the runtime timer armed through `ScheduleDisplayTimeout`.
    pub fn handle_display_timeout(&mut self, signal_id: &str, now_ms: i64) -> Vec<SessionAction> {
        let showing = matches!(
            &self.display,
            DisplayState::ResolvedDisplay { signal_id: shown, .. } if shown.as_str() == signal_id
        );
        if !showing {
            debug!(signal_id = %signal_id, state = self.display.as_str(), "Stale display timeout ignored");
            return Vec::new();
        }
        self.display = DisplayState::Searching;
        vec![SessionAction::Emit(SessionEvent::new("searching", now_ms))]
    }

    pub fn display(&self) -> &DisplayState {
        &self.display
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn wins(&self) -> u64 {
        self.ledger.wins()
    }

    pub fn losses(&self) -> u64 {
        self.ledger.losses()
    }

    pub fn pending_count(&self) -> usize {
        self.tracker.pending_count()
    }

    /// Snapshot for `getSessionStatus()`. `running` is filled by the runtime.
    pub fn status(&self) -> SessionStatus {
        let stats = self.history.stats();
        let current = self.tracker.current();
        SessionStatus {
            running: false,
            connected: self.connected,
            events_received: self.events_received as i64,
            malformed_events: self.malformed_events as i64,
            last_event_at_ms: self.last_event_at_ms,
            round: self.round as i64,

            results_total: stats.total as i32,
            red: stats.red as i32,
            black: stats.black as i32,
            white: stats.white as i32,
            streak_color: stats.streak.map(|s| s.color.as_str().to_string()),
            streak_length: stats.streak.map(|s| s.length as i32).unwrap_or(0),

            wins: self.ledger.wins() as i64,
            losses: self.ledger.losses() as i64,
            consecutive_losses: self.ledger.consecutive_losses() as i32,
            last_win_at_ms: self.ledger.last_win_at_ms(),
            last_loss_at_ms: self.ledger.last_loss_at_ms(),

            cooldown_remaining: self.governor.cooldown_remaining() as i32,
            stop_mode: self.governor.is_stopped(),
            stop_remaining: self.governor.stop_remaining() as i32,
            alerts_in_window: self.governor.alerts_in_window(self.round) as i32,

            pending_signal_id: current.map(|p| p.signal_id.clone()),
            pending_attempt: current.map(|p| p.next_attempt() as i32),
            pending_max_attempts: current.map(|p| p.max_attempts as i32),
            display_state: self.display.as_str().to_string(),
        }
    }

    // =========================================================================
    // ROUNDS
    // =========================================================================

    fn on_result(&mut self, outcome: Outcome, now_ms: i64, actions: &mut Vec<SessionAction>) {
        let outcome = if outcome.timestamp_ms > 0 {
            outcome
        } else {
            Outcome {
                timestamp_ms: now_ms,
                ..outcome
            }
        };

        self.round += 1;
        self.governor.tick();
        self.history.push(outcome);
        actions.push(SessionAction::Emit(SessionEvent::result(&outcome, self.round)));

        match self.tracker.evaluate(&outcome) {
            EvaluationOutcome::Resolved(resolution) => self.apply_resolution(
                resolution,
                ResolutionSource::Local,
                outcome.timestamp_ms,
                now_ms,
                actions,
            ),
            EvaluationOutcome::Pending {
                signal_id,
                next_attempt,
                max_attempts,
            } => {
                debug!(signal_id = %signal_id, attempt = next_attempt, max_attempts, "Signal still pending");
                actions.push(SessionAction::Emit(SessionEvent {
                    signal_id: Some(signal_id),
                    attempt: Some(next_attempt as i32),
                    max_attempts: Some(max_attempts as i32),
                    ..SessionEvent::new("attempt", now_ms)
                }));
            }
            EvaluationOutcome::Idle => {}
        }

        if self.settings.local_detection && !self.tracker.has_pending() {
            self.run_local_detection(now_ms, actions);
        }
    }

    fn run_local_detection(&mut self, now_ms: i64, actions: &mut Vec<SessionAction>) {
        let detection = match detect(&self.history) {
            Some(d) => d,
            None => return,
        };

        let admission = self.governor.admission(self.round);
        if !admission.is_allowed() {
            debug!(
                pattern = detection.pattern_key,
                round = self.round,
                reason = admission.reason(),
                "Local detection held back"
            );
            return;
        }

        let signal = detection.into_signal(
            generate_signal_id(now_ms),
            self.settings.default_max_attempts,
        );
        self.admit(signal, now_ms, actions);
    }

    // =========================================================================
    // SIGNALS
    // =========================================================================

    fn on_server_signal(&mut self, raw: ServerSignal, now_ms: i64, actions: &mut Vec<SessionAction>) {
        if let Some(ref id) = raw.id {
            if self.tracker.is_open(id) || self.ledger.is_counted(id) {
                debug!(signal_id = %id, "Duplicate server signal ignored");
                return;
            }
        }

        let signal = self.signal_from_server(raw, now_ms);

        if self.tracker.has_pending() {
            self.suppress(&signal, "pending", now_ms, actions);
            return;
        }

        let admission = self.governor.admission(self.round);
        if !admission.is_allowed() {
            self.suppress(&signal, admission.reason(), now_ms, actions);
            return;
        }

        self.admit(signal, now_ms, actions);
    }

    fn signal_from_server(&self, raw: ServerSignal, now_ms: i64) -> Signal {
        let id = raw.id.unwrap_or_else(|| {
            let id = generate_signal_id(now_ms);
            warn!(signal_id = %id, "Server signal without id, generated one");
            id
        });
        let max_attempts = raw
            .max_attempts
            .filter(|n| (2..=3).contains(n))
            .unwrap_or(self.settings.default_max_attempts);
        let color = raw.suggested_bet.color;
        let numbers = if raw.suggested_bet.numbers.is_empty() {
            color.numbers()
        } else {
            raw.suggested_bet.numbers
        };

        Signal {
            id,
            expected_color: color,
            max_attempts,
            protect_white: raw.suggested_bet.protect_white,
            tier: SignalTier::from_str(&raw.signal_type),
            confidence: raw.confidence,
            description: raw.description,
            pattern_key: raw.pattern_key,
            numbers,
            probability: raw.probability,
            reasons: raw.reasons,
            after_number: raw
                .after_number
                .or_else(|| self.history.latest().map(|o| o.number)),
            origin: SignalOrigin::Server,
        }
    }

    fn admit(&mut self, signal: Signal, now_ms: i64, actions: &mut Vec<SessionAction>) {
        if !self.tracker.open(&signal) {
            self.suppress(&signal, "pending", now_ms, actions);
            return;
        }
        self.governor.record_alert(self.round, now_ms);
        self.display = DisplayState::Active {
            signal_id: signal.id.clone(),
        };

        info!(
            signal_id = %signal.id,
            origin = signal.origin.as_str(),
            pattern = %signal.pattern_key,
            color = signal.expected_color.as_str(),
            max_attempts = signal.max_attempts,
            round = self.round,
            "Signal emitted"
        );
        actions.push(SessionAction::Emit(SessionEvent::signal(&signal, now_ms)));
    }

    fn suppress(&mut self, signal: &Signal, reason: &str, now_ms: i64, actions: &mut Vec<SessionAction>) {
        self.tracker.mark_suppressed(&signal.id);
        debug!(
            signal_id = %signal.id,
            origin = signal.origin.as_str(),
            reason,
            "Signal suppressed"
        );
        actions.push(SessionAction::Emit(SessionEvent {
            signal_id: Some(signal.id.clone()),
            origin: Some(signal.origin.as_str().to_string()),
            color: Some(signal.expected_color.as_str().to_string()),
            reason: Some(reason.to_string()),
            ..SessionEvent::new("signal_suppressed", now_ms)
        }));
    }

    // =========================================================================
    // RESOLUTIONS
    // =========================================================================

    fn on_bet_result(&mut self, bet: BetResult, now_ms: i64, actions: &mut Vec<SessionAction>) {
        let resolved_at_ms = bet.resolved_at_ms.unwrap_or(now_ms);

        match self
            .tracker
            .resolve_external(&bet.id, bet.result, bet.attempts_used)
        {
            ExternalResolution::Suppressed => {
                debug!(signal_id = %bet.id, "bet_result for suppressed signal ignored");
            }
            ExternalResolution::Closed(resolution) => self.apply_resolution(
                resolution,
                ResolutionSource::Server,
                resolved_at_ms,
                now_ms,
                actions,
            ),
            ExternalResolution::NotOpen if self.ledger.is_counted(&bet.id) => {
                let update = self.ledger.record(
                    &bet.id,
                    bet.result,
                    bet.color,
                    ResolutionSource::Server,
                    resolved_at_ms,
                    now_ms,
                );
                if let LedgerUpdate::Reconciled { from, to } = update {
                    self.on_reconciled(&bet.id, from, to, bet.attempts_used, now_ms, actions);
                }
            }
            ExternalResolution::NotOpen => {
                debug!(signal_id = %bet.id, "bet_result for unknown signal ignored");
            }
        }
    }

    fn apply_resolution(
        &mut self,
        resolution: TrackedResolution,
        source: ResolutionSource,
        resolved_at_ms: i64,
        now_ms: i64,
        actions: &mut Vec<SessionAction>,
    ) {
        let TrackedResolution {
            signal_id,
            expected_color,
            resolution: outcome,
            attempts_used,
            max_attempts,
            origin,
        } = resolution;

        let update = self.ledger.record(
            &signal_id,
            outcome,
            Some(expected_color),
            source,
            resolved_at_ms,
            now_ms,
        );

        match update {
            LedgerUpdate::Counted => {
                self.governor.record_outcome(outcome.is_win());
                info!(
                    signal_id = %signal_id,
                    result = outcome.as_str(),
                    attempts_used,
                    max_attempts,
                    wins = self.ledger.wins(),
                    losses = self.ledger.losses(),
                    "Signal resolved"
                );

                actions.push(SessionAction::Emit(SessionEvent {
                    color: Some(expected_color.as_str().to_string()),
                    max_attempts: Some(max_attempts as i32),
                    ..self.resolution_event("resolution", &signal_id, outcome, attempts_used, now_ms)
                }));

                self.display = DisplayState::ResolvedDisplay {
                    signal_id: signal_id.clone(),
                    resolution: outcome,
                };
                actions.push(SessionAction::ScheduleDisplayTimeout {
                    signal_id: signal_id.clone(),
                    delay_ms: self.settings.resolution_display_ms,
                });

                if source == ResolutionSource::Local
                    && origin == SignalOrigin::Local
                    && self.settings.report_local_resolutions
                {
                    actions.push(SessionAction::Report(ResolutionReport {
                        id: signal_id,
                        result: outcome.as_str().to_string(),
                        attempts_used,
                        color: expected_color.as_str().to_string(),
                        resolved_at: resolved_at_ms,
                    }));
                }
            }
            LedgerUpdate::Reconciled { from, to } => {
                self.on_reconciled(&signal_id, from, to, attempts_used, now_ms, actions);
            }
            LedgerUpdate::Confirmed | LedgerUpdate::Duplicate => {}
        }
    }

    fn on_reconciled(
        &mut self,
        signal_id: &str,
        from: Resolution,
        to: Resolution,
        attempts_used: u32,
        now_ms: i64,
        actions: &mut Vec<SessionAction>,
    ) {
        warn!(
            signal_id = %signal_id,
            local = from.as_str(),
            server = to.as_str(),
            "Server overrode local classification"
        );
        self.governor.correct_last_outcome(to.is_win());

        if let DisplayState::ResolvedDisplay {
            signal_id: shown,
            resolution,
        } = &mut self.display
        {
            if shown.as_str() == signal_id {
                *resolution = to;
            }
        }

        actions.push(SessionAction::Emit(SessionEvent {
            reason: Some(format!("{}->{}", from.as_str(), to.as_str())),
            ..self.resolution_event("reconciled", signal_id, to, attempts_used, now_ms)
        }));
    }

    fn resolution_event(
        &self,
        kind: &str,
        signal_id: &str,
        outcome: Resolution,
        attempts_used: u32,
        now_ms: i64,
    ) -> SessionEvent {
        SessionEvent {
            signal_id: Some(signal_id.to_string()),
            result: Some(outcome.as_str().to_string()),
            attempts_used: Some(attempts_used as i32),
            wins: Some(self.ledger.wins() as i64),
            losses: Some(self.ledger.losses() as i64),
            ..SessionEvent::new(kind, now_ms)
        }
    }

    fn update_connected(&mut self, connected: bool, now_ms: i64, actions: &mut Vec<SessionAction>) {
        if self.connected == connected {
            return;
        }
        self.connected = connected;
        info!(connected, "Connection state changed");
        actions.push(SessionAction::Emit(SessionEvent::connection(connected, now_ms)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::config::SessionConfig;
    use crate::types::event::SuggestedBet;
    use crate::types::outcome::Color;

    fn settings(local_detection: bool) -> SessionSettings {
        SessionConfig {
            base_url: "http://localhost:3001".to_string(),
            local_detection: Some(local_detection),
            ..Default::default()
        }
        .validate()
        .unwrap()
    }

    fn result(color: Color) -> StreamEvent {
        let number = match color {
            Color::White => 0,
            Color::Red => 3,
            Color::Black => 10,
        };
        StreamEvent::DoubleResult(Outcome::new(color, number, 0))
    }

    fn server_signal(id: &str, color: Color) -> StreamEvent {
        StreamEvent::Signal(ServerSignal {
            id: Some(id.to_string()),
            signal_type: "STRONG_SIGNAL".to_string(),
            confidence: 8.5,
            description: "server pattern".to_string(),
            pattern_key: "srv".to_string(),
            suggested_bet: SuggestedBet {
                color,
                numbers: vec![],
                protect_white: true,
            },
            probability: "72%".to_string(),
            reasons: vec![],
            max_attempts: Some(2),
            after_number: None,
        })
    }

    fn bet_result(id: &str, result: Resolution, attempts_used: u32) -> StreamEvent {
        StreamEvent::BetResult(BetResult {
            id: id.to_string(),
            result,
            attempts_used,
            color: None,
            resolved_at_ms: None,
        })
    }

    fn emitted<'a>(actions: &'a [SessionAction], kind: &str) -> Vec<&'a SessionEvent> {
        actions
            .iter()
            .filter_map(|a| match a {
                SessionAction::Emit(e) if e.kind == kind => Some(e),
                _ => None,
            })
            .collect()
    }

    /// Feed red, red, red and return the opened local signal id.
    fn open_local_black(session: &mut Session) -> String {
        session.handle_event(result(Color::Red), 1_000);
        session.handle_event(result(Color::Red), 2_000);
        let actions = session.handle_event(result(Color::Red), 3_000);
        let signals = emitted(&actions, "signal");
        assert_eq!(signals.len(), 1);
        signals[0].signal_id.clone().unwrap()
    }

    #[test]
    fn test_triple_red_opens_black_and_wins_first_attempt() {
        let mut session = Session::new(settings(true));
        session.handle_event(result(Color::Red), 1_000);
        session.handle_event(result(Color::Red), 2_000);
        let actions = session.handle_event(result(Color::Red), 3_000);

        let signal = emitted(&actions, "signal")[0];
        assert_eq!(signal.color.as_deref(), Some("black"));
        assert_eq!(signal.protect_white, Some(true));
        assert_eq!(signal.origin.as_deref(), Some("local"));
        assert_eq!(session.display().as_str(), "active");
        let id = signal.signal_id.clone().unwrap();

        let actions = session.handle_event(result(Color::Black), 4_000);
        let resolution = emitted(&actions, "resolution")[0];
        assert_eq!(resolution.result.as_deref(), Some("win"));
        assert_eq!(resolution.attempts_used, Some(1));
        assert_eq!(resolution.wins, Some(1));
        assert_eq!(session.wins(), 1);
        assert_eq!(session.pending_count(), 0);

        assert!(actions.iter().any(|a| matches!(
            a,
            SessionAction::ScheduleDisplayTimeout { signal_id, delay_ms: 5_000 } if *signal_id == id
        )));
        let report = actions
            .iter()
            .find_map(|a| match a {
                SessionAction::Report(r) => Some(r),
                _ => None,
            })
            .unwrap();
        assert_eq!(report.id, id);
        assert_eq!(report.result, "win");
        assert_eq!(report.attempts_used, 1);
        assert_eq!(report.color, "black");
    }

    #[test]
    fn test_pending_attempt_is_reported() {
        let mut session = Session::new(settings(true));
        let id = open_local_black(&mut session);

        let actions = session.handle_event(result(Color::Red), 4_000);
        let attempt = emitted(&actions, "attempt")[0];
        assert_eq!(attempt.signal_id.as_deref(), Some(id.as_str()));
        assert_eq!(attempt.attempt, Some(2));
        assert_eq!(attempt.max_attempts, Some(3));

        let status = session.status();
        assert_eq!(status.pending_signal_id.as_deref(), Some(id.as_str()));
        assert_eq!(status.pending_attempt, Some(2));
    }

    #[test]
    fn test_overridden_losses_do_not_stop_the_governor() {
        let mut session = Session::new(settings(false));
        let mut now = 1_000;

        for i in 0..3 {
            let id = format!("srv-{}", i);
            let actions = session.handle_event(server_signal(&id, Color::Red), now);
            assert_eq!(emitted(&actions, "signal").len(), 1, "signal {} admitted", i);

            now += 1_000;
            session.handle_event(result(Color::Black), now);
            now += 1_000;
            let actions = session.handle_event(result(Color::Black), now);
            assert_eq!(emitted(&actions, "resolution")[0].result.as_deref(), Some("loss"));

            now += 1_000;
            let actions = session.handle_event(bet_result(&id, Resolution::Win, 2), now);
            assert_eq!(emitted(&actions, "reconciled").len(), 1);

            for _ in 0..8 {
                now += 1_000;
                session.handle_event(result(Color::White), now);
            }
        }

        let status = session.status();
        assert_eq!(status.wins, 3);
        assert_eq!(status.losses, 0);
        assert_eq!(status.consecutive_losses, 0);
        assert!(!status.stop_mode);
        assert_eq!(status.stop_remaining, 0);
    }

    #[test]
    fn test_server_confirmation_counts_once() {
        let mut session = Session::new(settings(true));
        let id = open_local_black(&mut session);
        session.handle_event(result(Color::Black), 4_000);

        let actions = session.handle_event(bet_result(&id, Resolution::Win, 1), 5_000);
        assert!(actions.is_empty());
        assert_eq!(session.wins(), 1);
        assert_eq!(session.losses(), 0);
    }

    #[test]
    fn test_server_overrides_local_classification() {
        let mut session = Session::new(settings(true));
        let id = open_local_black(&mut session);
        session.handle_event(result(Color::Black), 4_000);

        let actions = session.handle_event(bet_result(&id, Resolution::Loss, 3), 6_000);
        let reconciled = emitted(&actions, "reconciled")[0];
        assert_eq!(reconciled.result.as_deref(), Some("loss"));
        assert_eq!(reconciled.wins, Some(0));
        assert_eq!(reconciled.losses, Some(1));
        assert_eq!(
            session.display(),
            &DisplayState::ResolvedDisplay {
                signal_id: id,
                resolution: Resolution::Loss
            }
        );
    }

    #[test]
    fn test_signal_while_pending_is_suppressed_and_its_result_ignored() {
        let mut session = Session::new(settings(true));
        let local_id = open_local_black(&mut session);

        let actions = session.handle_event(server_signal("srv-1", Color::Red), 3_500);
        let suppressed = emitted(&actions, "signal_suppressed")[0];
        assert_eq!(suppressed.signal_id.as_deref(), Some("srv-1"));
        assert_eq!(suppressed.reason.as_deref(), Some("pending"));

        let actions = session.handle_event(bet_result("srv-1", Resolution::Win, 1), 3_600);
        assert!(actions.is_empty());
        assert_eq!(session.wins(), 0);
        assert_eq!(session.status().pending_signal_id, Some(local_id));
    }

    #[test]
    fn test_server_signal_resolved_by_bet_result() {
        let mut session = Session::new(settings(false));
        let actions = session.handle_event(server_signal("srv-1", Color::Red), 1_000);
        let signal = emitted(&actions, "signal")[0];
        assert_eq!(signal.origin.as_deref(), Some("server"));
        assert_eq!(signal.max_attempts, Some(2));
        assert_eq!(signal.numbers.as_ref().map(|n| n.len()), Some(7));

        session.handle_event(result(Color::Black), 2_000);
        let actions = session.handle_event(bet_result("srv-1", Resolution::Loss, 0), 2_100);

        let resolution = emitted(&actions, "resolution")[0];
        assert_eq!(resolution.result.as_deref(), Some("loss"));
        assert_eq!(resolution.attempts_used, Some(1));
        // Server-origin resolutions are never reported back.
        assert!(!actions.iter().any(|a| matches!(a, SessionAction::Report(_))));
        assert_eq!(session.losses(), 1);
    }

    #[test]
    fn test_redelivered_server_signal_keeps_its_result() {
        let mut session = Session::new(settings(false));
        session.handle_event(server_signal("srv-1", Color::Red), 1_000);

        let actions = session.handle_event(server_signal("srv-1", Color::Red), 1_100);
        assert!(actions.is_empty());
        assert_eq!(session.status().pending_signal_id.as_deref(), Some("srv-1"));

        let actions = session.handle_event(bet_result("srv-1", Resolution::Loss, 2), 1_200);
        assert_eq!(emitted(&actions, "resolution").len(), 1);
        assert_eq!(session.losses(), 1);
        assert_eq!(session.pending_count(), 0);

        // Replay after resolution is ignored too.
        assert!(session
            .handle_event(server_signal("srv-1", Color::Red), 1_300)
            .is_empty());
        assert_eq!(session.status().pending_signal_id, None);
    }

    #[test]
    fn test_cooldown_suppresses_server_signal() {
        let mut session = Session::new(settings(false));
        session.handle_event(server_signal("srv-1", Color::Red), 1_000);
        session.handle_event(bet_result("srv-1", Resolution::Win, 1), 1_100);

        // Win sets the cooldown to max(3, 7 / 2) = 3.
        let actions = session.handle_event(server_signal("srv-2", Color::Red), 1_200);
        assert_eq!(
            emitted(&actions, "signal_suppressed")[0].reason.as_deref(),
            Some("cooldown")
        );

        for i in 0..3 {
            session.handle_event(result(Color::White), 2_000 + i);
        }
        let actions = session.handle_event(server_signal("srv-3", Color::Black), 3_000);
        assert_eq!(emitted(&actions, "signal").len(), 1);
    }

    #[test]
    fn test_unknown_bet_result_is_ignored() {
        let mut session = Session::new(settings(true));
        let actions = session.handle_event(bet_result("nobody", Resolution::Win, 1), 1_000);
        assert!(actions.is_empty());
        assert_eq!(session.wins(), 0);
    }

    #[test]
    fn test_display_timeout_returns_to_searching() {
        let mut session = Session::new(settings(true));
        let id = open_local_black(&mut session);
        session.handle_event(result(Color::Black), 4_000);
        assert_eq!(session.display().as_str(), "resolved");

        assert!(session.handle_display_timeout("other", 9_000).is_empty());

        let actions = session.handle_display_timeout(&id, 9_000);
        assert_eq!(emitted(&actions, "searching").len(), 1);
        assert_eq!(session.display(), &DisplayState::Searching);
    }

    #[test]
    fn test_new_signal_preempts_resolved_display() {
        let mut session = Session::new(settings(false));
        session.handle_event(server_signal("srv-1", Color::Red), 1_000);
        session.handle_event(bet_result("srv-1", Resolution::Win, 1), 1_100);
        for i in 0..3 {
            session.handle_event(result(Color::White), 2_000 + i);
        }
        session.handle_event(server_signal("srv-2", Color::Black), 3_000);
        assert_eq!(
            session.display(),
            &DisplayState::Active {
                signal_id: "srv-2".to_string()
            }
        );

        // Timer armed for srv-1 fires late and must not clear srv-2.
        assert!(session.handle_display_timeout("srv-1", 6_100).is_empty());
        assert_eq!(session.display().as_str(), "active");
    }

    #[test]
    fn test_connection_events_only_on_change() {
        let mut session = Session::new(settings(true));
        let actions = session.handle_event(StreamEvent::Status { connected: true }, 1_000);
        assert_eq!(emitted(&actions, "connection")[0].connected, Some(true));
        assert!(session.set_connected(true, 1_100).is_empty());
        assert_eq!(emitted(&session.set_connected(false, 1_200), "connection").len(), 1);
        assert!(!session.status().connected);
    }

    #[test]
    fn test_at_most_one_pending_and_every_resolution_counted_once() {
        let mut session = Session::new(settings(true));
        let mut seed: u64 = 42;
        let mut resolutions = 0u64;

        for i in 0..2_000 {
            seed = seed
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let color = match (seed >> 33) % 15 {
                0 => Color::White,
                1..=7 => Color::Red,
                _ => Color::Black,
            };
            let actions = session.handle_event(result(color), 1_000 + i * 1_000);
            resolutions += emitted(&actions, "resolution").len() as u64;
            assert!(session.pending_count() <= 1);
        }

        assert!(resolutions > 0);
        assert_eq!(session.wins() + session.losses(), resolutions);
        assert_eq!(session.round(), 2_000);
    }

    #[test]
    fn test_malformed_counter_in_status() {
        let mut session = Session::new(settings(true));
        session.record_malformed();
        session.handle_event(StreamEvent::Ping, 5);
        let status = session.status();
        assert_eq!(status.malformed_events, 1);
        assert_eq!(status.events_received, 1);
        assert_eq!(status.last_event_at_ms, Some(5));
        assert_eq!(status.display_state, "searching");
    }
}
