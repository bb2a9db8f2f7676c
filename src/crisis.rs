//! Crisis detection and escalation
//!
//! A per-child state machine over successive risk assessments and emotional
//! signals:
//!
//! ```text
//! Normal -> Elevated -> CrisisPending -> CrisisConfirmed -> Escalated -> Resolved -> Normal
//! ```
//!
//! Confirmation requires N consecutive high-confidence qualifying signals
//! inside the rolling window W, which bounds the false-positive rate: one
//! noisy reading can never confirm a crisis on its own. States short of
//! confirmation decay back to Normal once the window expires (hysteresis).
//!
//! The machine carries only the state enum, the timestamp of entry into it
//! and the running count of qualifying signals; its history is
//! reconstructable from the immutable assessment and intervention trails.

use crate::config::CrisisConfig;
use crate::types::{CrisisState, RiskLevel, TriggerType};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// The slice of an assessment the crisis machine consumes.
///
/// The two qualification routes carry their own confidences: the risk level
/// is backed by the assessment confidence, the emotional spike by the
/// emotional feature's confidence.
#[derive(Debug, Clone, Copy)]
pub struct CrisisSignal {
    pub risk_level: RiskLevel,
    /// Assessment confidence backing the risk level
    pub confidence: f64,
    /// Normalized emotional-risk feature value
    pub emotional_risk: f64,
    /// Confidence of the emotional feature
    pub emotional_confidence: f64,
    pub at: DateTime<Utc>,
}

/// Emitted exactly once per escalation; the engine turns this into an
/// intervention log entry and a parent notification
#[derive(Debug, Clone)]
pub struct EscalationEvent {
    pub trigger_type: TriggerType,
    /// Confidence of the confirming signal
    pub confidence: f64,
    pub escalation_level: RiskLevel,
    pub at: DateTime<Utc>,
}

/// Result of feeding one signal through the machine
#[derive(Debug, Clone)]
pub struct CrisisObservation {
    pub previous: CrisisState,
    pub current: CrisisState,
    /// Present only on the CrisisConfirmed -> Escalated transition
    pub escalation: Option<EscalationEvent>,
}

/// Per-child escalation state machine.
///
/// Single-writer: callers must serialize access per child.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrisisMachine {
    state: CrisisState,
    entered_at: Option<DateTime<Utc>>,
    /// Consecutive qualifying signals inside the current window
    qualifying_count: u32,
}

impl Default for CrisisMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl CrisisMachine {
    pub fn new() -> Self {
        Self {
            state: CrisisState::Normal,
            entered_at: None,
            qualifying_count: 0,
        }
    }

    /// Raw stored state, without decay applied
    pub fn state(&self) -> CrisisState {
        self.state
    }

    /// Effective state at `now`: pre-confirmation states past the window
    /// read as Normal even before the next signal arrives
    pub fn state_at(&self, now: DateTime<Utc>, config: &CrisisConfig) -> CrisisState {
        match self.state {
            CrisisState::Elevated | CrisisState::CrisisPending if self.window_expired(now, config) => {
                CrisisState::Normal
            }
            state => state,
        }
    }

    /// Feed one qualifying-candidate signal through the machine
    pub fn observe(&mut self, signal: CrisisSignal, config: &CrisisConfig) -> CrisisObservation {
        let previous = self.state;

        // Resolved returns to Normal on the next observation
        if self.state == CrisisState::Resolved {
            self.transition(CrisisState::Normal, signal.at);
        }

        // Hysteresis: pre-confirmation states decay once the window expires
        if matches!(self.state, CrisisState::Elevated | CrisisState::CrisisPending)
            && self.window_expired(signal.at, config)
        {
            self.transition(CrisisState::Normal, signal.at);
        }

        let escalation = if self.counts_toward_confirmation(signal, config) {
            self.advance(signal, config)
        } else {
            None
        };

        CrisisObservation {
            previous,
            current: self.state,
            escalation,
        }
    }

    /// Acknowledge an escalation: Escalated -> Resolved. Returns whether the
    /// transition happened (false when not currently escalated).
    pub fn acknowledge(&mut self, at: DateTime<Utc>) -> bool {
        if self.state == CrisisState::Escalated {
            self.transition(CrisisState::Resolved, at);
            true
        } else {
            false
        }
    }

    /// A signal counts toward confirmation when either route clears the
    /// minimum confidence on its own: a `high` assessment at the assessment
    /// confidence, or an emotional spike at the emotional feature's
    /// confidence. The routes are independent, so a noisy reading on one
    /// never suppresses a confident signal on the other.
    fn counts_toward_confirmation(&self, signal: CrisisSignal, config: &CrisisConfig) -> bool {
        self.qualifies_by_level(signal, config) || self.qualifies_by_spike(signal, config)
    }

    fn qualifies_by_level(&self, signal: CrisisSignal, config: &CrisisConfig) -> bool {
        signal.risk_level >= RiskLevel::High
            && signal.confidence >= config.min_signal_confidence
    }

    fn qualifies_by_spike(&self, signal: CrisisSignal, config: &CrisisConfig) -> bool {
        signal.emotional_risk >= config.emotional_spike_threshold
            && signal.emotional_confidence >= config.min_signal_confidence
    }

    fn advance(&mut self, signal: CrisisSignal, config: &CrisisConfig) -> Option<EscalationEvent> {
        // Already escalated (or mid-confirmation): no further transitions and
        // no duplicate intervention records
        if matches!(
            self.state,
            CrisisState::CrisisConfirmed | CrisisState::Escalated | CrisisState::Resolved
        ) {
            return None;
        }

        self.qualifying_count += 1;

        if self.qualifying_count >= config.required_signals {
            // Nth consecutive high-confidence signal inside the window:
            // confirm, then escalate immediately. The escalation itself
            // never blocks and never fails silently.
            self.transition(CrisisState::CrisisConfirmed, signal.at);
            self.transition(CrisisState::Escalated, signal.at);

            // Trigger and confidence come from the route that qualified
            let (trigger_type, confidence) = if self.qualifies_by_level(signal, config) {
                (TriggerType::ConsecutiveHighRisk, signal.confidence)
            } else {
                (TriggerType::EmotionalSpike, signal.emotional_confidence)
            };

            warn!(
                trigger = trigger_type.as_str(),
                confidence,
                "crisis confirmed, escalating"
            );

            return Some(EscalationEvent {
                trigger_type,
                confidence,
                escalation_level: signal.risk_level.max(RiskLevel::High),
                at: signal.at,
            });
        }

        // Each intra-sequence transition re-anchors `entered_at`, so the
        // window bounds the gap between consecutive qualifying signals
        // rather than the span of the whole sequence. This reads the window
        // in the direction of escalation.
        if self.qualifying_count == 1 {
            self.transition(CrisisState::Elevated, signal.at);
        } else {
            self.transition(CrisisState::CrisisPending, signal.at);
        }
        None
    }

    fn window_expired(&self, now: DateTime<Utc>, config: &CrisisConfig) -> bool {
        match self.entered_at {
            Some(entered) => now - entered > Duration::seconds(config.window_secs),
            None => false,
        }
    }

    fn transition(&mut self, next: CrisisState, at: DateTime<Utc>) {
        if next == CrisisState::Normal {
            self.qualifying_count = 0;
        }
        self.state = next;
        self.entered_at = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(seconds: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap() + Duration::seconds(seconds as i64)
    }

    fn high_signal(seconds: u32) -> CrisisSignal {
        CrisisSignal {
            risk_level: RiskLevel::High,
            confidence: 0.9,
            emotional_risk: 0.3,
            emotional_confidence: 0.9,
            at: at(seconds),
        }
    }

    fn emotional_spike(seconds: u32, confidence: f64) -> CrisisSignal {
        CrisisSignal {
            risk_level: RiskLevel::Low,
            confidence: 0.4,
            emotional_risk: 0.9,
            emotional_confidence: confidence,
            at: at(seconds),
        }
    }

    fn calm_signal(seconds: u32) -> CrisisSignal {
        CrisisSignal {
            risk_level: RiskLevel::Low,
            confidence: 0.9,
            emotional_risk: 0.1,
            emotional_confidence: 0.9,
            at: at(seconds),
        }
    }

    #[test]
    fn test_three_signals_within_window_escalate() {
        let config = CrisisConfig::default();
        let mut machine = CrisisMachine::new();

        assert_eq!(machine.observe(high_signal(0), &config).current, CrisisState::Elevated);
        assert_eq!(
            machine.observe(high_signal(120), &config).current,
            CrisisState::CrisisPending
        );

        let third = machine.observe(high_signal(240), &config);
        assert_eq!(third.current, CrisisState::Escalated);
        let escalation = third.escalation.expect("third signal escalates");
        assert_eq!(escalation.trigger_type, TriggerType::ConsecutiveHighRisk);
    }

    #[test]
    fn test_fewer_than_three_never_pass_pending() {
        let config = CrisisConfig::default();
        let mut machine = CrisisMachine::new();

        machine.observe(high_signal(0), &config);
        let second = machine.observe(high_signal(60), &config);
        assert_eq!(second.current, CrisisState::CrisisPending);
        assert!(second.escalation.is_none());

        // Window expires with no third signal: back to Normal
        assert_eq!(
            machine.state_at(at(700), &config),
            CrisisState::Normal
        );
    }

    #[test]
    fn test_emotional_spikes_alone_escalate() {
        // Scenario: three emotional spikes >= 0.85 at confidence >= 0.7
        // within 10 minutes, starting from Normal
        let config = CrisisConfig::default();
        let mut machine = CrisisMachine::new();

        machine.observe(emotional_spike(0, 0.75), &config);
        machine.observe(emotional_spike(200, 0.8), &config);
        let third = machine.observe(emotional_spike(400, 0.7), &config);

        assert_eq!(third.current, CrisisState::Escalated);
        let escalation = third.escalation.unwrap();
        assert_eq!(escalation.trigger_type, TriggerType::EmotionalSpike);
        // A standalone emotional spike still escalates at high level
        assert_eq!(escalation.escalation_level, RiskLevel::High);
    }

    #[test]
    fn test_noisy_emotional_reading_never_suppresses_high_assessments() {
        // High-band assessments at full confidence that happen to carry an
        // incidental emotional reading above the spike threshold but at low
        // provider confidence must still qualify through the level route.
        let config = CrisisConfig::default();
        let mut machine = CrisisMachine::new();

        let signal = |seconds: u32| CrisisSignal {
            risk_level: RiskLevel::High,
            confidence: 0.77,
            emotional_risk: 0.9,
            emotional_confidence: 0.3,
            at: at(seconds),
        };

        machine.observe(signal(0), &config);
        machine.observe(signal(180), &config);
        let third = machine.observe(signal(360), &config);

        assert_eq!(third.current, CrisisState::Escalated);
        let escalation = third.escalation.unwrap();
        assert_eq!(escalation.trigger_type, TriggerType::ConsecutiveHighRisk);
        assert!((escalation.confidence - 0.77).abs() < 1e-9);
    }

    #[test]
    fn test_spike_route_carries_emotional_confidence() {
        let config = CrisisConfig::default();
        let mut machine = CrisisMachine::new();

        machine.observe(emotional_spike(0, 0.8), &config);
        machine.observe(emotional_spike(120, 0.8), &config);
        let third = machine.observe(emotional_spike(240, 0.8), &config);

        let escalation = third.escalation.unwrap();
        assert_eq!(escalation.trigger_type, TriggerType::EmotionalSpike);
        assert!((escalation.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_low_confidence_signals_never_advance() {
        let config = CrisisConfig::default();
        let mut machine = CrisisMachine::new();

        for s in 0..5 {
            let obs = machine.observe(emotional_spike(s * 60, 0.5), &config);
            assert_eq!(obs.current, CrisisState::Normal);
        }
    }

    #[test]
    fn test_non_qualifying_signals_never_advance() {
        let config = CrisisConfig::default();
        let mut machine = CrisisMachine::new();

        machine.observe(high_signal(0), &config);
        let obs = machine.observe(calm_signal(60), &config);
        // Calm signal neither advances nor resets within the window
        assert_eq!(obs.current, CrisisState::Elevated);
    }

    #[test]
    fn test_window_bounds_gap_between_consecutive_signals() {
        // Signals 500s apart with a 600s window: every gap is inside the
        // window even though the sequence spans 1000s, so the re-anchored
        // window still confirms.
        let config = CrisisConfig::default();
        let mut machine = CrisisMachine::new();

        machine.observe(high_signal(0), &config);
        machine.observe(high_signal(500), &config);
        let third = machine.observe(high_signal(1000), &config);
        assert_eq!(third.current, CrisisState::Escalated);
    }

    #[test]
    fn test_window_expiry_restarts_sequence() {
        let config = CrisisConfig::default();
        let mut machine = CrisisMachine::new();

        machine.observe(high_signal(0), &config);
        machine.observe(high_signal(60), &config);
        assert_eq!(machine.state(), CrisisState::CrisisPending);

        // Next qualifying signal lands past the window: sequence restarts
        let late = machine.observe(high_signal(800), &config);
        assert_eq!(late.current, CrisisState::Elevated);
        assert!(late.escalation.is_none());
    }

    #[test]
    fn test_escalated_is_stable_and_emits_once() {
        let config = CrisisConfig::default();
        let mut machine = CrisisMachine::new();

        machine.observe(high_signal(0), &config);
        machine.observe(high_signal(60), &config);
        let escalations = machine.observe(high_signal(120), &config).escalation.is_some();
        assert!(escalations);

        // Further qualifying signals, including past the window, stay Escalated
        for s in [180, 240, 2000] {
            let obs = machine.observe(high_signal(s), &config);
            assert_eq!(obs.current, CrisisState::Escalated);
            assert!(obs.escalation.is_none());
        }
        assert_eq!(machine.state_at(at(5000), &config), CrisisState::Escalated);
    }

    #[test]
    fn test_acknowledge_then_normal() {
        let config = CrisisConfig::default();
        let mut machine = CrisisMachine::new();

        machine.observe(high_signal(0), &config);
        machine.observe(high_signal(60), &config);
        machine.observe(high_signal(120), &config);
        assert_eq!(machine.state(), CrisisState::Escalated);

        assert!(machine.acknowledge(at(300)));
        assert_eq!(machine.state(), CrisisState::Resolved);

        // Acknowledging twice does nothing
        assert!(!machine.acknowledge(at(310)));

        // Next observation returns to Normal before processing
        let obs = machine.observe(calm_signal(400), &config);
        assert_eq!(obs.current, CrisisState::Normal);
    }

    #[test]
    fn test_configured_signal_count_is_honored() {
        let mut config = CrisisConfig::default();
        config.required_signals = 4;
        let mut machine = CrisisMachine::new();

        machine.observe(high_signal(0), &config);
        machine.observe(high_signal(60), &config);
        let third = machine.observe(high_signal(120), &config);
        assert_eq!(third.current, CrisisState::CrisisPending);
        assert!(third.escalation.is_none());

        let fourth = machine.observe(high_signal(180), &config);
        assert_eq!(fourth.current, CrisisState::Escalated);
        assert!(fourth.escalation.is_some());
    }

    #[test]
    fn test_acknowledge_outside_escalated_is_rejected() {
        let mut machine = CrisisMachine::new();
        assert!(!machine.acknowledge(at(0)));
        assert_eq!(machine.state(), CrisisState::Normal);
    }
}
