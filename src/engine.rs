//! Engine orchestration
//!
//! This module provides the public API for the guardian scoring core. One
//! inbound event flows through:
//!
//! 1. SignalNormalizer - validate and clamp the raw bundle
//! 2. TemporalAnalyzer - derive the time-context feature
//! 3. TrendTracker - interpret the event against the child's baseline
//! 4. CompositeScorer - weighted composite score and risk level
//! 5. CrisisMachine - escalation state transitions, intervention logging
//!
//! Bias analysis runs independently against content-feature vectors and
//! never feeds the composite formula.

use crate::bias::BiasAnalyzer;
use crate::config::EngineConfig;
use crate::crisis::CrisisSignal;
use crate::error::EngineError;
use crate::normalizer::SignalNormalizer;
use crate::notify::{CrisisNotification, NotificationDispatcher, ParentNotifier};
use crate::provider::{fetch_or_degrade, FetchOutcome, SignalProvider};
use crate::recommend::recommendations;
use crate::scorer::CompositeScorer;
use crate::store::ChildStateStore;
use crate::temporal::TemporalAnalyzer;
use crate::types::{
    AgeBand, ChildContext, ContentFeatures, CrisisState, CulturalBiasAnalysis, CulturalContext,
    FeatureSample, InterventionLog, RawSignalBundle, RiskAssessment, RiskFactor,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

/// Optional upstream providers for building a signal bundle on demand
#[derive(Default)]
pub struct SignalProviders<'a> {
    pub content_safety: Option<&'a dyn SignalProvider>,
    pub behavioral_delta: Option<&'a dyn SignalProvider>,
    pub emotional_indicator: Option<&'a dyn SignalProvider>,
    pub cumulative_exposure: Option<&'a dyn SignalProvider>,
}

/// The guardian scoring engine.
///
/// Construction validates the configuration; an engine with invalid weights
/// or thresholds cannot exist. Events for different children may be
/// assessed from any number of threads concurrently.
pub struct RiskEngine {
    config: EngineConfig,
    store: ChildStateStore,
    bias: BiasAnalyzer,
    dispatcher: Arc<NotificationDispatcher>,
    children: RwLock<HashMap<String, ChildContext>>,
    interventions: Mutex<HashMap<Uuid, InterventionLog>>,
}

impl RiskEngine {
    /// Build an engine over a configuration and a parent-notification channel.
    ///
    /// Fails fast with `Configuration` when the config is invalid; the
    /// process must not serve requests in that case.
    pub fn new(
        config: EngineConfig,
        notifier: Arc<dyn ParentNotifier>,
    ) -> Result<Self, EngineError> {
        let config = config.validated()?;
        let bias = BiasAnalyzer::new(config.taxonomy.clone())?;
        let dispatcher = Arc::new(NotificationDispatcher::new(
            notifier,
            config.notify.clone(),
        ));

        Ok(Self {
            config,
            store: ChildStateStore::new(),
            bias,
            dispatcher,
            children: RwLock::new(HashMap::new()),
            interventions: Mutex::new(HashMap::new()),
        })
    }

    /// Register or replace a child's context (age band, time zone offset,
    /// monitoring flags). Called by the external configuration collaborator.
    pub fn upsert_child(&self, context: ChildContext) {
        self.children
            .write()
            .expect("child registry poisoned")
            .insert(context.child_id.clone(), context);
    }

    /// Assess one inbound event end to end.
    ///
    /// Always completes for structurally valid input: missing or broken
    /// numeric signals degrade with an audit trail instead of failing.
    pub fn assess_risk(&self, raw: &RawSignalBundle) -> Result<RiskAssessment, EngineError> {
        self.assess(raw, &[])
    }

    fn assess(
        &self,
        raw: &RawSignalBundle,
        timed_out: &[RiskFactor],
    ) -> Result<RiskAssessment, EngineError> {
        // Stage 1: validate and clamp the raw bundle
        let mut snapshot = SignalNormalizer::normalize_degraded(raw, timed_out)?;

        let child = self.child_context(&raw.child_id);

        // Stage 2: temporal feature from the child's local clock
        let temporal = TemporalAnalyzer::analyze(raw, &child, &self.config.temporal);
        snapshot.temporal = FeatureSample::new(temporal.risk, 1.0);

        // Stages 3-5 run under the child's single-writer lock
        let handle = self.store.entry(&raw.child_id);
        let mut state = handle.lock().expect("child state poisoned");

        // Stage 3: interpret the behavioral delta against the baseline
        let observation = state
            .tracker
            .observe(snapshot.behavioral_pattern.value, &self.config.trend);
        snapshot.behavioral_pattern = FeatureSample::new(
            observation.risk.value,
            snapshot
                .behavioral_pattern
                .confidence
                .min(observation.risk.confidence),
        );

        // Stage 4: composite score
        let mut outcome =
            CompositeScorer::score(&snapshot, &self.config.weights, &self.config.thresholds);
        attach_evidence(&mut outcome.breakdown, &snapshot, &temporal, &observation);

        state
            .tracker
            .record(outcome.composite_score, raw.timestamp, &self.config.trend);

        // Stage 5: crisis transitions. The machine weighs the level route
        // against the assessment confidence and the spike route against the
        // emotional feature's own confidence.
        let signal = CrisisSignal {
            risk_level: outcome.risk_level,
            confidence: outcome.confidence,
            emotional_risk: snapshot.emotional.value,
            emotional_confidence: snapshot.emotional.confidence,
            at: raw.timestamp,
        };
        let crisis = state.crisis.observe(signal, &self.config.crisis);
        drop(state);

        if let Some(escalation) = crisis.escalation {
            self.escalate(&raw.child_id, escalation);
        }

        Ok(RiskAssessment {
            id: Uuid::new_v4(),
            child_id: raw.child_id.clone(),
            event_id: raw.event_id.clone(),
            composite_score: outcome.composite_score,
            risk_level: outcome.risk_level,
            factor_breakdown: outcome.breakdown,
            dominant_factor: outcome.dominant_factor,
            recommendations: recommendations(
                outcome.risk_level,
                outcome.dominant_factor,
                false,
                child.age_band,
            ),
            confidence: outcome.confidence,
            trend: observation.trend,
            anomaly_spike: observation.anomaly_spike,
            created_at: Utc::now(),
            engine_version: crate::VERSION.to_string(),
        })
    }

    /// Build a bundle from upstream providers (retry-once-then-degrade per
    /// provider) and assess it.
    pub fn assess_with_providers(
        &self,
        child_id: &str,
        event_id: &str,
        timestamp: chrono::DateTime<Utc>,
        providers: &SignalProviders<'_>,
        deadline: Duration,
    ) -> Result<RiskAssessment, EngineError> {
        let mut timed_out = Vec::new();
        let mut fetch = |provider: Option<&dyn SignalProvider>, factor: RiskFactor| {
            match provider.map(|p| fetch_or_degrade(p, child_id, event_id, deadline)) {
                Some(FetchOutcome::Fetched(feature)) => Some(feature),
                Some(FetchOutcome::TimedOut) => {
                    timed_out.push(factor);
                    None
                }
                Some(FetchOutcome::Unavailable) | None => None,
            }
        };

        let raw = RawSignalBundle {
            event_id: event_id.to_string(),
            child_id: child_id.to_string(),
            timestamp,
            content_safety: fetch(providers.content_safety, RiskFactor::ContentSafety),
            behavioral_delta: fetch(providers.behavioral_delta, RiskFactor::BehavioralPattern),
            emotional_indicator: fetch(
                providers.emotional_indicator,
                RiskFactor::EmotionalIndicator,
            ),
            cumulative_exposure: fetch(
                providers.cumulative_exposure,
                RiskFactor::CumulativeExposure,
            ),
            same_day_session_minutes: None,
        };

        self.assess(&raw, &timed_out)
    }

    /// Analyze one content item for cultural bias (stateless, parallelizable)
    pub fn analyze_bias(
        &self,
        content_id: &str,
        cultural_context: CulturalContext,
        features: &ContentFeatures,
    ) -> Result<CulturalBiasAnalysis, EngineError> {
        self.bias.analyze(content_id, cultural_context, features)
    }

    /// Re-derive an assessment's recommendations with bias findings folded in
    pub fn fold_bias_into_recommendations(
        &self,
        assessment: &RiskAssessment,
        bias: &CulturalBiasAnalysis,
    ) -> Vec<String> {
        let child = self.child_context(&assessment.child_id);
        let has_findings =
            bias.overall_bias_score > 0.0 && !bias.missing_perspectives.is_empty();
        recommendations(
            assessment.risk_level,
            assessment.dominant_factor,
            has_findings,
            child.age_band,
        )
    }

    /// Read-only crisis-state diagnostic, with window decay applied
    pub fn get_crisis_state(&self, child_id: &str) -> CrisisState {
        self.store
            .snapshot(child_id)
            .map(|s| s.crisis.state_at(Utc::now(), &self.config.crisis))
            .unwrap_or(CrisisState::Normal)
    }

    /// Acknowledge an intervention: flips `resolved` exactly once and moves
    /// the child's crisis machine Escalated -> Resolved.
    pub fn acknowledge_intervention(
        &self,
        intervention_id: Uuid,
        actor_id: &str,
    ) -> Result<InterventionLog, EngineError> {
        if actor_id.trim().is_empty() {
            return Err(EngineError::InvalidInput("actor_id is empty".to_string()));
        }

        let mut interventions = self.interventions.lock().expect("intervention log poisoned");
        let log = interventions
            .get_mut(&intervention_id)
            .ok_or_else(|| EngineError::UnknownIntervention(intervention_id.to_string()))?;

        if log.resolved {
            return Err(EngineError::InvalidInput(format!(
                "intervention {} already resolved",
                intervention_id
            )));
        }

        log.resolved = true;
        log.resolved_by = Some(actor_id.to_string());
        log.resolved_at = Some(Utc::now());
        let resolved = log.clone();
        drop(interventions);

        let handle = self.store.entry(&resolved.child_id);
        handle
            .lock()
            .expect("child state poisoned")
            .crisis
            .acknowledge(Utc::now());

        Ok(resolved)
    }

    /// Intervention records for one child, newest last (diagnostics)
    pub fn interventions_for(&self, child_id: &str) -> Vec<InterventionLog> {
        let mut logs: Vec<InterventionLog> = self
            .interventions
            .lock()
            .expect("intervention log poisoned")
            .values()
            .filter(|log| log.child_id == child_id)
            .cloned()
            .collect();
        logs.sort_by_key(|log| log.timestamp);
        logs
    }

    /// The validated configuration in force
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Delivery-attempt audit trail (diagnostics)
    pub fn delivery_attempts(&self) -> Vec<crate::notify::DeliveryAttempt> {
        self.dispatcher.attempts()
    }

    fn child_context(&self, child_id: &str) -> ChildContext {
        self.children
            .read()
            .expect("child registry poisoned")
            .get(child_id)
            .cloned()
            .unwrap_or_else(|| {
                ChildContext::new(child_id.to_string(), AgeBand::MiddleChildhood)
            })
    }

    /// Write the intervention record and dispatch the parent notification.
    ///
    /// The record is persisted synchronously; delivery runs detached so the
    /// scoring path never blocks on the notification channel. Delivery
    /// failure surfaces through the dispatcher's alert, never silently.
    fn escalate(&self, child_id: &str, escalation: crate::crisis::EscalationEvent) {
        let log = InterventionLog {
            id: Uuid::new_v4(),
            child_id: child_id.to_string(),
            trigger_type: escalation.trigger_type,
            confidence: escalation.confidence,
            escalation_level: escalation.escalation_level,
            timestamp: escalation.at,
            resolved: false,
            resolved_by: None,
            resolved_at: None,
        };

        let notification = CrisisNotification {
            intervention_id: log.id,
            child_id: log.child_id.clone(),
            trigger_type: log.trigger_type,
            escalation_level: log.escalation_level,
            at: log.timestamp,
        };

        self.interventions
            .lock()
            .expect("intervention log poisoned")
            .insert(log.id, log);

        let dispatcher = Arc::clone(&self.dispatcher);
        std::thread::spawn(move || {
            if let Err(err) = dispatcher.dispatch(&notification) {
                // Already alerted inside the dispatcher; the detached thread
                // must not panic over it
                warn!(error = %err, "escalation notification not delivered");
            }
        });
    }
}

/// Fold the audit evidence (substitutions, temporal findings, trend
/// observations) into the per-factor breakdown
fn attach_evidence(
    breakdown: &mut [crate::types::FactorContribution],
    snapshot: &crate::types::SignalSnapshot,
    temporal: &crate::temporal::TemporalFindings,
    observation: &crate::trend::BehaviorObservation,
) {
    for contribution in breakdown.iter_mut() {
        for substitution in &snapshot.substitutions {
            if substitution.factor == contribution.factor {
                contribution.evidence.push(format!(
                    "Neutral default substituted ({})",
                    substitution.reason.as_str()
                ));
            }
        }

        match contribution.factor {
            RiskFactor::TemporalFactor => {
                contribution.evidence.extend(temporal.evidence());
            }
            RiskFactor::BehavioralPattern => {
                if observation.anomaly_spike {
                    contribution
                        .evidence
                        .push("Anomaly spike above behavioral baseline".to_string());
                }
                contribution
                    .evidence
                    .push(format!("Trend: {}", observation.trend.as_str()));
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RawFeature, RiskLevel, TrendClass, TriggerType};
    use chrono::TimeZone;
    use std::sync::mpsc::{channel, Sender};

    /// Notifier that reports each delivery on a channel
    struct ChannelNotifier {
        sender: Mutex<Sender<Uuid>>,
    }

    impl ParentNotifier for ChannelNotifier {
        fn deliver(&self, notification: &CrisisNotification) -> Result<(), String> {
            self.sender
                .lock()
                .unwrap()
                .send(notification.intervention_id)
                .map_err(|e| e.to_string())
        }
    }

    struct NoopNotifier;

    impl ParentNotifier for NoopNotifier {
        fn deliver(&self, _notification: &CrisisNotification) -> Result<(), String> {
            Ok(())
        }
    }

    fn make_engine() -> RiskEngine {
        RiskEngine::new(EngineConfig::default(), Arc::new(NoopNotifier)).unwrap()
    }

    fn event(child: &str, event_id: &str, minute: u32, emotional: f64) -> RawSignalBundle {
        RawSignalBundle {
            event_id: event_id.to_string(),
            child_id: child.to_string(),
            // Weekday midday, no temporal triggers
            timestamp: Utc.with_ymd_and_hms(2024, 1, 17, 12, minute, 0).unwrap(),
            content_safety: Some(RawFeature::with_confidence(0.2, 0.9)),
            behavioral_delta: Some(RawFeature::with_confidence(0.2, 0.9)),
            emotional_indicator: Some(RawFeature::with_confidence(emotional, 0.8)),
            cumulative_exposure: Some(RawFeature::with_confidence(0.1, 0.9)),
            same_day_session_minutes: None,
        }
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let mut config = EngineConfig::default();
        config.weights.content_safety = 0.9;
        assert!(matches!(
            RiskEngine::new(config, Arc::new(NoopNotifier)),
            Err(EngineError::Configuration(_))
        ));
    }

    #[test]
    fn test_assessment_reference_values() {
        let engine = make_engine();
        let raw = RawSignalBundle {
            event_id: "e1".to_string(),
            child_id: "c1".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 17, 12, 0, 0).unwrap(),
            content_safety: Some(RawFeature::new(0.9)),
            behavioral_delta: Some(RawFeature::new(0.2)),
            emotional_indicator: Some(RawFeature::new(0.1)),
            cumulative_exposure: Some(RawFeature::new(0.1)),
            same_day_session_minutes: None,
        };

        let assessment = engine.assess_risk(&raw).unwrap();
        // Empty history passes the behavioral delta through and the midday
        // weekday timestamp contributes zero temporal risk:
        // 0.3*0.9 + 0.25*0.2 + 0.2*0.0 + 0.15*0.1 + 0.1*0.1 = 0.345
        assert!((assessment.composite_score - 0.345).abs() < 1e-9);
        assert_eq!(assessment.risk_level, RiskLevel::Medium);
        assert_eq!(assessment.dominant_factor, RiskFactor::ContentSafety);
        assert_eq!(assessment.trend, TrendClass::InsufficientData);
        assert_eq!(assessment.factor_breakdown.len(), 5);
    }

    #[test]
    fn test_identical_events_score_identically() {
        let engine_a = make_engine();
        let engine_b = make_engine();
        let raw = event("c1", "e1", 0, 0.3);

        let a = engine_a.assess_risk(&raw).unwrap();
        let b = engine_b.assess_risk(&raw).unwrap();

        assert_eq!(a.composite_score, b.composite_score);
        assert_eq!(a.risk_level, b.risk_level);
        assert_eq!(a.recommendations, b.recommendations);
        assert_eq!(a.confidence, b.confidence);
    }

    #[test]
    fn test_crisis_scenario_three_emotional_spikes() {
        let (sender, receiver) = channel();
        let engine = RiskEngine::new(
            EngineConfig::default(),
            Arc::new(ChannelNotifier {
                sender: Mutex::new(sender),
            }),
        )
        .unwrap();

        // Three emotional spikes >= 0.85 within 10 minutes
        for (i, minute) in [0u32, 3, 6].iter().enumerate() {
            let assessment = engine
                .assess_risk(&event("c1", &format!("e{i}"), *minute, 0.9))
                .unwrap();
            // The individual assessments stay below the high band; only the
            // emotional spike path qualifies them
            assert!(assessment.risk_level < RiskLevel::High);
        }

        assert_eq!(engine.get_crisis_state("c1"), CrisisState::Escalated);

        let logs = engine.interventions_for("c1");
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].trigger_type, TriggerType::EmotionalSpike);
        assert!(!logs[0].resolved);

        // The detached notification eventually lands with the log's id
        let delivered = receiver
            .recv_timeout(Duration::from_secs(2))
            .expect("notification delivered");
        assert_eq!(delivered, logs[0].id);
    }

    #[test]
    fn test_high_assessments_escalate_despite_noisy_emotional_reading() {
        // Three confidently high-band assessments that each carry an
        // incidental emotional reading above the spike threshold at low
        // provider confidence. The level route must carry them to
        // escalation on its own.
        let engine = make_engine();
        for (i, minute) in [0u32, 3, 6].iter().enumerate() {
            let raw = RawSignalBundle {
                event_id: format!("e{i}"),
                child_id: "c1".to_string(),
                timestamp: Utc.with_ymd_and_hms(2024, 1, 17, 12, *minute, 0).unwrap(),
                content_safety: Some(RawFeature::with_confidence(1.0, 1.0)),
                behavioral_delta: Some(RawFeature::with_confidence(1.0, 1.0)),
                emotional_indicator: Some(RawFeature::with_confidence(0.9, 0.3)),
                cumulative_exposure: Some(RawFeature::with_confidence(1.0, 1.0)),
                same_day_session_minutes: None,
            };
            let assessment = engine.assess_risk(&raw).unwrap();
            assert!(assessment.risk_level >= RiskLevel::High);
            assert!(assessment.confidence >= 0.7);
        }

        assert_eq!(engine.get_crisis_state("c1"), CrisisState::Escalated);
        let logs = engine.interventions_for("c1");
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].trigger_type, TriggerType::ConsecutiveHighRisk);
    }

    #[test]
    fn test_two_spikes_never_escalate() {
        let engine = make_engine();
        engine.assess_risk(&event("c1", "e0", 0, 0.9)).unwrap();
        engine.assess_risk(&event("c1", "e1", 3, 0.9)).unwrap();

        assert!(engine.interventions_for("c1").is_empty());
        // Pending, but the window has not expired yet in this fresh read
        let state = engine.store.snapshot("c1").unwrap().crisis.state();
        assert_eq!(state, CrisisState::CrisisPending);
    }

    #[test]
    fn test_spikes_outside_window_never_escalate() {
        let engine = make_engine();
        engine.assess_risk(&event("c1", "e0", 0, 0.9)).unwrap();
        engine.assess_risk(&event("c1", "e1", 15, 0.9)).unwrap();
        engine.assess_risk(&event("c1", "e2", 30, 0.9)).unwrap();

        assert!(engine.interventions_for("c1").is_empty());
    }

    #[test]
    fn test_acknowledge_flow() {
        let engine = make_engine();
        for (i, minute) in [0u32, 3, 6].iter().enumerate() {
            engine
                .assess_risk(&event("c1", &format!("e{i}"), *minute, 0.9))
                .unwrap();
        }
        let log = engine.interventions_for("c1").remove(0);

        let resolved = engine.acknowledge_intervention(log.id, "parent-1").unwrap();
        assert!(resolved.resolved);
        assert_eq!(resolved.resolved_by.as_deref(), Some("parent-1"));
        assert_eq!(engine.get_crisis_state("c1"), CrisisState::Resolved);

        // The flip happens exactly once
        assert!(engine.acknowledge_intervention(log.id, "parent-1").is_err());

        // Unknown ids are rejected
        assert!(matches!(
            engine.acknowledge_intervention(Uuid::new_v4(), "parent-1"),
            Err(EngineError::UnknownIntervention(_))
        ));
    }

    #[test]
    fn test_children_are_independent() {
        let engine = make_engine();
        for (i, minute) in [0u32, 3, 6].iter().enumerate() {
            engine
                .assess_risk(&event("c1", &format!("e{i}"), *minute, 0.9))
                .unwrap();
        }
        engine.assess_risk(&event("c2", "x0", 8, 0.1)).unwrap();

        assert_eq!(engine.get_crisis_state("c1"), CrisisState::Escalated);
        assert_eq!(engine.get_crisis_state("c2"), CrisisState::Normal);
        assert!(engine.interventions_for("c2").is_empty());
    }

    #[test]
    fn test_unknown_child_reads_normal() {
        let engine = make_engine();
        assert_eq!(engine.get_crisis_state("nobody"), CrisisState::Normal);
    }

    #[test]
    fn test_degraded_event_still_assessed() {
        let engine = make_engine();
        let raw = RawSignalBundle {
            event_id: "e1".to_string(),
            child_id: "c1".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 17, 12, 0, 0).unwrap(),
            content_safety: None,
            behavioral_delta: Some(RawFeature::new(f64::NAN)),
            emotional_indicator: None,
            cumulative_exposure: None,
            same_day_session_minutes: None,
        };

        let assessment = engine.assess_risk(&raw).unwrap();
        // Substitution evidence shows up in the breakdown
        let content = assessment
            .factor_breakdown
            .iter()
            .find(|c| c.factor == RiskFactor::ContentSafety)
            .unwrap();
        assert!(content.evidence.iter().any(|e| e.contains("Neutral default")));
        assert!(assessment.confidence < 0.75);
    }

    #[test]
    fn test_bias_fold_changes_recommendations() {
        let engine = make_engine();
        let assessment = engine.assess_risk(&event("c1", "e1", 0, 0.3)).unwrap();

        let bias = engine
            .analyze_bias(
                "content-1",
                CulturalContext::Western,
                &ContentFeatures::default(),
            )
            .unwrap();
        assert!((bias.overall_bias_score - 1.0).abs() < 1e-12);

        let folded = engine.fold_bias_into_recommendations(&assessment, &bias);
        assert_eq!(folded.len(), assessment.recommendations.len() + 1);
    }

    #[test]
    fn test_upserted_child_context_drives_recommendations() {
        let engine = make_engine();
        let mut context = ChildContext::new("c1", AgeBand::EarlyChildhood);
        context.utc_offset_minutes = 0;
        engine.upsert_child(context);

        let assessment = engine.assess_risk(&event("c1", "e1", 0, 0.3)).unwrap();
        assert!(assessment
            .recommendations
            .iter()
            .any(|r| r.contains("15-minute")));
    }

    #[test]
    fn test_assess_with_providers_degrades_on_timeout() {
        struct AlwaysTimeout;
        impl SignalProvider for AlwaysTimeout {
            fn name(&self) -> &str {
                "slow"
            }
            fn fetch(
                &self,
                _child_id: &str,
                _event_id: &str,
                _deadline: Duration,
            ) -> Result<RawFeature, EngineError> {
                Err(EngineError::UpstreamTimeout("deadline exceeded".to_string()))
            }
        }

        struct FixedProvider(f64);
        impl SignalProvider for FixedProvider {
            fn name(&self) -> &str {
                "fixed"
            }
            fn fetch(
                &self,
                _child_id: &str,
                _event_id: &str,
                _deadline: Duration,
            ) -> Result<RawFeature, EngineError> {
                Ok(RawFeature::with_confidence(self.0, 0.9))
            }
        }

        let engine = make_engine();
        let slow = AlwaysTimeout;
        let fixed = FixedProvider(0.6);
        let providers = SignalProviders {
            content_safety: Some(&fixed),
            behavioral_delta: None,
            emotional_indicator: Some(&slow),
            cumulative_exposure: None,
        };

        let assessment = engine
            .assess_with_providers(
                "c1",
                "e1",
                Utc.with_ymd_and_hms(2024, 1, 17, 12, 0, 0).unwrap(),
                &providers,
                Duration::from_millis(50),
            )
            .unwrap();

        // The timed-out emotional feature degraded to the neutral default
        let emotional = assessment
            .factor_breakdown
            .iter()
            .find(|c| c.factor == RiskFactor::EmotionalIndicator)
            .unwrap();
        assert!((emotional.value - 0.5).abs() < 1e-9);
        assert!(emotional.confidence <= 0.5);
        // The audit trail names the timeout, not a plain missing feature
        assert!(emotional
            .evidence
            .iter()
            .any(|e| e.contains("upstream_timeout")));

        let content = assessment
            .factor_breakdown
            .iter()
            .find(|c| c.factor == RiskFactor::ContentSafety)
            .unwrap();
        assert!((content.value - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_trend_reported_after_history_builds() {
        let engine = make_engine();
        for i in 0..6u32 {
            engine
                .assess_risk(&event("c1", &format!("e{i}"), i, 0.2))
                .unwrap();
        }
        let assessment = engine.assess_risk(&event("c1", "e9", 7, 0.2)).unwrap();
        assert_ne!(assessment.trend, TrendClass::InsufficientData);
    }
}
