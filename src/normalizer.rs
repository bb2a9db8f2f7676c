//! Signal normalization
//!
//! This module validates raw per-event signal bundles into [`SignalSnapshot`]s
//! with every feature clamped to [0,1]. A missing or out-of-domain numeric
//! feature never fails the event: it is replaced by a neutral default with a
//! confidence penalty and an audit record. Only missing structural fields
//! (child id, event id) reject the event.

use crate::types::{
    FeatureSample, RawFeature, RawSignalBundle, RiskFactor, SignalSnapshot, SignalSubstitution,
    SubstitutionReason,
};
use crate::error::EngineError;
use tracing::info;

/// Neutral default substituted for an unusable feature value
pub const NEUTRAL_DEFAULT: f64 = 0.5;

/// Confidence multiplier applied alongside a neutral-default substitution
pub const SUBSTITUTION_CONFIDENCE_PENALTY: f64 = 0.5;

/// Normalizer for converting raw signal bundles into validated snapshots
pub struct SignalNormalizer;

impl SignalNormalizer {
    /// Normalize a raw bundle into a snapshot.
    ///
    /// The temporal and behavioral-pattern features are placeholders here;
    /// the temporal analyzer and trend tracker overwrite them before scoring.
    pub fn normalize(raw: &RawSignalBundle) -> Result<SignalSnapshot, EngineError> {
        Self::normalize_degraded(raw, &[])
    }

    /// Normalize a bundle whose listed factors were dropped by upstream
    /// timeouts, so their absence is audited as a timeout rather than a
    /// plain missing signal.
    pub fn normalize_degraded(
        raw: &RawSignalBundle,
        timed_out: &[RiskFactor],
    ) -> Result<SignalSnapshot, EngineError> {
        if raw.child_id.trim().is_empty() {
            return Err(EngineError::InvalidInput("child_id is empty".to_string()));
        }
        if raw.event_id.trim().is_empty() {
            return Err(EngineError::InvalidInput("event_id is empty".to_string()));
        }

        let mut substitutions = Vec::new();

        let mut normalize = |raw_feature, factor| {
            normalize_feature(raw_feature, factor, timed_out.contains(&factor), &mut substitutions)
        };

        let content_safety = normalize(raw.content_safety, RiskFactor::ContentSafety);
        let behavioral_pattern = normalize(raw.behavioral_delta, RiskFactor::BehavioralPattern);
        let emotional = normalize(raw.emotional_indicator, RiskFactor::EmotionalIndicator);
        let cumulative_exposure = normalize(raw.cumulative_exposure, RiskFactor::CumulativeExposure);
        drop(normalize);

        for sub in &substitutions {
            info!(
                child_id = %raw.child_id,
                event_id = %raw.event_id,
                factor = sub.factor.as_str(),
                reason = sub.reason.as_str(),
                "signal degraded to neutral default"
            );
        }

        Ok(SignalSnapshot {
            event_id: raw.event_id.clone(),
            child_id: raw.child_id.clone(),
            timestamp: raw.timestamp,
            content_safety,
            behavioral_pattern,
            // Derived by the temporal analyzer before scoring
            temporal: FeatureSample::new(0.0, 1.0),
            emotional,
            cumulative_exposure,
            substitutions,
        })
    }
}

/// Normalize one raw feature, recording a substitution when it is unusable.
///
/// Raw domain: finite values in [-0.05, 1.05] are accepted and clamped to
/// [0,1] (small sensor overshoot is tolerated); anything else is replaced.
fn normalize_feature(
    raw: Option<RawFeature>,
    factor: RiskFactor,
    timed_out: bool,
    substitutions: &mut Vec<SignalSubstitution>,
) -> FeatureSample {
    const DOMAIN_SLACK: f64 = 0.05;

    let Some(feature) = raw else {
        substitutions.push(SignalSubstitution {
            factor,
            reason: if timed_out {
                SubstitutionReason::UpstreamTimeout
            } else {
                SubstitutionReason::Missing
            },
            rejected_value: None,
        });
        return neutral_sample(None);
    };

    let confidence = clamp_confidence(feature.confidence);

    if !feature.value.is_finite() {
        substitutions.push(SignalSubstitution {
            factor,
            reason: SubstitutionReason::NotFinite,
            rejected_value: None,
        });
        return neutral_sample(Some(confidence));
    }

    if feature.value < -DOMAIN_SLACK || feature.value > 1.0 + DOMAIN_SLACK {
        substitutions.push(SignalSubstitution {
            factor,
            reason: SubstitutionReason::OutOfDomain,
            rejected_value: Some(feature.value),
        });
        return neutral_sample(Some(confidence));
    }

    FeatureSample::new(feature.value.clamp(0.0, 1.0), confidence)
}

/// Build the neutral-default sample, applying the confidence penalty to the
/// provider confidence when one was supplied
fn neutral_sample(provider_confidence: Option<f64>) -> FeatureSample {
    let base = provider_confidence.unwrap_or(1.0);
    FeatureSample::new(NEUTRAL_DEFAULT, base * SUBSTITUTION_CONFIDENCE_PENALTY)
}

fn clamp_confidence(confidence: Option<f64>) -> f64 {
    match confidence {
        Some(c) if c.is_finite() => c.clamp(0.0, 1.0),
        _ => 1.0,
    }
}
