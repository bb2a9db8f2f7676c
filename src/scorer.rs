//! Composite risk scoring
//!
//! Combines the five normalized features into one weighted composite score
//! and maps it onto a risk level. The formula is a plain weighted sum:
//!
//! ```text
//! composite  = Σ (weight_i × feature_i)     clamped to [0,1]
//! confidence = Σ (weight_i × confidence_i)
//! ```
//!
//! Confidence blends with the same weights but never alters the score
//! itself, and increasing any single feature can never decrease the
//! composite. Both properties keep the score explainable to a parent.

use crate::config::{RiskThresholds, RiskWeights};
use crate::types::{FactorContribution, RiskFactor, RiskLevel, SignalSnapshot};

/// Result of scoring one snapshot
#[derive(Debug, Clone)]
pub struct ScoreOutcome {
    pub composite_score: f64,
    pub confidence: f64,
    pub risk_level: RiskLevel,
    /// Factor with the largest weighted contribution; ties resolve to the
    /// higher-weighted factor so the outcome is deterministic
    pub dominant_factor: RiskFactor,
    /// Per-factor contributions in weight order
    pub breakdown: Vec<FactorContribution>,
}

/// Scorer applying the validated weight table to normalized snapshots
pub struct CompositeScorer;

impl CompositeScorer {
    /// Score a snapshot. Deterministic: identical snapshots always produce
    /// identical outcomes.
    pub fn score(
        snapshot: &SignalSnapshot,
        weights: &RiskWeights,
        thresholds: &RiskThresholds,
    ) -> ScoreOutcome {
        let mut breakdown = Vec::with_capacity(RiskFactor::ALL.len());
        let mut composite = 0.0;
        let mut confidence = 0.0;

        for factor in RiskFactor::ALL {
            let sample = snapshot.feature(factor);
            let weight = weights.weight(factor);
            let weighted = weight * sample.value;

            composite += weighted;
            confidence += weight * sample.confidence;

            breakdown.push(FactorContribution {
                factor,
                value: sample.value,
                weight,
                weighted,
                confidence: sample.confidence,
                evidence: Vec::new(),
            });
        }

        let composite_score = composite.clamp(0.0, 1.0);

        // Strictly-greater comparison keeps the first (higher-weighted)
        // factor on ties
        let mut dominant_factor = RiskFactor::ContentSafety;
        let mut dominant_weighted = f64::NEG_INFINITY;
        for contribution in &breakdown {
            if contribution.weighted > dominant_weighted {
                dominant_weighted = contribution.weighted;
                dominant_factor = contribution.factor;
            }
        }

        ScoreOutcome {
            composite_score,
            confidence: confidence.clamp(0.0, 1.0),
            risk_level: risk_level_for(composite_score, thresholds),
            dominant_factor,
            breakdown,
        }
    }
}

/// Map a composite score onto its band. Band edges are closed lower bounds:
/// a score exactly at an edge belongs to the higher band.
pub fn risk_level_for(score: f64, thresholds: &RiskThresholds) -> RiskLevel {
    if score >= thresholds.critical {
        RiskLevel::Critical
    } else if score >= thresholds.high {
        RiskLevel::High
    } else if score >= thresholds.medium {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}
