//! Core types for the guardian scoring pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: raw signal bundles, normalized snapshots, risk assessments,
//! cultural bias analyses, and crisis/intervention records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Risk level bands for a composite score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

/// The five weighted risk factors of the composite score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFactor {
    ContentSafety,
    BehavioralPattern,
    TemporalFactor,
    EmotionalIndicator,
    CumulativeExposure,
}

impl RiskFactor {
    /// All factors, in weight order (highest weight first)
    pub const ALL: [RiskFactor; 5] = [
        RiskFactor::ContentSafety,
        RiskFactor::BehavioralPattern,
        RiskFactor::TemporalFactor,
        RiskFactor::EmotionalIndicator,
        RiskFactor::CumulativeExposure,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskFactor::ContentSafety => "content_safety",
            RiskFactor::BehavioralPattern => "behavioral_pattern",
            RiskFactor::TemporalFactor => "temporal_factor",
            RiskFactor::EmotionalIndicator => "emotional_indicator",
            RiskFactor::CumulativeExposure => "cumulative_exposure",
        }
    }
}

/// Age band used for age-appropriate recommendations and audience analysis
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeBand {
    /// Ages 8 and under
    EarlyChildhood,
    /// Ages 9-12
    #[default]
    MiddleChildhood,
    /// Ages 13-16
    Adolescence,
    /// Ages 17+
    LateAdolescence,
}

impl AgeBand {
    /// Classify an age in years into its band
    pub fn from_age(age: u8) -> Self {
        match age {
            0..=8 => AgeBand::EarlyChildhood,
            9..=12 => AgeBand::MiddleChildhood,
            13..=16 => AgeBand::Adolescence,
            _ => AgeBand::LateAdolescence,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgeBand::EarlyChildhood => "early_childhood",
            AgeBand::MiddleChildhood => "middle_childhood",
            AgeBand::Adolescence => "adolescence",
            AgeBand::LateAdolescence => "late_adolescence",
        }
    }
}

/// Per-child context, referenced read-only by the scoring components.
///
/// Mutated only by an external configuration collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildContext {
    /// Child identifier
    pub child_id: String,
    /// Age band for recommendation language and audience analysis
    pub age_band: AgeBand,
    /// UTC offset of the child's local time zone, in minutes
    pub utc_offset_minutes: i32,
    /// Whether weekday school-hours monitoring is enabled for this child
    #[serde(default)]
    pub school_hours_monitoring: bool,
}

impl ChildContext {
    pub fn new(child_id: impl Into<String>, age_band: AgeBand) -> Self {
        Self {
            child_id: child_id.into(),
            age_band,
            utc_offset_minutes: 0,
            school_hours_monitoring: false,
        }
    }
}

/// A raw feature value with optional provider confidence, before normalization
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RawFeature {
    pub value: f64,
    /// Provider confidence in [0,1]; defaults to 1.0 when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl RawFeature {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            confidence: None,
        }
    }

    pub fn with_confidence(value: f64, confidence: f64) -> Self {
        Self {
            value,
            confidence: Some(confidence),
        }
    }
}

/// Raw per-event signal bundle delivered by external analyzers.
///
/// Missing numeric features are legal and degrade to neutral defaults;
/// missing structural fields reject the event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSignalBundle {
    pub event_id: String,
    pub child_id: String,
    pub timestamp: DateTime<Utc>,
    /// Content-safety risk from the external content analyzer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_safety: Option<RawFeature>,
    /// Behavioral delta from the external behavior analyzer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub behavioral_delta: Option<RawFeature>,
    /// Emotional-indicator probability from the external emotion analyzer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotional_indicator: Option<RawFeature>,
    /// Cumulative exposure risk from the usage aggregator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cumulative_exposure: Option<RawFeature>,
    /// Minutes of screen time accumulated so far today, for binge detection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub same_day_session_minutes: Option<f64>,
}

/// A normalized feature value with its confidence, both in [0,1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureSample {
    pub value: f64,
    pub confidence: f64,
}

impl FeatureSample {
    pub fn new(value: f64, confidence: f64) -> Self {
        Self { value, confidence }
    }
}

/// Why a raw feature was replaced by the neutral default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubstitutionReason {
    /// Feature absent from the bundle
    Missing,
    /// Value was NaN or otherwise non-finite
    NotFinite,
    /// Value fell outside the declared raw domain
    OutOfDomain,
    /// Upstream provider timed out after one retry
    UpstreamTimeout,
}

impl SubstitutionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubstitutionReason::Missing => "missing",
            SubstitutionReason::NotFinite => "not_finite",
            SubstitutionReason::OutOfDomain => "out_of_domain",
            SubstitutionReason::UpstreamTimeout => "upstream_timeout",
        }
    }
}

/// Audit record of a neutral-default substitution performed by the normalizer.
///
/// Substitutions are never silent: every replaced feature is recorded here
/// and carried on the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalSubstitution {
    pub factor: RiskFactor,
    pub reason: SubstitutionReason,
    /// The raw value that was rejected, when one was present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_value: Option<f64>,
}

/// Validated, normalized per-event snapshot consumed by the composite scorer.
///
/// Created once per inbound event; immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalSnapshot {
    pub event_id: String,
    pub child_id: String,
    pub timestamp: DateTime<Utc>,
    pub content_safety: FeatureSample,
    pub behavioral_pattern: FeatureSample,
    pub temporal: FeatureSample,
    pub emotional: FeatureSample,
    pub cumulative_exposure: FeatureSample,
    /// Audit trail of neutral-default substitutions applied
    pub substitutions: Vec<SignalSubstitution>,
}

impl SignalSnapshot {
    /// Look up a feature sample by factor
    pub fn feature(&self, factor: RiskFactor) -> FeatureSample {
        match factor {
            RiskFactor::ContentSafety => self.content_safety,
            RiskFactor::BehavioralPattern => self.behavioral_pattern,
            RiskFactor::TemporalFactor => self.temporal,
            RiskFactor::EmotionalIndicator => self.emotional,
            RiskFactor::CumulativeExposure => self.cumulative_exposure,
        }
    }
}

/// Behavioral trend classification over the rolling history window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendClass {
    Improving,
    Stable,
    Declining,
    /// Fewer samples than needed to classify
    InsufficientData,
}

impl TrendClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendClass::Improving => "improving",
            TrendClass::Stable => "stable",
            TrendClass::Declining => "declining",
            TrendClass::InsufficientData => "insufficient_data",
        }
    }
}

/// One factor's weighted contribution to the composite score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorContribution {
    pub factor: RiskFactor,
    /// Normalized feature value in [0,1]
    pub value: f64,
    /// Configured weight for this factor
    pub weight: f64,
    /// `weight * value`
    pub weighted: f64,
    pub confidence: f64,
    /// Human-readable evidence notes for the audit trail
    pub evidence: Vec<String>,
}

/// Immutable, append-only audit record of one risk assessment.
///
/// Created by the composite scorer from exactly one [`SignalSnapshot`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub id: Uuid,
    pub child_id: String,
    pub event_id: String,
    /// Weighted composite in [0,1]
    pub composite_score: f64,
    pub risk_level: RiskLevel,
    /// The five weighted contributions, in weight order
    pub factor_breakdown: Vec<FactorContribution>,
    /// Factor with the largest weighted contribution
    pub dominant_factor: RiskFactor,
    /// Deterministic, ordered recommendation strings
    pub recommendations: Vec<String>,
    /// Weight-blended confidence in [0,1]
    pub confidence: f64,
    /// Behavioral trend at assessment time
    pub trend: TrendClass,
    /// Whether the event registered as an anomaly spike against the baseline
    pub anomaly_spike: bool,
    pub created_at: DateTime<Utc>,
    /// Engine version that produced this assessment
    pub engine_version: String,
}

/// Cultural context taxonomy for bias analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CulturalContext {
    Western,
    Eastern,
    Indigenous,
    GlobalSouth,
    Unclassified,
}

impl CulturalContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            CulturalContext::Western => "western",
            CulturalContext::Eastern => "eastern",
            CulturalContext::Indigenous => "indigenous",
            CulturalContext::GlobalSouth => "global_south",
            CulturalContext::Unclassified => "unclassified",
        }
    }
}

/// Content-feature vector from the external content analyzer.
///
/// Category presence scores are keyed by taxonomy category name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentFeatures {
    /// Per-category presence scores in [0,1]
    pub category_presence: std::collections::HashMap<String, f64>,
    /// Free-form topic/entity tags detected in the content
    #[serde(default)]
    pub tags: Vec<String>,
    /// Audience age band the content targets
    pub audience: AgeBand,
}

/// Immutable cultural bias analysis of one content item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CulturalBiasAnalysis {
    pub content_id: String,
    pub cultural_context: CulturalContext,
    /// Intersectionality-weighted taxonomy coverage in [0,1]
    pub representation_score: f64,
    /// Cultural markers matched against the context's marker list
    pub cultural_markers: Vec<String>,
    /// Taxonomy categories below the presence threshold
    pub missing_perspectives: Vec<String>,
    /// Missing perspectives flagged demographically significant for the audience
    pub underrepresented_groups: Vec<String>,
    /// `1 - representation_score`
    pub overall_bias_score: f64,
    pub created_at: DateTime<Utc>,
}

/// Per-child crisis escalation state.
///
/// Mutated exclusively by the crisis machine, serialized per child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrisisState {
    Normal,
    Elevated,
    CrisisPending,
    CrisisConfirmed,
    Escalated,
    Resolved,
}

impl CrisisState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrisisState::Normal => "normal",
            CrisisState::Elevated => "elevated",
            CrisisState::CrisisPending => "crisis_pending",
            CrisisState::CrisisConfirmed => "crisis_confirmed",
            CrisisState::Escalated => "escalated",
            CrisisState::Resolved => "resolved",
        }
    }
}

/// What tripped the intervention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    /// N consecutive high-risk assessments within the crisis window
    ConsecutiveHighRisk,
    /// Standalone emotional-indicator spikes above the crisis threshold
    EmotionalSpike,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::ConsecutiveHighRisk => "consecutive_high_risk",
            TriggerType::EmotionalSpike => "emotional_spike",
        }
    }
}

/// Append-only intervention record written on escalation.
///
/// Never deleted, never content-mutated except the single `resolved` flip
/// performed through `acknowledge_intervention`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterventionLog {
    pub id: Uuid,
    pub child_id: String,
    pub trigger_type: TriggerType,
    /// Confidence of the signal that confirmed the crisis
    pub confidence: f64,
    pub escalation_level: RiskLevel,
    pub timestamp: DateTime<Utc>,
    /// Flips exactly once, via an authorized external actor
    pub resolved: bool,
    /// Actor that acknowledged the intervention, once resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}
