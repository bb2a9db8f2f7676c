//! Engine configuration
//!
//! All weights, thresholds, and windows are loaded at process start and
//! validated before any request is served. Configurations that fail
//! validation are rejected at construction, never at use.

use crate::bias::BiasTaxonomy;
use crate::error::EngineError;
use crate::types::RiskFactor;
use serde::{Deserialize, Serialize};

/// Tolerance for the weight-sum check
const WEIGHT_SUM_EPSILON: f64 = 1e-9;

/// Default rolling history window in days
pub const DEFAULT_HISTORY_WINDOW_DAYS: i64 = 30;

/// Default maximum history entries per child
pub const DEFAULT_HISTORY_MAX_ENTRIES: usize = 30;

/// Versioned weight table for the composite risk score.
///
/// Weights must sum to 1.0; the defaults are the calibrated production
/// values, not behavioral guarantees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskWeights {
    pub content_safety: f64,
    pub behavioral_pattern: f64,
    pub temporal_factor: f64,
    pub emotional_indicator: f64,
    pub cumulative_exposure: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            content_safety: 0.30,
            behavioral_pattern: 0.25,
            temporal_factor: 0.20,
            emotional_indicator: 0.15,
            cumulative_exposure: 0.10,
        }
    }
}

impl RiskWeights {
    /// Look up the weight for a factor
    pub fn weight(&self, factor: RiskFactor) -> f64 {
        match factor {
            RiskFactor::ContentSafety => self.content_safety,
            RiskFactor::BehavioralPattern => self.behavioral_pattern,
            RiskFactor::TemporalFactor => self.temporal_factor,
            RiskFactor::EmotionalIndicator => self.emotional_indicator,
            RiskFactor::CumulativeExposure => self.cumulative_exposure,
        }
    }

    fn validate(&self) -> Result<(), EngineError> {
        let all = [
            self.content_safety,
            self.behavioral_pattern,
            self.temporal_factor,
            self.emotional_indicator,
            self.cumulative_exposure,
        ];

        for (factor, w) in RiskFactor::ALL.iter().zip(all) {
            if !w.is_finite() || !(0.0..=1.0).contains(&w) {
                return Err(EngineError::Configuration(format!(
                    "weight for {} must be in [0,1], got {}",
                    factor.as_str(),
                    w
                )));
            }
        }

        let sum: f64 = all.iter().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
            return Err(EngineError::Configuration(format!(
                "risk weights must sum to 1.0, got {}",
                sum
            )));
        }

        Ok(())
    }
}

/// Risk-level band edges. Each edge is a closed lower bound: a score exactly
/// at an edge maps into the higher band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskThresholds {
    /// Scores below this are `low`
    pub medium: f64,
    /// Scores at or above `medium` and below this are `medium`
    pub high: f64,
    /// Scores at or above this are `critical`
    pub critical: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            medium: 0.30,
            high: 0.60,
            critical: 0.85,
        }
    }
}

impl RiskThresholds {
    fn validate(&self) -> Result<(), EngineError> {
        let edges = [self.medium, self.high, self.critical];
        for e in edges {
            if !e.is_finite() || !(0.0..=1.0).contains(&e) {
                return Err(EngineError::Configuration(format!(
                    "risk threshold must be in [0,1], got {}",
                    e
                )));
            }
        }
        if !(self.medium < self.high && self.high < self.critical) {
            return Err(EngineError::Configuration(format!(
                "risk thresholds must be strictly increasing, got {} / {} / {}",
                self.medium, self.high, self.critical
            )));
        }
        Ok(())
    }
}

/// Crisis state machine tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrisisConfig {
    /// Rolling qualification window W, in seconds
    pub window_secs: i64,
    /// Consecutive qualifying signals required to confirm a crisis
    pub required_signals: u32,
    /// Minimum per-signal confidence for a signal to count toward confirmation
    pub min_signal_confidence: f64,
    /// Standalone emotional-risk value that qualifies on its own
    pub emotional_spike_threshold: f64,
}

impl Default for CrisisConfig {
    fn default() -> Self {
        Self {
            window_secs: 600,
            required_signals: 3,
            min_signal_confidence: 0.7,
            emotional_spike_threshold: 0.85,
        }
    }
}

impl CrisisConfig {
    fn validate(&self) -> Result<(), EngineError> {
        if self.window_secs <= 0 {
            return Err(EngineError::Configuration(
                "crisis window must be positive".to_string(),
            ));
        }
        if self.required_signals < 2 {
            // A single noisy reading must never alone confirm a crisis.
            return Err(EngineError::Configuration(
                "crisis confirmation requires at least 2 signals".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_signal_confidence)
            || !(0.0..=1.0).contains(&self.emotional_spike_threshold)
        {
            return Err(EngineError::Configuration(
                "crisis confidence thresholds must be in [0,1]".to_string(),
            ));
        }
        Ok(())
    }
}

/// Behavioral trend tracker tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendConfig {
    /// EWMA smoothing factor alpha in (0,1]
    pub ewma_alpha: f64,
    /// History entries older than this are evicted
    pub window_days: i64,
    /// History is also capped at this many entries
    pub max_entries: usize,
    /// EWMA slope magnitude below which the trend is `stable`
    pub slope_threshold: f64,
    /// Standard deviations above EWMA that flag an anomaly spike
    pub spike_sigma: f64,
    /// History depth at which behavioral confidence reaches 1.0
    pub full_confidence_depth: usize,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            ewma_alpha: 0.3,
            window_days: DEFAULT_HISTORY_WINDOW_DAYS,
            max_entries: DEFAULT_HISTORY_MAX_ENTRIES,
            slope_threshold: 0.05,
            spike_sigma: 2.0,
            full_confidence_depth: 10,
        }
    }
}

impl TrendConfig {
    fn validate(&self) -> Result<(), EngineError> {
        if !(self.ewma_alpha > 0.0 && self.ewma_alpha <= 1.0) {
            return Err(EngineError::Configuration(format!(
                "EWMA alpha must be in (0,1], got {}",
                self.ewma_alpha
            )));
        }
        if self.window_days <= 0 || self.max_entries == 0 {
            return Err(EngineError::Configuration(
                "history window must be non-empty".to_string(),
            ));
        }
        if self.spike_sigma <= 0.0 || self.slope_threshold < 0.0 {
            return Err(EngineError::Configuration(
                "trend thresholds must be positive".to_string(),
            ));
        }
        if self.full_confidence_depth == 0 {
            return Err(EngineError::Configuration(
                "full confidence depth must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Temporal factor tuning.
///
/// Each trigger contributes its load to an exponential saturation curve, so
/// the temporal factor is bounded and can never dominate the composite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalConfig {
    /// Late-night window start hour (local), inclusive
    pub late_night_start_hour: u32,
    /// Late-night window end hour (local), exclusive
    pub late_night_end_hour: u32,
    /// School-hours window start hour (local, weekdays), inclusive
    pub school_start_hour: u32,
    /// School-hours window end hour (local, weekdays), exclusive
    pub school_end_hour: u32,
    /// Same-day minutes on a weekend day above which binge triggers
    pub weekend_binge_baseline_minutes: f64,
    /// Saturation load contributed by late-night usage
    pub late_night_load: f64,
    /// Saturation load contributed by school-hours usage
    pub school_hours_load: f64,
    /// Saturation load contributed by weekend binge
    pub weekend_binge_load: f64,
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            late_night_start_hour: 23,
            late_night_end_hour: 5,
            school_start_hour: 8,
            school_end_hour: 15,
            weekend_binge_baseline_minutes: 240.0,
            late_night_load: 0.9,
            school_hours_load: 0.5,
            weekend_binge_load: 0.7,
        }
    }
}

impl TemporalConfig {
    fn validate(&self) -> Result<(), EngineError> {
        for h in [
            self.late_night_start_hour,
            self.late_night_end_hour,
            self.school_start_hour,
            self.school_end_hour,
        ] {
            if h >= 24 {
                return Err(EngineError::Configuration(format!(
                    "temporal hour must be in 0..24, got {}",
                    h
                )));
            }
        }
        for load in [
            self.late_night_load,
            self.school_hours_load,
            self.weekend_binge_load,
        ] {
            if !load.is_finite() || load < 0.0 {
                return Err(EngineError::Configuration(
                    "temporal loads must be non-negative".to_string(),
                ));
            }
        }
        if self.weekend_binge_baseline_minutes <= 0.0 {
            return Err(EngineError::Configuration(
                "weekend binge baseline must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parent-notification retry budget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Maximum delivery attempts before surfacing an operational alert
    pub max_attempts: u32,
    /// Initial backoff in milliseconds; doubles per attempt
    pub initial_backoff_ms: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 200,
        }
    }
}

impl NotifyConfig {
    fn validate(&self) -> Result<(), EngineError> {
        if self.max_attempts == 0 {
            return Err(EngineError::Configuration(
                "notification retry budget must allow at least one attempt".to_string(),
            ));
        }
        Ok(())
    }
}

/// Complete, versioned engine configuration.
///
/// Immutable after construction; [`EngineConfig::validated`] is the only way
/// to obtain one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Configuration version recorded on every assessment
    pub version: String,
    pub weights: RiskWeights,
    pub thresholds: RiskThresholds,
    pub crisis: CrisisConfig,
    pub trend: TrendConfig,
    pub temporal: TemporalConfig,
    pub notify: NotifyConfig,
    /// Cultural taxonomy and intersectionality matrix for bias analysis
    pub taxonomy: BiasTaxonomy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: "1".to_string(),
            weights: RiskWeights::default(),
            thresholds: RiskThresholds::default(),
            crisis: CrisisConfig::default(),
            trend: TrendConfig::default(),
            temporal: TemporalConfig::default(),
            notify: NotifyConfig::default(),
            taxonomy: BiasTaxonomy::default(),
        }
    }
}

impl EngineConfig {
    /// Validate every section, failing fast on the first violation
    pub fn validate(&self) -> Result<(), EngineError> {
        self.weights.validate()?;
        self.thresholds.validate()?;
        self.crisis.validate()?;
        self.trend.validate()?;
        self.temporal.validate()?;
        self.notify.validate()?;
        self.taxonomy.validate()?;
        Ok(())
    }

    /// Validate and return the configuration, consuming it
    pub fn validated(self) -> Result<Self, EngineError> {
        self.validate()?;
        Ok(self)
    }

    /// Load and validate a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validated()
    }
}
