//! Behavioral trend tracking
//!
//! Maintains a bounded, time-ordered history of past composite scores per
//! child plus an EWMA baseline. Each new event is interpreted relative to
//! that baseline: the behavioral-pattern risk feature blends the event's
//! clamped z-score against the trailing window with the sign of the EWMA
//! slope, and anomaly spikes are flagged separately from gradual decline
//! because they warrant different recommendation language.

use crate::config::TrendConfig;
use crate::types::{FeatureSample, TrendClass};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// z-score magnitude mapped to the edge of the behavioral-risk scale
const Z_SCALE: f64 = 3.0;

/// Blend weights between deviation and slope terms
const DEVIATION_WEIGHT: f64 = 0.7;
const SLOPE_WEIGHT: f64 = 0.3;

/// Minimum samples before a trend classification is attempted
const MIN_TREND_SAMPLES: usize = 3;

/// One historical composite score
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreSample {
    pub score: f64,
    pub at: DateTime<Utc>,
}

/// What the tracker observed about one incoming event
#[derive(Debug, Clone)]
pub struct BehaviorObservation {
    /// Behavioral-pattern risk feature for the composite scorer
    pub risk: FeatureSample,
    pub trend: TrendClass,
    /// New value more than `spike_sigma` standard deviations above the EWMA
    pub anomaly_spike: bool,
    /// Current EWMA baseline, when established
    pub ewma: Option<f64>,
    /// Trailing-window standard deviation, when established
    pub std_dev: Option<f64>,
}

/// Rolling per-child trend tracker.
///
/// Single-writer: callers must serialize access per child (the engine's
/// child-state store enforces this).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendTracker {
    history: VecDeque<ScoreSample>,
    ewma: Option<f64>,
    /// EWMA value before the most recent record, for slope estimation
    prev_ewma: Option<f64>,
}

impl Default for TrendTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl TrendTracker {
    pub fn new() -> Self {
        Self {
            history: VecDeque::new(),
            ewma: None,
            prev_ewma: None,
        }
    }

    /// Number of samples currently in the window
    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Interpret a new event's behavioral-delta feature against the baseline.
    ///
    /// Read-only: the history is updated afterwards via [`TrendTracker::record`]
    /// once the composite score for this event is known.
    pub fn observe(&self, behavioral_delta: f64, config: &TrendConfig) -> BehaviorObservation {
        let delta = behavioral_delta.clamp(0.0, 1.0);
        let std_dev = self.window_std_dev();

        let (risk_value, anomaly_spike) = match (self.ewma, std_dev) {
            (Some(ewma), Some(sigma)) if sigma > f64::EPSILON => {
                let z = (delta - ewma) / sigma;
                let deviation_term = ((z / Z_SCALE).clamp(-1.0, 1.0) + 1.0) / 2.0;
                let slope_term = ((self.slope() / config.slope_threshold).clamp(-1.0, 1.0) + 1.0) / 2.0;
                let risk = DEVIATION_WEIGHT * deviation_term + SLOPE_WEIGHT * slope_term;
                let spike = z > config.spike_sigma;
                (risk.clamp(0.0, 1.0), spike)
            }
            // No usable baseline yet: the raw delta stands alone
            _ => (delta, false),
        };

        let confidence = self.confidence(config);

        BehaviorObservation {
            risk: FeatureSample::new(risk_value, confidence),
            trend: self.classify_trend(config),
            anomaly_spike,
            ewma: self.ewma,
            std_dev,
        }
    }

    /// Append the event's final composite score and evict expired entries.
    ///
    /// History stays monotonically time-ordered; out-of-order timestamps are
    /// clamped forward to the newest entry rather than breaking the invariant.
    pub fn record(&mut self, composite_score: f64, at: DateTime<Utc>, config: &TrendConfig) {
        let at = match self.history.back() {
            Some(last) if at < last.at => last.at,
            _ => at,
        };

        self.prev_ewma = self.ewma;
        self.ewma = Some(match self.ewma {
            Some(prev) => config.ewma_alpha * composite_score + (1.0 - config.ewma_alpha) * prev,
            None => composite_score,
        });

        self.history.push_back(ScoreSample {
            score: composite_score,
            at,
        });

        self.evict(at, config);
    }

    /// Evict entries beyond the count cap or older than the time window
    fn evict(&mut self, now: DateTime<Utc>, config: &TrendConfig) {
        while self.history.len() > config.max_entries {
            self.history.pop_front();
        }
        let cutoff = now - Duration::days(config.window_days);
        while self
            .history
            .front()
            .map(|s| s.at < cutoff)
            .unwrap_or(false)
        {
            self.history.pop_front();
        }
    }

    /// EWMA slope: change introduced by the most recent record
    fn slope(&self) -> f64 {
        match (self.ewma, self.prev_ewma) {
            (Some(current), Some(prev)) => current - prev,
            _ => 0.0,
        }
    }

    /// Classify the trend from the EWMA slope.
    ///
    /// A rising composite baseline means risk is worsening (`Declining`
    /// behavior); a falling one means `Improving`.
    fn classify_trend(&self, config: &TrendConfig) -> TrendClass {
        if self.history.len() < MIN_TREND_SAMPLES {
            return TrendClass::InsufficientData;
        }
        let slope = self.slope();
        if slope > config.slope_threshold {
            TrendClass::Declining
        } else if slope < -config.slope_threshold {
            TrendClass::Improving
        } else {
            TrendClass::Stable
        }
    }

    /// Behavioral confidence ramps with history depth
    fn confidence(&self, config: &TrendConfig) -> f64 {
        let depth_ratio = self.history.len() as f64 / config.full_confidence_depth as f64;
        depth_ratio.clamp(0.5, 1.0)
    }

    fn window_std_dev(&self) -> Option<f64> {
        let n = self.history.len();
        if n < 2 {
            return None;
        }
        let mean: f64 = self.history.iter().map(|s| s.score).sum::<f64>() / n as f64;
        let variance: f64 = self
            .history
            .iter()
            .map(|s| (s.score - mean).powi(2))
            .sum::<f64>()
            / n as f64;
        Some(variance.sqrt())
    }

    /// Load tracker state from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize tracker state to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
