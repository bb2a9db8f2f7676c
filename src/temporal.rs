//! Temporal factor analysis
//!
//! Derives a time-context risk feature from the event timestamp in the
//! child's local time zone. Each triggered pattern (late-night usage,
//! weekday school hours, weekend binge) contributes a configured load to an
//! exponential saturation curve, so the output is bounded in [0,1) and can
//! never dominate the composite score.

use crate::config::TemporalConfig;
use crate::types::{ChildContext, RawSignalBundle};
use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc, Weekday};

/// Which temporal patterns an event triggered, for the audit trail
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemporalFindings {
    pub late_night: bool,
    pub school_hours: bool,
    pub weekend_binge: bool,
    /// Saturated risk value in [0,1)
    pub risk: f64,
}

impl TemporalFindings {
    /// Evidence strings describing each triggered pattern
    pub fn evidence(&self) -> Vec<String> {
        let mut notes = Vec::new();
        if self.late_night {
            notes.push("Late-night usage window".to_string());
        }
        if self.school_hours {
            notes.push("Usage during weekday school hours".to_string());
        }
        if self.weekend_binge {
            notes.push("Weekend session length above binge baseline".to_string());
        }
        notes
    }
}

/// Analyzer deriving the temporal risk feature from an event timestamp
pub struct TemporalAnalyzer;

impl TemporalAnalyzer {
    /// Analyze an event against the child's local clock.
    ///
    /// Pure function of the event and configuration: identical inputs always
    /// produce identical findings.
    pub fn analyze(
        raw: &RawSignalBundle,
        child: &ChildContext,
        config: &TemporalConfig,
    ) -> TemporalFindings {
        let local = to_local(raw.timestamp, child.utc_offset_minutes);
        let hour = local.hour();
        let weekday = local.weekday();
        let is_weekend = matches!(weekday, Weekday::Sat | Weekday::Sun);

        let late_night = in_wrapping_window(hour, config.late_night_start_hour, config.late_night_end_hour);

        let school_hours = child.school_hours_monitoring
            && !is_weekend
            && in_wrapping_window(hour, config.school_start_hour, config.school_end_hour);

        let weekend_binge = is_weekend
            && raw
                .same_day_session_minutes
                .map(|m| m > config.weekend_binge_baseline_minutes)
                .unwrap_or(false);

        let mut load = 0.0;
        if late_night {
            load += config.late_night_load;
        }
        if school_hours {
            load += config.school_hours_load;
        }
        if weekend_binge {
            load += config.weekend_binge_load;
        }

        TemporalFindings {
            late_night,
            school_hours,
            weekend_binge,
            risk: saturate(load),
        }
    }
}

/// Convert a UTC timestamp to the child's local clock
fn to_local(timestamp: DateTime<Utc>, utc_offset_minutes: i32) -> DateTime<FixedOffset> {
    // Out-of-range offsets fall back to UTC rather than failing the event;
    // a wrong offset only perturbs the bounded temporal factor.
    let offset = FixedOffset::east_opt(utc_offset_minutes * 60)
        .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"));
    timestamp.with_timezone(&offset)
}

/// Hour-range membership where the window may wrap midnight (e.g., 23..5)
fn in_wrapping_window(hour: u32, start: u32, end: u32) -> bool {
    if start <= end {
        hour >= start && hour < end
    } else {
        hour >= start || hour < end
    }
}

/// Exponential saturation: maps non-negative load to [0,1)
fn saturate(load: f64) -> f64 {
    (1.0 - (-load).exp()).clamp(0.0, 1.0)
}
