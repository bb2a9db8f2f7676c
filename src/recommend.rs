//! Intervention recommendation generation
//!
//! A deterministic lookup from `(risk level, dominant factor, bias findings
//! present, age band)` to an ordered list of recommendation strings. Pure:
//! no external services, no side effects, identical inputs always produce
//! identical text.

use crate::types::{AgeBand, RiskFactor, RiskLevel};

/// Produce the ordered recommendation list for an assessment.
///
/// Order: risk-level actions first, then a dominant-factor action, then a
/// bias note when bias findings accompany the assessment, then two
/// age-appropriate base activities.
pub fn recommendations(
    level: RiskLevel,
    dominant: RiskFactor,
    bias_findings: bool,
    age_band: AgeBand,
) -> Vec<String> {
    let mut out = Vec::new();

    out.extend(level_actions(level).iter().map(|s| s.to_string()));
    out.push(factor_action(level, dominant).to_string());
    if bias_findings {
        out.push(
            "Review flagged content together and discuss the perspectives it leaves out"
                .to_string(),
        );
    }
    out.extend(age_actions(age_band).iter().take(2).map(|s| s.to_string()));

    out
}

fn level_actions(level: RiskLevel) -> &'static [&'static str] {
    match level {
        RiskLevel::Critical => &[
            "Notify parent or guardian immediately",
            "Pause the current session and suggest an activity change",
            "Consider professional consultation if emotional distress persists",
        ],
        RiskLevel::High => &[
            "Schedule a parent-child conversation about recent activity within 24 hours",
            "Apply temporary content restrictions",
        ],
        RiskLevel::Medium => &[
            "Encourage more diverse content choices",
            "Set a time limit for the current session",
        ],
        RiskLevel::Low => &["Keep regular check-ins about online activity"],
    }
}

fn factor_action(level: RiskLevel, dominant: RiskFactor) -> &'static str {
    match dominant {
        RiskFactor::ContentSafety => match level {
            RiskLevel::Critical | RiskLevel::High => {
                "Switch to age-appropriate or educational content now"
            }
            _ => "Review recent content choices together",
        },
        RiskFactor::BehavioralPattern => match level {
            RiskLevel::Critical | RiskLevel::High => {
                "Interrupt the current usage pattern with an offline break"
            }
            _ => "Watch for changes in usage patterns over the coming days",
        },
        RiskFactor::TemporalFactor => {
            "Adjust device schedules to keep usage out of late-night and school hours"
        }
        RiskFactor::EmotionalIndicator => match level {
            RiskLevel::Critical | RiskLevel::High => {
                "Check in directly about how the child is feeling"
            }
            _ => "Keep an eye on mood around screen-time sessions",
        },
        RiskFactor::CumulativeExposure => "Plan screen-free blocks to reduce total weekly exposure",
    }
}

fn age_actions(age_band: AgeBand) -> &'static [&'static str] {
    match age_band {
        AgeBand::EarlyChildhood => &[
            "Take a 15-minute break for physical activity",
            "Try a creative offline activity like drawing or building",
            "Read a book together with a parent",
        ],
        AgeBand::MiddleChildhood => &[
            "Take a 20-minute break to help with a household task",
            "Try a hands-on learning activity or experiment",
            "Go outside for fresh air and movement",
        ],
        AgeBand::Adolescence | AgeBand::LateAdolescence => &[
            "Take a 30-minute break for homework or reading",
            "Engage in a physical activity or sport",
            "Try a creative project or hobby",
        ],
    }
}
