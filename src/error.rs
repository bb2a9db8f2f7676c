//! Error types for the guardian scoring core

use thiserror::Error;

/// Errors that can occur during risk assessment and bias analysis.
///
/// Missing numeric signals are NOT errors: they degrade to the normalizer's
/// neutral-default path and are recorded on the snapshot as substitutions.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A structurally required field (child id, event id, timestamp) is absent.
    /// The request is rejected and no partial record is persisted.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Weights, thresholds, or other startup configuration are invalid.
    /// Fatal: the engine must not serve requests with an invalid configuration.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// An upstream signal provider exceeded its deadline.
    /// Retried once, then the feature degrades to a neutral default.
    #[error("Upstream provider timed out: {0}")]
    UpstreamTimeout(String),

    /// Parent notification could not be delivered within the retry budget.
    /// Surfaced as an operational alert, never discarded.
    #[error("Notification delivery failed after {attempts} attempts: {reason}")]
    NotificationDelivery { attempts: u32, reason: String },

    /// Referenced intervention log entry does not exist.
    #[error("Unknown intervention: {0}")]
    UnknownIntervention(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
