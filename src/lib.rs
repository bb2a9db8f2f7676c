//! Guardian Core - Deterministic risk-scoring engine for child digital safety
//!
//! Guardian transforms per-event safety signals into auditable risk
//! assessments through a deterministic pipeline: signal normalization →
//! temporal analysis → behavioral trend tracking → weighted composite
//! scoring → crisis escalation.
//!
//! ## Modules
//!
//! - **Scoring Pipeline**: Normalize raw signal bundles and produce composite
//!   risk assessments with per-factor evidence
//! - **Bias Analysis**: Intersectionality-weighted cultural representation
//!   scoring for content items
//! - **Crisis Handling**: Per-child escalation state machine, intervention
//!   logging and parent notification with retry

pub mod bias;
pub mod config;
pub mod crisis;
pub mod engine;
pub mod error;
pub mod normalizer;
pub mod notify;
pub mod provider;
pub mod recommend;
pub mod scorer;
pub mod store;
pub mod temporal;
pub mod trend;
pub mod types;

pub use config::EngineConfig;
pub use engine::{RiskEngine, SignalProviders};
pub use error::EngineError;

// Scoring exports
pub use scorer::{CompositeScorer, ScoreOutcome};
pub use types::{
    ChildContext, CrisisState, CulturalBiasAnalysis, RawSignalBundle, RiskAssessment, RiskLevel,
};

// Crisis exports
pub use crisis::CrisisMachine;
pub use notify::{CrisisNotification, ParentNotifier};

/// Engine version stamped into every assessment
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for exported records
pub const PRODUCER_NAME: &str = "guardian-core";
