//! External signal providers
//!
//! Seam for the upstream content-safety and emotional-indicator analyzers.
//! An implementation is handed a deadline and must return within it; a
//! timeout is retried exactly once, after which the feature degrades to the
//! normalizer's neutral-default path instead of blocking the assessment.

use crate::error::EngineError;
use crate::types::RawFeature;
use std::time::Duration;
use tracing::warn;

/// Upstream analyzer producing one raw feature per event
pub trait SignalProvider {
    /// Human-readable provider name for degradation audit logs
    fn name(&self) -> &str;

    /// Fetch the feature for an event within the deadline.
    ///
    /// Implementations return [`EngineError::UpstreamTimeout`] when the
    /// deadline cannot be met.
    fn fetch(
        &self,
        child_id: &str,
        event_id: &str,
        deadline: Duration,
    ) -> Result<RawFeature, EngineError>;
}

/// What became of a provider fetch after the retry policy ran
#[derive(Debug, Clone, Copy)]
pub enum FetchOutcome {
    Fetched(RawFeature),
    /// Deadline exceeded on the initial call and the single retry; the
    /// feature degrades with an upstream-timeout audit record
    TimedOut,
    /// Non-timeout provider failure; the feature degrades as missing
    Unavailable,
}

/// Fetch with a single retry on timeout, degrading instead of failing.
///
/// Degraded outcomes feed the normalizer's neutral-default path: neutral
/// value with a confidence penalty, never a blocked or failed assessment.
pub fn fetch_or_degrade(
    provider: &dyn SignalProvider,
    child_id: &str,
    event_id: &str,
    deadline: Duration,
) -> FetchOutcome {
    for attempt in 1..=2u32 {
        match provider.fetch(child_id, event_id, deadline) {
            Ok(feature) => return FetchOutcome::Fetched(feature),
            Err(EngineError::UpstreamTimeout(reason)) => {
                warn!(
                    provider = provider.name(),
                    event_id,
                    attempt,
                    %reason,
                    "signal provider timed out"
                );
            }
            Err(other) => {
                warn!(
                    provider = provider.name(),
                    event_id,
                    error = %other,
                    "signal provider failed, degrading to neutral default"
                );
                return FetchOutcome::Unavailable;
            }
        }
    }
    FetchOutcome::TimedOut
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct TimeoutThenOk {
        timeouts: u32,
        calls: AtomicU32,
    }

    impl SignalProvider for TimeoutThenOk {
        fn name(&self) -> &str {
            "test-provider"
        }

        fn fetch(
            &self,
            _child_id: &str,
            _event_id: &str,
            _deadline: Duration,
        ) -> Result<RawFeature, EngineError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.timeouts {
                Err(EngineError::UpstreamTimeout("deadline exceeded".to_string()))
            } else {
                Ok(RawFeature::with_confidence(0.4, 0.9))
            }
        }
    }

    #[test]
    fn test_success_passes_through() {
        let provider = TimeoutThenOk {
            timeouts: 0,
            calls: AtomicU32::new(0),
        };
        match fetch_or_degrade(&provider, "c1", "e1", Duration::from_millis(50)) {
            FetchOutcome::Fetched(feature) => assert!((feature.value - 0.4).abs() < 1e-9),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_single_timeout_is_retried() {
        let provider = TimeoutThenOk {
            timeouts: 1,
            calls: AtomicU32::new(0),
        };
        assert!(matches!(
            fetch_or_degrade(&provider, "c1", "e1", Duration::from_millis(50)),
            FetchOutcome::Fetched(_)
        ));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_second_timeout_degrades_as_timeout() {
        let provider = TimeoutThenOk {
            timeouts: 2,
            calls: AtomicU32::new(0),
        };
        assert!(matches!(
            fetch_or_degrade(&provider, "c1", "e1", Duration::from_millis(50)),
            FetchOutcome::TimedOut
        ));
        // Exactly one retry, never more
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    struct AlwaysBroken;

    impl SignalProvider for AlwaysBroken {
        fn name(&self) -> &str {
            "broken"
        }

        fn fetch(
            &self,
            _child_id: &str,
            _event_id: &str,
            _deadline: Duration,
        ) -> Result<RawFeature, EngineError> {
            Err(EngineError::InvalidInput("bad provider".to_string()))
        }
    }

    #[test]
    fn test_non_timeout_error_degrades_without_retry() {
        assert!(matches!(
            fetch_or_degrade(&AlwaysBroken, "c1", "e1", Duration::from_millis(50)),
            FetchOutcome::Unavailable
        ));
    }
}
