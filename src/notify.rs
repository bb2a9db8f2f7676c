//! Parent notification dispatch
//!
//! The escalation side effect is an explicit outbound task with retry and
//! backoff, plus an audit record of every delivery attempt. Exhausting the
//! retry budget surfaces an operational alert; child-safety notifications
//! are the one place where failing silently is explicitly disallowed.

use crate::config::NotifyConfig;
use crate::error::EngineError;
use crate::types::{RiskLevel, TriggerType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, info};
use uuid::Uuid;

/// Payload handed to the external parent-notification collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrisisNotification {
    pub intervention_id: Uuid,
    pub child_id: String,
    pub trigger_type: TriggerType,
    pub escalation_level: RiskLevel,
    pub at: DateTime<Utc>,
}

/// External parent-notification channel.
///
/// Implementations deliver one notification attempt; transient failures
/// return an error and the dispatcher retries with backoff.
pub trait ParentNotifier: Send + Sync {
    fn deliver(&self, notification: &CrisisNotification) -> Result<(), String>;
}

/// Audit record of one delivery attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    pub intervention_id: Uuid,
    /// 1-based attempt number
    pub attempt: u32,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub at: DateTime<Utc>,
}

/// Retrying dispatcher wrapping a [`ParentNotifier`].
///
/// Backoff doubles per attempt from the configured initial delay. The sleep
/// function is injectable so tests run without real waits.
pub struct NotificationDispatcher {
    notifier: Arc<dyn ParentNotifier>,
    config: NotifyConfig,
    attempts: Mutex<Vec<DeliveryAttempt>>,
    sleep: fn(Duration),
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn ParentNotifier>, config: NotifyConfig) -> Self {
        Self {
            notifier,
            config,
            attempts: Mutex::new(Vec::new()),
            sleep: std::thread::sleep,
        }
    }

    /// Build a dispatcher that does not actually sleep between retries
    #[cfg(test)]
    pub fn without_backoff(notifier: Arc<dyn ParentNotifier>, config: NotifyConfig) -> Self {
        Self {
            notifier,
            config,
            attempts: Mutex::new(Vec::new()),
            sleep: |_| {},
        }
    }

    /// Deliver with retry and backoff until acknowledged or the budget is
    /// exhausted. Exhaustion raises the operational alert and returns the
    /// failure to the caller; it is never swallowed.
    pub fn dispatch(&self, notification: &CrisisNotification) -> Result<(), EngineError> {
        let mut backoff = Duration::from_millis(self.config.initial_backoff_ms);
        let mut last_error = String::new();

        for attempt in 1..=self.config.max_attempts {
            let outcome = self.notifier.deliver(notification);
            let success = outcome.is_ok();

            self.attempts.lock().expect("attempt log poisoned").push(DeliveryAttempt {
                intervention_id: notification.intervention_id,
                attempt,
                success,
                error: outcome.as_ref().err().cloned(),
                at: Utc::now(),
            });

            match outcome {
                Ok(()) => {
                    info!(
                        intervention_id = %notification.intervention_id,
                        attempt,
                        "parent notification delivered"
                    );
                    return Ok(());
                }
                Err(reason) => {
                    last_error = reason;
                    if attempt < self.config.max_attempts {
                        (self.sleep)(backoff);
                        backoff *= 2;
                    }
                }
            }
        }

        // Operational alert: retry budget exhausted on a child-safety path
        error!(
            intervention_id = %notification.intervention_id,
            child_id = %notification.child_id,
            attempts = self.config.max_attempts,
            reason = %last_error,
            "parent notification delivery exhausted retry budget"
        );

        Err(EngineError::NotificationDelivery {
            attempts: self.config.max_attempts,
            reason: last_error,
        })
    }

    /// Snapshot of the delivery-attempt audit trail
    pub fn attempts(&self) -> Vec<DeliveryAttempt> {
        self.attempts.lock().expect("attempt log poisoned").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Notifier that fails a fixed number of times before succeeding
    struct FlakyNotifier {
        failures_before_success: u32,
        calls: AtomicU32,
    }

    impl FlakyNotifier {
        fn new(failures_before_success: u32) -> Self {
            Self {
                failures_before_success,
                calls: AtomicU32::new(0),
            }
        }
    }

    impl ParentNotifier for FlakyNotifier {
        fn deliver(&self, _notification: &CrisisNotification) -> Result<(), String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                Err("connection refused".to_string())
            } else {
                Ok(())
            }
        }
    }

    fn make_notification() -> CrisisNotification {
        CrisisNotification {
            intervention_id: Uuid::new_v4(),
            child_id: "c1".to_string(),
            trigger_type: TriggerType::EmotionalSpike,
            escalation_level: RiskLevel::High,
            at: Utc::now(),
        }
    }

    #[test]
    fn test_first_attempt_success() {
        let dispatcher = NotificationDispatcher::without_backoff(
            Arc::new(FlakyNotifier::new(0)),
            NotifyConfig::default(),
        );

        assert!(dispatcher.dispatch(&make_notification()).is_ok());
        let attempts = dispatcher.attempts();
        assert_eq!(attempts.len(), 1);
        assert!(attempts[0].success);
    }

    #[test]
    fn test_retries_until_success() {
        let dispatcher = NotificationDispatcher::without_backoff(
            Arc::new(FlakyNotifier::new(2)),
            NotifyConfig::default(),
        );

        assert!(dispatcher.dispatch(&make_notification()).is_ok());
        let attempts = dispatcher.attempts();
        assert_eq!(attempts.len(), 3);
        assert!(!attempts[0].success);
        assert!(!attempts[1].success);
        assert!(attempts[2].success);
        assert_eq!(attempts[1].attempt, 2);
    }

    #[test]
    fn test_exhaustion_surfaces_failure() {
        let config = NotifyConfig {
            max_attempts: 3,
            initial_backoff_ms: 1,
        };
        let dispatcher =
            NotificationDispatcher::without_backoff(Arc::new(FlakyNotifier::new(10)), config);

        let err = dispatcher.dispatch(&make_notification()).unwrap_err();
        match err {
            EngineError::NotificationDelivery { attempts, reason } => {
                assert_eq!(attempts, 3);
                assert_eq!(reason, "connection refused");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(dispatcher.attempts().len(), 3);
    }

    #[test]
    fn test_attempt_trail_records_errors() {
        let config = NotifyConfig {
            max_attempts: 2,
            initial_backoff_ms: 1,
        };
        let dispatcher =
            NotificationDispatcher::without_backoff(Arc::new(FlakyNotifier::new(10)), config);
        let notification = make_notification();
        let _ = dispatcher.dispatch(&notification);

        for attempt in dispatcher.attempts() {
            assert_eq!(attempt.intervention_id, notification.intervention_id);
            assert_eq!(attempt.error.as_deref(), Some("connection refused"));
        }
    }
}
