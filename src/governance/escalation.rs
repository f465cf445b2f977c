//! Background escalation and expiry sweeper.
//!
//! A pending request carries the escalation ladder captured from its
//! policy: level *k* activates `offset_minutes` after creation and hands
//! the request to a new approver set. The sweeper advances levels
//! monotonically and notifies approvers through the
//! [`EscalationNotifier`] seam; a sweep that fires after a terminal
//! transition is a no-op and never reverts state.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::EscalationConfig;
use crate::policy::EscalationLevel;

use super::request::ApprovalRequest;
use super::store::ApprovalStore;

// ============================================================================
// Notifier Seam
// ============================================================================

/// Notification delivery failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// The destination rejected or never received the notification.
    #[error("notification delivery failed: {details}")]
    DeliveryFailed {
        /// Transport-specific failure description
        details: String,
    },
}

/// Delivery adapter for escalation notifications (chat, email, pager).
///
/// Implementations must be cheap to call repeatedly: the sweeper retries
/// on its next pass if delivery fails.
#[async_trait]
pub trait EscalationNotifier: Send + Sync {
    /// Notify the level's approver set about a pending request.
    async fn notify(
        &self,
        request: &ApprovalRequest,
        level: &EscalationLevel,
    ) -> Result<(), NotifyError>;

    /// Adapter name for logs.
    fn name(&self) -> &str;
}

/// Default adapter: records the escalation in the log stream only.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl EscalationNotifier for LogNotifier {
    async fn notify(
        &self,
        request: &ApprovalRequest,
        level: &EscalationLevel,
    ) -> Result<(), NotifyError> {
        let approvers: Vec<&str> = level.approvers.iter().map(|a| a.id.as_str()).collect();
        info!(
            request_id = %request.id,
            offset_minutes = level.offset_minutes,
            approvers = ?approvers,
            message = level.message.as_deref().unwrap_or(""),
            "escalation notification"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

// ============================================================================
// Scheduler
// ============================================================================

/// Periodic sweeper advancing escalation levels and reconciling expired
/// requests.
pub struct EscalationScheduler {
    store: Arc<ApprovalStore>,
    notifier: Arc<dyn EscalationNotifier>,
    config: EscalationConfig,
    shutdown: CancellationToken,
}

impl EscalationScheduler {
    #[must_use]
    pub fn new(
        store: Arc<ApprovalStore>,
        notifier: Arc<dyn EscalationNotifier>,
        config: EscalationConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store,
            notifier,
            config,
            shutdown,
        }
    }

    /// Run until the shutdown token is cancelled.
    ///
    /// The sweep cadence comes from tokio's monotonic timer, so wall-clock
    /// adjustments cannot stall the loop; missed ticks are skipped rather
    /// than replayed in a burst.
    pub async fn run(&self) {
        info!(adapter = %self.notifier.name(), "escalation scheduler started");

        let mut interval = tokio::time::interval(self.config.sweep_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    info!("escalation scheduler shutting down");
                    break;
                }

                _ = interval.tick() => {
                    self.sweep_once().await;
                }
            }
        }

        // Final reconciliation pass so shutdown leaves no overdue pendings.
        let reconciled = self.store.reconcile_expired(Utc::now());
        if !reconciled.is_empty() {
            info!(count = reconciled.len(), "expired requests reconciled during shutdown");
        }
    }

    /// One sweep: advance due escalations, then reconcile expiry.
    ///
    /// Exposed so tests and callers can drive the schedule directly
    /// without the background loop.
    pub async fn sweep_once(&self) {
        let now = Utc::now();

        for request in self.store.pending() {
            if request.escalations.is_empty() {
                continue;
            }

            let elapsed_minutes = (now - request.created_at).num_minutes().max(0) as u64;
            let due_level = request
                .escalations
                .iter()
                .take_while(|level| u64::from(level.offset_minutes) <= elapsed_minutes)
                .count() as u32;

            if due_level <= request.escalation_level {
                continue;
            }

            // advance_escalation re-checks status under the entry lock, so
            // a request decided since the snapshot stays untouched.
            match self.store.advance_escalation(&request.id, due_level) {
                Ok(Some(advanced)) => {
                    let level = &advanced.escalations[(due_level - 1) as usize];
                    debug!(
                        request_id = %advanced.id,
                        level = due_level,
                        "escalation level reached"
                    );
                    if let Err(err) = self.notifier.notify(&advanced, level).await {
                        // Retried on the next sweep; the level advance stands.
                        warn!(
                            request_id = %advanced.id,
                            error = %err,
                            "escalation notification failed"
                        );
                    }
                }
                Ok(None) => {}
                Err(err) => warn!(request_id = %request.id, error = %err, "escalation advance failed"),
            }
        }

        let reconciled = self.store.reconcile_expired(now);
        if !reconciled.is_empty() {
            info!(count = reconciled.len(), "expired requests reconciled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{Approver, ProposedAction, RiskLevel};
    use crate::governance::request::ApprovalStatus;
    use chrono::Duration as ChronoDuration;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingNotifier {
        delivered: AtomicUsize,
    }

    #[async_trait]
    impl EscalationNotifier for CountingNotifier {
        async fn notify(
            &self,
            _request: &ApprovalRequest,
            _level: &EscalationLevel,
        ) -> Result<(), NotifyError> {
            self.delivered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn ladder() -> Vec<EscalationLevel> {
        vec![
            EscalationLevel {
                offset_minutes: 0,
                approvers: vec![Approver::user("lead")],
                message: Some("first escalation".into()),
            },
            EscalationLevel {
                offset_minutes: 60,
                approvers: vec![Approver::user("director")],
                message: None,
            },
        ]
    }

    fn scheduler(store: Arc<ApprovalStore>) -> (EscalationScheduler, Arc<CountingNotifier>) {
        let notifier = Arc::new(CountingNotifier {
            delivered: AtomicUsize::new(0),
        });
        let scheduler = EscalationScheduler::new(
            store,
            notifier.clone(),
            EscalationConfig::default(),
            CancellationToken::new(),
        );
        (scheduler, notifier)
    }

    fn pending_with_ladder(store: &ApprovalStore) -> Arc<ApprovalRequest> {
        store
            .insert(ApprovalRequest::new(
                ProposedAction::new("deploy", "cog-1"),
                "policy-1",
                RiskLevel::High,
                vec![Approver::user("lead")],
                ladder(),
                None,
            ))
            .unwrap()
    }

    #[tokio::test]
    async fn sweep_advances_due_level_and_notifies() {
        let store = Arc::new(ApprovalStore::new(100));
        let request = pending_with_ladder(&store);
        let (scheduler, notifier) = scheduler(store.clone());

        // Level 1 has offset 0, so the first sweep reaches it.
        scheduler.sweep_once().await;
        assert_eq!(store.get(&request.id).unwrap().escalation_level, 1);
        assert_eq!(notifier.delivered.load(Ordering::SeqCst), 1);

        // Sweeping again is monotonic: no re-advance, no duplicate notify.
        scheduler.sweep_once().await;
        assert_eq!(store.get(&request.id).unwrap().escalation_level, 1);
        assert_eq!(notifier.delivered.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn sweep_is_noop_after_terminal_transition() {
        let store = Arc::new(ApprovalStore::new(100));
        let request = pending_with_ladder(&store);
        store
            .transition_if(
                &request.id,
                ApprovalStatus::Pending,
                ApprovalStatus::Approved,
                None,
                None,
                None,
            )
            .unwrap();

        let (scheduler, notifier) = scheduler(store.clone());
        scheduler.sweep_once().await;

        let after = store.get(&request.id).unwrap();
        assert_eq!(after.status, ApprovalStatus::Approved);
        assert_eq!(after.escalation_level, 0);
        assert_eq!(notifier.delivered.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn sweep_reconciles_expired_requests() {
        let store = Arc::new(ApprovalStore::new(100));
        let request = store
            .insert(ApprovalRequest::new(
                ProposedAction::new("deploy", "cog-1"),
                "policy-1",
                RiskLevel::Low,
                vec![],
                vec![],
                Some(Utc::now() - ChronoDuration::seconds(5)),
            ))
            .unwrap();

        let (scheduler, _) = scheduler(store.clone());
        scheduler.sweep_once().await;
        assert_eq!(
            store.get(&request.id).unwrap().status,
            ApprovalStatus::Rejected
        );
    }

    #[tokio::test]
    async fn run_stops_on_cancellation() {
        let store = Arc::new(ApprovalStore::new(100));
        let shutdown = CancellationToken::new();
        let scheduler = EscalationScheduler::new(
            store,
            Arc::new(LogNotifier),
            EscalationConfig {
                sweep_interval: std::time::Duration::from_millis(10),
            },
            shutdown.clone(),
        );

        let handle = tokio::spawn(async move { scheduler.run().await });
        shutdown.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .expect("scheduler should stop promptly")
            .expect("scheduler task should not panic");
    }
}
