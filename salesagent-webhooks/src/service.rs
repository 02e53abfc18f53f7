//! The delivery notifier and the service trait adapters depend on
//!
//! Adapters receive an `Arc<dyn NotificationService>` at construction
//! instead of reaching for a process-wide instance. The host owns the
//! concrete [`DeliveryNotifier`] and drives its shutdown reporting.

use std::{sync::Arc, thread};

use chrono::{DateTime, Utc};
use salesagent_common::{audit::AuditLog, internal};
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::error;

use crate::{
    aggregator,
    config::NotifierConfig,
    directory::ReceiverDirectory,
    error::ConfigError,
    executor::{DeliveryExecutor, DeliveryOutcome},
    lifecycle::ShutdownReporter,
    payload::{DeliveryReport, build_envelope, build_payload},
    sequence::SequenceStore,
};

/// Delivery notification operations used by ad server adapters
///
/// # Example
///
/// ```rust,ignore
/// fn report_progress(notifier: &dyn NotificationService, report: &DeliveryReport) {
///     if !notifier.send_delivery_notification(report) {
///         // reporting continues; failures are visible via failure_count
///     }
/// }
/// ```
pub trait NotificationService: Send + Sync {
    /// Notify every active receiver about `report`.
    ///
    /// Returns `true` if at least one receiver accepted the notification.
    /// Blocks the calling thread while receivers are tried; see
    /// [`NotifierConfig::blocking_budget`].
    ///
    /// Safe to call from plain threads and from tokio tasks. On a
    /// current-thread runtime the whole runtime is held while receivers are
    /// tried, so prefer `spawn_blocking` there.
    fn send_delivery_notification(&self, report: &DeliveryReport) -> bool;

    /// Consecutive notifications for `media_buy_id` that reached no receiver
    fn failure_count(&self, media_buy_id: &str) -> u64;

    /// When a receiver last accepted a notification for `media_buy_id`
    fn last_success(&self, media_buy_id: &str) -> Option<DateTime<Utc>>;

    /// Drop all state for a finished or cancelled media buy
    fn reset(&self, media_buy_id: &str);
}

/// Webhook delivery notifier
pub struct DeliveryNotifier {
    store: Arc<SequenceStore>,
    directory: Arc<dyn ReceiverDirectory>,
    audit: Arc<dyn AuditLog>,
    executor: DeliveryExecutor,
}

impl std::fmt::Debug for DeliveryNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryNotifier")
            .field("tracked", &self.store.len())
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

impl DeliveryNotifier {
    /// Create a notifier. Performs no global registration.
    ///
    /// Build and drop the notifier outside any async runtime; the blocking
    /// HTTP client owns a runtime of its own.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid or the HTTP client cannot be
    /// built.
    pub fn new(
        config: &NotifierConfig,
        directory: Arc<dyn ReceiverDirectory>,
        audit: Arc<dyn AuditLog>,
    ) -> Result<Self, ConfigError> {
        let executor = DeliveryExecutor::new(config)?;

        internal!(
            "Delivery notifier initialised with max_attempts={}, attempt_timeout={}s, backoff={}",
            config.max_attempts,
            config.attempt_timeout_secs,
            if config.backoff.is_some() { "enabled" } else { "none" }
        );

        Ok(Self {
            store: Arc::new(SequenceStore::new()),
            directory,
            audit,
            executor,
        })
    }

    /// Send one notification and return every receiver's outcome.
    ///
    /// Receivers are tried one at a time in directory order. The
    /// sequence number is allocated before any receiver is contacted and is
    /// consumed even if nothing is delivered.
    ///
    /// Inside a multi-thread tokio runtime the delivery runs under
    /// [`tokio::task::block_in_place`]. Any other runtime cannot hand its
    /// thread over, so the delivery runs on a scoped thread outside the
    /// runtime while the caller waits.
    pub fn notify(&self, report: &DeliveryReport) -> (bool, Vec<DeliveryOutcome>) {
        match Handle::try_current() {
            Err(_) => self.deliver(report),
            Ok(handle) if matches!(handle.runtime_flavor(), RuntimeFlavor::MultiThread) => {
                tokio::task::block_in_place(|| self.deliver(report))
            }
            Ok(handle) => {
                internal!(
                    level = DEBUG,
                    "Delivering {} off a {:?} runtime",
                    report.media_buy_id,
                    handle.runtime_flavor()
                );
                thread::scope(|scope| scope.spawn(|| self.deliver(report)).join())
                    .unwrap_or_else(|_| {
                        error!(
                            media_buy_id = %report.media_buy_id,
                            "Delivery thread panicked, notification not delivered"
                        );
                        (false, Vec::new())
                    })
            }
        }
    }

    fn deliver(&self, report: &DeliveryReport) -> (bool, Vec<DeliveryOutcome>) {
        let sequence_number = self.store.next_sequence(&report.media_buy_id);
        let now = Utc::now();

        let envelope = build_envelope(report, build_payload(report, sequence_number, now), now);

        let outcomes: Vec<DeliveryOutcome> = self
            .directory
            .list_active_receivers(&report.tenant_id, &report.principal_id)
            .iter()
            .map(|receiver| self.executor.deliver(receiver, &envelope))
            .collect();

        let delivered = aggregator::settle(
            &self.store,
            self.audit.as_ref(),
            &report.tenant_id,
            &report.principal_id,
            &report.media_buy_id,
            &envelope.data,
            &outcomes,
        );

        (delivered, outcomes)
    }

    #[must_use]
    pub const fn sequence_store(&self) -> &Arc<SequenceStore> {
        &self.store
    }

    #[must_use]
    pub fn tracked_media_buys(&self) -> Vec<String> {
        self.store.tracked()
    }

    /// Reporter that can be handed to the host's shutdown sequence.
    #[must_use]
    pub fn shutdown_reporter(&self) -> ShutdownReporter {
        ShutdownReporter::new(Arc::clone(&self.store))
    }

    /// Log tracked media buys; call during graceful shutdown.
    pub fn shutdown(&self) -> Vec<String> {
        self.shutdown_reporter().report()
    }
}

impl NotificationService for DeliveryNotifier {
    fn send_delivery_notification(&self, report: &DeliveryReport) -> bool {
        self.notify(report).0
    }

    fn failure_count(&self, media_buy_id: &str) -> u64 {
        self.store.failure_count(media_buy_id)
    }

    fn last_success(&self, media_buy_id: &str) -> Option<DateTime<Utc>> {
        self.store.last_success(media_buy_id)
    }

    fn reset(&self, media_buy_id: &str) {
        if self.store.reset(media_buy_id) {
            internal!("Reset delivery notification state for {media_buy_id}");
        }
    }
}
