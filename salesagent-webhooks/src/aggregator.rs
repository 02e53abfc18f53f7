//! Settling a notification once every receiver has been tried

use salesagent_common::audit::AuditLog;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::{executor::DeliveryOutcome, payload::NotificationPayload, sequence::SequenceStore};

/// Audit operation name for delivery notifications.
pub const AUDIT_OPERATION: &str = "delivery_webhook";

/// A notification is delivered when any receiver accepted it.
///
/// With no receivers nothing was delivered.
#[must_use]
pub fn overall_success(outcomes: &[DeliveryOutcome]) -> bool {
    outcomes.iter().any(DeliveryOutcome::accepted)
}

/// Audit details describing what was attempted.
#[must_use]
pub fn audit_details(payload: &NotificationPayload, outcomes: &[DeliveryOutcome]) -> Value {
    let delivery = payload.media_buy_deliveries.first();
    let totals = delivery.map(|d| &d.totals);

    json!({
        "media_buy_id": delivery.map(|d| d.media_buy_id.as_str()),
        "sequence_number": payload.sequence_number,
        "notification_type": payload.notification_type,
        "impressions": totals.map(|t| t.impressions),
        "spend": totals.map(|t| t.spend),
        "clicks": totals.and_then(|t| t.clicks),
        "ctr": totals.and_then(|t| t.ctr),
        "currency": payload.currency,
        "receivers_total": outcomes.len(),
        "receivers_accepted": outcomes.iter().filter(|o| o.accepted()).count(),
    })
}

/// Decide the notification's result, update sequence bookkeeping and write
/// the audit record. The record is written whether or not anything was
/// delivered.
pub fn settle(
    store: &SequenceStore,
    audit: &dyn AuditLog,
    tenant_id: &str,
    principal_id: &str,
    media_buy_id: &str,
    payload: &NotificationPayload,
    outcomes: &[DeliveryOutcome],
) -> bool {
    let delivered = overall_success(outcomes);
    let sequence_number = payload.sequence_number;

    if outcomes.is_empty() {
        debug!(
            media_buy_id,
            tenant_id,
            principal_id,
            sequence_number,
            "No webhook receivers configured, nothing delivered"
        );
    } else if delivered {
        info!(
            media_buy_id,
            sequence_number,
            notification_type = %payload.notification_type,
            accepted = outcomes.iter().filter(|o| o.accepted()).count(),
            receivers = outcomes.len(),
            "Delivery notification sent"
        );
    } else {
        warn!(
            media_buy_id,
            sequence_number,
            notification_type = %payload.notification_type,
            receivers = outcomes.len(),
            "Delivery notification reached no receiver"
        );
    }

    audit.append(
        tenant_id,
        principal_id,
        AUDIT_OPERATION,
        delivered,
        &audit_details(payload, outcomes),
    );

    store.record_outcome(media_buy_id, delivered);

    delivered
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use parking_lot::Mutex;

    use super::*;
    use crate::{
        error::{DeliveryError, TemporaryError},
        payload::{DeliveryReport, build_payload},
    };

    #[derive(Default)]
    struct Recorder {
        records: Mutex<Vec<(String, bool, Value)>>,
    }

    impl AuditLog for Recorder {
        fn append(&self, _: &str, _: &str, operation: &str, success: bool, details: &Value) {
            self.records
                .lock()
                .push((operation.to_string(), success, details.clone()));
        }
    }

    fn accepted(url: &str) -> DeliveryOutcome {
        DeliveryOutcome {
            receiver: url.to_string(),
            attempts: 1,
            result: Ok(200),
        }
    }

    fn rejected(url: &str) -> DeliveryOutcome {
        DeliveryOutcome {
            receiver: url.to_string(),
            attempts: 3,
            result: Err(DeliveryError::Temporary(TemporaryError::Status(500))),
        }
    }

    fn payload(sequence_number: u64) -> NotificationPayload {
        let now = Utc::now();
        build_payload(
            &DeliveryReport::new("mb_1", "t1", "p1", now, now, 100.0, 2.5),
            sequence_number,
            now,
        )
    }

    #[test]
    fn test_overall_success() {
        assert!(!overall_success(&[]));
        assert!(!overall_success(&[rejected("a"), rejected("b")]));
        assert!(overall_success(&[rejected("a"), accepted("b")]));
    }

    #[test]
    fn test_settle_partial_success_resets_failures() {
        let store = SequenceStore::new();
        let audit = Recorder::default();
        store.record_outcome("mb_1", false);

        let delivered = settle(
            &store,
            &audit,
            "t1",
            "p1",
            "mb_1",
            &payload(4),
            &[rejected("a"), accepted("b")],
        );

        assert!(delivered);
        assert_eq!(store.failure_count("mb_1"), 0);
        assert!(store.last_success("mb_1").is_some());

        let records = audit.records.lock();
        assert_eq!(records.len(), 1);
        let (operation, success, details) = &records[0];
        assert_eq!(operation, AUDIT_OPERATION);
        assert!(*success);
        assert_eq!(details["sequence_number"], 4);
        assert_eq!(details["notification_type"], "scheduled");
        assert_eq!(details["receivers_accepted"], 1);
        assert_eq!(details["receivers_total"], 2);
    }

    #[test]
    fn test_settle_without_receivers_still_audits() {
        let store = SequenceStore::new();
        let audit = Recorder::default();

        let delivered = settle(&store, &audit, "t1", "p1", "mb_1", &payload(1), &[]);

        assert!(!delivered);
        assert_eq!(store.failure_count("mb_1"), 1);

        let records = audit.records.lock();
        assert_eq!(records.len(), 1);
        assert!(!records[0].1);
        assert_eq!(records[0].2["impressions"], 100.0);
        assert_eq!(records[0].2["spend"], 2.5);
    }
}
