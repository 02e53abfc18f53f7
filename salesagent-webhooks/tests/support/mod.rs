//! Shared helpers for notifier integration tests
#![allow(dead_code)] // Not every helper is used by every test binary

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use salesagent_common::audit::AuditLog;
use salesagent_webhooks::{
    DeliveryNotifier, DeliveryReport, NotifierConfig, ReceiverConfig, StaticReceiverDirectory,
};
use serde_json::Value;

/// One captured audit append
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub tenant_id: String,
    pub principal_id: String,
    pub operation: String,
    pub success: bool,
    pub details: Value,
}

impl AuditRecord {
    pub fn sequence_number(&self) -> u64 {
        self.details["sequence_number"]
            .as_u64()
            .expect("audit record carries a sequence number")
    }
}

/// Audit log that keeps every record in memory
#[derive(Debug, Default)]
pub struct RecordingAuditLog {
    records: Mutex<Vec<AuditRecord>>,
}

impl RecordingAuditLog {
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }
}

impl AuditLog for RecordingAuditLog {
    fn append(
        &self,
        tenant_id: &str,
        principal_id: &str,
        operation: &str,
        success: bool,
        details: &Value,
    ) {
        self.records.lock().push(AuditRecord {
            tenant_id: tenant_id.to_string(),
            principal_id: principal_id.to_string(),
            operation: operation.to_string(),
            success,
            details: details.clone(),
        });
    }
}

/// Notifier wired to an in-memory directory and a recording audit log
pub struct Harness {
    pub notifier: DeliveryNotifier,
    pub directory: Arc<StaticReceiverDirectory>,
    pub audit: Arc<RecordingAuditLog>,
}

impl Harness {
    pub fn new(config: &NotifierConfig) -> Self {
        let directory = Arc::new(StaticReceiverDirectory::new());
        let audit = Arc::new(RecordingAuditLog::default());
        let notifier = DeliveryNotifier::new(config, directory.clone(), audit.clone())
            .expect("notifier should build");

        Self {
            notifier,
            directory,
            audit,
        }
    }

    pub fn with_receivers(receivers: impl IntoIterator<Item = ReceiverConfig>) -> Self {
        let harness = Self::new(&NotifierConfig::default());
        for receiver in receivers {
            harness.directory.add("t1", "p1", receiver);
        }
        harness
    }
}

pub fn report(media_buy_id: &str) -> DeliveryReport {
    DeliveryReport::new(
        media_buy_id,
        "t1",
        "p1",
        Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 3, 2, 0, 0, 0).unwrap(),
        1000.0,
        12.34,
    )
}
