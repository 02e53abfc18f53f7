//! Audit trail for notification attempts
//!
//! Services record what they *attempted* through the [`AuditLog`] contract.
//! Storage of the trail belongs to the host; [`TracingAuditLog`] is the
//! default sink and emits each record as a structured `tracing` event.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Audit logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Enable audit records
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

const fn default_true() -> bool {
    true
}

/// Destination for audit records.
///
/// Implementations must be callable from any thread; notifications are sent
/// from whichever thread the adapter happens to run on.
pub trait AuditLog: Send + Sync {
    /// Append one record to the trail.
    fn append(
        &self,
        tenant_id: &str,
        principal_id: &str,
        operation: &str,
        success: bool,
        details: &Value,
    );
}

/// Audit sink that writes records to the `tracing` subscriber.
#[derive(Debug, Clone, Default)]
pub struct TracingAuditLog {
    config: AuditConfig,
}

impl TracingAuditLog {
    #[must_use]
    pub const fn new(config: AuditConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.config.enabled
    }
}

impl AuditLog for TracingAuditLog {
    fn append(
        &self,
        tenant_id: &str,
        principal_id: &str,
        operation: &str,
        success: bool,
        details: &Value,
    ) {
        if !self.config.enabled {
            return;
        }

        if success {
            tracing::event!(
                tracing::Level::INFO,
                event = "Audit",
                tenant_id = %tenant_id,
                principal_id = %principal_id,
                operation = %operation,
                success,
                details = %details,
                "Audit: {operation}"
            );
        } else {
            tracing::event!(
                tracing::Level::WARN,
                event = "Audit",
                tenant_id = %tenant_id,
                principal_id = %principal_id,
                operation = %operation,
                success,
                details = %details,
                "Audit: {operation} failed"
            );
        }
    }
}
