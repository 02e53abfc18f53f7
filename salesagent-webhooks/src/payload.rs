//! Notification payloads and the webhook envelope
//!
//! Payload construction is pure: the caller supplies the allocated sequence
//! number and the notification time, nothing is read from the environment.
//! Inputs are not validated here; the notifier's callers own that.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Schema version stamped on every payload.
pub const ADCP_VERSION: &str = "2.3.0";

/// Whether more notifications are expected for the media buy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Scheduled,
    Final,
}

impl NotificationKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Final => "final",
        }
    }

    /// Task status reported in the envelope.
    #[must_use]
    pub const fn task_status(self) -> TaskStatus {
        match self {
            Self::Scheduled => TaskStatus::Working,
            Self::Final => TaskStatus::Completed,
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Working,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportingPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Cumulative delivery totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryTotals {
    pub impressions: f64,
    pub spend: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub clicks: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ctr: Option<f64>,
}

/// Delivery for one package of a media buy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageDelivery {
    pub package_id: String,
    pub impressions: f64,
    pub spend: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub clicks: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaBuyDelivery {
    pub media_buy_id: String,
    pub status: String,
    pub totals: DeliveryTotals,
    #[serde(default)]
    pub by_package: Vec<PackageDelivery>,
}

/// The `data` object of a delivery notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub adcp_version: String,
    pub notification_type: NotificationKind,
    pub sequence_number: u64,
    pub reporting_period: ReportingPeriod,
    pub currency: String,
    pub media_buy_deliveries: Vec<MediaBuyDelivery>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub next_expected_at: Option<DateTime<Utc>>,
}

/// Body POSTed to each receiver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    pub task_id: String,
    pub status: TaskStatus,
    pub timestamp: DateTime<Utc>,
    pub tenant_id: String,
    pub principal_id: String,
    pub data: NotificationPayload,
}

/// Raw delivery metrics reported by an ad server adapter.
///
/// Deserialises with the same defaults as [`DeliveryReport::new`], so a
/// JSON line only needs the required fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub media_buy_id: String,
    pub tenant_id: String,
    pub principal_id: String,
    pub reporting_period_start: DateTime<Utc>,
    pub reporting_period_end: DateTime<Utc>,
    pub impressions: f64,
    pub spend: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub clicks: Option<f64>,
    #[serde(default)]
    pub ctr: Option<f64>,
    #[serde(default)]
    pub by_package: Option<Vec<PackageDelivery>>,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub next_expected_interval_seconds: Option<u64>,
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_status() -> String {
    "active".to_string()
}

impl DeliveryReport {
    #[must_use]
    pub fn new(
        media_buy_id: impl Into<String>,
        tenant_id: impl Into<String>,
        principal_id: impl Into<String>,
        reporting_period_start: DateTime<Utc>,
        reporting_period_end: DateTime<Utc>,
        impressions: f64,
        spend: f64,
    ) -> Self {
        Self {
            media_buy_id: media_buy_id.into(),
            tenant_id: tenant_id.into(),
            principal_id: principal_id.into(),
            reporting_period_start,
            reporting_period_end,
            impressions,
            spend,
            currency: default_currency(),
            status: default_status(),
            clicks: None,
            ctr: None,
            by_package: None,
            is_final: false,
            next_expected_interval_seconds: None,
        }
    }

    #[must_use]
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    #[must_use]
    pub const fn with_clicks(mut self, clicks: f64) -> Self {
        self.clicks = Some(clicks);
        self
    }

    #[must_use]
    pub const fn with_ctr(mut self, ctr: f64) -> Self {
        self.ctr = Some(ctr);
        self
    }

    #[must_use]
    pub fn with_packages(mut self, packages: Vec<PackageDelivery>) -> Self {
        self.by_package = Some(packages);
        self
    }

    /// Mark this as the last report for the media buy.
    #[must_use]
    pub const fn final_report(mut self) -> Self {
        self.is_final = true;
        self
    }

    #[must_use]
    pub const fn with_next_expected_interval(mut self, seconds: u64) -> Self {
        self.next_expected_interval_seconds = Some(seconds);
        self
    }

    #[must_use]
    pub const fn kind(&self) -> NotificationKind {
        if self.is_final {
            NotificationKind::Final
        } else {
            NotificationKind::Scheduled
        }
    }
}

/// Round a monetary amount to cents.
#[must_use]
pub fn round_currency(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Build the notification payload for `report`.
///
/// `next_expected_at` is only set for scheduled notifications with a
/// positive interval, and is then `now + interval`.
#[must_use]
pub fn build_payload(
    report: &DeliveryReport,
    sequence_number: u64,
    now: DateTime<Utc>,
) -> NotificationPayload {
    let kind = report.kind();

    let next_expected_at = match (kind, report.next_expected_interval_seconds) {
        (NotificationKind::Scheduled, Some(secs)) if secs > 0 => {
            i64::try_from(secs)
                .ok()
                .and_then(Duration::try_seconds)
                .and_then(|interval| now.checked_add_signed(interval))
        }
        _ => None,
    };

    NotificationPayload {
        adcp_version: ADCP_VERSION.to_string(),
        notification_type: kind,
        sequence_number,
        reporting_period: ReportingPeriod {
            start: report.reporting_period_start,
            end: report.reporting_period_end,
        },
        currency: report.currency.clone(),
        media_buy_deliveries: vec![MediaBuyDelivery {
            media_buy_id: report.media_buy_id.clone(),
            status: report.status.clone(),
            totals: DeliveryTotals {
                impressions: report.impressions,
                spend: round_currency(report.spend),
                clicks: report.clicks,
                ctr: report.ctr,
            },
            by_package: report.by_package.clone().unwrap_or_default(),
        }],
        next_expected_at,
    }
}

/// Wrap `payload` in the task envelope sent to receivers.
#[must_use]
pub fn build_envelope(
    report: &DeliveryReport,
    payload: NotificationPayload,
    now: DateTime<Utc>,
) -> WebhookEnvelope {
    WebhookEnvelope {
        task_id: report.media_buy_id.clone(),
        status: payload.notification_type.task_status(),
        timestamp: now,
        tenant_id: report.tenant_id.clone(),
        principal_id: report.principal_id.clone(),
        data: payload,
    }
}
