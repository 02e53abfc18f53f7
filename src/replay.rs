//! Replaying recorded delivery reports through a notifier
//!
//! Reports are read as JSON lines and dispatched from a fixed number of
//! worker threads, the same way independent ad server adapters share one
//! notifier.

use std::{
    io::BufRead,
    sync::atomic::{AtomicUsize, Ordering},
    thread,
};

use anyhow::Context;
use salesagent_webhooks::{DeliveryReport, NotificationService};
use tracing::info;

/// Totals for one replay run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    pub sent: usize,
    pub delivered: usize,
}

impl ReplaySummary {
    #[must_use]
    pub const fn undelivered(&self) -> usize {
        self.sent - self.delivered
    }
}

/// Parse one [`DeliveryReport`] per non-blank line.
///
/// # Errors
///
/// Returns an error naming the first line that cannot be read or parsed.
pub fn read_reports(reader: impl BufRead) -> anyhow::Result<Vec<DeliveryReport>> {
    let mut reports = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", index + 1))?;
        if line.trim().is_empty() {
            continue;
        }

        let report: DeliveryReport = serde_json::from_str(&line)
            .with_context(|| format!("Invalid delivery report on line {}", index + 1))?;
        reports.push(report);
    }

    Ok(reports)
}

/// Send every report from `workers` threads and wait for all of them.
///
/// Reports are handed out in file order, but with more than one worker
/// notifications for the same media buy may complete out of order.
pub fn dispatch(
    notifier: &dyn NotificationService,
    reports: &[DeliveryReport],
    workers: usize,
) -> ReplaySummary {
    let workers = workers.clamp(1, reports.len().max(1));
    let next = AtomicUsize::new(0);
    let delivered = AtomicUsize::new(0);

    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| {
                while let Some(report) = reports.get(next.fetch_add(1, Ordering::Relaxed)) {
                    if notifier.send_delivery_notification(report) {
                        delivered.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }
    });

    let summary = ReplaySummary {
        sent: reports.len(),
        delivered: delivered.into_inner(),
    };

    info!(
        sent = summary.sent,
        delivered = summary.delivered,
        workers,
        "Replay complete"
    );

    summary
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use chrono::{DateTime, Utc};
    use salesagent_webhooks::NotificationKind;

    use super::*;

    /// Records reports and accepts those with positive spend
    #[derive(Default)]
    struct CountingService {
        seen: AtomicUsize,
    }

    impl NotificationService for CountingService {
        fn send_delivery_notification(&self, report: &DeliveryReport) -> bool {
            self.seen.fetch_add(1, Ordering::Relaxed);
            report.spend > 0.0
        }

        fn failure_count(&self, _: &str) -> u64 {
            0
        }

        fn last_success(&self, _: &str) -> Option<DateTime<Utc>> {
            None
        }

        fn reset(&self, _: &str) {}
    }

    const LINES: &str = r#"{"media_buy_id":"mb_1","tenant_id":"t1","principal_id":"p1","reporting_period_start":"2025-01-01T00:00:00Z","reporting_period_end":"2025-01-02T00:00:00Z","impressions":100,"spend":1.0}

{"media_buy_id":"mb_2","tenant_id":"t1","principal_id":"p1","reporting_period_start":"2025-01-01T00:00:00Z","reporting_period_end":"2025-01-02T00:00:00Z","impressions":0,"spend":0.0,"is_final":true}
"#;

    #[test]
    fn test_read_reports_skips_blank_lines() {
        let reports = read_reports(Cursor::new(LINES)).unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].media_buy_id, "mb_1");
        assert_eq!(reports[1].kind(), NotificationKind::Final);
    }

    #[test]
    fn test_read_reports_names_bad_line() {
        let error = read_reports(Cursor::new("{}\n")).unwrap_err();
        assert!(error.to_string().contains("line 1"));
    }

    #[test]
    fn test_dispatch_counts_delivered() {
        let reports = read_reports(Cursor::new(LINES)).unwrap();
        let service = CountingService::default();

        let summary = dispatch(&service, &reports, 4);
        assert_eq!(summary, ReplaySummary { sent: 2, delivered: 1 });
        assert_eq!(summary.undelivered(), 1);
        assert_eq!(service.seen.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_dispatch_with_no_reports() {
        let service = CountingService::default();
        let summary = dispatch(&service, &[], 0);
        assert_eq!(summary, ReplaySummary::default());
    }
}
