//! Command-line host for delivery notifications
//!
//! Sends delivery notifications to the receivers configured in
//! `salesagent.config.ron`, either one at a time or by replaying a file of
//! recorded delivery reports.

use std::{fs::File, io::BufReader, path::PathBuf, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use salesagent::{
    controller::{self, SalesAgent},
    replay,
};
use salesagent_common::{internal, logging};
use salesagent_webhooks::{DeliveryNotifier, DeliveryReport, NotificationService};

/// Send media buy delivery notifications to buyer webhooks
#[derive(Parser, Debug)]
#[command(name = "salesagent-notify")]
#[command(about = "Send delivery notification webhooks", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (overrides `SALESAGENT_CONFIG` and default locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send a single notification
    Send {
        #[arg(long = "media-buy")]
        media_buy_id: String,
        #[arg(long = "tenant")]
        tenant_id: String,
        #[arg(long = "principal")]
        principal_id: String,
        #[arg(long)]
        impressions: f64,
        #[arg(long)]
        spend: f64,
        #[arg(long, default_value = "USD")]
        currency: String,
        #[arg(long, default_value = "active")]
        status: String,
        #[arg(long)]
        clicks: Option<f64>,
        /// Start of the reporting period (RFC 3339), default 24 hours ago
        #[arg(long)]
        start: Option<DateTime<Utc>>,
        /// End of the reporting period (RFC 3339), default now
        #[arg(long)]
        end: Option<DateTime<Utc>>,
        /// Mark the notification as final
        #[arg(long = "final")]
        is_final: bool,
        /// Seconds until the next scheduled notification
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Replay delivery reports from a JSON-lines file
    Replay {
        file: PathBuf,
        /// Worker threads sending concurrently
        #[arg(short, long, default_value_t = 4)]
        workers: usize,
    },
}

fn load(config: Option<PathBuf>) -> anyhow::Result<SalesAgent> {
    match config {
        Some(path) => {
            let content = std::fs::read_to_string(&path).map_err(|e| {
                anyhow::anyhow!("Failed to read config from {}: {}", path.display(), e)
            })?;
            SalesAgent::from_ron(&content)
        }
        None => SalesAgent::load(),
    }
}

/// Run one command to completion; `Ok(false)` when anything went undelivered.
fn execute(notifier: &DeliveryNotifier, command: Commands) -> anyhow::Result<bool> {
    match command {
        Commands::Send {
            media_buy_id,
            tenant_id,
            principal_id,
            impressions,
            spend,
            currency,
            status,
            clicks,
            start,
            end,
            is_final,
            interval,
        } => {
            let end = end.unwrap_or_else(Utc::now);
            let start = start.unwrap_or_else(|| end - Duration::hours(24));

            let mut report = DeliveryReport::new(
                media_buy_id,
                tenant_id,
                principal_id,
                start,
                end,
                impressions,
                spend,
            )
            .with_currency(currency)
            .with_status(status);
            report.clicks = clicks;
            report.is_final = is_final;
            report.next_expected_interval_seconds = interval;

            let delivered = notifier.send_delivery_notification(&report);
            println!(
                "{} (sequence {})",
                if delivered { "Delivered" } else { "Not delivered" },
                notifier
                    .sequence_store()
                    .sequence_number(&report.media_buy_id)
            );
            Ok(delivered)
        }
        Commands::Replay { file, workers } => {
            let reader = BufReader::new(File::open(&file).map_err(|e| {
                anyhow::anyhow!("Failed to open {}: {}", file.display(), e)
            })?);
            let reports = replay::read_reports(reader)?;
            let summary = replay::dispatch(notifier, &reports, workers);

            println!(
                "Sent {} notification(s): {} delivered, {} not delivered",
                summary.sent,
                summary.delivered,
                summary.undelivered()
            );
            Ok(summary.undelivered() == 0)
        }
    }
}

fn main() -> anyhow::Result<()> {
    logging::init();

    let cli = Cli::parse();
    let agent = load(cli.config)?;

    // The blocking HTTP client must be created outside the async runtime
    let notifier = Arc::new(agent.notifier()?);
    let reporter = notifier.shutdown_reporter();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let worker = Arc::clone(&notifier);
    let (outcome, _) = runtime.block_on(controller::run(reporter, move || {
        execute(&worker, cli.command)
    }))?;

    // An interrupted command may still be mid-delivery on the blocking pool
    runtime.shutdown_background();

    match outcome {
        Some(true) => Ok(()),
        Some(false) => std::process::exit(1),
        None => {
            internal!("Interrupted before all notifications were sent");
            std::process::exit(130)
        }
    }
}
