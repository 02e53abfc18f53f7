use std::{path::PathBuf, sync::Arc};

use salesagent_common::{
    Signal,
    audit::{AuditConfig, TracingAuditLog},
    internal,
};
use salesagent_webhooks::{
    DeliveryNotifier, NotifierConfig, ReceiverEntry, ShutdownReporter, StaticReceiverDirectory,
};
use serde::Deserialize;
use tokio::{
    signal::unix::{SignalKind, signal},
    sync::broadcast,
};

/// Host configuration, read from `salesagent.config.ron`
///
/// ```ron
/// (
///     webhooks: (max_attempts: 3, attempt_timeout_secs: 10),
///     audit: (enabled: true),
///     receivers: [
///         (
///             tenant_id: "t1",
///             principal_id: "p1",
///             url: "https://buyer.example.com/hook",
///             auth: bearer,
///             credentials: Some("token"),
///         ),
///     ],
/// )
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct SalesAgent {
    #[serde(default)]
    pub webhooks: NotifierConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(alias = "receiver", default)]
    pub receivers: Vec<ReceiverEntry>,
}

impl SalesAgent {
    /// Parse a RON configuration document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid configuration.
    pub fn from_ron(content: &str) -> anyhow::Result<Self> {
        Ok(ron::from_str(content)?)
    }

    /// Load configuration from the first location found; see
    /// [`find_config_file`].
    ///
    /// # Errors
    ///
    /// Returns an error if no file is found, it cannot be read, or it does
    /// not parse.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = find_config_file()?;
        let content = std::fs::read_to_string(&config_path).map_err(|e| {
            anyhow::anyhow!(
                "Failed to read config from {}: {}",
                config_path.display(),
                e
            )
        })?;

        internal!("Loaded configuration from {}", config_path.display());
        Self::from_ron(&content)
    }

    /// Build the notifier described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the webhook configuration is invalid.
    pub fn notifier(&self) -> anyhow::Result<DeliveryNotifier> {
        let directory = Arc::new(StaticReceiverDirectory::from_entries(
            self.receivers.iter().cloned(),
        ));
        let audit = Arc::new(TracingAuditLog::new(self.audit.clone()));

        internal!("Configured {} webhook receiver(s)", directory.len());

        Ok(DeliveryNotifier::new(&self.webhooks, directory, audit)?)
    }
}

/// Find the configuration file using the following precedence:
/// 1. `SALESAGENT_CONFIG` environment variable
/// 2. ./salesagent.config.ron (current working directory)
/// 3. /etc/salesagent/salesagent.config.ron (system-wide config)
///
/// # Errors
///
/// Returns an error if `SALESAGENT_CONFIG` names a missing file, or no
/// default location exists.
pub fn find_config_file() -> anyhow::Result<PathBuf> {
    if let Ok(env_path) = std::env::var("SALESAGENT_CONFIG") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        anyhow::bail!(
            "SALESAGENT_CONFIG points to non-existent file: {}",
            path.display()
        );
    }

    let default_paths = vec![
        PathBuf::from("./salesagent.config.ron"),
        PathBuf::from("/etc/salesagent/salesagent.config.ron"),
    ];

    for path in &default_paths {
        if path.exists() {
            return Ok(path.clone());
        }
    }

    let paths_tried = default_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    anyhow::bail!(
        "No configuration file found. Tried:\n  - SALESAGENT_CONFIG environment variable\n{paths_tried}"
    )
}

/// Run `work` on the blocking pool alongside the notifier's shutdown watcher.
///
/// CTRL+C or SIGTERM stops waiting for `work`. Either way the watcher is sent
/// [`Signal::Shutdown`] and has reported before this returns. The first value
/// is `None` when interrupted; the second is the media buys the watcher
/// reported.
///
/// # Errors
///
/// Returns an error if `work` fails or panics, signal handlers cannot be
/// installed, or the shutdown broadcast has no listener.
pub async fn run<F, T>(reporter: ShutdownReporter, work: F) -> anyhow::Result<(Option<T>, Vec<String>)>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let (shutdown, receiver) = broadcast::channel(8);
    let watcher = tokio::spawn(reporter.watch(receiver));
    let worker = tokio::task::spawn_blocking(work);

    let mut terminate = signal(SignalKind::terminate())?;

    let outcome = tokio::select! {
        result = worker => Some(result??),
        _ = tokio::signal::ctrl_c() => {
            internal!("CTRL+C entered, shutting down");
            None
        }
        _ = terminate.recv() => {
            internal!("Terminate Signal received, shutting down");
            None
        }
    };

    shutdown
        .send(Signal::Shutdown)
        .map_err(|e| anyhow::anyhow!("Failed to broadcast shutdown: {e}"))?;

    Ok((outcome, watcher.await?))
}
