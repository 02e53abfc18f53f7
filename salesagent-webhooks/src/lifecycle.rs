//! Shutdown visibility for in-flight sequence state
//!
//! Sequence state is process-lifetime only. When the host shuts down it asks
//! the reporter to log which media buys still have state, so operators can
//! see what receivers may observe restart from sequence 1 afterwards.
//! Reporting only logs; nothing is flushed or persisted.

use std::sync::Arc;

use salesagent_common::{Signal, internal};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::sequence::SequenceStore;

/// Logs tracked media buys when the host shuts down
#[derive(Debug, Clone)]
pub struct ShutdownReporter {
    store: Arc<SequenceStore>,
}

impl ShutdownReporter {
    #[must_use]
    pub const fn new(store: Arc<SequenceStore>) -> Self {
        Self { store }
    }

    /// Log and return the media buys with tracked sequence state.
    pub fn report(&self) -> Vec<String> {
        let tracked = self.store.tracked();

        if tracked.is_empty() {
            internal!(level = DEBUG, "No delivery notification state to report at shutdown");
        } else {
            info!(
                count = tracked.len(),
                media_buys = ?tracked,
                "Delivery notification sequence state discarded at shutdown"
            );
        }

        tracked
    }

    /// Wait for a shutdown signal, then report once.
    ///
    /// A closed channel counts as shutdown. Returns the reported ids.
    pub async fn watch(self, mut shutdown: broadcast::Receiver<Signal>) -> Vec<String> {
        loop {
            match shutdown.recv().await {
                Ok(Signal::Shutdown | Signal::Finalised) => {
                    internal!("Webhook notifier received shutdown signal");
                    break;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Shutdown watcher lagged behind signal channel");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    internal!("Shutdown channel closed");
                    break;
                }
            }
        }

        self.report()
    }
}
