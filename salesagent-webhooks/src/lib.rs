//! Delivery notification webhooks
//!
//! Informs buyer systems about media buy delivery progress. Each media buy
//! gets its own strictly increasing notification sequence; every
//! notification is attempted against every active receiver with bounded
//! retries, and the outcome is tracked per media buy and written to the
//! audit trail.
//!
//! - [`SequenceStore`]: per-media-buy sequence numbers and failure accounting
//! - [`payload`]: notification payload and envelope construction
//! - [`ReceiverDirectory`]: where receivers come from
//! - [`DeliveryExecutor`]: HTTP delivery with retries
//! - [`aggregator`]: overall success, bookkeeping and audit
//! - [`ShutdownReporter`]: shutdown visibility of in-flight state

pub mod aggregator;
mod config;
mod directory;
mod error;
mod executor;
mod lifecycle;
pub mod payload;
mod sequence;
mod service;

pub use config::{BackoffPolicy, NotifierConfig};
pub use directory::{
    AuthScheme, ReceiverConfig, ReceiverDirectory, ReceiverEntry, StaticReceiverDirectory,
};
pub use error::{ConfigError, DeliveryError, FatalError, TemporaryError};
pub use executor::{DeliveryExecutor, DeliveryOutcome, WEBHOOK_TOKEN_HEADER, request_headers};
pub use lifecycle::ShutdownReporter;
pub use payload::{DeliveryReport, NotificationKind, NotificationPayload, PackageDelivery};
pub use sequence::{MediaBuySequenceState, SequenceStore};
pub use service::{DeliveryNotifier, NotificationService};
