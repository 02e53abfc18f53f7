//! Webhook receiver configuration and lookup
//!
//! Receivers are configured per `(tenant, principal)` outside this crate;
//! the notifier only reads them through [`ReceiverDirectory`].

use std::{collections::HashMap, fmt};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// How a receiver authenticates our requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthScheme {
    #[default]
    None,
    Bearer,
    /// Credentials are stored already base64 encoded.
    Basic,
}

/// One configured receiver endpoint
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiverConfig {
    pub url: String,
    #[serde(default)]
    pub auth: AuthScheme,
    /// Token for `bearer`, or the encoded `user:password` for `basic`
    #[serde(default)]
    pub credentials: Option<String>,
    /// Shared secret echoed in `X-Webhook-Token`
    #[serde(default)]
    pub validation_token: Option<String>,
}

impl ReceiverConfig {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth: AuthScheme::None,
            credentials: None,
            validation_token: None,
        }
    }

    #[must_use]
    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.auth = AuthScheme::Bearer;
        self.credentials = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_basic(mut self, encoded: impl Into<String>) -> Self {
        self.auth = AuthScheme::Basic;
        self.credentials = Some(encoded.into());
        self
    }

    #[must_use]
    pub fn with_validation_token(mut self, token: impl Into<String>) -> Self {
        self.validation_token = Some(token.into());
        self
    }

    /// Value for the `Authorization` header, if the scheme needs one.
    ///
    /// A bearer or basic scheme without credentials sends no header.
    #[must_use]
    pub fn authorization(&self) -> Option<String> {
        let credentials = self.credentials.as_deref()?;
        match self.auth {
            AuthScheme::None => None,
            AuthScheme::Bearer => Some(format!("Bearer {credentials}")),
            AuthScheme::Basic => Some(format!("Basic {credentials}")),
        }
    }
}

impl fmt::Debug for ReceiverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceiverConfig")
            .field("url", &self.url)
            .field("auth", &self.auth)
            .field("credentials", &self.credentials.as_ref().map(|_| "[REDACTED]"))
            .field(
                "validation_token",
                &self.validation_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Source of active receivers for a tenant/principal pair.
///
/// An empty list is a normal answer meaning "nobody is listening".
pub trait ReceiverDirectory: Send + Sync {
    fn list_active_receivers(&self, tenant_id: &str, principal_id: &str) -> Vec<ReceiverConfig>;
}

/// A receiver entry as written in host configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct ReceiverEntry {
    pub tenant_id: String,
    pub principal_id: String,
    pub url: String,
    #[serde(default)]
    pub auth: AuthScheme,
    #[serde(default)]
    pub credentials: Option<String>,
    #[serde(default)]
    pub validation_token: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl ReceiverEntry {
    #[must_use]
    pub fn receiver(&self) -> ReceiverConfig {
        ReceiverConfig {
            url: self.url.clone(),
            auth: self.auth,
            credentials: self.credentials.clone(),
            validation_token: self.validation_token.clone(),
        }
    }
}

impl fmt::Debug for ReceiverEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceiverEntry")
            .field("tenant_id", &self.tenant_id)
            .field("principal_id", &self.principal_id)
            .field("receiver", &self.receiver())
            .field("active", &self.active)
            .finish()
    }
}

const fn default_active() -> bool {
    true
}

type DirectoryKey = (String, String);

/// In-memory directory, populated from configuration or at runtime
#[derive(Debug, Default)]
pub struct StaticReceiverDirectory {
    receivers: RwLock<HashMap<DirectoryKey, Vec<ReceiverEntry>>>,
}

impl StaticReceiverDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = ReceiverEntry>) -> Self {
        let directory = Self::new();
        for entry in entries {
            directory.insert(entry);
        }
        directory
    }

    pub fn insert(&self, entry: ReceiverEntry) {
        self.receivers
            .write()
            .entry((entry.tenant_id.clone(), entry.principal_id.clone()))
            .or_default()
            .push(entry);
    }

    /// Register an active receiver for `tenant_id`/`principal_id`.
    pub fn add(&self, tenant_id: &str, principal_id: &str, receiver: ReceiverConfig) {
        self.insert(ReceiverEntry {
            tenant_id: tenant_id.to_string(),
            principal_id: principal_id.to_string(),
            url: receiver.url,
            auth: receiver.auth,
            credentials: receiver.credentials,
            validation_token: receiver.validation_token,
            active: true,
        });
    }

    /// Remove every receiver registered for `tenant_id`/`principal_id`.
    pub fn clear(&self, tenant_id: &str, principal_id: &str) {
        self.receivers
            .write()
            .remove(&(tenant_id.to_string(), principal_id.to_string()));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.receivers.read().values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ReceiverDirectory for StaticReceiverDirectory {
    fn list_active_receivers(&self, tenant_id: &str, principal_id: &str) -> Vec<ReceiverConfig> {
        self.receivers
            .read()
            .get(&(tenant_id.to_string(), principal_id.to_string()))
            .map(|entries| {
                entries
                    .iter()
                    .filter(|entry| entry.active)
                    .map(ReceiverEntry::receiver)
                    .collect()
            })
            .unwrap_or_default()
    }
}
