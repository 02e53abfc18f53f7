//! HTTP delivery of one notification to one receiver
//!
//! A delivery makes up to `max_attempts` POSTs, each bounded by the
//! per-attempt timeout. Temporary failures (non-2xx, timeout, transport) are
//! retried, immediately unless a [`BackoffPolicy`] is configured. Fatal
//! failures end delivery to that receiver at once.
//!
//! Delivery is blocking: the calling thread is held for at most
//! `max_attempts × attempt_timeout` plus any backoff.

use reqwest::{
    blocking::Client,
    header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue},
};
use salesagent_common::outbound;
use tracing::{debug, error, warn};

use crate::{
    config::{BackoffPolicy, NotifierConfig},
    directory::ReceiverConfig,
    error::{ConfigError, DeliveryError, FatalError, TemporaryError},
    payload::WebhookEnvelope,
};

/// Header carrying the receiver's shared validation token.
pub const WEBHOOK_TOKEN_HEADER: &str = "X-Webhook-Token";

/// Result of delivering one notification to one receiver
#[derive(Debug)]
pub struct DeliveryOutcome {
    /// Receiver URL
    pub receiver: String,
    /// HTTP attempts made, including the last
    pub attempts: u32,
    /// Accepting status code, or the error that ended delivery
    pub result: Result<u16, DeliveryError>,
}

impl DeliveryOutcome {
    #[must_use]
    pub const fn accepted(&self) -> bool {
        self.result.is_ok()
    }

    /// Status of the final response, if the receiver answered at all.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match &self.result {
            Ok(status) => Some(*status),
            Err(e) => e.status(),
        }
    }
}

/// Performs webhook POSTs with bounded retries
#[derive(Debug, Clone)]
pub struct DeliveryExecutor {
    client: Client,
    max_attempts: u32,
    backoff: Option<BackoffPolicy>,
}

impl DeliveryExecutor {
    /// Build an executor and its HTTP client.
    ///
    /// Must not be called from within an async runtime; the blocking client
    /// owns its own.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the client cannot
    /// be built.
    pub fn new(config: &NotifierConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.attempt_timeout())
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            max_attempts: config.max_attempts,
            backoff: config.backoff.clone(),
        })
    }

    /// Deliver `envelope` to `receiver`.
    ///
    /// Never panics and never returns early with an error; every failure is
    /// reported through the outcome.
    pub fn deliver(&self, receiver: &ReceiverConfig, envelope: &WebhookEnvelope) -> DeliveryOutcome {
        let media_buy_id = envelope.task_id.as_str();
        let sequence_number = envelope.data.sequence_number;

        let prepared = request_headers(receiver).and_then(|headers| {
            serde_json::to_vec(envelope)
                .map(|body| (headers, body))
                .map_err(|e| FatalError::InvalidRequest(e.to_string()).into())
        });

        let (headers, body) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                error!(
                    media_buy_id,
                    sequence_number,
                    receiver = %receiver.url,
                    error = %e,
                    "Webhook request could not be prepared"
                );
                return DeliveryOutcome {
                    receiver: receiver.url.clone(),
                    attempts: 0,
                    result: Err(e),
                };
            }
        };

        let mut attempt = 0;
        loop {
            attempt += 1;

            match self.attempt(receiver, &headers, &body) {
                Ok(status) => {
                    debug!(
                        media_buy_id,
                        sequence_number,
                        receiver = %receiver.url,
                        attempt,
                        status,
                        "Webhook delivered"
                    );
                    return DeliveryOutcome {
                        receiver: receiver.url.clone(),
                        attempts: attempt,
                        result: Ok(status),
                    };
                }
                Err(e) if e.is_fatal() => {
                    error!(
                        media_buy_id,
                        sequence_number,
                        receiver = %receiver.url,
                        attempt,
                        error = ?e,
                        "Unexpected webhook failure, not retrying this receiver"
                    );
                    return DeliveryOutcome {
                        receiver: receiver.url.clone(),
                        attempts: attempt,
                        result: Err(e),
                    };
                }
                Err(e) => {
                    warn!(
                        media_buy_id,
                        sequence_number,
                        receiver = %receiver.url,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Webhook attempt failed"
                    );

                    if attempt >= self.max_attempts {
                        return DeliveryOutcome {
                            receiver: receiver.url.clone(),
                            attempts: attempt,
                            result: Err(e),
                        };
                    }

                    if let Some(backoff) = &self.backoff {
                        std::thread::sleep(backoff.delay_for(attempt));
                    }
                }
            }
        }
    }

    /// One POST. `Ok` carries a 2xx status.
    fn attempt(
        &self,
        receiver: &ReceiverConfig,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<u16, DeliveryError> {
        outbound!(receiver = receiver.url, bytes = body.len(), "POST");

        let response = self
            .client
            .post(&receiver.url)
            .headers(headers.clone())
            .body(body.to_vec())
            .send()?;

        let status = response.status();
        if status.is_success() {
            Ok(status.as_u16())
        } else {
            Err(TemporaryError::Status(status.as_u16()).into())
        }
    }
}

/// Headers for a receiver: content type, scheme-dependent `Authorization`,
/// and the optional validation token. `User-Agent` is set by the client.
///
/// # Errors
///
/// Returns a fatal error if configured credentials are not valid header text.
pub fn request_headers(receiver: &ReceiverConfig) -> Result<HeaderMap, DeliveryError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    if let Some(authorization) = receiver.authorization() {
        let mut value = header_value("Authorization", &authorization)?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    if let Some(token) = &receiver.validation_token {
        let mut value = header_value(WEBHOOK_TOKEN_HEADER, token)?;
        value.set_sensitive(true);
        headers.insert(HeaderName::from_static("x-webhook-token"), value);
    }

    Ok(headers)
}

fn header_value(name: &'static str, value: &str) -> Result<HeaderValue, DeliveryError> {
    HeaderValue::from_str(value).map_err(|e| {
        FatalError::InvalidHeader {
            name,
            reason: e.to_string(),
        }
        .into()
    })
}
