//! Client configuration and credentials.
//!
//! Both can be built in code or read from `SHIPFUNK_*` environment variables.

use std::fmt;
use std::time::Duration;

use tracing::warn;

use crate::error::ApiError;
use crate::transport::UreqTransport;
use crate::types::{Currency, Language};

pub const DEFAULT_ENDPOINT: &str = "https://shipfunkservices.com/api/1.2/";

pub const ENV_ENDPOINT: &str = "SHIPFUNK_ENDPOINT";
pub const ENV_TIMEOUT_SECS: &str = "SHIPFUNK_TIMEOUT_SECS";
pub const ENV_LANGUAGE: &str = "SHIPFUNK_LANGUAGE";
pub const ENV_CURRENCY: &str = "SHIPFUNK_CURRENCY";
pub const ENV_API_KEY: &str = "SHIPFUNK_API_KEY";
pub const ENV_ORDER_ID: &str = "SHIPFUNK_ORDER_ID";

/// Connection and localisation settings shared by both clients.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub endpoint: String,
    pub timeout: Duration,
    /// Language of the texts Shipfunk returns.
    pub language: Language,
    pub currency: Currency,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(30),
            language: Language::default(),
            currency: Currency::default(),
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by whichever `SHIPFUNK_*` variables are set.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(endpoint) = lookup(ENV_ENDPOINT) {
            config.endpoint = endpoint;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.timeout = Duration::from_secs(secs),
                _ => warn!(value = %raw, "ignoring invalid {ENV_TIMEOUT_SECS}"),
            }
        }
        if let Some(language) = lookup(ENV_LANGUAGE) {
            config.language = Language::lenient(&language);
        }
        if let Some(currency) = lookup(ENV_CURRENCY) {
            config.currency = Currency::lenient(&currency);
        }
        config
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Blocking transport honouring `timeout`, which must be non-zero.
    pub(crate) fn ureq_transport(&self) -> Result<UreqTransport, ApiError> {
        if self.timeout.is_zero() {
            return Err(ApiError::validation("timeout has to be bigger than 0"));
        }
        Ok(UreqTransport::new(self.timeout))
    }

    /// Invalid codes fall back to `FI`.
    pub fn with_language(mut self, language: &str) -> Self {
        self.language = Language::lenient(language);
        self
    }

    /// Invalid codes fall back to `EUR`.
    pub fn with_currency(mut self, currency: &str) -> Self {
        self.currency = Currency::lenient(currency);
        self
    }
}

/// API key and order number. The order number is only needed by the
/// shipping client.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub order_id: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, order_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            order_id: order_id.into(),
        }
    }

    /// Reads `SHIPFUNK_API_KEY` (required) and `SHIPFUNK_ORDER_ID`.
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ApiError> {
        let api_key = lookup(ENV_API_KEY)
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ApiError::validation(format!("{ENV_API_KEY} is not set")))?;
        let order_id = lookup(ENV_ORDER_ID).unwrap_or_default();
        Ok(Self { api_key, order_id })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("order_id", &self.order_id)
            .finish()
    }
}
