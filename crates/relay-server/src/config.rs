//! Server Configuration
//!
//! Read once at startup from the process environment (after `.env`).

use std::path::PathBuf;
use std::time::Duration;

use relay_payments::{DEFAULT_LEDGER_PATH, DEFAULT_TOLERANCE_SECS, PaymentError, Result};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Clone)]
pub struct ServerConfig {
    pub stripe_secret_key: String,
    pub webhook_secret: String,
    pub bind_addr: String,
    pub ledger_path: PathBuf,
    pub request_timeout: Duration,
    /// Allowed age of a webhook signature, in seconds
    pub signature_tolerance_secs: u64,
}

impl ServerConfig {
    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| PaymentError::Config(format!("{key} not set")))
        };

        let request_timeout_secs =
            parse_or(&lookup, "REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?;
        let signature_tolerance_secs =
            parse_or(&lookup, "WEBHOOK_TOLERANCE_SECS", DEFAULT_TOLERANCE_SECS)?;

        Ok(Self {
            stripe_secret_key: required("STRIPE_SECRET_KEY")?,
            webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
            ledger_path: lookup("PAYMENT_LOG_PATH")
                .unwrap_or_else(|| DEFAULT_LEDGER_PATH.into())
                .into(),
            request_timeout: Duration::from_secs(request_timeout_secs),
            signature_tolerance_secs,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| PaymentError::Config(format!("{key} is not a valid number: {raw:?}"))),
        None => Ok(default),
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("stripe_secret_key", &"***")
            .field("webhook_secret", &"***")
            .field("bind_addr", &self.bind_addr)
            .field("ledger_path", &self.ledger_path)
            .field("request_timeout", &self.request_timeout)
            .field("signature_tolerance_secs", &self.signature_tolerance_secs)
            .finish()
    }
}
