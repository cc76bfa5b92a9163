//! Stripe Webhook Signature Verification
//!
//! The `Stripe-Signature` header carries a timestamp and one or more
//! HMAC-SHA256 signatures of `"<timestamp>.<raw body>"` keyed by the endpoint's
//! signing secret. Deliveries are only dispatched once this check passes.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{PaymentError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Header Stripe sends the signature in
pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

/// Default allowed distance between the signed timestamp and now (5 minutes)
pub const DEFAULT_TOLERANCE_SECS: u64 = 300;

/// Parsed `Stripe-Signature` header
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    /// All `v1` entries; Stripe sends several while a secret is being rolled
    pub v1: Vec<Vec<u8>>,
}

impl SignatureHeader {
    /// Parse `t=<timestamp>,v1=<hex>[,v1=<hex>...]`. Unknown keys (`v0`) are ignored.
    pub fn parse(header: &str) -> Result<Self> {
        let mut timestamp = None;
        let mut v1 = Vec::new();

        for part in header.split(',') {
            let (key, value) = part
                .trim()
                .split_once('=')
                .ok_or_else(|| PaymentError::WebhookSignature("invalid header format".into()))?;

            match key {
                "t" => {
                    timestamp = Some(value.parse().map_err(|_| {
                        PaymentError::WebhookSignature("invalid timestamp".into())
                    })?);
                }
                "v1" => {
                    // A malformed entry simply cannot match
                    if let Ok(bytes) = hex::decode(value) {
                        v1.push(bytes);
                    }
                }
                _ => {}
            }
        }

        let timestamp =
            timestamp.ok_or_else(|| PaymentError::WebhookSignature("missing timestamp".into()))?;
        if v1.is_empty() {
            return Err(PaymentError::WebhookSignature("missing v1 signature".into()));
        }

        Ok(Self { timestamp, v1 })
    }
}

/// Verifies webhook deliveries against the endpoint signing secret
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance_secs: u64,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>, tolerance_secs: u64) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs,
        }
    }

    /// Verify `payload` against a `Stripe-Signature` header value at the current time
    pub fn verify(&self, payload: &[u8], header: &str) -> Result<()> {
        self.verify_at(payload, header, chrono::Utc::now().timestamp())
    }

    /// Verify against an explicit "now" (unix seconds)
    pub fn verify_at(&self, payload: &[u8], header: &str, now: i64) -> Result<()> {
        let header = SignatureHeader::parse(header)?;

        if now.abs_diff(header.timestamp) > self.tolerance_secs {
            return Err(PaymentError::WebhookSignature(format!(
                "timestamp {} outside tolerance of {}s",
                header.timestamp, self.tolerance_secs
            )));
        }

        let mac = self.mac(header.timestamp, payload);
        let matched = header
            .v1
            .iter()
            .any(|candidate| mac.clone().verify_slice(candidate).is_ok());

        if matched {
            Ok(())
        } else {
            Err(PaymentError::WebhookSignature(
                "no signature matches the payload".into(),
            ))
        }
    }

    /// Hex signature Stripe would send for `payload` at `timestamp`
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> String {
        hex::encode(self.mac(timestamp, payload).finalize().into_bytes())
    }

    /// Full header value for `payload` at `timestamp`
    pub fn header_for(&self, payload: &[u8], timestamp: i64) -> String {
        format!("t={},v1={}", timestamp, self.sign(payload, timestamp))
    }

    fn mac(&self, timestamp: i64, payload: &[u8]) -> HmacSha256 {
        // HMAC-SHA256 accepts keys of any length, so this cannot fail.
        let mut mac = <HmacSha256 as Mac>::new_from_slice(self.secret.as_bytes())
            .unwrap_or_else(|_| unreachable!("HMAC key length is unrestricted"));
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac
    }
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("secret", &"***")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish()
    }
}
