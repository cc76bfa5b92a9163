//! Payment Intent Creation
//!
//! Asks Stripe for a new payment intent and hands back the client secret the
//! payer's browser needs to confirm it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stripe::{Client, CreatePaymentIntent, Currency, PaymentIntent};

use crate::error::{PaymentError, Result};

/// Amount charged per intent, in minor units ($20.00)
pub const DEFAULT_AMOUNT: i64 = 2000;

/// Parameters for a new payment intent
#[derive(Clone, Debug)]
pub struct IntentParams {
    /// Amount in the currency's minor unit
    pub amount: i64,
    pub currency: Currency,
    /// Accepted payment method types (e.g. `card`)
    pub payment_method_types: Vec<String>,
}

impl Default for IntentParams {
    fn default() -> Self {
        Self {
            amount: DEFAULT_AMOUNT,
            currency: Currency::USD,
            payment_method_types: vec!["card".to_string()],
        }
    }
}

/// Opaque client secret of a created payment intent
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientSecret(String);

impl ClientSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ClientSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ClientSecret(***)")
    }
}

/// Capability to create payment intents
#[async_trait]
pub trait IntentProvider: Send + Sync {
    /// Create a payment intent and return its client secret.
    ///
    /// Every failure, including a created intent that carries no secret,
    /// comes back as an error.
    async fn create_intent(&self, params: &IntentParams) -> Result<ClientSecret>;
}

/// Stripe-backed intent provider
pub struct StripeIntents {
    client: Client,
}

impl StripeIntents {
    /// Create a new provider authenticated with the given secret key
    pub fn new(secret_key: &str) -> Self {
        Self {
            client: Client::new(secret_key),
        }
    }
}

#[async_trait]
impl IntentProvider for StripeIntents {
    async fn create_intent(&self, params: &IntentParams) -> Result<ClientSecret> {
        let mut create = CreatePaymentIntent::new(params.amount, params.currency);
        create.payment_method_types = Some(params.payment_method_types.clone());

        let intent = PaymentIntent::create(&self.client, create)
            .await
            .map_err(|e| PaymentError::Stripe(e.to_string()))?;

        tracing::debug!(intent_id = %intent.id, amount = params.amount, "Created payment intent");

        intent
            .client_secret
            .map(ClientSecret::new)
            .ok_or_else(|| PaymentError::MissingClientSecret(intent.id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params() {
        let params = IntentParams::default();
        assert_eq!(params.amount, 2000);
        assert_eq!(params.currency, Currency::USD);
        assert_eq!(params.payment_method_types, vec!["card".to_string()]);
    }

    #[test]
    fn test_client_secret_serializes_as_string() {
        let secret = ClientSecret::new("pi_1_secret_2");
        assert_eq!(serde_json::to_string(&secret).unwrap(), "\"pi_1_secret_2\"");
        assert_eq!(format!("{secret:?}"), "ClientSecret(***)");
    }
}
