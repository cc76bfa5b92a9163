//! Stripe Webhook Handling
//!
//! Authenticates deliveries, decodes them into [`WebhookEvent`]s and performs
//! the per-type side effects.

use std::sync::Arc;

use crate::error::{PaymentError, Result};
use crate::event::{WebhookEnvelope, WebhookEvent};
use crate::ledger::PaymentLedger;
use crate::signature::WebhookVerifier;

/// Largest webhook body accepted, in bytes
pub const MAX_WEBHOOK_BODY_BYTES: usize = 65_536;

/// Severity of the console line a handled event produced
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warn,
}

/// What handling an event emitted
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    /// Whether a ledger record was written for this event
    pub recorded: bool,
}

/// Webhook handler
pub struct WebhookHandler {
    verifier: WebhookVerifier,
    ledger: Arc<PaymentLedger>,
}

impl WebhookHandler {
    pub fn new(verifier: WebhookVerifier, ledger: Arc<PaymentLedger>) -> Self {
        Self { verifier, ledger }
    }

    pub fn ledger(&self) -> &PaymentLedger {
        &self.ledger
    }

    /// Verify webhook signature and decode the event
    pub fn parse_event(&self, payload: &[u8], signature: Option<&str>) -> Result<WebhookEvent> {
        let signature = signature.ok_or(PaymentError::MissingSignature)?;
        self.verifier.verify(payload, signature)?;

        let envelope = WebhookEnvelope::parse(payload)?;
        tracing::debug!(
            event_id = envelope.id.as_deref().unwrap_or("-"),
            event_type = %envelope.event_type,
            "Received Stripe webhook"
        );

        WebhookEvent::from_envelope(envelope)
    }

    /// Process a webhook event.
    ///
    /// Redeliveries are processed again; nothing here deduplicates by event ID.
    pub async fn handle(&self, event: &WebhookEvent) -> Notice {
        match event {
            WebhookEvent::PaymentIntentSucceeded(intent) => {
                let message = format!("PaymentIntent was successful! Amount: {}", intent.amount);
                tracing::info!(intent_id = ?intent.id, "{message}");
                Notice::info(message, false)
            }

            WebhookEvent::PaymentMethodAttached(method) => {
                let message = "PaymentMethod was attached to a Customer!".to_string();
                tracing::info!(payment_method_id = ?method.id, "{message}");
                Notice::info(message, false)
            }

            WebhookEvent::ChargeSucceeded(charge) => {
                let message = charge.summary();
                tracing::info!(charge_id = ?charge.id, "{message}");
                let recorded = self.ledger.record(&message).await;
                Notice::info(message, recorded)
            }

            WebhookEvent::Unhandled { event_type } => {
                let message = format!("Unhandled event type: {event_type}");
                tracing::warn!("{message}");
                Notice {
                    level: NoticeLevel::Warn,
                    message,
                    recorded: false,
                }
            }
        }
    }
}

impl Notice {
    fn info(message: String, recorded: bool) -> Self {
        Self {
            level: NoticeLevel::Info,
            message,
            recorded,
        }
    }
}
