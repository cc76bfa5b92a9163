//! Webhook Envelope and Typed Event Payloads
//!
//! Stripe posts every notification as the same outer envelope: a type tag and
//! a `data.object` blob whose shape depends on the tag. The envelope is
//! decoded first, then the tag selects exactly one payload type.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, Result};

/// Outer structure of a Stripe webhook delivery
#[derive(Clone, Debug, Deserialize)]
pub struct WebhookEnvelope {
    /// Stripe event ID (`evt_...`)
    #[serde(default)]
    pub id: Option<String>,

    /// Event type tag, e.g. `charge.succeeded`
    #[serde(rename = "type")]
    pub event_type: String,

    #[serde(default)]
    pub data: Option<EnvelopeData>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EnvelopeData {
    /// Raw, type-dependent payload
    pub object: serde_json::Value,
}

impl WebhookEnvelope {
    /// Parse a raw request body into an envelope
    pub fn parse(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(|e| PaymentError::WebhookParse(e.to_string()))
    }
}

/// Event types this relay acts on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    PaymentIntentSucceeded,
    PaymentMethodAttached,
    ChargeSucceeded,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [
        EventKind::PaymentIntentSucceeded,
        EventKind::PaymentMethodAttached,
        EventKind::ChargeSucceeded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PaymentIntentSucceeded => "payment_intent.succeeded",
            EventKind::PaymentMethodAttached => "payment_method.attached",
            EventKind::ChargeSucceeded => "charge.succeeded",
        }
    }

    /// Look up a type tag; `None` for anything not handled here
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `payment_intent.succeeded` object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntentPayload {
    #[serde(default)]
    pub id: Option<String>,
    /// Amount in minor units
    pub amount: i64,
    #[serde(default)]
    pub currency: Option<String>,
}

/// `payment_method.attached` object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethodPayload {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "type")]
    pub method_type: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
}

/// `charge.succeeded` object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargePayload {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub amount: Option<i64>,
    pub billing_details: BillingDetails,
}

/// Payer identity and contact details attached to a charge.
///
/// Stripe sends `null` for anything the payer did not supply.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingDetails {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<Address>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub line1: Option<String>,
    #[serde(default)]
    pub line2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl ChargePayload {
    /// One-line summary of the payer, written to the console and the ledger
    pub fn summary(&self) -> String {
        let billing = &self.billing_details;
        let address = billing.address.clone().unwrap_or_default();
        let field = |value: &Option<String>| value.clone().unwrap_or_default();

        format!(
            "Charge succeeded! Customer:{}; Email:{}; Address:{}, {}, {}, {}, {}, {}; Phone:{}",
            field(&billing.name),
            field(&billing.email),
            field(&address.line1),
            field(&address.line2),
            field(&address.city),
            field(&address.state),
            field(&address.postal_code),
            field(&address.country),
            field(&billing.phone),
        )
    }
}

/// Parsed webhook event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookEvent {
    PaymentIntentSucceeded(PaymentIntentPayload),
    PaymentMethodAttached(PaymentMethodPayload),
    ChargeSucceeded(ChargePayload),

    /// Unhandled event type; the payload is never decoded
    Unhandled { event_type: String },
}

impl WebhookEvent {
    /// Decode the envelope's payload into the variant its type tag selects
    pub fn from_envelope(envelope: WebhookEnvelope) -> Result<Self> {
        let Some(kind) = EventKind::from_tag(&envelope.event_type) else {
            return Ok(WebhookEvent::Unhandled {
                event_type: envelope.event_type,
            });
        };

        let object = envelope.data.map(|d| d.object).ok_or_else(|| {
            PaymentError::PayloadDecode {
                event_type: kind.to_string(),
                reason: "missing `data.object`".into(),
            }
        })?;

        Ok(match kind {
            EventKind::PaymentIntentSucceeded => {
                WebhookEvent::PaymentIntentSucceeded(decode(kind, object)?)
            }
            EventKind::PaymentMethodAttached => {
                WebhookEvent::PaymentMethodAttached(decode(kind, object)?)
            }
            EventKind::ChargeSucceeded => WebhookEvent::ChargeSucceeded(decode(kind, object)?),
        })
    }

    /// Type tag this event was delivered under
    pub fn event_type(&self) -> &str {
        match self {
            WebhookEvent::PaymentIntentSucceeded(_) => EventKind::PaymentIntentSucceeded.as_str(),
            WebhookEvent::PaymentMethodAttached(_) => EventKind::PaymentMethodAttached.as_str(),
            WebhookEvent::ChargeSucceeded(_) => EventKind::ChargeSucceeded.as_str(),
            WebhookEvent::Unhandled { event_type } => event_type,
        }
    }
}

fn decode<T: DeserializeOwned>(kind: EventKind, object: serde_json::Value) -> Result<T> {
    serde_json::from_value(object).map_err(|e| PaymentError::PayloadDecode {
        event_type: kind.to_string(),
        reason: e.to_string(),
    })
}
