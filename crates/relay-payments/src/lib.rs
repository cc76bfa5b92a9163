//! # relay-payments
//!
//! Payment intent creation and Stripe webhook dispatch for payment-relay.
//!
//! ## Flow
//!
//! ```text
//! ┌──────────┐  POST /create-payment-intent  ┌─────────────┐  create   ┌────────┐
//! │  Browser │──────────────────────────────▶│    Relay    │──────────▶│ Stripe │
//! │          │◀──── { client_secret } ───────│             │           │        │
//! └──────────┘                               │             │◀──────────│        │
//!                                            │  /webhook   │  events   └────────┘
//!                                            └──────┬──────┘
//!                                                   │ charge.succeeded
//!                                                   ▼
//!                                       successful_payments.log
//! ```
//!
//! Webhook deliveries are authenticated with the endpoint signing secret
//! before anything is decoded. Stripe may redeliver or reorder events; this
//! crate does not deduplicate them, so a redelivered `charge.succeeded`
//! produces a second ledger record.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relay_payments::{IntentParams, IntentProvider, StripeIntents};
//!
//! let intents = StripeIntents::new("sk_test_xxx");
//! let secret = intents.create_intent(&IntentParams::default()).await?;
//!
//! // Hand secret.as_str() to Stripe.js on the client
//! ```

mod error;
mod event;
mod intent;
mod ledger;
mod signature;
mod webhook;

pub use error::{PaymentError, Result};
pub use event::{
    Address, BillingDetails, ChargePayload, EventKind, PaymentIntentPayload,
    PaymentMethodPayload, WebhookEnvelope, WebhookEvent,
};
pub use intent::{ClientSecret, IntentParams, IntentProvider, StripeIntents};
pub use ledger::{DEFAULT_LEDGER_PATH, PaymentLedger, RECORD_PREFIX};
pub use signature::{DEFAULT_TOLERANCE_SECS, SIGNATURE_HEADER, WebhookVerifier};
pub use webhook::{MAX_WEBHOOK_BODY_BYTES, Notice, NoticeLevel, WebhookHandler};
