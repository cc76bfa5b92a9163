//! Application State

use std::sync::Arc;

use relay_payments::{IntentProvider, WebhookHandler};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Payment intent provider (Stripe in production)
    pub intents: Arc<dyn IntentProvider>,

    /// Webhook verification, dispatch and the payment ledger
    pub webhooks: Arc<WebhookHandler>,
}
