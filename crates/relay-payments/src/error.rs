//! Payment Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Stripe API error
    #[error("Stripe error: {0}")]
    Stripe(String),

    /// Stripe created the intent but returned no client secret
    #[error("Stripe returned payment intent {0} without a client secret")]
    MissingClientSecret(String),

    /// Webhook request carried no signature header
    #[error("Webhook signature missing")]
    MissingSignature,

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Webhook envelope parsing failed
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Event payload did not match the shape its type implies
    #[error("Failed to decode {event_type} payload: {reason}")]
    PayloadDecode { event_type: String, reason: String },

    /// Request body could not be read (too large or transport failure)
    #[error("Request body unreadable: {0}")]
    BodyRead(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Payment ledger I/O error
    #[error("Payment ledger error: {0}")]
    Ledger(#[from] std::io::Error),
}

impl PaymentError {
    /// Get user-friendly message
    pub fn user_message(&self) -> &str {
        match self {
            PaymentError::Stripe(_) | PaymentError::MissingClientSecret(_) => {
                "Payment processing failed. Please try again."
            }
            PaymentError::MissingSignature => "Missing Stripe signature.",
            PaymentError::WebhookSignature(_) => "Invalid signature.",
            PaymentError::WebhookParse(_) | PaymentError::PayloadDecode { .. } => {
                "Malformed webhook payload."
            }
            PaymentError::BodyRead(_) => "Request body could not be read.",
            PaymentError::Config(_) => "Service configuration error.",
            PaymentError::Ledger(_) => "An error occurred processing your request.",
        }
    }
}
