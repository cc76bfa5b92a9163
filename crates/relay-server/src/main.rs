//! payment-relay HTTP Server
//!
//! Axum-based server that creates Stripe payment intents and relays Stripe
//! webhook events into the console and the payment ledger.

mod config;
mod handlers;
mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use relay_payments::{PaymentLedger, StripeIntents, WebhookHandler, WebhookVerifier};

use crate::config::ServerConfig;
use crate::handlers::{create_payment_intent, health_check, stripe_webhook};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment; a missing .env is fine, a broken one is not
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            tracing::error!("Failed to load .env: {}", e);
            return Err(e.into());
        }
    }

    let config = ServerConfig::from_env().inspect_err(|e| {
        tracing::error!("{}", e);
        tracing::error!("  Set STRIPE_SECRET_KEY and STRIPE_WEBHOOK_SECRET in .env");
    })?;
    tracing::debug!(?config, "Loaded configuration");

    // The ledger is the audit trail for successful charges; refuse to run without it
    let ledger = Arc::new(PaymentLedger::open(&config.ledger_path).await.inspect_err(|e| {
        tracing::error!(path = %config.ledger_path.display(), "Cannot open payment ledger: {}", e);
    })?);
    tracing::info!("✓ Payment ledger at {}", ledger.path().display());

    let state = AppState {
        intents: Arc::new(StripeIntents::new(&config.stripe_secret_key)),
        webhooks: Arc::new(WebhookHandler::new(
            WebhookVerifier::new(&config.webhook_secret, config.signature_tolerance_secs),
            ledger.clone(),
        )),
    };

    let app = build_router(state, config.request_timeout);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 payment-relay running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                - Health check");
    tracing::info!("  POST /create-payment-intent - Create Stripe payment intent");
    tracing::info!("  POST /webhook               - Stripe webhook events");
    tracing::info!("");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    ledger.sync().await?;
    tracing::info!("Payment ledger synced, shutting down");

    Ok(())
}

/// Build the application router
pub(crate) fn build_router(state: AppState, request_timeout: Duration) -> Router {
    // The client secret is fetched by browser checkout code on another origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/create-payment-intent", post(create_payment_intent))
        .route("/webhook", post(stripe_webhook))
        .layer(cors)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining requests");
}
