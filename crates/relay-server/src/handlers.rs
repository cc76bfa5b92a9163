//! HTTP Handlers

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use serde::Serialize;

use relay_payments::{
    ClientSecret, IntentParams, MAX_WEBHOOK_BODY_BYTES, PaymentError, SIGNATURE_HEADER,
};

use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub ledger_failed_writes: u64,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct ClientSecretResponse {
    pub client_secret: ClientSecret,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: &PaymentError, code: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.user_message().into(),
            code: code.into(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        ledger_failed_writes: state.webhooks.ledger().failed_writes(),
    })
}

/// Create a Stripe payment intent for the fixed checkout amount
pub async fn create_payment_intent(
    State(state): State<AppState>,
) -> Result<Json<ClientSecretResponse>, ApiError> {
    let client_secret = state
        .intents
        .create_intent(&IntentParams::default())
        .await
        .map_err(|e| {
            tracing::error!("Payment intent error: {}", e);
            api_error(StatusCode::BAD_GATEWAY, &e, "PROVIDER_ERROR")
        })?;

    Ok(Json(ClientSecretResponse { client_secret }))
}

/// Stripe webhook handler
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<StatusCode, ApiError> {
    let payload = axum::body::to_bytes(body, MAX_WEBHOOK_BODY_BYTES)
        .await
        .map_err(|e| {
            let e = PaymentError::BodyRead(e.to_string());
            tracing::warn!("Error reading webhook body: {}", e);
            api_error(StatusCode::SERVICE_UNAVAILABLE, &e, "BODY_UNREADABLE")
        })?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let event = state
        .webhooks
        .parse_event(&payload, signature)
        .map_err(|e| {
            tracing::warn!("Rejected webhook: {}", e);
            let code = match e {
                PaymentError::MissingSignature => "MISSING_SIGNATURE",
                PaymentError::WebhookSignature(_) => "INVALID_SIGNATURE",
                _ => "INVALID_PAYLOAD",
            };
            api_error(StatusCode::BAD_REQUEST, &e, code)
        })?;

    state.webhooks.handle(&event).await;

    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::{Router, body::Body, http::Request};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use relay_payments::{
        DEFAULT_TOLERANCE_SECS, IntentProvider, PaymentLedger, Result, WebhookHandler,
        WebhookVerifier,
    };

    use super::*;

    const WEBHOOK_SECRET: &str = "whsec_server_test";

    struct FakeIntents {
        fail: bool,
    }

    #[async_trait]
    impl IntentProvider for FakeIntents {
        async fn create_intent(&self, params: &IntentParams) -> Result<ClientSecret> {
            if self.fail {
                Err(PaymentError::Stripe("api_key_expired".into()))
            } else {
                Ok(ClientSecret::new(format!("pi_{}_secret_abc", params.amount)))
            }
        }
    }

    struct TestApp {
        router: Router,
        dir: tempfile::TempDir,
    }

    impl TestApp {
        async fn new(fail_intents: bool) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let ledger_path = dir.path().join("payments.log");
            Self::with_ledger(fail_intents, dir, &ledger_path).await
        }

        async fn with_ledger(
            fail_intents: bool,
            dir: tempfile::TempDir,
            ledger_path: &Path,
        ) -> Self {
            let ledger = PaymentLedger::open(ledger_path).await.unwrap();
            let state = AppState {
                intents: Arc::new(FakeIntents { fail: fail_intents }),
                webhooks: Arc::new(WebhookHandler::new(
                    WebhookVerifier::new(WEBHOOK_SECRET, DEFAULT_TOLERANCE_SECS),
                    Arc::new(ledger),
                )),
            };
            Self {
                router: crate::build_router(state, Duration::from_secs(5)),
                dir,
            }
        }

        fn ledger_lines(&self) -> Vec<String> {
            std::fs::read_to_string(self.dir.path().join("payments.log"))
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect()
        }

        async fn post(
            &self,
            uri: &str,
            body: Vec<u8>,
            signature: Option<String>,
        ) -> (StatusCode, Value) {
            let mut request = Request::builder().method("POST").uri(uri);
            if let Some(signature) = signature {
                request = request.header(SIGNATURE_HEADER, signature);
            }
            self.send(request.body(Body::from(body)).unwrap()).await
        }

        async fn get(&self, uri: &str) -> (StatusCode, Value) {
            self.send(Request::builder().uri(uri).body(Body::empty()).unwrap()).await
        }

        async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
            let response = self.router.clone().oneshot(request).await.unwrap();

            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, value)
        }

        async fn webhook(&self, body: &Value) -> StatusCode {
            let body = body.to_string().into_bytes();
            let signature = sign(&body);
            self.post("/webhook", body, Some(signature)).await.0
        }
    }

    fn sign(body: &[u8]) -> String {
        WebhookVerifier::new(WEBHOOK_SECRET, DEFAULT_TOLERANCE_SECS)
            .header_for(body, chrono::Utc::now().timestamp())
    }

    fn charge_event(name: &str) -> Value {
        json!({
            "id": "evt_1",
            "type": "charge.succeeded",
            "data": {"object": {"id": "ch_1", "billing_details": {
                "name": name, "email": "a@x.com", "phone": "555",
                "address": {"line1": "L1", "line2": "L2", "city": "C",
                            "state": "S", "postal_code": "Z", "country": "US"}
            }}}
        })
    }

    #[tokio::test]
    async fn test_create_payment_intent() {
        let app = TestApp::new(false).await;

        let (status, body) = app.post("/create-payment-intent", Vec::new(), None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"client_secret": "pi_2000_secret_abc"}));
    }

    #[tokio::test]
    async fn test_create_payment_intent_provider_failure() {
        let app = TestApp::new(true).await;

        let (status, body) = app.post("/create-payment-intent", Vec::new(), None).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], "PROVIDER_ERROR");
        assert!(body["error"].as_str().unwrap().contains("Payment processing failed"));
        assert!(!body.to_string().contains("api_key_expired"));
    }

    #[tokio::test]
    async fn test_health() {
        let app = TestApp::new(false).await;

        let (status, body) = app.get("/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["ledger_failed_writes"], 0);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_ledger_failure_keeps_webhook_ok() {
        // Every write to /dev/full fails with ENOSPC
        let dir = tempfile::tempdir().unwrap();
        let app = TestApp::with_ledger(false, dir, Path::new("/dev/full")).await;

        assert_eq!(app.webhook(&charge_event("A")).await, StatusCode::OK);
        assert_eq!(app.webhook(&charge_event("B")).await, StatusCode::OK);

        let (status, body) = app.get("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ledger_failed_writes"], 2);
    }

    #[tokio::test]
    async fn test_supported_events_return_ok() {
        let app = TestApp::new(false).await;

        let intent = json!({
            "type": "payment_intent.succeeded",
            "data": {"object": {"id": "pi_1", "amount": 2000}}
        });
        let method = json!({
            "type": "payment_method.attached",
            "data": {"object": {"id": "pm_1", "type": "card"}}
        });

        assert_eq!(app.webhook(&intent).await, StatusCode::OK);
        assert_eq!(app.webhook(&method).await, StatusCode::OK);
        assert!(app.ledger_lines().is_empty());

        assert_eq!(app.webhook(&charge_event("A")).await, StatusCode::OK);
        let lines = app.ledger_lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("payment_successful: "));
        assert!(lines[0].ends_with(
            "Charge succeeded! Customer:A; Email:a@x.com; Address:L1, L2, C, S, Z, US; Phone:555"
        ));
    }

    #[tokio::test]
    async fn test_unknown_type_is_ok_without_decode() {
        let app = TestApp::new(false).await;

        let status = app
            .webhook(&json!({"type": "customer.created", "data": {"object": "not an object"}}))
            .await;
        assert_eq!(status, StatusCode::OK);

        let status = app.webhook(&json!({"type": "invoice.paid"})).await;
        assert_eq!(status, StatusCode::OK);
        assert!(app.ledger_lines().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_body_is_unavailable() {
        let app = TestApp::new(false).await;

        let mut event = charge_event("A");
        event["padding"] = json!("x".repeat(MAX_WEBHOOK_BODY_BYTES));
        let body = event.to_string().into_bytes();
        assert!(body.len() > MAX_WEBHOOK_BODY_BYTES);

        let signature = sign(&body);
        let (status, _) = app.post("/webhook", body, Some(signature)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(app.ledger_lines().is_empty());

        // Oversize wins even without a signature
        let (status, _) = app
            .post("/webhook", vec![b'{'; MAX_WEBHOOK_BODY_BYTES + 1], None)
            .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_body_at_limit_is_accepted() {
        let app = TestApp::new(false).await;

        let mut event = json!({"type": "invoice.paid", "padding": ""});
        let overhead = event.to_string().len();
        event["padding"] = json!("x".repeat(MAX_WEBHOOK_BODY_BYTES - overhead));
        let body = event.to_string().into_bytes();
        assert_eq!(body.len(), MAX_WEBHOOK_BODY_BYTES);

        let signature = sign(&body);
        let (status, _) = app.post("/webhook", body, Some(signature)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_invalid_json_is_bad_request() {
        let app = TestApp::new(false).await;
        let body = b"{\"type\": \"charge.succeeded\",".to_vec();
        let signature = sign(&body);

        let (status, response) = app.post("/webhook", body, Some(signature)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["code"], "INVALID_PAYLOAD");
        assert!(app.ledger_lines().is_empty());
    }

    #[tokio::test]
    async fn test_mismatched_payload_is_bad_request() {
        let app = TestApp::new(false).await;

        let status = app
            .webhook(&json!({
                "type": "payment_intent.succeeded",
                "data": {"object": {"amount": "lots"}}
            }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let status = app
            .webhook(&json!({
                "type": "charge.succeeded",
                "data": {"object": {"billing_details": "A"}}
            }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(app.ledger_lines().is_empty());
    }

    #[tokio::test]
    async fn test_signature_required() {
        let app = TestApp::new(false).await;
        let body = charge_event("Mallory").to_string().into_bytes();

        let (status, response) = app.post("/webhook", body.clone(), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["code"], "MISSING_SIGNATURE");

        let forged = WebhookVerifier::new("whsec_guess", DEFAULT_TOLERANCE_SECS)
            .header_for(&body, chrono::Utc::now().timestamp());
        let (status, response) = app.post("/webhook", body, Some(forged)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["code"], "INVALID_SIGNATURE");

        assert!(app.ledger_lines().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_charges_are_not_interleaved() {
        let app = Arc::new(TestApp::new(false).await);
        const N: usize = 50;

        let tasks = (0..N).map(|i| {
            let app = app.clone();
            tokio::spawn(async move { app.webhook(&charge_event(&format!("Customer{i}"))).await })
        });
        for status in futures::future::join_all(tasks).await {
            assert_eq!(status.unwrap(), StatusCode::OK);
        }

        let lines = app.ledger_lines();
        assert_eq!(lines.len(), N);

        let mut customers: Vec<usize> = lines
            .iter()
            .map(|line| {
                assert!(line.starts_with("payment_successful: "));
                assert!(line.ends_with("Address:L1, L2, C, S, Z, US; Phone:555"));
                let name = line.split("Customer:").nth(1).unwrap();
                name.trim_start_matches("Customer")
                    .split(';')
                    .next()
                    .unwrap()
                    .parse()
                    .unwrap()
            })
            .collect();
        customers.sort_unstable();
        assert_eq!(customers, (0..N).collect::<Vec<_>>());
    }
}
