//! Request logger demo server.
//!
//! Runs a small axum API with the request logger installed, to show both
//! ways of writing to a request's log:
//!
//! ```text
//!   handler ── RequestLogger extractor ──┐
//!      │                                 ├──▶ one JSON record per request
//!      └─▶ helpers ── context::log_* ────┘        (stdout / stderr / remote)
//! ```
//!
//! Try:
//! - `GET  /user/123`, `GET /user/invalid`
//! - `POST /process-order` with `{"userId": "123", "amount": 100}`
//! - `GET  /error-demo`, `GET /backward-compatibility`
//! - `GET  /test-success`, `GET /test-error`

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::Path,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use request_logger::config::{apply_env_overrides, load_config};
use request_logger::context::{self, log_error, log_field};
use request_logger::{LoggerConfig, LoggerSettings, RequestLogger};

#[derive(Parser)]
#[command(name = "request-logger")]
#[command(about = "Demo API with per-request log aggregation", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on.
    #[arg(short, long, default_value = "0.0.0.0:3001")]
    bind: String,
}

#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error("Invalid user ID")]
    InvalidUser,

    #[error("Invalid payment amount")]
    InvalidAmount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderRequest {
    user_id: String,
    amount: i64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "request_logger=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => LoggerConfig {
            domain: "context-example".to_string(),
            service: "demo".to_string(),
            module: "async-storage".to_string(),
            colors: true,
            ..LoggerConfig::default()
        },
    };
    apply_env_overrides(&mut config);

    tracing::info!(
        domain = %config.domain,
        service = %config.service,
        only_errors = config.only_errors,
        remote = config.remote.enabled,
        "Configuration loaded"
    );

    let settings = Arc::new(LoggerSettings::new(config));
    let app = demo_router(settings).layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(&cli.bind).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn demo_router(settings: Arc<LoggerSettings>) -> Router {
    let router = Router::new()
        .route("/user/{id}", get(get_user))
        .route("/process-order", post(process_order))
        .route("/error-demo", get(error_demo))
        .route("/backward-compatibility", get(backward_compatibility))
        .route("/test-success", get(test_success))
        .route("/test-error", get(test_error));
    request_logger::http::install(router, settings)
}

fn error_body(message: impl std::fmt::Display) -> Json<serde_json::Value> {
    Json(json!({ "error": message.to_string(), "isError": true }))
}

async fn get_user(logger: RequestLogger, Path(id): Path<String>) -> impl IntoResponse {
    logger.append_field("route-accessed", "/user/{id}");
    log_field("request-start", &chrono::Utc::now().timestamp_millis());

    match get_user_data(&id).await {
        Ok(user) => {
            log_field("request-success", &true);
            (StatusCode::OK, Json(user))
        }
        Err(e) => {
            log_error("request-error", &e.to_string(), Some("REQ_001"));
            (StatusCode::BAD_REQUEST, error_body(e))
        }
    }
}

async fn process_order(Json(order): Json<OrderRequest>) -> impl IntoResponse {
    log_field("route-accessed", "/process-order");
    log_field("order-data", &json!({ "userId": order.user_id, "amount": order.amount }));

    let result = async {
        let user = get_user_data(&order.user_id).await?;
        let payment = process_payment(order.amount).await?;
        let name = user["name"].as_str().unwrap_or_default();
        send_notification(format!("Order processed for user {name}")).await;
        Ok::<_, DemoError>((user, payment))
    }
    .await;

    match result {
        Ok((user, payment)) => {
            log_field("order-completed", &true);
            let order_id = format!("order_{}", chrono::Utc::now().timestamp_millis());
            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "orderId": order_id,
                    "user": user,
                    "payment": payment,
                })),
            )
        }
        Err(e) => {
            context::log_failure("order-error", &e, Some("ORDER_001"));
            (StatusCode::BAD_REQUEST, error_body(e))
        }
    }
}

async fn error_demo() -> impl IntoResponse {
    log_field("route-accessed", "/error-demo");
    if get_user_data("invalid").await.is_err() {
        log_field("error-handled", &true);
    }
    (StatusCode::INTERNAL_SERVER_ERROR, error_body("Demo error"))
}

async fn backward_compatibility(logger: RequestLogger) -> Json<serde_json::Value> {
    logger.append_field("traditional-method", "works");
    log_field("global-method", "also works");
    Json(json!({ "message": "Both methods work" }))
}

async fn test_success() -> Json<serde_json::Value> {
    log_field("test-type", "success-test");
    log_field("message", "This is a successful request test");
    log_field("timestamp", &chrono::Utc::now().to_rfc3339());
    Json(json!({ "status": "success" }))
}

async fn test_error() -> impl IntoResponse {
    log_field("test-type", "error-test");
    log_error("test-error", "This is a test error", Some("TEST_ERR_001"));
    (StatusCode::INTERNAL_SERVER_ERROR, error_body("This is a test error"))
}

async fn get_user_data(user_id: &str) -> Result<serde_json::Value, DemoError> {
    log_field("function-called", "getUserData");
    log_field("user-id", user_id);

    tokio::time::sleep(Duration::from_millis(100)).await;

    if user_id == "invalid" {
        log_error("validation-error", "Invalid user ID", Some("USER_001"));
        return Err(DemoError::InvalidUser);
    }

    let user = json!({ "id": user_id, "name": "John Doe", "email": "john@example.com" });
    log_field("user-data-retrieved", &user);
    Ok(user)
}

async fn process_payment(amount: i64) -> Result<serde_json::Value, DemoError> {
    log_field("function-called", "processPayment");
    log_field("payment-amount", &amount);

    tokio::time::sleep(Duration::from_millis(200)).await;

    if amount <= 0 {
        log_error("payment-error", "Invalid payment amount", Some("PAY_001"));
        return Err(DemoError::InvalidAmount);
    }

    let payment_id = format!("pay_{}", chrono::Utc::now().timestamp_millis());
    log_field("payment-processed", &json!({ "paymentId": payment_id, "amount": amount }));
    Ok(json!({ "paymentId": payment_id, "status": "completed" }))
}

async fn send_notification(message: String) {
    log_field("function-called", "sendNotification");

    // Handlers can also grab the full logger from context.
    if let Ok(logger) = context::require_current() {
        logger.append_field("notification-message", &message);
    }

    // Delivery runs detached but still logs into this request.
    let delivery = context::spawn(async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        log_field("notification-sent", &true);
    });
    if let Err(e) = delivery.await {
        log_error("notification-error", &e.to_string(), None);
    }
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
