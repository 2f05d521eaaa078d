//! HTTP ingress.
//!
//! A thin layer over the [`Advisor`]: one chat endpoint that accepts a
//! JSON array of messages, forwards the last message's content as the
//! query, and streams generation fragments back as a chunked text body,
//! one chunk per fragment, as soon as each is produced.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/v1/llm` | Answer the last message's content, streamed |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! Failures before streaming starts return a JSON body:
//!
//! ```json
//! { "error": { "code": "upstream_error", "message": "..." } }
//! ```
//!
//! Codes: `bad_request` (400), `content_policy` (403), `not_found` (404),
//! `upstream_error` (502), `internal` (500). Once streaming has begun, a
//! mid-stream failure truncates the response and closes the connection;
//! the client keeps whatever fragments it already received.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::chat::Advisor;
use crate::config::Config;
use crate::error::AdvisorError;

/// Shared application state passed to route handlers.
#[derive(Clone)]
struct AppState {
    advisor: Arc<Advisor>,
}

/// Start the HTTP server. Runs until the process is terminated.
///
/// Ingestion must have completed before this is called; the advisor only
/// reads the index.
pub async fn run_server(config: &Config, advisor: Arc<Advisor>) -> anyhow::Result<()> {
    let cors = match &config.server.cors_origin {
        Some(origin) => {
            let origin: HeaderValue = origin
                .parse()
                .map_err(|_| AdvisorError::Configuration(format!("invalid CORS origin: {}", origin)))?;
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE])
                .allow_credentials(true)
        }
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    };

    let state = AppState { advisor };

    let app = Router::new()
        .route("/api/v1/llm", post(handle_chat))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("advisor listening on http://{}", config.server.bind);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

/// Map a pipeline failure to the most appropriate status code.
fn classify_error(err: anyhow::Error) -> AppError {
    let (status, code) = match err.downcast_ref::<AdvisorError>() {
        Some(AdvisorError::ContentPolicy(_)) => (StatusCode::FORBIDDEN, "content_policy"),
        Some(AdvisorError::NotFound(_)) => (StatusCode::NOT_FOUND, "not_found"),
        Some(AdvisorError::EmbeddingService(_)) | Some(AdvisorError::GenerationService(_)) => {
            (StatusCode::BAD_GATEWAY, "upstream_error")
        }
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    };

    AppError {
        status,
        code: code.to_string(),
        message: err.to_string(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/v1/llm ============

/// One entry of the incoming conversation array. Only the last entry's
/// `content` is consumed.
#[derive(Deserialize)]
struct IncomingMessage {
    #[allow(dead_code)]
    #[serde(default)]
    role: String,
    content: String,
}

async fn handle_chat(
    State(state): State<AppState>,
    Json(messages): Json<Vec<IncomingMessage>>,
) -> Result<Response, AppError> {
    let query = messages
        .last()
        .map(|m| m.content.clone())
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| bad_request("messages must contain a non-empty last entry"))?;

    let stream = state
        .advisor
        .respond(&query)
        .await
        .map_err(classify_error)?;

    // Fragment errors after this point terminate the body mid-stream.
    let body = Body::from_stream(
        stream.map(|fragment| fragment.map_err(|e| std::io::Error::other(e.to_string()))),
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(body)
        .map_err(|e| AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal".to_string(),
            message: e.to_string(),
        })
}
