//! HTTP surface of the relay.
//!
//! Routes:
//! - `POST /auth/signup`, `POST /auth/login`: account creation and login
//! - `POST /auth/subscribe`, `POST /auth/unsubscribe`: push subscription
//!   management for the bearer of a token
//! - `POST /webhook/alerts`: relay alerts to a vehicle owner's browser
//! - `GET /vapid-public-key`, `GET /healthz`
//!
//! Anything else falls through to the static front-end when one is
//! configured.

mod account;
mod error;
mod webhook;


use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::header::HeaderName;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use tracing::{info, warn, Level};

use crate::auth::TokenIssuer;
use crate::config::{Config, ServerConfig};
use crate::error::Result;
use crate::push::{AlertTemplate, PushSender};
use crate::storage::Database;

pub use error::ApiError;

/// Request settings derived from the configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Minimum accepted password length at signup.
    pub min_password_length: usize,
    /// VAPID public key handed to browsers.
    pub vapid_public_key: String,
    /// Title and icon of relayed alerts.
    pub alert: AlertTemplate,
    /// Expected `X-Webhook-Secret`, if the webhook is protected.
    pub webhook_secret: Option<String>,
}

impl Settings {
    /// Extract the request settings from a configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            min_password_length: config.auth.min_password_length,
            vapid_public_key: config.push.vapid_public_key.clone(),
            alert: AlertTemplate {
                title: config.push.alert_title.clone(),
                icon: config.push.alert_icon.clone(),
            },
            webhook_secret: config.webhook.secret.clone(),
        }
    }
}

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    db: Database,
    tokens: Arc<TokenIssuer>,
    push: Arc<dyn PushSender>,
    settings: Arc<Settings>,
}

impl AppState {
    /// Assemble the handler state.
    #[must_use]
    pub fn new(
        db: Database,
        tokens: TokenIssuer,
        push: Arc<dyn PushSender>,
        settings: Settings,
    ) -> Self {
        Self {
            db,
            tokens: Arc::new(tokens),
            push,
            settings: Arc::new(settings),
        }
    }
}

/// Build the application router with the standard layers applied.
pub fn router(state: AppState, server: &ServerConfig) -> Router {
    let router = Router::new()
        .route("/auth/signup", post(account::signup))
        .route("/auth/login", post(account::login))
        .route("/auth/subscribe", post(account::subscribe))
        .route("/auth/unsubscribe", post(account::unsubscribe))
        .route("/webhook/alerts", post(webhook::alerts))
        .route("/vapid-public-key", get(vapid_public_key))
        .route("/healthz", get(healthz))
        .with_state(state);

    let router = match &server.static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    apply_standard_layers(router, server.body_limit_bytes)
}

/// Request tracing, request ids and the body size limit.
pub fn apply_standard_layers(router: Router, body_limit_bytes: usize) -> Router {
    let trace = TraceLayer::new_for_http()
        .make_span_with(|request: &axum::http::Request<_>| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|value| value.to_str().ok())
                .unwrap_or("-");
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id
            )
        })
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        );

    let request_id_header = HeaderName::from_static("x-request-id");

    router
        .layer(trace)
        .layer(RequestBodyLimitLayer::new(body_limit_bytes))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
}

/// Serve `router` on `addr` until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(addr: SocketAddr, router: Router) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}

async fn vapid_public_key(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "publicKey": state.settings.vapid_public_key }))
}

async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.call(|storage| storage.ping()).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        Err(err) => {
            warn!(error = %err, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
        }
    }
}
