//! HTTP server for the webhook relay.
//!
//! # Endpoints
//!
//! - `POST /` - Accepts a signed webhook and forwards it downstream
//! - `GET /health` - Returns 200 if the server is running

use std::sync::Arc;

use tower_http::trace::TraceLayer;

use crate::config::RelayConfig;
use crate::forward::{DisconnectPolicy, Forwarder, HttpTransport};
use crate::routing::{RouteTable, RoutingPolicy};
use crate::types::WebhookSecret;

pub mod health;
pub mod relay;

pub use health::health_handler;
pub use relay::{DeliveryOutcome, RelayError, relay_handler};

/// Shared application state.
///
/// Built once from [`RelayConfig`] and read-only afterwards. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    secret: WebhookSecret,
    routes: RouteTable,
    routing: RoutingPolicy,
    endpoint_base: String,

    /// Holds the pooled HTTP client shared by every delivery.
    forwarder: Forwarder<HttpTransport>,

    on_disconnect: DisconnectPolicy,
    max_body_bytes: usize,
}

impl AppState {
    /// Builds the state, including the outbound HTTP client.
    pub fn from_config(config: &RelayConfig) -> Result<Self, reqwest::Error> {
        let transport = HttpTransport::new(&config.retry)?;

        Ok(AppState {
            inner: Arc::new(AppStateInner {
                secret: config.secret.clone(),
                routes: config.routes.clone(),
                routing: config.routing,
                endpoint_base: config.endpoint_base.clone(),
                forwarder: Forwarder::new(transport, config.retry),
                on_disconnect: config.on_disconnect,
                max_body_bytes: config.max_body_bytes,
            }),
        })
    }

    pub fn secret(&self) -> &WebhookSecret {
        &self.inner.secret
    }

    pub fn routes(&self) -> &RouteTable {
        &self.inner.routes
    }

    pub fn routing(&self) -> RoutingPolicy {
        self.inner.routing
    }

    pub fn endpoint_base(&self) -> &str {
        &self.inner.endpoint_base
    }

    pub fn forwarder(&self) -> &Forwarder<HttpTransport> {
        &self.inner.forwarder
    }

    pub fn on_disconnect(&self) -> DisconnectPolicy {
        self.inner.on_disconnect
    }

    pub fn max_body_bytes(&self) -> usize {
        self.inner.max_body_bytes
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/", post(relay_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
