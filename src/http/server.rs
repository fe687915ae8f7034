//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with every handler
//! - Wire up the middleware pipeline in an explicit, fixed order
//! - Bind the server to a listener and drain on shutdown
//!
//! # Pipeline (outermost first)
//! ```text
//! set request id → trace span → propagate request id → metrics → cors
//!     → render error bodies → timeout → body limit
//!     → rate limit gate → authentication gate → route policy → handler
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{DefaultBodyLimit, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::setup_admin_router;
use crate::auth::credentials::UserDirectory;
use crate::auth::{handlers as auth_handlers, SessionService};
use crate::config::AppConfig;
use crate::http::cors::cors_layer;
use crate::http::request::{request_id, X_REQUEST_ID};
use crate::http::response::render_errors;
use crate::observability::metrics;
use crate::security::access_control::access_control_middleware;
use crate::security::authentication::authenticate;
use crate::security::rate_limit::rate_limit_middleware;
use crate::security::{Authenticator, RateLimiter, RoutePolicy};
use crate::tasks::{handlers as task_handlers, TaskRepository};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub sessions: Arc<SessionService>,
    pub authenticator: Authenticator,
    pub rate_limiter: RateLimiter,
    pub route_policy: RoutePolicy,
    pub users: Arc<dyn UserDirectory>,
    pub tasks: Arc<TaskRepository>,
    pub started_at: Instant,
}

/// HTTP server for the task tracker API.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        Self {
            router: Self::build_router(state),
        }
    }

    /// The fully layered router, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState) -> Router {
        let x_request_id = HeaderName::from_static(X_REQUEST_ID);
        let request_timeout = Duration::from_secs(state.config.listener.request_timeout_secs);
        let max_body = state.config.listener.max_body_bytes;

        let routes = Router::new()
            .route("/health", get(health))
            .merge(auth_handlers::routes(state.sessions.revocation().is_enabled()))
            .merge(task_handlers::routes())
            .merge(setup_admin_router());

        let pipeline = ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id(request.headers()),
                )
            }))
            .layer(PropagateRequestIdLayer::new(x_request_id))
            .layer(middleware::from_fn(track_metrics))
            .layer(cors_layer(&state.config.cors))
            .layer(middleware::from_fn(render_errors))
            .layer(TimeoutLayer::new(request_timeout))
            .layer(DefaultBodyLimit::max(max_body))
            .layer(middleware::from_fn_with_state(
                state.rate_limiter.clone(),
                rate_limit_middleware,
            ))
            .layer(middleware::from_fn_with_state(
                state.authenticator.clone(),
                authenticate,
            ))
            .layer(middleware::from_fn_with_state(
                state.route_policy.clone(),
                access_control_middleware,
            ));

        routes.layer(pipeline).with_state(state)
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "UP" }))
}

async fn track_metrics(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let response = next.run(request).await;
    metrics::record_request(&method, response.status().as_u16(), start);
    response
}
