//! # HTTP API
//!
//! axum router over a shared [`Session`].
//!
//! Two optional guards, both configured through [`ServerConfig`]: a
//! Bearer API key required on every route except `/health`, and a global
//! rate limiter in front of everything.

pub mod handlers;
pub mod types;

use crate::cli::{CliError, load_or_create_session, save_session};
use crate::config::ServerConfig;
use axum::{
    Router,
    extract::{Request, State},
    http::{HeaderValue, Method, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use spliitz_core::Session;
use std::path::PathBuf;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

/// Shared server state.
pub struct AppState {
    pub session: Mutex<Session>,
    /// Where to rewrite the snapshot after each change. `None` when the
    /// backend persists on its own (redb) or for in-memory test servers.
    snapshot_path: Option<PathBuf>,
    api_key: Option<String>,
    limiter: Option<DefaultDirectRateLimiter>,
}

impl AppState {
    pub fn new(session: Session, snapshot_path: Option<PathBuf>, config: &ServerConfig) -> Arc<Self> {
        Arc::new(Self {
            session: Mutex::new(session),
            snapshot_path,
            api_key: config.api_key.clone(),
            limiter: config
                .rate_limit
                .map(|per_second| RateLimiter::direct(Quota::per_second(per_second))),
        })
    }

    /// In-memory state with no persistence, auth or limits.
    pub fn in_memory(session: Session) -> Arc<Self> {
        Self::new(session, None, &ServerConfig::new("127.0.0.1", 0))
    }

    /// Write the snapshot after a change.
    ///
    /// When the write fails the session is reloaded from the last snapshot
    /// on disk, so the rejected change is not served or saved later.
    fn persist(&self, session: &mut Session) -> Result<(), CliError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let Err(err) = save_session(session, path) else {
            return Ok(());
        };
        match load_or_create_session(path, "file") {
            Ok(restored) => {
                warn!(path = %path.display(), "snapshot write failed, change rolled back");
                *session = restored;
            }
            Err(reload) => {
                error!(path = %path.display(), "snapshot reload failed: {}", reload);
            }
        }
        Err(err)
    }
}

/// Build the full router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/status", get(handlers::status))
        .route("/users", post(handlers::create_user))
        .route("/groups", post(handlers::create_group))
        .route("/groups/{id}/members", post(handlers::add_member))
        .route("/groups/{id}/members/{user}", delete(handlers::remove_member))
        .route(
            "/groups/{id}/expenses",
            get(handlers::list_expenses).post(handlers::propose_expense),
        )
        .route("/groups/{id}/dues", get(handlers::list_dues))
        .route("/groups/{id}/balances", get(handlers::balances))
        .route("/groups/{id}/summary", get(handlers::summary))
        .route("/expenses/{id}", get(handlers::get_expense))
        .route("/expenses/{id}/approve", post(handlers::approve_expense))
        .route("/expenses/{id}/withdraw", post(handlers::withdraw_expense))
        .route("/dues/{id}/paid", post(handlers::mark_paid))
        .route("/dues/{id}/received", post(handlers::confirm_received))
        .route("/reconcile", post(handlers::reconcile))
        .route("/export", get(handlers::export))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(handlers::health))
        .merge(protected)
        .fallback(handlers::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(middleware::from_fn_with_state(state.clone(), rate_limit)),
        )
        .with_state(state)
}

// =============================================================================
// MIDDLEWARE
// =============================================================================

fn unauthorized(message: &'static str) -> Response {
    let mut response = handlers::ApiError {
        status: StatusCode::UNAUTHORIZED,
        message: message.to_string(),
    }
    .into_response();
    response
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    response
}

/// Reject requests without the configured Bearer key.
async fn require_api_key(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let Some(expected) = state.api_key.as_deref() else {
        return next.run(request).await;
    };

    let verdict = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|token| bool::from(token.as_bytes().ct_eq(expected.as_bytes())));

    match verdict {
        Some(true) => next.run(request).await,
        Some(false) => {
            warn!(path = %request.uri().path(), "rejected request with wrong API key");
            unauthorized("invalid API key")
        }
        None => unauthorized("missing Authorization header, expected: Bearer <key>"),
    }
}

async fn rate_limit(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let limited = state
        .limiter
        .as_ref()
        .is_some_and(|limiter| limiter.check().is_err());
    if limited {
        debug!(path = %request.uri().path(), "rate limited");
        return handlers::ApiError {
            status: StatusCode::TOO_MANY_REQUESTS,
            message: "rate limit exceeded".to_string(),
        }
        .into_response();
    }
    next.run(request).await
}
