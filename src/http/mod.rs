//! HTTP boundary.
//!
//! JSON routes under `/v1/auth` translate requests into orchestrator calls
//! and [`crate::error::AuthError`] kinds into status codes. `/healthz` and
//! (optionally) `/metrics` sit beside them.

mod error;
mod handlers;

pub use error::ApiError;
pub use handlers::REQUEST_ID_HEADER;

use crate::service::AuthService;
use axum::Router;
use axum::routing::{get, post};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub service: AuthService,
    /// Deadline placed on each request context.
    pub request_timeout: Duration,
    /// Parent of every request's cancellation token.
    pub shutdown: CancellationToken,
}

/// Build the router.
pub fn router(state: AppState, metrics: bool) -> Router {
    let auth = Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/logout", post(handlers::logout))
        .route("/access-token/check", post(handlers::check_access_token))
        .route("/service-token", post(handlers::generate_service_token))
        .route("/service-token/check", post(handlers::check_service_token))
        .route(
            "/accounts/:id/role",
            get(handlers::get_role).put(handlers::set_role),
        )
        // `:id` here is the secondary identity, not an account.
        .route("/accounts/:id/auth-code", post(handlers::generate_auth_code))
        .route("/accounts/:id/verify", post(handlers::verify));

    let mut app = Router::new()
        .nest("/v1/auth", auth)
        .route("/healthz", get(handlers::healthz));
    if metrics {
        app = app.route("/metrics", get(handlers::metrics));
    }
    app.with_state(state)
}

/// Serve `app` on `listener` until `shutdown` is cancelled.
///
/// In-flight requests see their cancellation tokens fire at the same moment,
/// so their store calls abort instead of holding shutdown open.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "HTTP server listening");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}
