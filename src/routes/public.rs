use crate::{AppState, config::AppConfig, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Endpoints reachable without a session: monitoring, the login page the guard redirects
/// to, and read-only session introspection for the browser client.
///
/// The login page is mounted at `config.login_path`, the same path the gate redirects to.
pub fn public_routes(config: &AppConfig) -> Router<AppState> {
    Router::new()
        // GET /health
        // Used by load balancers; returns "ok" immediately.
        .route("/health", get(|| async { "ok" }))
        // GET {login_path}
        // Redirect target for denied sessions. Must stay public or denial would loop.
        .route(&config.login_path, get(handlers::login_page))
        // GET /session
        // The caller's Session snapshot as resolved from its credentials.
        .route("/session", get(handlers::get_session))
        // GET /session/decision
        // Allow / Pending / Deny for the caller, without side effects.
        .route("/session/decision", get(handlers::get_decision))
        // GET /session/login-path
        .route("/session/login-path", get(handlers::get_login_path))
}
