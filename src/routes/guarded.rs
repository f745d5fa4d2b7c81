use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Guarded Router Module
///
/// Every route here is reached only after the route guard layer (see `create_router`)
/// has evaluated the caller's session to Allow. Pending callers get the loading
/// placeholder and denied callers are redirected before any handler runs.
pub fn guarded_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /dashboard
        // The protected "User Dashboard" page.
        .route("/dashboard", get(handlers::dashboard))
}
