use crate::{
    auth::RequestSession,
    config::AppConfig,
    gate::AccessGate,
    models::{GateDecision, Session},
};
use axum::{
    Json,
    extract::State,
    http::header,
    response::{Html, IntoResponse},
};

/// Seconds before a client showing the placeholder asks again.
const PLACEHOLDER_REFRESH_SECS: &str = "1";

// --- Pages ---

/// dashboard
///
/// [Guarded Route] The protected "User Dashboard" page. Only reached when the route guard
/// allows the request; rendered verbatim.
#[utoipa::path(
    get,
    path = "/dashboard",
    responses(
        (status = 200, description = "Dashboard page", body = String, content_type = "text/html"),
        (status = 303, description = "Not signed in, redirected to the login page")
    )
)]
pub async fn dashboard() -> Html<&'static str> {
    Html(
        r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>User Dashboard</title></head>
<body>
<main>
<h1>User Dashboard</h1>
</main>
</body>
</html>
"#,
    )
}

/// login_page
///
/// [Public Route] Destination for denied sessions. Mounted at `LOGIN_PATH`; the documented
/// path is the default.
#[utoipa::path(
    get,
    path = "/login",
    responses((status = 200, description = "Login page", body = String, content_type = "text/html"))
)]
pub async fn login_page() -> Html<&'static str> {
    Html(
        r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>Sign in</title></head>
<body>
<main>
<h1>Sign in</h1>
</main>
</body>
</html>
"#,
    )
}

/// loading_placeholder
///
/// Neutral page served in place of guarded content while the session is still resolving.
/// Never cached, and asks the browser to retry shortly.
pub fn loading_placeholder() -> impl IntoResponse {
    (
        [
            (header::REFRESH, PLACEHOLDER_REFRESH_SECS),
            (header::CACHE_CONTROL, "no-store"),
        ],
        Html(
            r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>Loading</title></head>
<body>
<main aria-busy="true"><p>Loading&hellip;</p></main>
</body>
</html>
"#,
        ),
    )
}

// --- Session Introspection ---

/// get_session
///
/// [Public Route] The caller's current Session snapshot, `null` when no credentials were
/// presented. Lets the browser client seed its own guard.
#[utoipa::path(
    get,
    path = "/session",
    responses((status = 200, description = "Current session", body = Session))
)]
pub async fn get_session(RequestSession(session): RequestSession) -> Json<Option<Session>> {
    Json(session)
}

/// get_decision
///
/// [Public Route] What the gate would decide for this request, without redirecting.
#[utoipa::path(
    get,
    path = "/session/decision",
    responses((status = 200, description = "Gate decision", body = GateDecision))
)]
pub async fn get_decision(
    State(gate): State<AccessGate>,
    RequestSession(session): RequestSession,
) -> Json<GateDecision> {
    Json(gate.evaluate(session.as_ref()))
}

/// get_login_path
///
/// [Public Route] Where denied sessions are sent, for clients building their own redirect.
#[utoipa::path(
    get,
    path = "/session/login-path",
    responses((status = 200, description = "Login path", body = String, content_type = "text/plain"))
)]
pub async fn get_login_path(State(config): State<AppConfig>) -> String {
    config.login_path
}
