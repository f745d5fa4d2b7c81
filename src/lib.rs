use axum::{
    Router,
    extract::{FromRef, Request, State},
    http::HeaderName,
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Access-control core: pure decision, per-view guard, session source.
pub mod gate;
pub mod guard;
pub mod provider;

// Session resolution and its backing store.
pub mod auth;
pub mod directory;

pub mod config;
pub mod handlers;
pub mod models;

// Module for routing segregation (Public, Guarded).
pub mod routes;
use auth::RequestSession;
use routes::{guarded, public};

// --- Public Re-exports ---

pub use auth::{Credentials, SessionResolver};
pub use config::AppConfig;
pub use directory::{DirectoryState, InMemoryDirectory, PostgresDirectory, UserDirectory};
pub use gate::AccessGate;
pub use guard::{GuardHandle, Navigator, RouteGuard, View, spawn_guard};
pub use models::{GateDecision, Session};
pub use provider::SessionProvider;

/// ApiDoc
///
/// Auto-generated OpenAPI documentation, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::dashboard, handlers::login_page, handlers::get_session,
        handlers::get_decision, handlers::get_login_path
    ),
    components(schemas(models::Session, models::GateDecision)),
    tags(
        (name = "dashboard-gate", description = "Guarded User Dashboard")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, immutable container shared across all incoming requests.
#[derive(Clone)]
pub struct AppState {
    /// User lookup used by session resolution.
    pub directory: DirectoryState,
    pub config: AppConfig,
    pub gate: AccessGate,
    pub resolver: SessionResolver,
}

impl AppState {
    /// Assembles the state, deriving the gate and resolver from the configuration.
    pub fn new(config: AppConfig, directory: DirectoryState) -> Self {
        Self {
            gate: AccessGate::new(config.login_path.clone()),
            resolver: SessionResolver::new(&config, directory.clone()),
            directory,
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for DirectoryState {
    fn from_ref(app_state: &AppState) -> DirectoryState {
        app_state.directory.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for AccessGate {
    fn from_ref(app_state: &AppState) -> AccessGate {
        app_state.gate.clone()
    }
}

impl FromRef<AppState> for SessionResolver {
    fn from_ref(app_state: &AppState) -> SessionResolver {
        app_state.resolver.clone()
    }
}

/// route_guard
///
/// Middleware enforcing the gate for the `guarded_routes`.
///
/// *Mechanism*: `RequestSession` resolves the caller's session (it never rejects), the gate
/// classifies it, and the outcome picks the response:
/// - Allow: the request proceeds to the handler untouched.
/// - Pending: the loading placeholder is served instead of the handler.
/// - Deny: `303 See Other` to the login path with an empty body.
async fn route_guard(
    State(gate): State<AccessGate>,
    RequestSession(session): RequestSession,
    request: Request,
    next: Next,
) -> Response {
    match gate.evaluate(session.as_ref()) {
        GateDecision::Allow => next.run(request).await,
        GateDecision::Pending => handlers::loading_placeholder().into_response(),
        GateDecision::Deny(target) => {
            tracing::debug!(uri = %request.uri(), redirect = %target, "guard denied request");
            Redirect::to(&target).into_response()
        }
    }
}

/// create_router
///
/// Assembles the routing structure, applies global and scoped middleware, and registers
/// the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes(&state.config))
        // `route_layer` so unmatched paths still 404 instead of redirecting.
        .merge(
            guarded::guarded_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), route_guard)),
        )
        .with_state(state);

    // Request ids are set before tracing so every span carries one.
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Builds the per-request span, tagging it with the `x-request-id` generated above so every
/// log line for a request is correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
