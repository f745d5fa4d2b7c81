use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use dashboard_gate::{
    AppConfig, AppState, GateDecision, InMemoryDirectory, Session, auth::Claims, config::Env,
    create_router,
    directory::{DirectoryError, DirectoryState, UserDirectory},
    models::User,
};
use jsonwebtoken::{EncodingKey, Header, encode};
use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};
use tower::util::ServiceExt;
use uuid::Uuid;

// --- Test Scaffolding ---

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";

struct SlowDirectory;

#[async_trait]
impl UserDirectory for SlowDirectory {
    async fn get_user(&self, _id: Uuid) -> Result<Option<User>, DirectoryError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(None)
    }
}

fn config() -> AppConfig {
    AppConfig {
        env: Env::Production,
        jwt_secret: TEST_JWT_SECRET.to_string(),
        resolve_timeout: Duration::from_millis(50),
        ..AppConfig::default()
    }
}

fn app_with(config: AppConfig, directory: DirectoryState) -> Router {
    create_router(AppState::new(config, directory))
}

fn app(user_id: Uuid) -> Router {
    let directory = InMemoryDirectory::with_users([User {
        id: user_id,
        email: "student@example.com".to_string(),
        role: "student".to_string(),
    }]);
    app_with(config(), Arc::new(directory))
}

fn token_for(user_id: Uuid) -> String {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let claims = Claims {
        sub: user_id,
        iat: now as usize,
        exp: (now + 3600) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// --- Guarded Route ---

#[tokio::test]
async fn test_dashboard_without_credentials_redirects_to_login() {
    let response = app(Uuid::new_v4())
        .oneshot(get("/dashboard", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/login");
    assert!(body_string(response).await.is_empty());
}

#[tokio::test]
async fn test_dashboard_with_valid_token_renders_page() {
    let user_id = Uuid::new_v4();
    let token = token_for(user_id);

    let response = app(user_id)
        .oneshot(get("/dashboard", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("<h1>User Dashboard</h1>"));
}

#[tokio::test]
async fn test_dashboard_with_invalid_token_redirects() {
    let response = app(Uuid::new_v4())
        .oneshot(get("/dashboard", Some("garbage")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/login");
}

#[tokio::test]
async fn test_dashboard_redirects_to_configured_login_path() {
    let config = AppConfig {
        login_path: "/auth/sign-in".to_string(),
        ..config()
    };
    let app = app_with(config, Arc::new(InMemoryDirectory::new()));
    let response = app.clone().oneshot(get("/dashboard", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
    assert_eq!(location, "/auth/sign-in");

    // The redirect lands on the login page, not a 404.
    let login = app.clone().oneshot(get(&location, None)).await.unwrap();
    assert_eq!(login.status(), StatusCode::OK);
    assert!(body_string(login).await.contains("Sign in"));

    // The default path is not mounted once another one is configured.
    let stale = app.oneshot(get("/login", None)).await.unwrap();
    assert_eq!(stale.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_dashboard_while_resolving_serves_placeholder() {
    let token = token_for(Uuid::new_v4());
    let response = app_with(config(), Arc::new(SlowDirectory))
        .oneshot(get("/dashboard", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::REFRESH], "1");
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
    let body = body_string(response).await;
    assert!(body.contains("Loading"));
    assert!(!body.contains("User Dashboard"));
}

#[tokio::test]
async fn test_unknown_route_is_not_redirected() {
    let response = app(Uuid::new_v4())
        .oneshot(get("/does-not-exist", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// --- Public Routes ---

#[tokio::test]
async fn test_login_page_is_public() {
    let response = app(Uuid::new_v4())
        .oneshot(get("/login", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_session_endpoint_reports_snapshot() {
    let user_id = Uuid::new_v4();
    let router = app(user_id);

    let anonymous = router.clone().oneshot(get("/session", None)).await.unwrap();
    assert_eq!(anonymous.status(), StatusCode::OK);
    let snapshot: Option<Session> = serde_json::from_str(&body_string(anonymous).await).unwrap();
    assert_eq!(snapshot, None);

    let token = token_for(user_id);
    let signed_in = router.oneshot(get("/session", Some(&token))).await.unwrap();
    let snapshot: Option<Session> = serde_json::from_str(&body_string(signed_in).await).unwrap();
    assert_eq!(snapshot, Some(Session::authenticated()));
}

#[tokio::test]
async fn test_decision_endpoint_classifies_without_redirecting() {
    let user_id = Uuid::new_v4();
    let router = app(user_id);

    let denied = router
        .clone()
        .oneshot(get("/session/decision", None))
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::OK);
    let decision: GateDecision = serde_json::from_str(&body_string(denied).await).unwrap();
    assert_eq!(decision, GateDecision::Deny("/login".to_string()));

    let token = token_for(user_id);
    let allowed = router
        .oneshot(get("/session/decision", Some(&token)))
        .await
        .unwrap();
    let decision: GateDecision = serde_json::from_str(&body_string(allowed).await).unwrap();
    assert_eq!(decision, GateDecision::Allow);
}

#[tokio::test]
async fn test_login_path_endpoint() {
    let response = app(Uuid::new_v4())
        .oneshot(get("/session/login-path", None))
        .await
        .unwrap();

    assert_eq!(body_string(response).await, "/login");
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let response = app(Uuid::new_v4())
        .oneshot(get("/health", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}
