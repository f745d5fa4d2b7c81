use std::{env, time::Duration};

use crate::gate::DEFAULT_LOGIN_PATH;

const LOCAL_JWT_SECRET: &str = "super-secure-test-secret-value-local";
const DEFAULT_RESOLVE_TIMEOUT_MS: u64 = 2000;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// AppConfig
///
/// Holds the application's entire configuration state. Immutable once loaded and pulled
/// into handlers and extractors via FromRef.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Database connection string (Postgres). Optional in local, where the in-memory
    // directory is used instead.
    pub db_url: Option<String>,
    // Runtime environment marker. Controls feature activation (e.g., Dev Bypass).
    pub env: Env,
    // Secret key used to decode and validate incoming JWTs (Supabase-managed).
    pub jwt_secret: String,
    // Where denied sessions are sent.
    pub login_path: String,
    // Upper bound on session resolution before the caller is shown the loading state.
    pub resolve_timeout: Duration,
    pub bind_addr: String,
}

/// Env
///
/// Defines the runtime context, used to switch between development utilities (Bypass,
/// in-memory directory) and hardened production auth.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// Safe, non-panicking configuration for test state setup.
    fn default() -> Self {
        Self {
            db_url: None,
            env: Env::Local,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            resolve_timeout: Duration::from_millis(DEFAULT_RESOLVE_TIMEOUT_MS),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads all parameters from environment variables, failing fast on anything the
    /// current environment cannot run without.
    ///
    /// # Panics
    /// Panics in Production if `SUPABASE_JWT_SECRET` or `DATABASE_URL` is missing, or in
    /// any environment if `SESSION_RESOLVE_TIMEOUT_MS` is not a whole number.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let (jwt_secret, db_url) = match env {
            Env::Production => (
                env::var("SUPABASE_JWT_SECRET")
                    .expect("FATAL: SUPABASE_JWT_SECRET must be set in production."),
                Some(env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in prod")),
            ),
            Env::Local => (
                env::var("SUPABASE_JWT_SECRET").unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
                env::var("DATABASE_URL").ok(),
            ),
        };

        let resolve_timeout = env::var("SESSION_RESOLVE_TIMEOUT_MS")
            .ok()
            .map(|raw| {
                raw.parse::<u64>()
                    .expect("FATAL: SESSION_RESOLVE_TIMEOUT_MS must be a number of milliseconds")
            })
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(DEFAULT_RESOLVE_TIMEOUT_MS));

        Self {
            db_url,
            env,
            jwt_secret,
            login_path: env::var("LOGIN_PATH").unwrap_or_else(|_| DEFAULT_LOGIN_PATH.to_string()),
            resolve_timeout,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
        }
    }
}
