use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use std::{convert::Infallible, time::Duration};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    directory::{DirectoryError, DirectoryState},
    models::Session,
};

/// Header accepted in `Env::Local` in place of a JWT.
pub const LOCAL_USER_HEADER: &str = "x-user-id";

/// Claims
///
/// The payload expected inside a JSON Web Token. Signed by the auth provider's secret and
/// validated on every resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user's UUID, looked up in the user directory.
    pub sub: Uuid,
    /// Expiration Time (exp): seconds since the epoch after which the token is rejected.
    pub exp: usize,
    /// Issued At (iat).
    pub iat: usize,
}

/// ResolveError
///
/// Why a set of credentials did not produce an authenticated session. These never reach
/// the caller: the resolver logs them and degrades to an unauthenticated session.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("no credentials presented")]
    MissingCredentials,
    #[error("authorization header is not a bearer token")]
    MalformedHeader,
    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
    #[error("user {0} not found in directory")]
    UnknownUser(Uuid),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Credentials
///
/// Raw credential material as presented by the caller. Parsing is deferred to resolution
/// so that malformed input degrades like any other failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    authorization: Option<String>,
    local_user: Option<String>,
}

impl Credentials {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn bearer(token: impl AsRef<str>) -> Self {
        Self {
            authorization: Some(format!("Bearer {}", token.as_ref())),
            local_user: None,
        }
    }

    pub fn local_user(id: Uuid) -> Self {
        Self {
            authorization: None,
            local_user: Some(id.to_string()),
        }
    }

    pub fn from_headers(headers: &HeaderMap) -> Self {
        let read = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        Self {
            authorization: read(header::AUTHORIZATION.as_str()),
            local_user: read(LOCAL_USER_HEADER),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.authorization.is_none() && self.local_user.is_none()
    }
}

/// Resolution
///
/// Outcome of resolving credentials. `session` is `None` when nothing was presented.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub session: Option<Session>,
    pub user_id: Option<Uuid>,
    /// When the backing token stops being valid; `None` for sessions without a token.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Resolution {
    fn absent() -> Self {
        Self {
            session: None,
            user_id: None,
            expires_at: None,
        }
    }

    fn with_session(session: Session) -> Self {
        Self {
            session: Some(session),
            ..Self::absent()
        }
    }
}

struct Identity {
    user_id: Uuid,
    expires_at: Option<DateTime<Utc>>,
}

/// SessionResolver
///
/// Turns credentials into a Session snapshot:
/// 1. Local Bypass: in `Env::Local`, an `x-user-id` header naming an existing user.
/// 2. Token Validation: `Authorization: Bearer <jwt>`, signature and expiry checked.
/// 3. Directory Lookup: the token subject must still exist.
///
/// `resolve` bounds the whole resolution by the configured timeout and reports a resolution
/// that has not finished in time as a loading session.
#[derive(Clone)]
pub struct SessionResolver {
    env: Env,
    jwt_secret: String,
    timeout: Duration,
    directory: DirectoryState,
}

impl SessionResolver {
    pub fn new(config: &AppConfig, directory: DirectoryState) -> Self {
        Self {
            env: config.env,
            jwt_secret: config.jwt_secret.clone(),
            timeout: config.resolve_timeout,
            directory,
        }
    }

    /// Upper bound `resolve` puts on a resolution before reporting it as loading.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn resolve(&self, credentials: &Credentials) -> Resolution {
        match tokio::time::timeout(self.timeout, self.resolve_unbounded(credentials)).await {
            Ok(resolution) => resolution,
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "session resolution still in progress"
                );
                Resolution::with_session(Session::loading())
            }
        }
    }

    /// Resolves without a time limit. Used where the caller publishes loading itself and
    /// waits for the final outcome.
    pub async fn resolve_unbounded(&self, credentials: &Credentials) -> Resolution {
        match self.try_resolve(credentials).await {
            Ok(identity) => Resolution {
                session: Some(Session::authenticated()),
                user_id: Some(identity.user_id),
                expires_at: identity.expires_at,
            },
            Err(ResolveError::MissingCredentials) => Resolution::absent(),
            Err(ResolveError::Directory(e)) => {
                tracing::warn!(error = %e, "session resolution failed, treating as unauthenticated");
                Resolution::with_session(Session::anonymous())
            }
            Err(e) => {
                tracing::debug!(error = %e, "credentials rejected");
                Resolution::with_session(Session::anonymous())
            }
        }
    }

    async fn try_resolve(&self, credentials: &Credentials) -> Result<Identity, ResolveError> {
        // The bypass only ever adds a way in; if it fails we fall through to the token.
        if self.env == Env::Local {
            if let Some(user_id) = credentials
                .local_user
                .as_deref()
                .and_then(|raw| Uuid::parse_str(raw).ok())
            {
                if self.directory.get_user(user_id).await?.is_some() {
                    return Ok(Identity {
                        user_id,
                        expires_at: None,
                    });
                }
            }
        }

        let token = match credentials.authorization.as_deref() {
            Some(value) => value
                .strip_prefix("Bearer ")
                .ok_or(ResolveError::MalformedHeader)?,
            None if credentials.is_empty() => return Err(ResolveError::MissingCredentials),
            // Only a bypass header was sent and it did not resolve.
            None => return Err(ResolveError::MalformedHeader),
        };

        let claims = self.decode(token)?;

        self.directory
            .get_user(claims.sub)
            .await?
            .ok_or(ResolveError::UnknownUser(claims.sub))?;

        Ok(Identity {
            user_id: claims.sub,
            expires_at: DateTime::<Utc>::from_timestamp(claims.exp as i64, 0),
        })
    }

    fn decode(&self, token: &str) -> Result<Claims, ResolveError> {
        let decoding_key = DecodingKey::from_secret(self.jwt_secret.as_bytes());

        let mut validation = Validation::default();
        validation.validate_exp = true;
        // Supabase tokens carry an `aud` we do not pin.
        validation.validate_aud = false;

        Ok(decode::<Claims>(token, &decoding_key, &validation)?.claims)
    }
}

/// RequestSession Extractor
///
/// Resolves the Session for an incoming request. Never rejects: absent or invalid
/// credentials simply produce `None` or an unauthenticated Session for the gate to classify.
#[derive(Debug, Clone, Copy)]
pub struct RequestSession(pub Option<Session>);

impl<S> FromRequestParts<S> for RequestSession
where
    S: Send + Sync,
    SessionResolver: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let resolver = SessionResolver::from_ref(state);
        let credentials = Credentials::from_headers(&parts.headers);
        let resolution = resolver.resolve(&credentials).await;

        if let Some(user_id) = resolution.user_id {
            tracing::debug!(%user_id, "request session resolved");
        }
        Ok(RequestSession(resolution.session))
    }
}
