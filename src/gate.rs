use crate::models::{GateDecision, Session};

/// Default destination for unauthenticated callers.
pub const DEFAULT_LOGIN_PATH: &str = "/login";

/// AccessGate
///
/// The access-control decision point in front of protected content. `evaluate` is a pure
/// function of the Session snapshot: it classifies and never fails. Side effects (redirects,
/// rendering) belong to the callers, i.e. the `RouteGuard` and the HTTP middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGate {
    login_path: String,
}

impl Default for AccessGate {
    fn default() -> Self {
        Self::new(DEFAULT_LOGIN_PATH)
    }
}

impl AccessGate {
    pub fn new(login_path: impl Into<String>) -> Self {
        Self {
            login_path: login_path.into(),
        }
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// evaluate
    ///
    /// Loading wins over everything else so that neither protected content nor a premature
    /// redirect is produced while the provider is still resolving. An absent session is
    /// treated as unauthenticated.
    pub fn evaluate(&self, session: Option<&Session>) -> GateDecision {
        match session {
            Some(Session {
                is_loading: true, ..
            }) => GateDecision::Pending,
            Some(Session {
                is_authenticated: true,
                ..
            }) => GateDecision::Allow,
            _ => GateDecision::Deny(self.login_path.clone()),
        }
    }
}
