use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Directory Records ---

/// User
///
/// Represents a user's canonical identity record stored in the `public.profiles` table.
/// Only existence and role matter to the gate; the record is never exposed over HTTP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, Default)]
pub struct User {
    // Primary Key, also the Foreign Key to the external auth.users table.
    pub id: Uuid,
    pub email: String,
    // 'student' or 'admin'.
    pub role: String,
}

// --- Session State (Shared with the Browser Client) ---

/// Session
///
/// The caller's authentication state as known to the application. Published by the
/// `SessionProvider` (or resolved per request by the `SessionResolver`) and read-only
/// to the gate. Field names are camelCased on the wire to match the browser client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Session {
    pub is_authenticated: bool,
    /// Session resolution is still in progress.
    pub is_loading: bool,
}

impl Session {
    /// A session whose resolution has not finished yet.
    pub fn loading() -> Self {
        Self {
            is_authenticated: false,
            is_loading: true,
        }
    }

    pub fn authenticated() -> Self {
        Self {
            is_authenticated: true,
            is_loading: false,
        }
    }

    /// A resolved session with no valid identity behind it.
    pub fn anonymous() -> Self {
        Self::default()
    }
}

/// GateDecision
///
/// Output of evaluating a Session against the access rules. Exactly one variant holds
/// for any Session snapshot.
///
/// Serialized adjacently tagged, e.g. `{"decision":"deny","redirect_target":"/login"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(tag = "decision", content = "redirect_target", rename_all = "snake_case")]
#[ts(export)]
pub enum GateDecision {
    /// Render the protected content.
    Allow,
    /// No decision yet; show the loading state.
    Pending,
    /// Session invalid; navigate to the contained target.
    Deny(String),
}

impl GateDecision {
    /// The redirect target, if this decision is a denial.
    pub fn redirect_target(&self) -> Option<&str> {
        match self {
            GateDecision::Deny(target) => Some(target),
            _ => None,
        }
    }
}
