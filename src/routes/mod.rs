//! Router Module Index
//!
//! Routes are split by access level so the guard is applied explicitly at the module
//! level (via Axum layers) and never forgotten on a single endpoint.

/// Routes accessible to all callers, signed in or not.
pub mod public;

/// Routes wrapped in the route guard. Requires an allowed session.
pub mod guarded;
