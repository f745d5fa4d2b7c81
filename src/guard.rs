use async_trait::async_trait;
use std::sync::Arc;
use tokio::{
    sync::{oneshot, watch},
    task::JoinHandle,
};

use crate::{
    gate::AccessGate,
    models::{GateDecision, Session},
};

/// Navigator
///
/// The outbound navigation primitive invoked when the gate denies access. Implementations
/// may be slow (e.g. a client round-trip); the guard runs them fire-and-forget and abandons
/// them if the consuming view is torn down first.
#[async_trait]
pub trait Navigator: Send + Sync {
    async fn redirect(&self, path: &str);
}

pub type NavigatorState = Arc<dyn Navigator>;

/// View
///
/// What the guard renders in place of its wrapped content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// The wrapped content, verbatim.
    Children,
    /// Neutral loading placeholder.
    Placeholder,
    /// Nothing; navigation supersedes render.
    Nothing,
}

impl From<&GateDecision> for View {
    fn from(decision: &GateDecision) -> Self {
        match decision {
            GateDecision::Allow => View::Children,
            GateDecision::Pending => View::Placeholder,
            GateDecision::Deny(_) => View::Nothing,
        }
    }
}

/// Result of feeding one Session snapshot through a `RouteGuard`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardStep {
    pub decision: GateDecision,
    pub view: View,
    /// Set only when this snapshot is the first Deny since the view was last allowed.
    pub redirect: Option<String>,
}

/// RouteGuard
///
/// Wraps an `AccessGate` for the lifetime of one consuming view. The gate stays pure; the
/// guard remembers which redirect it already requested so that re-rendering with the same
/// terminal Deny never queues a second navigation. Only an Allow re-arms it: a denied view
/// whose provider re-resolves (Deny, Pending, Deny) keeps its single redirect.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    gate: AccessGate,
    last: Option<GateDecision>,
    redirected_to: Option<String>,
}

impl RouteGuard {
    pub fn new(gate: AccessGate) -> Self {
        Self {
            gate,
            last: None,
            redirected_to: None,
        }
    }

    /// The most recent decision, if any snapshot has been observed.
    pub fn last_decision(&self) -> Option<&GateDecision> {
        self.last.as_ref()
    }

    pub fn observe(&mut self, session: Option<&Session>) -> GuardStep {
        let decision = self.gate.evaluate(session);

        let redirect = match &decision {
            GateDecision::Deny(target) if self.redirected_to.as_deref() == Some(target.as_str()) => {
                None
            }
            GateDecision::Deny(target) => {
                self.redirected_to = Some(target.clone());
                Some(target.clone())
            }
            GateDecision::Allow => {
                self.redirected_to = None;
                None
            }
            GateDecision::Pending => None,
        };

        if self.last.as_ref() != Some(&decision) {
            tracing::debug!(from = ?self.last, to = ?decision, "gate decision changed");
        }
        self.last = Some(decision.clone());

        GuardStep {
            view: View::from(&decision),
            decision,
            redirect,
        }
    }
}

/// GuardHandle
///
/// Owner-side handle of a running guard driver. Dropping it is equivalent to `teardown`,
/// except that it does not wait for the driver to finish.
pub struct GuardHandle {
    view: watch::Receiver<View>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl GuardHandle {
    /// Observable rendered output. Starts as `View::Placeholder` until the first evaluation.
    pub fn view(&self) -> watch::Receiver<View> {
        self.view.clone()
    }

    /// Tears the consuming view down: stops re-evaluation and abandons any redirect that
    /// has not completed yet.
    pub async fn teardown(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for GuardHandle {
    fn drop(&mut self) {
        // Dropping the sender wakes the driver, which then aborts its pending redirect.
        self.shutdown.take();
    }
}

/// spawn_guard
///
/// Runs a `RouteGuard` against an observable session. The current snapshot is evaluated
/// immediately, then again every time the provider publishes. The driver exits when the
/// handle is torn down or the provider goes away.
pub fn spawn_guard(
    gate: AccessGate,
    navigator: NavigatorState,
    mut sessions: watch::Receiver<Option<Session>>,
) -> GuardHandle {
    let (view_tx, view_rx) = watch::channel(View::Placeholder);
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let mut guard = RouteGuard::new(gate);
        let mut in_flight: Option<JoinHandle<()>> = None;

        let torn_down = loop {
            let snapshot = *sessions.borrow_and_update();
            let step = guard.observe(snapshot.as_ref());
            view_tx.send_replace(step.view);

            if let Some(target) = step.redirect {
                tracing::info!(path = %target, "redirecting unauthenticated session");
                let navigator = navigator.clone();
                in_flight = Some(tokio::spawn(async move {
                    navigator.redirect(&target).await;
                }));
            }

            tokio::select! {
                _ = &mut shutdown_rx => break true,
                changed = sessions.changed() => {
                    if changed.is_err() {
                        tracing::debug!("session provider dropped, guard stopping");
                        break false;
                    }
                }
            }
        };

        if torn_down {
            if let Some(redirect) = in_flight.take() {
                if !redirect.is_finished() {
                    tracing::debug!("view torn down, abandoning pending redirect");
                }
                redirect.abort();
            }
        }
    });

    GuardHandle {
        view: view_rx,
        shutdown: Some(shutdown_tx),
        task: Some(task),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_loading_renders_placeholder_without_redirect() {
        let mut guard = RouteGuard::new(AccessGate::default());
        let step = guard.observe(Some(&Session::loading()));
        assert_eq!(step.decision, GateDecision::Pending);
        assert_eq!(step.view, View::Placeholder);
        assert_eq!(step.redirect, None);
    }

    #[test]
    fn scenario_unauthenticated_redirects_exactly_once() {
        let mut guard = RouteGuard::new(AccessGate::default());
        let first = guard.observe(Some(&Session::anonymous()));
        let second = guard.observe(Some(&Session::anonymous()));

        assert_eq!(first.decision, GateDecision::Deny("/login".into()));
        assert_eq!(first.view, View::Nothing);
        assert_eq!(first.redirect.as_deref(), Some("/login"));
        assert_eq!(second.decision, first.decision);
        assert_eq!(second.redirect, None);
    }

    #[test]
    fn scenario_authenticated_renders_children() {
        let mut guard = RouteGuard::new(AccessGate::default());
        let step = guard.observe(Some(&Session::authenticated()));
        assert_eq!(step.decision, GateDecision::Allow);
        assert_eq!(step.view, View::Children);
        assert_eq!(step.redirect, None);
    }

    #[test]
    fn scenario_pending_then_deny_redirects_once() {
        let mut guard = RouteGuard::new(AccessGate::default());
        let pending = guard.observe(Some(&Session::loading()));
        let denied = guard.observe(Some(&Session::anonymous()));
        let rerender = guard.observe(None);

        assert_eq!(pending.view, View::Placeholder);
        assert_eq!(denied.redirect.as_deref(), Some("/login"));
        assert_eq!(rerender.view, View::Nothing);
        assert_eq!(rerender.redirect, None);
    }

    #[test]
    fn re_resolving_a_denied_view_does_not_redirect_again() {
        let mut guard = RouteGuard::new(AccessGate::default());
        assert!(guard.observe(Some(&Session::anonymous())).redirect.is_some());

        let pending = guard.observe(Some(&Session::loading()));
        assert_eq!(pending.view, View::Placeholder);
        assert_eq!(pending.redirect, None);

        let denied_again = guard.observe(Some(&Session::anonymous()));
        assert_eq!(denied_again.view, View::Nothing);
        assert_eq!(denied_again.redirect, None);
    }

    #[test]
    fn allow_rearms_the_redirect() {
        let mut guard = RouteGuard::new(AccessGate::default());
        assert!(guard.observe(None).redirect.is_some());
        assert!(guard.observe(Some(&Session::authenticated())).redirect.is_none());
        assert_eq!(guard.last_decision(), Some(&GateDecision::Allow));
        assert_eq!(
            guard.observe(Some(&Session::anonymous())).redirect.as_deref(),
            Some("/login")
        );
    }
}
