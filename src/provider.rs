use chrono::{DateTime, Utc};
use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};
use tokio::{sync::watch, task::JoinHandle};

use crate::{
    auth::{Credentials, Resolution, SessionResolver},
    models::Session,
};

/// SessionProvider
///
/// The authentication provider as seen by guards: it owns the current Session snapshot and
/// publishes every change on a watch channel. Consumers never mutate the session; they
/// subscribe and re-evaluate when a new snapshot arrives.
///
/// Lifecycle of the published value:
/// - `None` until the first resolution starts.
/// - `Session::loading()` while credentials are being resolved.
/// - The resolved session afterwards, replaced on logout or when the token expires.
///
/// Every `resolve` and `logout` starts a new generation. Results and expiry timers from an
/// older generation are dropped, so a late resolution can never overwrite a logout or a
/// newer resolution.
pub struct SessionProvider {
    resolver: SessionResolver,
    shared: Arc<Shared>,
}

struct Shared {
    sessions: watch::Sender<Option<Session>>,
    state: Mutex<ProviderState>,
}

#[derive(Default)]
struct ProviderState {
    generation: u64,
    expiry: Option<JoinHandle<()>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ProviderState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Publishes `next` only if it differs from the current snapshot.
    fn publish(&self, next: Option<Session>) -> bool {
        self.sessions.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        })
    }

    /// Starts a new generation with `session` as its first snapshot.
    fn begin(&self, session: Session) -> u64 {
        let mut state = self.lock();
        state.generation += 1;
        if let Some(expiry) = state.expiry.take() {
            expiry.abort();
        }
        self.publish(Some(session));
        state.generation
    }

    /// Publishes a resolution if its generation is still current. Returns the snapshot
    /// that is current afterwards.
    fn complete(self: &Arc<Self>, generation: u64, resolution: Resolution) -> Option<Session> {
        let mut state = self.lock();
        if state.generation != generation {
            tracing::debug!(generation, current = state.generation, "discarding stale resolution");
            return *self.sessions.borrow();
        }

        self.publish(resolution.session);

        if let (Some(Session { is_authenticated: true, .. }), Some(expires_at)) =
            (resolution.session, resolution.expires_at)
        {
            state.expiry = Some(self.schedule_expiry(generation, expires_at));
        }

        resolution.session
    }

    fn schedule_expiry(self: &Arc<Self>, generation: u64, expires_at: DateTime<Utc>) -> JoinHandle<()> {
        let remaining = (expires_at - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        let shared = self.clone();

        tokio::spawn(async move {
            tokio::time::sleep(remaining).await;
            let state = shared.lock();
            if state.generation == generation {
                shared.publish(Some(Session::anonymous()));
                tracing::info!(%expires_at, "session token expired");
            }
        })
    }
}

impl SessionProvider {
    pub fn new(resolver: SessionResolver) -> Self {
        let (sessions, _) = watch::channel(None);
        Self {
            resolver,
            shared: Arc::new(Shared {
                sessions,
                state: Mutex::new(ProviderState::default()),
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.shared.sessions.subscribe()
    }

    pub fn snapshot(&self) -> Option<Session> {
        *self.shared.sessions.borrow()
    }

    /// resolve
    ///
    /// Publishes a loading snapshot and resolves the credentials in the background. Waits up
    /// to the resolver's timeout for the outcome; past that the caller gets the loading
    /// snapshot back while the resolution keeps running and publishes when it finishes.
    /// Token-backed sessions are invalidated again once the token's `exp` passes.
    pub async fn resolve(&self, credentials: &Credentials) -> Option<Session> {
        let generation = self.shared.begin(Session::loading());

        let resolver = self.resolver.clone();
        let credentials = credentials.clone();
        let shared = self.shared.clone();
        let mut resolution = tokio::spawn(async move {
            let outcome = resolver.resolve_unbounded(&credentials).await;
            shared.complete(generation, outcome)
        });

        match tokio::time::timeout(self.resolver.timeout(), &mut resolution).await {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "session resolution task failed");
                self.snapshot()
            }
            Err(_) => {
                tracing::warn!(generation, "session resolution still in progress");
                Some(Session::loading())
            }
        }
    }

    /// Ends the session. Guards observing it will deny on their next evaluation, and any
    /// resolution still in flight is discarded.
    pub fn logout(&self) {
        self.shared.begin(Session::anonymous());
        tracing::info!("session logged out");
    }
}

impl Drop for SessionProvider {
    fn drop(&mut self) {
        // The expiry task holds the sender; stop it so subscribers observe the provider closing.
        if let Some(expiry) = self.shared.lock().expiry.take() {
            expiry.abort();
        }
    }
}
