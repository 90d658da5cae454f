//! A running session: in-memory state, the backend it mirrors to, and the
//! pending write-behind batch.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::goals::GoalRegistry;
use crate::mirror::WriteBehind;
use crate::session::{SessionError, SessionState};
use crate::snapshot::Snapshot;
use crate::store::{Backend, StoreResult};

#[derive(Debug)]
pub struct AppSession<B> {
    backend: B,
    state: SessionState,
    mirror: WriteBehind,
}

impl<B: Backend> AppSession<B> {
    /// Loads all three collections. Transient store failures start the
    /// session empty and let later flushes catch the store up; anything
    /// else is returned.
    #[tracing::instrument(skip(backend), fields(backend = %backend.describe()))]
    pub async fn open(backend: B, debounce: Duration) -> StoreResult<Self> {
        let (baseline, state) = initial_state(load_or_empty(&backend).await?);
        let mut mirror = WriteBehind::new(baseline, debounce);
        mirror.observe(state.snapshot(), Instant::now());
        Ok(Self {
            backend,
            state,
            mirror,
        })
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Swaps in a new state. Persistence follows on the next due flush.
    pub fn apply(&mut self, next: SessionState, now: Instant) {
        self.mirror.observe(next.snapshot(), now);
        self.state = next;
    }

    /// Runs a transition against the current state and applies its result.
    /// A rejected transition leaves the state untouched.
    pub fn update<F>(&mut self, now: Instant, transition: F) -> Result<(), SessionError>
    where
        F: FnOnce(&SessionState) -> Result<SessionState, SessionError>,
    {
        let next = transition(&self.state)?;
        self.apply(next, now);
        Ok(())
    }

    pub fn has_pending(&self) -> bool {
        self.mirror.has_pending()
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.mirror.is_due(now)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.mirror.deadline()
    }

    pub async fn flush(&mut self) -> StoreResult<()> {
        self.mirror.flush(&self.backend).await
    }

    /// Moves the session to another backend, typically a different user.
    /// Pending changes go to the old backend first; the new one then
    /// replaces all three collections.
    #[tracing::instrument(skip(self, backend), fields(to = %backend.describe()))]
    pub async fn switch_backend(&mut self, backend: B) -> StoreResult<()> {
        if let Err(error) = self.flush().await {
            warn!(
                error = %error,
                from = %self.backend.describe(),
                "dropping unsent changes while switching backend"
            );
        }

        let (baseline, state) = initial_state(load_or_empty(&backend).await?);
        info!(
            from = %self.backend.describe(),
            to = %backend.describe(),
            "switched backend"
        );
        self.mirror.reset(baseline);
        self.mirror.observe(state.snapshot(), Instant::now());
        self.state = state;
        self.backend = backend;
        Ok(())
    }
}

/// `None` means the store was unreachable and the session starts empty.
async fn load_or_empty<B: Backend>(backend: &B) -> StoreResult<Option<Snapshot>> {
    match backend.load().await {
        Ok(snapshot) => Ok(Some(snapshot)),
        Err(error) if error.is_transient() => {
            warn!(
                error = %error,
                backend = %backend.describe(),
                "store unavailable; starting with empty collections"
            );
            Ok(None)
        }
        Err(error) => Err(error),
    }
}

/// Splits a load result into the persisted baseline and the starting state.
/// A store that answered with no goals gets the default goals, left pending
/// against the baseline so the next flush writes them.
fn initial_state(loaded: Option<Snapshot>) -> (Snapshot, SessionState) {
    match loaded {
        Some(snapshot) if snapshot.goals.is_empty() => {
            debug!("store has no goals; seeding defaults");
            let state = SessionState::new(
                snapshot.tasks.clone(),
                GoalRegistry::with_defaults(),
                snapshot.completed.clone(),
            );
            (snapshot, state)
        }
        Some(snapshot) => (snapshot.clone(), SessionState::from_snapshot(snapshot)),
        None => (Snapshot::default(), SessionState::from_snapshot(Snapshot::default())),
    }
}
