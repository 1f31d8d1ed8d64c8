//! Coalescing of concurrent access token renewals.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, warn};
use secrecy::SecretString;
use tokio::sync::oneshot;

/// Outcome handed to every queued request: the renewed token, or `None` when the
/// renewal failed.
type Release = Option<SecretString>;

#[derive(Default)]
struct RefreshState {
    in_flight: bool,
    waiters: VecDeque<oneshot::Sender<Release>>,
}

/// Guarantees at most one renewal in flight.
///
/// The first request to observe an expired token becomes the leader and performs
/// the renewal. Requests arriving while it runs are queued as waiters and are all
/// released, in arrival order, with the leader's outcome. A failed renewal
/// releases every waiter with a failure instead of leaving it pending.
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
}

/// What a request must do after a 401.
pub enum Ticket<'a> {
    /// Perform the renewal, then call [`LeaderGuard::release`].
    Leader(LeaderGuard<'a>),
    /// Wait for the leader's outcome.
    Waiter(oneshot::Receiver<Release>),
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RefreshState::default()),
        }
    }

    /// Join the current renewal, or start one.
    ///
    /// The in-flight flag is set under the lock before the caller can suspend,
    /// so two nearly simultaneous 401s can never both become leaders.
    pub fn begin(&self) -> Ticket<'_> {
        let mut state = self.lock();
        if state.in_flight {
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            debug!("Renewal in flight, queued request ({} waiting)", state.waiters.len());
            Ticket::Waiter(rx)
        } else {
            state.in_flight = true;
            debug!("Starting access token renewal");
            Ticket::Leader(LeaderGuard {
                coordinator: self,
                released: false,
            })
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.lock().in_flight
    }

    /// Number of requests queued behind the current renewal.
    pub fn pending_waiters(&self) -> usize {
        self.lock().waiters.len()
    }

    fn finish(&self, outcome: Release) {
        let waiters = {
            let mut state = self.lock();
            state.in_flight = false;
            std::mem::take(&mut state.waiters)
        };

        debug!(
            "Renewal {}, releasing {} queued request(s)",
            if outcome.is_some() { "succeeded" } else { "failed" },
            waiters.len()
        );

        for waiter in waiters {
            // A waiter whose caller went away is simply skipped.
            let _ = waiter.send(outcome.clone());
        }
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for RefreshCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Held by the request performing the renewal.
///
/// Dropping the guard without releasing it (for example when the leader's future
/// is cancelled) fails all waiters and clears the in-flight flag, so later 401s
/// can start a fresh renewal.
pub struct LeaderGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    released: bool,
}

impl LeaderGuard<'_> {
    /// Publish the renewal outcome to every queued request.
    pub fn release(mut self, outcome: Option<SecretString>) {
        self.released = true;
        self.coordinator.finish(outcome);
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if !self.released {
            warn!("Renewal abandoned before completion, failing queued requests");
            self.coordinator.finish(None);
        }
    }
}
