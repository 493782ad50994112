// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-flight credential renewal.
//!
//! The first caller to observe an expired credential becomes the leader and
//! runs the renewal. Callers arriving while it is in flight park on a oneshot
//! and receive the leader's outcome verbatim, success or failure.
//!
//! A renewal that outlives the session it started for (a logout or a new
//! login happened meanwhile) does not touch Session State.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, warn};

use crate::error::RenewalError;
use crate::session::{Credential, EndReason, Identity, SessionEvent, SessionState};

type Outcome = Result<Credential, RenewalError>;

#[derive(Default)]
struct RenewalState {
    in_flight: bool,
    waiters: Vec<oneshot::Sender<Outcome>>,
    /// Set after a fatal renewal failure or logout; cleared by a fresh login.
    terminal: Option<RenewalError>,
    /// Bumped on every login and logout. A renewal only writes the session
    /// if the epoch it started under is still current.
    epoch: u64,
}

enum Role {
    Lead(u64),
    Wait(oneshot::Receiver<Outcome>),
    Done(Outcome),
}

/// Coordinates renewal across every caller sharing one [`SessionState`].
pub struct RenewalCoordinator {
    state: Mutex<RenewalState>,
    session: Arc<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl RenewalCoordinator {
    pub fn new(session: Arc<SessionState>, events: broadcast::Sender<SessionEvent>) -> Self {
        Self { state: Mutex::new(RenewalState::default()), session, events }
    }

    /// Return a credential newer than `stale`, renewing at most once system-wide.
    ///
    /// `stale` is the credential the caller's failed request carried. When the
    /// session already holds a different one, it is returned without renewal.
    /// `renew` only runs if this caller becomes the leader.
    pub async fn ensure_fresh_credential<F, Fut>(
        &self,
        stale: Option<&Credential>,
        renew: F,
    ) -> Result<Credential, RenewalError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Outcome>,
    {
        let role = {
            let mut state = self.state.lock();
            if state.in_flight {
                let (tx, rx) = oneshot::channel();
                state.waiters.push(tx);
                Role::Wait(rx)
            } else if let Some(ref err) = state.terminal {
                Role::Done(Err(err.clone()))
            } else if let Some(current) =
                self.session.current_credential().filter(|c| Some(c) != stale)
            {
                Role::Done(Ok(current))
            } else {
                state.in_flight = true;
                Role::Lead(state.epoch)
            }
        };

        match role {
            Role::Done(outcome) => outcome,
            Role::Wait(rx) => {
                debug!("renewal in flight, waiting");
                rx.await.unwrap_or_else(|_| Err(RenewalError::abandoned()))
            }
            Role::Lead(epoch) => {
                debug!(epoch, "starting renewal");
                let mut flight = Flight { coordinator: self, epoch, settled: false };
                let outcome = renew().await;
                flight.settle(outcome)
            }
        }
    }

    /// Start a new session: store credential and identity, reopen renewal,
    /// and detach any renewal still running for the previous session.
    pub fn begin_session(&self, credential: Credential, identity: Identity) {
        let mut state = self.state.lock();
        state.epoch = state.epoch.wrapping_add(1);
        state.terminal = None;
        self.session.establish(credential, identity);
    }

    /// Clear the session after an explicit logout and latch renewal closed
    /// until the next [`RenewalCoordinator::begin_session`].
    pub fn end_session(&self) {
        let mut state = self.state.lock();
        state.epoch = state.epoch.wrapping_add(1);
        state.terminal = Some(RenewalError::rejected(401, "signed out"));
        self.session.clear();
    }

    /// Current session epoch. Pair with [`RenewalCoordinator::apply_if_current`].
    pub fn epoch(&self) -> u64 {
        self.state.lock().epoch
    }

    /// Run `apply` against the session only if no login or logout happened
    /// since `epoch` was read. Returns whether it ran.
    pub fn apply_if_current(&self, epoch: u64, apply: impl FnOnce(&SessionState)) -> bool {
        let state = self.state.lock();
        if state.epoch != epoch {
            return false;
        }
        apply(&self.session);
        true
    }

    pub fn is_in_flight(&self) -> bool {
        self.state.lock().in_flight
    }

    pub fn waiter_count(&self) -> usize {
        self.state.lock().waiters.len()
    }

    fn finish(&self, epoch: u64, outcome: Outcome) -> Outcome {
        let (outcome, waiters, current) = {
            let mut state = self.state.lock();
            state.in_flight = false;
            let current = state.epoch == epoch;
            let outcome = match outcome {
                Ok(_) if !current => Err(RenewalError::superseded()),
                other => other,
            };
            if current {
                match outcome {
                    Ok(ref credential) => self.session.set_credential(credential.clone()),
                    Err(ref e) if !e.abandoned => {
                        self.session.clear();
                        state.terminal = Some(e.clone());
                    }
                    Err(_) => {}
                }
            }
            (outcome, std::mem::take(&mut state.waiters), current)
        };

        let queued = waiters.len();
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }

        match outcome {
            Err(ref e) if e.abandoned => {
                warn!(queued, "renewal abandoned, releasing waiters");
            }
            _ if !current => {
                info!(queued, "session changed during renewal, outcome discarded");
            }
            Ok(_) => {
                info!(queued, "credential renewed");
                let _ = self.events.send(SessionEvent::Renewed);
            }
            Err(ref e) => {
                warn!(queued, err = %e, "renewal failed, session ended");
                let _ = self.events.send(SessionEvent::Ended { reason: EndReason::RenewalFailed });
            }
        }
        outcome
    }
}

/// Leader-side guard: returns the coordinator to idle even if the leader is
/// dropped mid-renewal or panics.
struct Flight<'a> {
    coordinator: &'a RenewalCoordinator,
    epoch: u64,
    settled: bool,
}

impl Flight<'_> {
    fn settle(&mut self, outcome: Outcome) -> Outcome {
        self.settled = true;
        self.coordinator.finish(self.epoch, outcome)
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            let _ = self.coordinator.finish(self.epoch, Err(RenewalError::abandoned()));
        }
    }
}

#[cfg(test)]
#[path = "renewal_tests.rs"]
mod tests;
