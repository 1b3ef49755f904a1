//! Pre-auth window and token verification.
//!
//! A connection gets one cancellable timer when it enters `PreAuth`. The only
//! way out of that state is [`AuthenticationGate::admit`] succeeding, which
//! cancels the timer before the caller transitions the connection, or a
//! forced disconnect.

use crate::error::DisconnectReason;
use crate::scheduler::TaskScheduler;
use crate::store::{Credential, PersistenceStore};
use log::debug;
use std::time::{Duration, Instant};

pub struct AuthenticationGate {
    timers: TaskScheduler,
    window: Duration,
}

impl AuthenticationGate {
    pub fn new(window: Duration) -> Self {
        Self {
            timers: TaskScheduler::new(),
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Starts the pre-auth timer for `id`, replacing any stale one.
    pub fn open(&mut self, id: u32, now: Instant) {
        debug!("Pre-auth timer started for {} ({:?})", id, self.window);
        self.timers.schedule_once(id, now + self.window);
    }

    pub fn cancel(&mut self, id: u32) -> bool {
        self.timers.cancel(id)
    }

    pub fn is_waiting(&self, id: u32) -> bool {
        self.timers.is_pending(id)
    }

    /// Ids whose window elapsed at `now`. Their timers are consumed.
    pub fn expired(&mut self, now: Instant) -> Vec<u32> {
        self.timers.due(now)
    }

    /// Checks an authentication attempt and, on success, cancels the timer.
    ///
    /// Checks run in a fixed order: world readiness, token presence,
    /// credential lookup, then whether `id` is still waiting in `PreAuth`.
    pub fn admit<S: PersistenceStore>(
        &mut self,
        id: u32,
        token: Option<&str>,
        store: &S,
        world_ready: bool,
        in_pre_auth: bool,
    ) -> Result<Credential, DisconnectReason> {
        if !world_ready {
            return Err(DisconnectReason::ServerNotReady);
        }

        let token = token.ok_or(DisconnectReason::MissingToken)?;
        let credential = store
            .credential_by_token(token)
            .ok_or(DisconnectReason::WrongCredentials)?;

        if !in_pre_auth || !self.timers.cancel(id) {
            return Err(DisconnectReason::ServerNotReady);
        }

        Ok(credential)
    }
}
