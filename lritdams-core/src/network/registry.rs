//! The roster of live subscriber sessions.
//!
//! One mutex guards every mutation and every enumeration. Callers that
//! await while iterating take a [`snapshot`](Registry::snapshot) first;
//! [`for_each`](Registry::for_each) runs a synchronous closure under
//! the lock.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::ClientSession;

#[derive(Default)]
struct Roster {
    sessions: Vec<Arc<ClientSession>>,
    closed: bool,
}

/// Cheap to clone; clones share the same roster.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<Mutex<Roster>>,
}

impl Registry {
    fn lock(&self) -> MutexGuard<'_, Roster> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a session. Refused when the id is already present or the
    /// registry has been closed.
    pub fn add(&self, session: Arc<ClientSession>) -> bool {
        let mut roster = self.lock();
        if roster.closed || roster.sessions.iter().any(|s| s.id() == session.id()) {
            return false;
        }
        roster.sessions.push(session);
        true
    }

    pub fn remove(&self, id: u64) -> Option<Arc<ClientSession>> {
        let mut roster = self.lock();
        let pos = roster.sessions.iter().position(|s| s.id() == id)?;
        Some(roster.sessions.remove(pos))
    }

    pub fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().sessions.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Copy of the roster in registration order.
    pub fn snapshot(&self) -> Vec<Arc<ClientSession>> {
        self.lock().sessions.clone()
    }

    /// Visit each live session while holding the lock. `f` must not
    /// call back into the registry.
    pub fn for_each(&self, mut f: impl FnMut(&Arc<ClientSession>)) {
        for session in &self.lock().sessions {
            f(session);
        }
    }

    /// Refuse further adds and hand back everything still registered.
    pub fn close(&self) -> Vec<Arc<ClientSession>> {
        let mut roster = self.lock();
        roster.closed = true;
        std::mem::take(&mut roster.sessions)
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let roster = self.lock();
        f.debug_struct("Registry")
            .field("sessions", &roster.sessions.len())
            .field("closed", &roster.closed)
            .finish()
    }
}
