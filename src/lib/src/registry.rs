//! Handle table for open sessions.
//!
//! Handles are plain integers handed out in increasing order and never
//! reused, so a stale handle can only ever miss. The table lock covers
//! insert, lookup and removal only; work on a session happens under that
//! session's own lock.
//!
//! Each session kind gets its own registry instance, so a handle can never
//! resolve to a session of the wrong kind.

use crate::error::VerifyError;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Opaque handle to an open session
///
/// The value has no meaning outside the registry that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle(u64);

impl SessionHandle {
    /// Create a handle from a raw value
    pub fn from_raw(value: u64) -> Self {
        SessionHandle(value)
    }

    /// Get the raw handle value
    pub fn as_raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

/// A registered session. `None` once the session has been taken out for
/// teardown.
pub type SessionSlot<T> = Arc<Mutex<Option<T>>>;

struct RegistryState<T> {
    next_handle: u64,
    sessions: HashMap<u64, SessionSlot<T>>,
}

/// Thread-safe session table with a fixed capacity.
pub struct SessionRegistry<T> {
    state: Mutex<RegistryState<T>>,
    capacity: usize,
}

impl<T> SessionRegistry<T> {
    pub fn new(capacity: usize) -> Self {
        SessionRegistry {
            state: Mutex::new(RegistryState {
                next_handle: 1,
                sessions: HashMap::new(),
            }),
            capacity,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, RegistryState<T>>, VerifyError> {
        self.state.lock().map_err(|e| {
            log::error!("Session registry lock poisoned: {}", e);
            VerifyError::BadArgs
        })
    }

    /// Register `session`, failing with `BadArgs` when the table is full.
    pub fn insert(&self, session: T) -> Result<SessionHandle, VerifyError> {
        let mut state = self.lock()?;
        if state.sessions.len() >= self.capacity {
            log::warn!(
                "Refusing new session: {} of {} slots in use",
                state.sessions.len(),
                self.capacity
            );
            return Err(VerifyError::BadArgs);
        }
        let handle = state.next_handle;
        state.next_handle += 1;
        state
            .sessions
            .insert(handle, Arc::new(Mutex::new(Some(session))));
        Ok(SessionHandle::from_raw(handle))
    }

    /// Look up a live session. Unknown handles are `BadArgs`.
    pub fn get(&self, handle: SessionHandle) -> Result<SessionSlot<T>, VerifyError> {
        let state = self.lock()?;
        state.sessions.get(&handle.as_raw()).cloned().ok_or_else(|| {
            log::debug!("Unknown {}", handle);
            VerifyError::BadArgs
        })
    }

    /// Unregister a session and hand it back for teardown.
    ///
    /// Waits for any in-flight operation on the session to finish before
    /// taking it.
    pub fn remove(&self, handle: SessionHandle) -> Result<T, VerifyError> {
        let slot = {
            let mut state = self.lock()?;
            state.sessions.remove(&handle.as_raw()).ok_or_else(|| {
                log::debug!("Unknown {}", handle);
                VerifyError::BadArgs
            })?
        };
        let mut guard = slot.lock().map_err(|e| {
            log::error!("Session lock poisoned: {}", e);
            VerifyError::BadArgs
        })?;
        guard.take().ok_or(VerifyError::BadArgs)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.sessions.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
