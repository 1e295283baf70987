//! Client sessions and their grab lifetime.
//!
//! Sessions are opened by clients, kept alive by activity, and terminated
//! either explicitly or by idle timeout. Termination releases every grab the
//! session holds exactly once, however many times termination is detected.
//!
//! Grabs made through [`SessionManager::grab`] hold the session's map entry
//! for the duration of the grab, and termination removes that entry before
//! releasing. A grab therefore either completes before termination (and is
//! released by it) or fails with `UnknownSession`; it can never outlive the
//! session.
//!
//! ```rust
//! use std::sync::Arc;
//! use rs_layout::{HardwareEvent, OwnershipRegistry, SessionManager, StateStore};
//!
//! let store = Arc::new(StateStore::new());
//! store.apply_event(HardwareEvent::train_discovered("train7", 7, &[])).unwrap();
//! let grabs = Arc::new(OwnershipRegistry::new(Arc::clone(&store)));
//! let sessions = SessionManager::new(Arc::clone(&grabs), 30_000);
//!
//! let token = sessions.open(0);
//! sessions.grab(&token, "train7", 10).unwrap();
//! assert!(grabs.is_grabbed("train7"));
//!
//! // First termination releases, the second is a no-op.
//! assert_eq!(sessions.terminate(&token).map(|r| r.len()), Some(1));
//! assert_eq!(sessions.terminate(&token), None);
//! assert!(!grabs.is_grabbed("train7"));
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use crate::error::{LayoutError, Result};
use crate::ownership::{GrabOutcome, OwnershipRegistry, ReleaseOutcome};
use crate::state::{Identifier, SessionToken};

/// Book-keeping for one open session.
#[derive(Debug)]
struct SessionEntry {
    last_seen_ms: AtomicU64,
}

/// Registry of open sessions.
pub struct SessionManager {
    grabs: Arc<OwnershipRegistry>,
    sessions: DashMap<SessionToken, SessionEntry>,
    idle_timeout_ms: u64,
}

impl SessionManager {
    /// Creates a manager releasing grabs through `grabs`.
    ///
    /// Sessions idle for longer than `idle_timeout_ms` are terminated by
    /// [`expire_idle`](Self::expire_idle). A timeout of 0 disables expiry.
    pub fn new(grabs: Arc<OwnershipRegistry>, idle_timeout_ms: u64) -> Self {
        Self {
            grabs,
            sessions: DashMap::new(),
            idle_timeout_ms,
        }
    }

    /// Open a session with a fresh random token.
    pub fn open(&self, now_ms: u64) -> SessionToken {
        let token = SessionToken::generate();
        self.sessions.insert(
            token.clone(),
            SessionEntry {
                last_seen_ms: AtomicU64::new(now_ms),
            },
        );
        info!(session = %token, "session opened");
        token
    }

    /// Record activity. Returns false if the session is not active.
    pub fn touch(&self, token: &SessionToken, now_ms: u64) -> bool {
        match self.sessions.get(token) {
            Some(entry) => {
                entry.last_seen_ms.fetch_max(now_ms, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Whether the session is open.
    pub fn is_active(&self, token: &SessionToken) -> bool {
        self.sessions.contains_key(token)
    }

    /// Number of open sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns true if no session is open.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Grab a train on behalf of an open session.
    ///
    /// # Errors
    ///
    /// [`LayoutError::UnknownSession`] if the session is not open, otherwise
    /// whatever [`OwnershipRegistry::grab`] returns.
    pub fn grab(&self, token: &SessionToken, train: &str, now_ms: u64) -> Result<GrabOutcome> {
        self.with_session(token, now_ms, || self.grabs.grab(train, token))?
    }

    /// Release a train on behalf of an open session.
    ///
    /// # Errors
    ///
    /// [`LayoutError::UnknownSession`] if the session is not open, otherwise
    /// whatever [`OwnershipRegistry::release`] returns.
    pub fn release(&self, token: &SessionToken, train: &str, now_ms: u64) -> Result<ReleaseOutcome> {
        self.with_session(token, now_ms, || self.grabs.release(train, token))?
    }

    /// Run `f` on behalf of an open session, recording activity.
    ///
    /// The session's entry is held until `f` returns, so termination waits
    /// for work already admitted under the session.
    ///
    /// # Errors
    ///
    /// [`LayoutError::UnknownSession`] if the session is not open.
    pub fn with_session<R>(&self, token: &SessionToken, now_ms: u64, f: impl FnOnce() -> R) -> Result<R> {
        let entry = self.sessions.get(token).ok_or(LayoutError::UnknownSession)?;
        entry.last_seen_ms.fetch_max(now_ms, Ordering::Relaxed);
        Ok(f())
    }

    /// End a session and release its grabs.
    ///
    /// Returns the released trains for the call that actually ended the
    /// session, and `None` for every redundant call.
    pub fn terminate(&self, token: &SessionToken) -> Option<Vec<Identifier>> {
        self.sessions.remove(token)?;
        let released = self.grabs.release_all(token);
        info!(session = %token, released = released.len(), "session terminated");
        Some(released)
    }

    /// Terminate every session idle for longer than the timeout.
    ///
    /// Returns the tokens that were terminated by this call.
    pub fn expire_idle(&self, now_ms: u64) -> Vec<SessionToken> {
        if self.idle_timeout_ms == 0 {
            return Vec::new();
        }
        let timeout = self.idle_timeout_ms;
        let idle = |entry: &SessionEntry| {
            now_ms.saturating_sub(entry.last_seen_ms.load(Ordering::Relaxed)) > timeout
        };

        let candidates: Vec<SessionToken> = self
            .sessions
            .iter()
            .filter(|e| idle(e.value()))
            .map(|e| e.key().clone())
            .collect();

        let mut expired = Vec::new();
        for token in candidates {
            // Re-check under the shard lock: the session may have been
            // touched or terminated since the scan.
            if self.sessions.remove_if(&token, |_, entry| idle(entry)).is_some() {
                let released = self.grabs.release_all(&token);
                info!(session = %token, released = released.len(), "session expired");
                expired.push(token);
            }
        }
        expired
    }

    /// Terminate every session (system shutdown). Returns how many were open.
    pub fn terminate_all(&self) -> usize {
        let tokens: Vec<SessionToken> = self.sessions.iter().map(|e| e.key().clone()).collect();
        tokens
            .iter()
            .filter(|token| self.terminate(token).is_some())
            .count()
    }
}
