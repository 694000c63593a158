//! SessionRegistry: the single-active-session state machine.
//!
//! # Session lifecycle (for beginners)
//!
//! ```text
//!               token matches                     disconnect
//! Unauthorized ───────────────►  Authorized  ──────────────────►  Absent
//!      │                              │
//!      │ token mismatch               │ another phone connects
//!      ▼                              ▼ with the right token
//!   Refused (handshake fails)     Superseded (closed by the server)
//! ```
//!
//! At most one session is authorized at any time.  When a second connection
//! presents the correct token, it **replaces** the current one
//! (replace-on-connect).  A phone that drops off Wi-Fi and reconnects gets a
//! new session id before the old socket has timed out; rejecting the
//! newcomer would lock the owner out for the whole idle timeout.
//!
//! # Concurrency
//!
//! The current session lives behind one `std::sync::Mutex`.  Every transition
//! (authorize, clear) happens inside that lock, so concurrent connects racing
//! a disconnect cannot leave two sessions authorized.  The lock is never held
//! across an `.await`; the WebSocket handshake callback that calls
//! [`SessionRegistry::authorize`] is synchronous.
//!
//! Displaced sessions learn about the change through a `tokio::sync::watch`
//! channel ([`SessionRegistry::subscribe`]) and close themselves.

use std::sync::{Mutex, MutexGuard, PoisonError};

use lanpush_core::AuthToken;
use tokio::sync::watch;

use crate::domain::SessionId;

/// Outcome of a connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    /// Token matched and no other session was active.
    Granted,
    /// Token matched; `previous` was active and has been displaced.
    Superseded { previous: SessionId },
    /// Token did not match; the handshake must be refused.
    Refused,
}

impl Authorization {
    /// Returns `true` for both `Granted` and `Superseded`.
    pub fn is_authorized(&self) -> bool {
        !matches!(self, Self::Refused)
    }
}

/// Tracks the one authorized session.
pub struct SessionRegistry {
    token: AuthToken,
    current: Mutex<Option<SessionId>>,
    changes: watch::Sender<Option<SessionId>>,
}

impl SessionRegistry {
    /// Creates an empty registry that accepts `token`.
    pub fn new(token: AuthToken) -> Self {
        let (changes, _) = watch::channel(None);
        Self {
            token,
            current: Mutex::new(None),
            changes,
        }
    }

    /// Returns the token connections are checked against.
    pub fn token(&self) -> &AuthToken {
        &self.token
    }

    /// Attempts to authorize `session_id` with `attempted_token`.
    ///
    /// On a match, `session_id` becomes the sole authorized session and any
    /// previous one is superseded.
    pub fn authorize(&self, attempted_token: &str, session_id: SessionId) -> Authorization {
        if !self.token.matches(attempted_token) {
            return Authorization::Refused;
        }

        let mut current = self.lock();
        let previous = current.replace(session_id);
        // Publish while still holding the lock so observers see transitions
        // in the same order they happened.
        self.changes.send_replace(Some(session_id));

        match previous {
            Some(previous) if previous != session_id => Authorization::Superseded { previous },
            _ => Authorization::Granted,
        }
    }

    /// Boolean form of [`SessionRegistry::authorize`].
    pub fn try_authorize(&self, attempted_token: &str, session_id: SessionId) -> bool {
        self.authorize(attempted_token, session_id).is_authorized()
    }

    /// Clears `session_id` if it is the authorized session.
    ///
    /// Returns `true` if the registry changed.  Stale ids are ignored.
    pub fn clear(&self, session_id: SessionId) -> bool {
        let mut current = self.lock();
        if *current == Some(session_id) {
            *current = None;
            self.changes.send_replace(None);
            true
        } else {
            false
        }
    }

    /// Returns `true` if `session_id` is the authorized session.
    pub fn is_authorized(&self, session_id: SessionId) -> bool {
        *self.lock() == Some(session_id)
    }

    /// Returns the authorized session, if any.
    pub fn current(&self) -> Option<SessionId> {
        *self.lock()
    }

    /// Subscribes to changes of the authorized session.
    pub fn subscribe(&self) -> watch::Receiver<Option<SessionId>> {
        self.changes.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, Option<SessionId>> {
        // The guarded value is a plain `Option`; a panic elsewhere cannot
        // leave it half-updated, so a poisoned lock is still usable.
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const TOKEN: &str = "482913";

    fn registry() -> SessionRegistry {
        SessionRegistry::new(AuthToken::new(TOKEN))
    }

    #[test]
    fn test_registry_starts_empty() {
        assert_eq!(registry().current(), None);
    }

    #[test]
    fn test_matching_token_is_granted() {
        // Arrange
        let reg = registry();
        let sid = SessionId::new();

        // Act
        let outcome = reg.authorize(TOKEN, sid);

        // Assert
        assert_eq!(outcome, Authorization::Granted);
        assert!(reg.is_authorized(sid));
    }

    #[test]
    fn test_wrong_token_is_refused_and_state_unchanged() {
        let reg = registry();
        let sid = SessionId::new();
        assert_eq!(reg.authorize("000000", sid), Authorization::Refused);
        assert!(!reg.try_authorize("", sid));
        assert_eq!(reg.current(), None);
    }

    #[test]
    fn test_wrong_token_does_not_displace_active_session() {
        // Arrange: one valid session
        let reg = registry();
        let first = SessionId::new();
        assert!(reg.try_authorize(TOKEN, first));

        // Act: a second attempt with a different token
        let second = SessionId::new();
        let accepted = reg.try_authorize("111111", second);

        // Assert: exactly the first session remains authorized
        assert!(!accepted);
        assert!(reg.is_authorized(first));
        assert!(!reg.is_authorized(second));
    }

    #[test]
    fn test_second_valid_connect_supersedes_first() {
        let reg = registry();
        let first = SessionId::new();
        let second = SessionId::new();
        reg.authorize(TOKEN, first);

        let outcome = reg.authorize(TOKEN, second);

        assert_eq!(outcome, Authorization::Superseded { previous: first });
        assert!(reg.is_authorized(second));
        assert!(!reg.is_authorized(first));
    }

    #[test]
    fn test_reauthorizing_same_session_is_granted() {
        let reg = registry();
        let sid = SessionId::new();
        reg.authorize(TOKEN, sid);
        assert_eq!(reg.authorize(TOKEN, sid), Authorization::Granted);
    }

    #[test]
    fn test_clear_current_session_empties_registry() {
        let reg = registry();
        let sid = SessionId::new();
        reg.authorize(TOKEN, sid);

        assert!(reg.clear(sid));
        assert_eq!(reg.current(), None);
    }

    #[test]
    fn test_clear_stale_session_is_noop() {
        // Arrange: second session superseded the first
        let reg = registry();
        let first = SessionId::new();
        let second = SessionId::new();
        reg.authorize(TOKEN, first);
        reg.authorize(TOKEN, second);

        // Act: the first session's disconnect arrives late
        let changed = reg.clear(first);

        // Assert
        assert!(!changed);
        assert_eq!(reg.current(), Some(second));
    }

    #[test]
    fn test_clear_unknown_session_on_empty_registry_is_noop() {
        let reg = registry();
        assert!(!reg.clear(SessionId::new()));
        assert_eq!(reg.current(), None);
    }

    #[test]
    fn test_subscribers_observe_supersession() {
        let reg = registry();
        let first = SessionId::new();
        reg.authorize(TOKEN, first);
        let rx = reg.subscribe();

        let second = SessionId::new();
        reg.authorize(TOKEN, second);

        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow(), Some(second));
    }

    #[test]
    fn test_subscribers_observe_clear() {
        let reg = registry();
        let sid = SessionId::new();
        reg.authorize(TOKEN, sid);
        let rx = reg.subscribe();

        reg.clear(sid);

        assert_eq!(*rx.borrow(), None);
    }

    #[test]
    fn test_concurrent_connects_leave_exactly_one_session() {
        // Arrange
        let reg = Arc::new(registry());
        let ids: Vec<SessionId> = (0..16).map(|_| SessionId::new()).collect();

        // Act: race authorize and clear from many threads
        let handles: Vec<_> = ids
            .iter()
            .copied()
            .map(|sid| {
                let reg = Arc::clone(&reg);
                std::thread::spawn(move || {
                    reg.authorize(TOKEN, sid);
                    reg.clear(SessionId::new());
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        // Assert: exactly one of the racing sessions holds the slot
        let authorized: Vec<_> = ids.iter().filter(|sid| reg.is_authorized(**sid)).collect();
        assert_eq!(authorized.len(), 1);
    }
}
