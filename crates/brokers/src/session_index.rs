//! In-memory user→broker and session→broker tables.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::broker::Broker;

/// The two live session tables.
///
/// Each table has its own reader-writer lock, and the two are never
/// acquired together, so there is no lock ordering to reason about.
/// Guards are held only for the duration of a map access (never across
/// a broker call) and every operation is O(1).
#[derive(Default)]
pub struct SessionIndex {
    users_to_broker: RwLock<HashMap<String, Broker>>,
    transactions_to_broker: RwLock<HashMap<String, Broker>>,
}

impl SessionIndex {
    /// An empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The broker previously chosen for `username`, if any.
    #[must_use]
    pub fn broker_for_user(&self, username: &str) -> Option<Broker> {
        self.users_to_broker.read().get(username).cloned()
    }

    /// Remembers `broker` as the preferred one for `username`.
    pub fn set_broker_for_user(&self, username: &str, broker: Broker) {
        self.users_to_broker.write().insert(username.to_owned(), broker);
    }

    /// The broker owning the live session `session_id`, if any.
    #[must_use]
    pub fn broker_for_session(&self, session_id: &str) -> Option<Broker> {
        self.transactions_to_broker.read().get(session_id).cloned()
    }

    /// Records a newly opened session.
    pub fn record_session(&self, session_id: &str, broker: Broker) {
        self.transactions_to_broker.write().insert(session_id.to_owned(), broker);
    }

    /// Forgets a session after its broker confirmed the end.
    pub fn forget_session(&self, session_id: &str) {
        self.transactions_to_broker.write().remove(session_id);
    }
}

impl std::fmt::Debug for SessionIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionIndex")
            .field("users", &self.users_to_broker.read().len())
            .field("sessions", &self.transactions_to_broker.read().len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testutil::ScriptedBroker;

    fn broker(id: &str) -> Broker {
        Broker::new(id, id.to_uppercase(), None, Arc::new(ScriptedBroker::default()))
    }

    #[test]
    fn user_preferences_are_independent_of_sessions() {
        let index = SessionIndex::new();

        index.set_broker_for_user("alice", broker("example"));
        index.record_session("sid-1", broker("other"));

        assert_eq!(index.broker_for_user("alice").unwrap().id(), "example");
        assert_eq!(index.broker_for_session("sid-1").unwrap().id(), "other");
        assert!(index.broker_for_user("bob").is_none());
        assert!(index.broker_for_session("sid-2").is_none());
    }

    #[test]
    fn preferences_overwrite() {
        let index = SessionIndex::new();

        index.set_broker_for_user("alice", broker("first"));
        index.set_broker_for_user("alice", broker("second"));

        assert_eq!(index.broker_for_user("alice").unwrap().id(), "second");
    }

    #[test]
    fn forgotten_sessions_are_gone() {
        let index = SessionIndex::new();

        index.record_session("sid-1", broker("example"));
        index.forget_session("sid-1");
        // Forgetting twice is harmless.
        index.forget_session("sid-1");

        assert!(index.broker_for_session("sid-1").is_none());
    }
}
