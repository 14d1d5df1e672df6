//! Session lifecycle on top of the registry and the session index.

use crate::{
    broker::{Broker, NewSessionReply},
    error::{BrokerError, BrokerResult},
    registry::BrokerRegistry,
    session_index::SessionIndex,
};

/// Composes the immutable [`BrokerRegistry`] with the live
/// [`SessionIndex`] and owns the session lifecycle the PAM service
/// drives.
///
/// The manager never repairs broker-side failures; it only refuses to
/// touch its in-memory tables when a broker call fails, so the index
/// stays consistent with the broker's view of the world.
pub struct Manager {
    registry: BrokerRegistry,
    sessions: SessionIndex,
}

impl Manager {
    /// Wraps a loaded registry with an empty session index.
    #[must_use]
    pub fn new(registry: BrokerRegistry) -> Self {
        Self { registry, sessions: SessionIndex::new() }
    }

    /// The loaded brokers in preference order.
    #[must_use]
    pub fn available_brokers(&self) -> Vec<Broker> {
        self.registry.available_brokers()
    }

    /// Opens an authentication session with the given broker and
    /// records it in the index.
    ///
    /// # Errors
    ///
    /// [`BrokerError::UnknownBroker`] for an id the registry does not
    /// know; [`BrokerError::Session`] when the broker call fails, in
    /// which case no index entry is created.
    pub async fn new_session(
        &self,
        broker_id: &str,
        username: &str,
        lang: &str,
    ) -> BrokerResult<NewSessionReply> {
        let broker = self.registry.broker_from_id(broker_id)?;

        let reply = broker.new_session(username, lang).await?;
        tracing::debug!(broker = broker_id, session = %reply.session_id, "opened session");

        self.sessions.record_session(&reply.session_id, broker);
        Ok(reply)
    }

    /// Signals the end of a session to its broker, then drops the
    /// index entry.
    ///
    /// A broker-side failure aborts before the removal, so the entry
    /// stays until the broker acknowledges the end.
    pub async fn end_session(&self, session_id: &str) -> BrokerResult<()> {
        let broker = self.broker_from_session_id(session_id)?;

        broker.end_session(session_id).await?;
        tracing::debug!(broker = broker.id(), session = session_id, "ended session");

        self.sessions.forget_session(session_id);
        Ok(())
    }

    /// The broker owning `session_id`.
    ///
    /// The empty session id is the sentinel for "no session yet" and
    /// always resolves to the local broker, whatever the index holds.
    pub fn broker_from_session_id(&self, session_id: &str) -> BrokerResult<Broker> {
        if session_id.is_empty() {
            return Ok(self.registry.local_broker());
        }

        self.sessions.broker_for_session(session_id).ok_or_else(|| {
            BrokerError::NoBrokerForSession { session_id: session_id.to_owned() }
        })
    }

    /// Remembers which broker should be offered first for `username`.
    ///
    /// # Errors
    ///
    /// [`BrokerError::UnknownBroker`] when the id does not resolve; the
    /// preference is untouched in that case.
    pub fn set_default_broker_for_user(
        &self,
        broker_id: &str,
        username: &str,
    ) -> BrokerResult<()> {
        let broker = self.registry.broker_from_id(broker_id)?;
        self.sessions.set_broker_for_user(username, broker);
        Ok(())
    }

    /// The broker previously selected for `username`; `None` means no
    /// preference has been recorded.
    #[must_use]
    pub fn broker_for_user(&self, username: &str) -> Option<Broker> {
        self.sessions.broker_for_user(username)
    }
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("registry", &self.registry)
            .field("sessions", &self.sessions)
            .finish()
    }
}
