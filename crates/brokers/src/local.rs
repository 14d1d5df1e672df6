//! The in-process local broker.

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    broker::{BrokerClient, NewSessionReply},
    error::TransportError,
};

/// Id of the synthesized local broker, always present and always first
/// in the registry ordering.
pub const LOCAL_BROKER_ID: &str = "local";

/// Broker that exists so selection UIs always have a first entry. It
/// performs no authentication and has no transport: sessions are
/// fabricated in-process and ending one always succeeds.
pub(crate) struct LocalBroker;

#[async_trait]
impl BrokerClient for LocalBroker {
    async fn new_session(
        &self,
        _username: &str,
        _lang: &str,
    ) -> Result<NewSessionReply, TransportError> {
        Ok(NewSessionReply {
            session_id: format!("{LOCAL_BROKER_ID}-{}", Uuid::new_v4()),
            encryption_key: String::new(),
        })
    }

    async fn end_session(&self, _session_id: &str) -> Result<(), TransportError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sessions_are_unique_and_unencrypted() {
        let broker = LocalBroker;

        let first = broker.new_session("alice", "en_US").await.unwrap();
        let second = broker.new_session("alice", "en_US").await.unwrap();

        assert!(first.session_id.starts_with("local-"));
        assert_ne!(first.session_id, second.session_id);
        assert!(first.encryption_key.is_empty());

        broker.end_session(&first.session_id).await.unwrap();
    }
}
