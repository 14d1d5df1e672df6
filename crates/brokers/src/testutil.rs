//! Shared test helpers: a scriptable broker transport.
//!
//! Feature-gated behind `testutil` so integration tests of downstream
//! crates can drive the [`Manager`](crate::Manager) against a broker
//! whose behaviour they control. Enable it in `[dev-dependencies]`:
//!
//! ```toml
//! [dev-dependencies]
//! identityd-brokers = { path = "../brokers", features = ["testutil"] }
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    broker::{BrokerClient, BrokerConnector, NewSessionReply},
    config::BrokerConfig,
    error::TransportError,
};

/// In-memory broker transport with scriptable failures.
///
/// Sessions get sequential ids (`session-1`, `session-2`, ...) and a
/// fixed encryption key. `fail_next_*` arms a one-shot failure for the
/// corresponding call.
#[derive(Default)]
pub struct ScriptedBroker {
    counter: AtomicU64,
    fail_new_session: Mutex<Option<String>>,
    fail_end_session: Mutex<Option<String>>,
    ended: Mutex<Vec<String>>,
}

impl ScriptedBroker {
    /// Makes the next `new_session` call fail with `reason`.
    pub fn fail_next_new_session(&self, reason: impl Into<String>) {
        *self.fail_new_session.lock() = Some(reason.into());
    }

    /// Makes the next `end_session` call fail with `reason`.
    pub fn fail_next_end_session(&self, reason: impl Into<String>) {
        *self.fail_end_session.lock() = Some(reason.into());
    }

    /// Session ids this broker has been told to end, in order.
    #[must_use]
    pub fn ended_sessions(&self) -> Vec<String> {
        self.ended.lock().clone()
    }
}

#[async_trait]
impl BrokerClient for ScriptedBroker {
    async fn new_session(
        &self,
        _username: &str,
        _lang: &str,
    ) -> Result<NewSessionReply, TransportError> {
        if let Some(reason) = self.fail_new_session.lock().take() {
            return Err(Arc::new(std::io::Error::other(reason)));
        }

        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(NewSessionReply {
            session_id: format!("session-{n}"),
            encryption_key: "scripted-key".into(),
        })
    }

    async fn end_session(&self, session_id: &str) -> Result<(), TransportError> {
        if let Some(reason) = self.fail_end_session.lock().take() {
            return Err(Arc::new(std::io::Error::other(reason)));
        }

        self.ended.lock().push(session_id.to_owned());
        Ok(())
    }
}

/// Connector that hands out [`ScriptedBroker`]s, refusing the
/// configuration names it was told to.
#[derive(Default)]
pub struct ScriptedConnector {
    refused: Mutex<Vec<String>>,
    connected: Mutex<Vec<(String, Arc<ScriptedBroker>)>>,
}

impl ScriptedConnector {
    /// Refuses to connect the broker whose configuration file is named
    /// `config_name`.
    pub fn refuse(&self, config_name: impl Into<String>) {
        self.refused.lock().push(config_name.into());
    }

    /// The scripted transport handed out for `config_name`, if it
    /// connected.
    #[must_use]
    pub fn client_for(&self, config_name: &str) -> Option<Arc<ScriptedBroker>> {
        self.connected
            .lock()
            .iter()
            .find(|(name, _)| name == config_name)
            .map(|(_, client)| Arc::clone(client))
    }
}

#[async_trait]
impl BrokerConnector for ScriptedConnector {
    async fn connect(
        &self,
        config_path: &std::path::Path,
        _config: &BrokerConfig,
    ) -> Result<Arc<dyn BrokerClient>, TransportError> {
        let config_name = config_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        if self.refused.lock().contains(&config_name) {
            return Err(Arc::new(std::io::Error::other(format!(
                "transport to {config_name} refused"
            ))));
        }

        let client = Arc::new(ScriptedBroker::default());
        self.connected.lock().push((config_name, Arc::clone(&client)));
        Ok(client)
    }
}
