//! The broker handle and its transport capability.

use std::{path::Path, sync::Arc};

use async_trait::async_trait;

use crate::{
    config::BrokerConfig,
    error::{BrokerError, BrokerResult, TransportError},
};

/// What a broker returns when a session is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSessionReply {
    /// Opaque session id, unique for the lifetime of the session.
    pub session_id: String,
    /// Key the UI uses to encrypt challenge answers for the broker.
    /// Empty when the broker does not encrypt (the local broker).
    pub encryption_key: String,
}

/// Transport capability a broker implementation provides.
///
/// Implementations own the IPC specifics. Both calls may block on the
/// wire; callers cancel by dropping the future, and implementations
/// must tie their transport to it so a dropped call closes the
/// connection rather than leaking a half-open session.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Opens an authentication session for `username` in language
    /// `lang`.
    async fn new_session(
        &self,
        username: &str,
        lang: &str,
    ) -> Result<NewSessionReply, TransportError>;

    /// Tells the broker the session is over.
    async fn end_session(&self, session_id: &str) -> Result<(), TransportError>;
}

/// Builds the transport for a configured broker.
///
/// The registry hands this the parsed configuration and the file it
/// came from; everything transport-specific (bus names, endpoints,
/// credentials) is the connector's to extract. Failing here makes the
/// registry skip the broker with a warning.
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    /// Connects to the broker described by `config`.
    async fn connect(
        &self,
        config_path: &Path,
        config: &BrokerConfig,
    ) -> Result<Arc<dyn BrokerClient>, TransportError>;
}

/// A loaded broker: identity, display metadata, and its transport.
///
/// Cheap to clone; clones share the transport.
#[derive(Clone)]
pub struct Broker {
    inner: Arc<BrokerInner>,
}

struct BrokerInner {
    id: String,
    name: String,
    brand_icon: Option<String>,
    client: Arc<dyn BrokerClient>,
}

impl Broker {
    pub(crate) fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        brand_icon: Option<String>,
        client: Arc<dyn BrokerClient>,
    ) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                id: id.into(),
                name: name.into(),
                brand_icon,
                client,
            }),
        }
    }

    /// Stable broker id: the configuration-name of the broker, or
    /// [`LOCAL_BROKER_ID`](crate::LOCAL_BROKER_ID) for the local one.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Human-readable broker name for UIs.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Optional icon path for UIs.
    #[must_use]
    pub fn brand_icon(&self) -> Option<&str> {
        self.inner.brand_icon.as_deref()
    }

    pub(crate) async fn new_session(
        &self,
        username: &str,
        lang: &str,
    ) -> BrokerResult<NewSessionReply> {
        self.inner.client.new_session(username, lang).await.map_err(|source| {
            BrokerError::Session { broker_id: self.inner.id.clone(), source }
        })
    }

    pub(crate) async fn end_session(&self, session_id: &str) -> BrokerResult<()> {
        self.inner.client.end_session(session_id).await.map_err(|source| {
            BrokerError::Session { broker_id: self.inner.id.clone(), source }
        })
    }
}

impl std::fmt::Debug for Broker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .finish_non_exhaustive()
    }
}
