//! The immutable broker directory loaded at startup.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    broker::{Broker, BrokerConnector},
    config::BrokerConfig,
    error::{BrokerError, BrokerResult},
    local::{LOCAL_BROKER_ID, LocalBroker},
};

/// Default configuration directory, relative to the root directory.
const DEFAULT_CONFIG_SUBDIR: &str = "etc/authd/broker.d";

/// Construction options for [`BrokerRegistry`].
#[derive(Debug, Clone)]
pub struct RegistryOptions {
    root_dir: PathBuf,
    config_subdir: PathBuf,
    configured: Vec<String>,
}

impl RegistryOptions {
    /// Options with the system root and the default configuration
    /// directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root_dir: PathBuf::from("/"),
            config_subdir: PathBuf::from(DEFAULT_CONFIG_SUBDIR),
            configured: Vec::new(),
        }
    }

    /// Uses a dedicated path as the root directory (tests, chroots).
    #[must_use]
    pub fn with_root_dir(mut self, root: impl Into<PathBuf>) -> Self {
        self.root_dir = root.into();
        self
    }

    /// Loads exactly these brokers, in this order, instead of
    /// enumerating the configuration directory.
    #[must_use]
    pub fn with_configured_brokers(mut self, names: Vec<String>) -> Self {
        self.configured = names;
        self
    }

    fn config_dir(&self) -> PathBuf {
        self.root_dir.join(&self.config_subdir)
    }
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Ordered, immutable directory of the brokers available to the
/// daemon.
///
/// Built once at startup and shared by reference afterwards; reads
/// need no locking. The local broker is always present and always
/// first.
pub struct BrokerRegistry {
    brokers: HashMap<String, Broker>,
    order: Vec<String>,
}

impl BrokerRegistry {
    /// Loads the registry.
    ///
    /// When `options` names no brokers explicitly, every regular file
    /// in the configuration directory is taken as a broker, in ASCII
    /// lexical filename order. A missing directory degrades to the
    /// local broker alone with a warning; an unreadable one is an
    /// error. A broker whose configuration fails to parse or whose
    /// transport fails to connect is skipped with a warning; the
    /// registry keeps whatever did load.
    pub async fn load(
        options: RegistryOptions,
        connector: &dyn BrokerConnector,
    ) -> BrokerResult<Self> {
        let config_dir = options.config_dir();
        tracing::debug!(dir = %config_dir.display(), "loading broker registry");

        let configured = if options.configured.is_empty() {
            enumerate_config_dir(&config_dir)?
        } else {
            options.configured
        };

        let mut brokers = HashMap::with_capacity(configured.len() + 1);
        let mut order = Vec::with_capacity(configured.len() + 1);

        // The local broker needs no configuration and always comes first.
        let local = Broker::new(LOCAL_BROKER_ID, "Local account", None, Arc::new(LocalBroker));
        order.push(local.id().to_owned());
        brokers.insert(local.id().to_owned(), local);

        for name in configured {
            let path = config_dir.join(&name);
            match load_broker(&path, &name, connector).await {
                Ok(broker) => {
                    order.push(broker.id().to_owned());
                    brokers.insert(broker.id().to_owned(), broker);
                },
                Err(err) => {
                    tracing::warn!(broker = %name, error = %err,
                        "skipping broker that is not correctly configured");
                },
            }
        }

        Ok(Self { brokers, order })
    }

    /// Returns the loaded brokers in preference order (local first,
    /// then configuration order).
    #[must_use]
    pub fn available_brokers(&self) -> Vec<Broker> {
        self.order.iter().map(|id| self.brokers[id].clone()).collect()
    }

    /// Resolves a broker by id.
    pub fn broker_from_id(&self, id: &str) -> BrokerResult<Broker> {
        self.brokers
            .get(id)
            .cloned()
            .ok_or_else(|| BrokerError::UnknownBroker { id: id.to_owned() })
    }

    /// The always-present local broker.
    #[must_use]
    pub fn local_broker(&self) -> Broker {
        self.brokers[LOCAL_BROKER_ID].clone()
    }
}

impl std::fmt::Debug for BrokerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerRegistry").field("order", &self.order).finish()
    }
}

/// Lists regular files of the configuration directory in ASCII lexical
/// order. A missing directory yields the empty list.
fn enumerate_config_dir(dir: &Path) -> BrokerResult<Vec<String>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(dir = %dir.display(),
                "broker configuration directory does not exist, only the local broker will be available");
            return Ok(Vec::new());
        },
        Err(err) => {
            return Err(BrokerError::ConfigDir { path: dir.to_owned(), source: err });
        },
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| BrokerError::ConfigDir {
            path: dir.to_owned(),
            source: err,
        })?;
        let is_file = entry
            .file_type()
            .map_err(|err| BrokerError::ConfigDir { path: dir.to_owned(), source: err })?
            .is_file();
        if !is_file {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(name) => {
                tracing::warn!(file = ?name, "ignoring broker configuration with non-UTF-8 name");
            },
        }
    }
    names.sort();

    Ok(names)
}

/// Parses one configuration file and connects its transport.
async fn load_broker(
    path: &Path,
    config_name: &str,
    connector: &dyn BrokerConnector,
) -> BrokerResult<Broker> {
    let config = BrokerConfig::load(path)?;
    let client = connector.connect(path, &config).await.map_err(|source| {
        BrokerError::Session { broker_id: config_name.to_owned(), source }
    })?;

    Ok(Broker::new(config_name, config.name, config.brand_icon, client))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::testutil::ScriptedConnector;

    fn write_config(root: &TempDir, filename: &str, name: &str) {
        let dir = root.path().join(DEFAULT_CONFIG_SUBDIR);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(filename), format!("name = {name:?}\n")).unwrap();
    }

    #[tokio::test]
    async fn local_broker_is_always_first() {
        let root = TempDir::new().unwrap();
        write_config(&root, "zulu", "Zulu");
        write_config(&root, "alpha", "Alpha");

        let registry = BrokerRegistry::load(
            RegistryOptions::new().with_root_dir(root.path()),
            &ScriptedConnector::default(),
        )
        .await
        .unwrap();

        let ids: Vec<String> =
            registry.available_brokers().iter().map(|b| b.id().to_owned()).collect();
        assert_eq!(ids, [LOCAL_BROKER_ID, "alpha", "zulu"]);
    }

    #[tokio::test]
    async fn explicit_list_overrides_directory_order() {
        let root = TempDir::new().unwrap();
        write_config(&root, "alpha", "Alpha");
        write_config(&root, "zulu", "Zulu");

        let registry = BrokerRegistry::load(
            RegistryOptions::new()
                .with_root_dir(root.path())
                .with_configured_brokers(vec!["zulu".into(), "alpha".into()]),
            &ScriptedConnector::default(),
        )
        .await
        .unwrap();

        let ids: Vec<String> =
            registry.available_brokers().iter().map(|b| b.id().to_owned()).collect();
        assert_eq!(ids, [LOCAL_BROKER_ID, "zulu", "alpha"]);
    }

    #[tokio::test]
    async fn missing_config_dir_degrades_to_local_only() {
        let root = TempDir::new().unwrap();

        let registry = BrokerRegistry::load(
            RegistryOptions::new().with_root_dir(root.path()),
            &ScriptedConnector::default(),
        )
        .await
        .unwrap();

        let brokers = registry.available_brokers();
        assert_eq!(brokers.len(), 1);
        assert_eq!(brokers[0].id(), LOCAL_BROKER_ID);
    }

    #[tokio::test]
    async fn unparseable_broker_is_skipped_not_fatal() {
        let root = TempDir::new().unwrap();
        write_config(&root, "good", "Good");
        let dir = root.path().join(DEFAULT_CONFIG_SUBDIR);
        std::fs::write(dir.join("broken"), "name =").unwrap();

        let registry = BrokerRegistry::load(
            RegistryOptions::new().with_root_dir(root.path()),
            &ScriptedConnector::default(),
        )
        .await
        .unwrap();

        let ids: Vec<String> =
            registry.available_brokers().iter().map(|b| b.id().to_owned()).collect();
        assert_eq!(ids, [LOCAL_BROKER_ID, "good"]);
        assert!(matches!(
            registry.broker_from_id("broken"),
            Err(BrokerError::UnknownBroker { .. })
        ));
    }

    #[tokio::test]
    async fn failing_transport_is_skipped_not_fatal() {
        let root = TempDir::new().unwrap();
        write_config(&root, "unreachable", "Unreachable");
        write_config(&root, "reachable", "Reachable");

        let connector = ScriptedConnector::default();
        connector.refuse("unreachable");

        let registry = BrokerRegistry::load(
            RegistryOptions::new().with_root_dir(root.path()),
            &connector,
        )
        .await
        .unwrap();

        let ids: Vec<String> =
            registry.available_brokers().iter().map(|b| b.id().to_owned()).collect();
        assert_eq!(ids, [LOCAL_BROKER_ID, "reachable"]);
    }

    #[tokio::test]
    async fn subdirectories_are_ignored() {
        let root = TempDir::new().unwrap();
        write_config(&root, "good", "Good");
        std::fs::create_dir_all(root.path().join(DEFAULT_CONFIG_SUBDIR).join("subdir")).unwrap();

        let registry = BrokerRegistry::load(
            RegistryOptions::new().with_root_dir(root.path()),
            &ScriptedConnector::default(),
        )
        .await
        .unwrap();

        assert_eq!(registry.available_brokers().len(), 2);
    }

    #[tokio::test]
    async fn broker_metadata_comes_from_the_config() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join(DEFAULT_CONFIG_SUBDIR);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("example-broker"),
            "name = \"Example\"\nbrand_icon = \"/icons/example.png\"\n",
        )
        .unwrap();

        let registry = BrokerRegistry::load(
            RegistryOptions::new().with_root_dir(root.path()),
            &ScriptedConnector::default(),
        )
        .await
        .unwrap();

        let broker = registry.broker_from_id("example-broker").unwrap();
        assert_eq!(broker.name(), "Example");
        assert_eq!(broker.brand_icon(), Some("/icons/example.png"));
    }
}
