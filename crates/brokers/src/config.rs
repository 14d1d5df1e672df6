//! Broker configuration files.

use std::path::Path;

use serde::Deserialize;

use crate::error::{BrokerError, BrokerResult};

/// Parsed broker configuration.
///
/// One TOML file per broker lives in the configuration directory; the
/// filename is the broker's configuration-name and becomes its id.
/// Transport-specific keys are allowed in the file but belong to the
/// [`BrokerConnector`](crate::BrokerConnector), which receives the file
/// path alongside this struct.
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    /// Human-readable broker name shown in UIs.
    pub name: String,
    /// Optional icon path shown next to the name.
    #[serde(default)]
    pub brand_icon: Option<String>,
}

impl BrokerConfig {
    /// Reads and parses the configuration file at `path`.
    pub fn load(path: &Path) -> BrokerResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| BrokerError::Config {
            path: path.to_owned(),
            reason: err.to_string(),
        })?;

        toml::from_str(&raw).map_err(|err| BrokerError::Config {
            path: path.to_owned(),
            reason: err.to_string(),
        })
    }
}
