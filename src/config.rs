//! Discovery configuration and validation

use std::path::Path;
use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::directory::http::HttpDirectoryConfig;
use crate::error::{ConfigError, DiscoveryResult, ValidationError};
use crate::types::{AddressMode, ServiceNames};

/// Default prefix for synthesized member identifiers
pub const DEFAULT_NAME_PREFIX: &str = "app";

/// Default milliseconds between polls
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5000;

/// Configuration of one cluster-discovery instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Target cluster identifier
    #[serde(default)]
    pub cluster: String,
    /// Literal service names or regular expressions selecting services
    #[serde(default)]
    pub service_names: Option<ServiceNames>,
    /// Directory endpoint region
    #[serde(default)]
    pub region: String,
    /// Prefix of synthesized member identifiers
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,
    /// Milliseconds between polls
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Which task attachment shape member addresses are read from
    #[serde(default)]
    pub address_mode: AddressMode,
}

fn default_name_prefix() -> String {
    DEFAULT_NAME_PREFIX.to_string()
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

impl StrategyConfig {
    pub fn new(
        cluster: impl Into<String>,
        service_names: impl Into<ServiceNames>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            cluster: cluster.into(),
            service_names: Some(service_names.into()),
            region: region.into(),
            name_prefix: default_name_prefix(),
            poll_interval_ms: default_poll_interval_ms(),
            address_mode: AddressMode::default(),
        }
    }

    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    pub fn with_poll_interval_ms(mut self, interval_ms: u64) -> Self {
        self.poll_interval_ms = interval_ms;
        self
    }

    pub fn with_address_mode(mut self, mode: AddressMode) -> Self {
        self.address_mode = mode;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Structural checks that must hold before a discovery loop may start
    pub fn check_structure(&self) -> Result<(), ConfigError> {
        if self.service_names.is_none() {
            return Err(ConfigError::MissingField { field: "service_names" });
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidPollInterval);
        }
        Ok(())
    }
}

/// A configuration that passed validation, borrowed for one poll
#[derive(Debug, Clone)]
pub struct ValidatedConfig<'a> {
    pub cluster: &'a str,
    pub region: &'a str,
    pub service_names: Vec<String>,
}

/// Validate the fields a poll needs.
///
/// An absent `service_names` is a fatal [`ConfigError`] and is reported
/// before anything else. The soft checks then run on `cluster`, `region` and
/// `service_names` in that order, reporting the first violation only as a
/// [`ValidationError`].
pub fn validate(config: &StrategyConfig) -> DiscoveryResult<ValidatedConfig<'_>> {
    let service_names = config
        .service_names
        .as_ref()
        .ok_or(ConfigError::MissingField { field: "service_names" })?
        .to_vec();

    if config.cluster.is_empty() {
        return Err(ValidationError { field: "cluster" }.into());
    }
    if config.region.is_empty() {
        return Err(ValidationError { field: "region" }.into());
    }
    if service_names.is_empty() || service_names.iter().any(String::is_empty) {
        return Err(ValidationError { field: "service_names" }.into());
    }

    Ok(ValidatedConfig {
        cluster: &config.cluster,
        region: &config.region,
        service_names,
    })
}

/// On-disk configuration of the `ream-cluster` binary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfigFile {
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub directory: HttpDirectoryConfig,
}

/// Load a TOML configuration file
pub fn load_from_file(path: &Path) -> Result<ClusterConfigFile, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    toml::from_str(&content).map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))
}
