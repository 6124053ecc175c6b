pub mod namespaces;

pub use namespaces::{
    parse_namespace_list, validate_namespace_configs, validate_namespace_name, NamespaceConfig,
    DEFAULT_NAMESPACES, DEFAULT_REFRESH_INTERVAL_MS,
};

use std::path::Path;
use std::time::Duration;

use thiserror::Error;

/// Default poll and broadcast cadence in seconds
pub const DEFAULT_TICK_SECS: u64 = 5;

/// Default upper bound for a single cluster call in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse namespace file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid namespace name '{0}'")]
    InvalidNamespace(String),
}

/// Timing knobs for the background tasks and cluster calls
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub poll_interval: Duration,
    pub broadcast_interval: Duration,
    pub request_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_TICK_SECS),
            broadcast_interval: Duration::from_secs(DEFAULT_TICK_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

// ============================================================================
// I/O wrapper - thin layer over pure parsing
// ============================================================================

/// Load a namespace list from a YAML or JSON file.
///
/// Accepts either full entries (`- name: apps\n  enabled: false`) or bare
/// names (`- apps`).
pub fn load_namespace_file(path: &Path) -> Result<Vec<NamespaceConfig>, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_namespace_document(&content)
}

fn parse_namespace_document(content: &str) -> Result<Vec<NamespaceConfig>, ConfigError> {
    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum Entry {
        Name(String),
        Config(NamespaceConfig),
    }

    // YAML is a superset of JSON, one parser covers both
    let entries: Vec<Entry> = serde_yaml::from_str(content)?;
    let configs: Vec<NamespaceConfig> = entries
        .into_iter()
        .map(|entry| match entry {
            Entry::Name(name) => NamespaceConfig::new(name),
            Entry::Config(config) => config,
        })
        .collect();

    validate_namespace_configs(&configs)?;
    Ok(configs)
}
