use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Nominal per-namespace refresh hint in milliseconds (informational only)
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 5000;

/// Namespaces monitored when nothing else is configured
pub const DEFAULT_NAMESPACES: &str = "default,kube-system,openshift-console,openshift-monitoring";

static NAMESPACE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("namespace pattern is valid")
});

/// One monitored namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceConfig {
    pub name: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Accepted and echoed back, never used to vary the poll cadence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_interval: Option<u64>,
}

fn default_enabled() -> bool {
    true
}

impl NamespaceConfig {
    /// Enabled namespace with the nominal refresh hint
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            refresh_interval: Some(DEFAULT_REFRESH_INTERVAL_MS),
        }
    }

    pub fn disabled(name: impl Into<String>) -> Self {
        Self {
            enabled: false,
            ..Self::new(name)
        }
    }
}

/// Check a namespace name against the DNS-1123 label rules
pub fn validate_namespace_name(name: &str) -> Result<(), ConfigError> {
    if name.len() > 63 || !NAMESPACE_NAME.is_match(name) {
        return Err(ConfigError::InvalidNamespace(name.to_string()));
    }
    Ok(())
}

/// Parse a comma-separated namespace list. Blank entries are skipped.
pub fn parse_namespace_list(list: &str) -> Result<Vec<NamespaceConfig>, ConfigError> {
    list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            validate_namespace_name(name)?;
            Ok(NamespaceConfig::new(name))
        })
        .collect()
}

/// Validate every entry of a replacement list. Duplicates are allowed.
pub fn validate_namespace_configs(configs: &[NamespaceConfig]) -> Result<(), ConfigError> {
    configs
        .iter()
        .try_for_each(|ns| validate_namespace_name(&ns.name))
}
