use clap::{ArgAction, Parser};
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::cluster::ClusterSource;
use crate::config::{
    load_namespace_file, parse_namespace_list, ConfigError, MonitorConfig, NamespaceConfig,
    DEFAULT_NAMESPACES,
};

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to load env file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },

    #[error(transparent)]
    Args(#[from] clap::Error),
}

#[derive(Parser, Debug)]
#[command(name = "podpulse")]
#[command(about = "Mirror pod state across cluster namespaces and stream it to live clients")]
#[command(version)]
pub struct Args {
    /// Path to a kubeconfig file (takes priority over in-cluster credentials)
    #[arg(long, env = "KUBECONFIG", value_name = "FILE")]
    pub kubeconfig: Option<PathBuf>,

    /// Comma-separated namespaces to monitor
    #[arg(long, env = "MONITOR_NAMESPACES", default_value = DEFAULT_NAMESPACES)]
    pub namespaces: String,

    /// YAML or JSON namespace list; overrides --namespaces
    #[arg(long, value_name = "FILE")]
    pub namespaces_file: Option<PathBuf>,

    /// Address the HTTP server binds to
    #[arg(long, value_name = "ADDR", default_value = "0.0.0.0")]
    pub bind_addr: String,

    /// Port the HTTP server listens on
    #[arg(short, long, env = "PORT", value_name = "PORT", default_value = "3000")]
    pub port: u16,

    /// Seconds between pod refreshes
    #[arg(long, default_value = "5")]
    pub poll_interval: u64,

    /// Seconds between snapshot pushes to subscribers
    #[arg(long, default_value = "5")]
    pub broadcast_interval: u64,

    /// Upper bound for a single cluster call, in seconds
    #[arg(long, default_value = "10")]
    pub request_timeout: u64,

    /// Path to a .env file to load before connecting
    #[arg(long, value_name = "FILE")]
    pub env_file: Option<PathBuf>,

    /// Enable verbose logging output (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Dry-run mode: resolve configuration and print it without connecting
    #[arg(long)]
    pub dry_run: bool,
}

impl Args {
    /// Load `--env-file` into the environment and parse `argv` again so its
    /// values back the env-driven options. Flags on the command line still win.
    pub fn apply_env_file<I, T>(self, argv: I) -> Result<Args, CliError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let Some(path) = self.env_file else {
            return Ok(self);
        };
        dotenvy::from_path(&path).map_err(|source| CliError::EnvFile { path, source })?;
        Ok(Args::try_parse_from(argv)?)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            poll_interval: Duration::from_secs(self.poll_interval.max(1)),
            broadcast_interval: Duration::from_secs(self.broadcast_interval.max(1)),
            request_timeout: Duration::from_secs(self.request_timeout.max(1)),
        }
    }

    /// `service_host` is the value of `KUBERNETES_SERVICE_HOST`, if any
    pub fn cluster_source(&self, service_host: Option<&str>) -> ClusterSource {
        ClusterSource::detect(self.kubeconfig.as_deref(), service_host)
    }

    /// Initial namespace list: the file when given, otherwise `--namespaces`
    pub fn resolve_namespaces(&self) -> Result<Vec<NamespaceConfig>, ConfigError> {
        match &self.namespaces_file {
            Some(path) => load_namespace_file(path),
            None => parse_namespace_list(&self.namespaces),
        }
    }
}

// ============================================================================
// SBIO: Pure display logic (no I/O - returns formatted strings)
// ============================================================================

/// Format the resolved configuration for `--dry-run`.
/// Pure function - returns a formatted string.
pub fn format_dry_run(args: &Args, source: &ClusterSource, namespaces: &[NamespaceConfig]) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "podpulse v{} - Dry Run Mode\n\n",
        env!("CARGO_PKG_VERSION")
    ));
    output.push_str(&format!("Cluster source: {}\n", source));
    output.push_str(&format!("Listen address: {}\n\n", args.listen_addr()));

    output.push_str(&format!("Namespaces ({}):\n", namespaces.len()));
    for ns in namespaces {
        let state = if ns.enabled { "enabled" } else { "disabled" };
        output.push_str(&format!("  - {} [{}]\n", ns.name, state));
    }
    output.push('\n');

    let config = args.monitor_config();
    output.push_str("Timing:\n");
    output.push_str(&format!("  Poll interval:      {}s\n", config.poll_interval.as_secs()));
    output.push_str(&format!(
        "  Broadcast interval: {}s\n",
        config.broadcast_interval.as_secs()
    ));
    output.push_str(&format!(
        "  Request timeout:    {}s\n",
        config.request_timeout.as_secs()
    ));

    output.push_str("\nReady to start monitoring. Remove --dry-run to execute.\n");

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["podpulse", "--namespaces", "apps,batch"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_timing_defaults() {
        let args = parse(&[]);
        let config = args.monitor_config();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.broadcast_interval, Duration::from_secs(5));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(args.bind_addr, "0.0.0.0");
        assert!(!args.dry_run);
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let args = parse(&["--poll-interval", "0"]);
        assert_eq!(args.monitor_config().poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_listen_addr() {
        let args = parse(&["--bind-addr", "127.0.0.1", "--port", "9000"]);
        assert_eq!(args.listen_addr(), "127.0.0.1:9000");
    }

    #[test]
    fn test_namespaces_from_list() {
        let args = parse(&[]);
        let names: Vec<String> = args
            .resolve_namespaces()
            .unwrap()
            .into_iter()
            .map(|ns| ns.name)
            .collect();
        assert_eq!(names, vec!["apps", "batch"]);
    }

    #[test]
    fn test_namespaces_file_overrides_list() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "- name: web\n  enabled: false").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let args = parse(&["--namespaces-file", &path]);
        let namespaces = args.resolve_namespaces().unwrap();
        assert_eq!(namespaces.len(), 1);
        assert_eq!(namespaces[0].name, "web");
        assert!(!namespaces[0].enabled);
    }

    #[test]
    fn test_env_file_feeds_namespaces() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "MONITOR_NAMESPACES=envfile-ns").unwrap();
        let path = file.path().to_string_lossy().to_string();
        let argv = ["podpulse", "--env-file", path.as_str()];

        let args = Args::try_parse_from(argv)
            .unwrap()
            .apply_env_file(argv)
            .unwrap();

        let names: Vec<String> = args
            .resolve_namespaces()
            .unwrap()
            .into_iter()
            .map(|ns| ns.name)
            .collect();
        assert_eq!(names, vec!["envfile-ns"]);
    }

    #[test]
    fn test_missing_env_file_is_an_error() {
        let argv = ["podpulse", "--namespaces", "apps", "--env-file", "/nonexistent/.env"];
        let result = Args::try_parse_from(argv).unwrap().apply_env_file(argv);
        assert!(matches!(result, Err(CliError::EnvFile { .. })));
    }

    #[test]
    fn test_explicit_kubeconfig_wins() {
        let args = parse(&["--kubeconfig", "/etc/kube/config"]);
        assert_eq!(
            args.cluster_source(Some("10.0.0.1")),
            ClusterSource::ConfigFile(PathBuf::from("/etc/kube/config"))
        );
    }

    #[test]
    fn test_format_dry_run() {
        let args = parse(&["--bind-addr", "127.0.0.1", "--port", "4000"]);
        let namespaces = vec![NamespaceConfig::new("apps"), NamespaceConfig::disabled("batch")];

        let output = format_dry_run(&args, &ClusterSource::InCluster, &namespaces);

        assert!(output.contains("Dry Run Mode"));
        assert!(output.contains("Listen address: 127.0.0.1:4000"));
        assert!(output.contains("Namespaces (2):"));
        assert!(output.contains("  - apps [enabled]"));
        assert!(output.contains("  - batch [disabled]"));
        assert!(output.contains("Poll interval:      5s"));
    }
}
