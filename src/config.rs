//! Process configuration, read from environment variables (and `.env`).

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use validator::Validate;

pub const DEFAULT_SERVER_PORT: u16 = 8080;
pub const DEFAULT_QUERY_INTERVAL_SECS: f64 = 5.0;
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_SHUTDOWN_GRACE_PERIOD_SECS: u64 = 10;

#[derive(Clone, Validate)]
pub struct AppConfig {
    #[validate(range(min = 1))]
    pub server_port: u16,
    pub debug: bool,
    pub mock: bool,
    /// Shared Redis for running several replicas; in-process store when unset
    #[validate(url)]
    pub redis_url: Option<String>,
    /// API server URLs polled when no other discovery is configured
    pub clusters: Vec<String>,
    pub kubeconfig_path: Option<PathBuf>,
    /// Restricts kubeconfig discovery to these contexts (empty = all)
    pub kubeconfig_contexts: BTreeSet<String>,
    #[validate(url)]
    pub cluster_registry_url: Option<String>,
    /// Bearer token for the cluster registry and remote API servers
    pub cluster_token: Option<String>,
    #[validate(range(min = 0.1, max = 3600.0))]
    pub query_interval_secs: f64,
    #[validate(range(min = 1, max = 300))]
    pub query_timeout_secs: u64,
    #[validate(range(max = 600))]
    pub shutdown_grace_period_secs: u64,
    pub node_link_url_template: Option<String>,
    pub pod_link_url_template: Option<String>,
    pub log_dir: Option<PathBuf>,
}

/// Where the cluster list comes from, in order of precedence.
#[derive(Debug, Clone, PartialEq)]
pub enum DiscoverySource {
    Mock,
    Registry(String),
    Kubeconfig(PathBuf),
    Static(Vec<String>),
}

impl AppConfig {
    /// Loads `.env` (if present) and reads the process environment.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Self {
            server_port: parse_or(&get, "SERVER_PORT", DEFAULT_SERVER_PORT)?,
            debug: flag(&get, "DEBUG"),
            mock: flag(&get, "MOCK"),
            redis_url: get("REDIS_URL"),
            clusters: list(get("CLUSTERS")),
            kubeconfig_path: get("KUBECONFIG_PATH").map(PathBuf::from),
            kubeconfig_contexts: list(get("KUBECONFIG_CONTEXTS")).into_iter().collect(),
            cluster_registry_url: get("CLUSTER_REGISTRY_URL"),
            cluster_token: get("CLUSTER_TOKEN"),
            query_interval_secs: parse_or(&get, "QUERY_INTERVAL", DEFAULT_QUERY_INTERVAL_SECS)?,
            query_timeout_secs: parse_or(&get, "QUERY_TIMEOUT", DEFAULT_QUERY_TIMEOUT_SECS)?,
            shutdown_grace_period_secs: parse_or(
                &get,
                "SHUTDOWN_GRACE_PERIOD",
                DEFAULT_SHUTDOWN_GRACE_PERIOD_SECS,
            )?,
            node_link_url_template: get("NODE_LINK_URL_TEMPLATE"),
            pod_link_url_template: get("POD_LINK_URL_TEMPLATE"),
            log_dir: get("LOG_DIR").map(PathBuf::from),
        };

        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    pub fn query_interval(&self) -> Duration {
        Duration::from_secs_f64(self.query_interval_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    pub fn shutdown_grace_period(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_period_secs)
    }

    pub fn discovery_source(&self) -> DiscoverySource {
        if self.mock {
            DiscoverySource::Mock
        } else if let Some(url) = &self.cluster_registry_url {
            DiscoverySource::Registry(url.clone())
        } else if let Some(path) = &self.kubeconfig_path {
            DiscoverySource::Kubeconfig(path.clone())
        } else {
            DiscoverySource::Static(self.clusters.clone())
        }
    }
}

fn flag<G: Fn(&str) -> Option<String>>(get: &G, key: &str) -> bool {
    get(key)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

fn list(raw: Option<String>) -> Vec<String> {
    raw.map(|v| {
        v.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect()
    })
    .unwrap_or_default()
}

fn parse_or<G, T>(get: &G, key: &str, default: T) -> Result<T>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key}: cannot parse '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = load(&[]).unwrap();
        assert_eq!(config.server_port, 8080);
        assert!(!config.mock);
        assert!(config.redis_url.is_none());
        assert_eq!(config.query_interval(), Duration::from_secs(5));
        assert_eq!(config.shutdown_grace_period(), Duration::from_secs(10));
        assert_eq!(config.discovery_source(), DiscoverySource::Static(vec![]));
    }

    #[test]
    fn reads_lists_flags_and_numbers() {
        let config = load(&[
            ("SERVER_PORT", "9000"),
            ("DEBUG", "true"),
            ("CLUSTERS", "https://a.example.org, https://b.example.org,"),
            ("KUBECONFIG_CONTEXTS", "prod,staging"),
            ("QUERY_INTERVAL", "2.5"),
            ("REDIS_URL", "redis://redis:6379"),
        ])
        .unwrap();

        assert_eq!(config.server_port, 9000);
        assert!(config.debug);
        assert_eq!(config.clusters.len(), 2);
        assert!(config.kubeconfig_contexts.contains("staging"));
        assert_eq!(config.query_interval(), Duration::from_millis(2500));
        assert_eq!(config.redis_url.as_deref(), Some("redis://redis:6379"));
    }

    #[test]
    fn discovery_precedence() {
        let config = load(&[
            ("MOCK", "1"),
            ("CLUSTER_REGISTRY_URL", "https://registry.example.org"),
        ])
        .unwrap();
        assert_eq!(config.discovery_source(), DiscoverySource::Mock);

        let config = load(&[
            ("CLUSTER_REGISTRY_URL", "https://registry.example.org"),
            ("KUBECONFIG_PATH", "/tmp/kubeconfig"),
        ])
        .unwrap();
        assert_eq!(
            config.discovery_source(),
            DiscoverySource::Registry("https://registry.example.org".into())
        );

        let config = load(&[("KUBECONFIG_PATH", "/tmp/kubeconfig")]).unwrap();
        assert_eq!(
            config.discovery_source(),
            DiscoverySource::Kubeconfig(PathBuf::from("/tmp/kubeconfig"))
        );
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(load(&[("SERVER_PORT", "eighty")]).is_err());
        assert!(load(&[("QUERY_INTERVAL", "0")]).is_err());
        assert!(load(&[("QUERY_TIMEOUT", "0")]).is_err());
        assert!(load(&[("CLUSTER_REGISTRY_URL", "not a url")]).is_err());
    }
}
