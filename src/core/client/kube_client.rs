use std::time::Duration;

use anyhow::{Context, Result};
use kube::{Client, Config};
use tracing::debug;

/// Connection settings for an API server reached by URL, optionally with a bearer token.
pub fn config_for_url(url: &str, token: Option<&str>, timeout: Duration) -> Result<Config> {
    let uri: http::Uri = url
        .parse()
        .with_context(|| format!("invalid API server URL '{}'", url))?;

    let mut config = Config::new(uri);
    if let Some(token) = token {
        config.auth_info.token = Some(token.to_string().into());
    }
    Ok(with_timeouts(config, timeout))
}

/// Applies the per-request bound used for every cluster query.
pub fn with_timeouts(mut config: Config, timeout: Duration) -> Config {
    config.connect_timeout = Some(timeout);
    config.read_timeout = Some(timeout);
    config
}

/// Creates a Kubernetes client from prepared connection settings
pub fn build_kube_client(config: Config) -> Result<Client> {
    let url = config.cluster_url.to_string();
    let client = Client::try_from(config)
        .with_context(|| format!("failed to build client for {}", url))?;

    debug!("Kubernetes client initialized for {}", url);
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_config_carries_timeouts_and_token() {
        let config =
            config_for_url("https://kube.example.org", Some("secret"), Duration::from_secs(3))
                .unwrap();

        assert_eq!(config.cluster_url.host(), Some("kube.example.org"));
        assert_eq!(config.read_timeout, Some(Duration::from_secs(3)));
        assert_eq!(config.connect_timeout, Some(Duration::from_secs(3)));
        assert!(config.auth_info.token.is_some());
    }

    #[test]
    fn rejects_garbage_url() {
        assert!(config_for_url("not a url", None, Duration::from_secs(1)).is_err());
    }
}
