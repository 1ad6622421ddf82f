//! Relay configuration.

use std::{net::SocketAddr, time::Duration};

use url::Url;

use crate::error::{RelayError, Result};

/// Default listen address.
pub const DEFAULT_LISTEN: &str = "127.0.0.1:3456";

/// Default upstream origin.
pub const DEFAULT_UPSTREAM: &str = "https://sproochmaschinn.lu";

/// Default upstream request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default cap on relayed request bodies (audio uploads).
pub const DEFAULT_MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address to listen on.
    pub listen: SocketAddr,
    /// Origin requests are forwarded to, without a trailing slash.
    pub upstream: String,
    /// Allowed browser origins. Empty means `*`.
    pub allowed_origins: Vec<String>,
    /// Upstream request timeout.
    pub timeout: Duration,
    /// Largest request body accepted for forwarding.
    pub max_body_bytes: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 3456)),
            upstream: DEFAULT_UPSTREAM.to_string(),
            allowed_origins: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl RelayConfig {
    /// Checks the configuration and normalizes the upstream origin.
    pub fn validate(mut self) -> Result<Self> {
        let url = Url::parse(&self.upstream)
            .map_err(|e| RelayError::Config(format!("upstream '{}': {}", self.upstream, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(RelayError::Config(format!(
                "upstream must be http or https, got '{}'",
                url.scheme()
            )));
        }
        if url.host_str().is_none() {
            return Err(RelayError::Config(format!(
                "upstream '{}' has no host",
                self.upstream
            )));
        }
        self.upstream = self.upstream.trim_end_matches('/').to_string();

        if self.timeout.is_zero() {
            return Err(RelayError::Config("timeout must be non-zero".to_string()));
        }
        if self.allowed_origins.iter().any(|o| o.trim().is_empty()) {
            return Err(RelayError::Config(
                "allowed origins must not be empty strings".to_string(),
            ));
        }
        Ok(self)
    }
}

/// Parses a listen address; `:3456` binds all interfaces.
pub fn parse_listen(addr: &str) -> Result<SocketAddr> {
    let addr = if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    };
    addr.parse()
        .map_err(|e| RelayError::Config(format!("listen address '{}': {}", addr, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = RelayConfig::default();
        assert_eq!(cfg.listen.to_string(), DEFAULT_LISTEN);
        assert!(cfg.allowed_origins.is_empty());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_normalizes_upstream() {
        let cfg = RelayConfig {
            upstream: "http://127.0.0.1:8080/".to_string(),
            ..Default::default()
        }
        .validate()
        .unwrap();
        assert_eq!(cfg.upstream, "http://127.0.0.1:8080");
    }

    #[test]
    fn test_validate_rejects_bad_upstream() {
        for upstream in ["", "not a url", "ftp://example.com"] {
            let cfg = RelayConfig {
                upstream: upstream.to_string(),
                ..Default::default()
            };
            assert!(cfg.validate().is_err(), "accepted {upstream:?}");
        }
    }

    #[test]
    fn test_parse_listen() {
        assert_eq!(parse_listen(":3456").unwrap().to_string(), "0.0.0.0:3456");
        assert_eq!(
            parse_listen("127.0.0.1:8080").unwrap().to_string(),
            "127.0.0.1:8080"
        );
        assert!(parse_listen("localhost").is_err());
    }
}
