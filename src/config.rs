//! Configuration management

use anyhow::{bail, Result};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::browser::BrowserConfig;

/// Streamable HTTP transport settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: 127.0.0.1)
    pub bind_addr: IpAddr,
    pub port: u16,
    /// JSON-RPC endpoint path
    pub path: String,
    pub log_requests: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 9010,
            path: "/mcp".to_string(),
            log_requests: true,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("MCP_HOST") {
            config.bind_addr = match addr.parse() {
                Ok(parsed) => parsed,
                Err(_) => bail!("MCP_HOST is not an IP address: {}", addr),
            };
        }

        if let Ok(port) = std::env::var("MCP_PORT") {
            config.port = match port.parse() {
                Ok(parsed) => parsed,
                Err(_) => bail!("MCP_PORT is not a valid port: {}", port),
            };
        }

        if let Ok(path) = std::env::var("MCP_PATH") {
            let trimmed = path.trim().trim_end_matches('/');
            config.path = if trimmed.starts_with('/') {
                trimmed.to_string()
            } else {
                format!("/{}", trimmed)
            };
        }

        if let Ok(val) = std::env::var("MCP_LOG_REQUESTS") {
            config.log_requests = val == "true" || val == "1";
        }

        if !config.is_localhost() {
            tracing::warn!(
                "MCP server binding to {} - tools will be reachable from the network",
                config.bind_addr
            );
        }

        Ok(config)
    }

    pub fn is_localhost(&self) -> bool {
        self.bind_addr.is_loopback()
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }

    /// Base URL clients connect to
    pub fn endpoint_url(&self) -> String {
        format!("http://{}{}", self.socket_addr(), self.path)
    }
}

/// Per-invocation defaults for the render pipeline
#[derive(Debug, Clone)]
pub struct ScrapeDefaults {
    /// Readiness wait (body element present)
    pub wait_timeout: Duration,
    /// Pause after each scroll for lazy content to arrive
    pub scroll_pause: Duration,
    /// Ceiling on scroll cycles
    pub max_scroll_cycles: usize,
}

impl Default for ScrapeDefaults {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_secs(10),
            scroll_pause: Duration::from_secs(3),
            max_scroll_cycles: 40,
        }
    }
}

impl ScrapeDefaults {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            wait_timeout: env_secs("SCRAPE_WAIT_TIMEOUT").unwrap_or(defaults.wait_timeout),
            scroll_pause: env_secs("SCRAPE_SCROLL_PAUSE").unwrap_or(defaults.scroll_pause),
            max_scroll_cycles: std::env::var("SCRAPE_MAX_SCROLL_CYCLES")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_scroll_cycles),
        }
    }
}

/// Parse a non-negative, finite seconds value
pub fn parse_secs(raw: &str) -> Option<Duration> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}

fn env_secs(key: &str) -> Option<Duration> {
    std::env::var(key).ok().and_then(|v| parse_secs(&v))
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub browser: BrowserConfig,
    pub scrape: ScrapeDefaults,
    /// TOML tool catalog replacing the built-in one
    pub tools_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            server: ServerConfig::from_env()?,
            browser: BrowserConfig::from_env(),
            scrape: ScrapeDefaults::from_env(),
            tools_file: std::env::var("SCRAPE_TOOLS_FILE").ok().map(PathBuf::from),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            browser: BrowserConfig::default(),
            scrape: ScrapeDefaults::default(),
            tools_file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoint() {
        let config = ServerConfig::default();
        assert!(config.is_localhost());
        assert_eq!(config.endpoint_url(), "http://127.0.0.1:9010/mcp");
    }

    #[test]
    fn test_parse_secs() {
        assert_eq!(parse_secs("3"), Some(Duration::from_secs(3)));
        assert_eq!(parse_secs(" 0.5 "), Some(Duration::from_millis(500)));
        assert_eq!(parse_secs("-1"), None);
        assert_eq!(parse_secs("NaN"), None);
        assert_eq!(parse_secs("soon"), None);
    }

    #[test]
    fn test_scrape_defaults() {
        let defaults = ScrapeDefaults::default();
        assert_eq!(defaults.wait_timeout, Duration::from_secs(10));
        assert_eq!(defaults.scroll_pause, Duration::from_secs(3));
        assert!(defaults.max_scroll_cycles > 1);
    }
}
