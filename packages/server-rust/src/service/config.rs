use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::network::NetworkConfig;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

/// Server configuration, read from command-line flags with `RULER_*`
/// environment fallbacks.
#[derive(Debug, Clone, Parser)]
#[command(name = "ruler-server", version, about = "Forked ruler API server")]
pub struct ServerConfig {
    /// Bind address.
    #[arg(long, env = "RULER_HOST", default_value = "0.0.0.0")]
    pub host: String,
    /// Port to listen on. 0 means OS-assigned.
    #[arg(long, env = "RULER_PORT", default_value_t = 3100)]
    pub port: u16,
    /// Maximum time to process a request, in seconds.
    #[arg(long, env = "RULER_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,
    /// Timeout for calls to upstream rulers, in seconds.
    #[arg(long, env = "RULER_PROXY_TIMEOUT_SECS", default_value_t = 30)]
    pub proxy_timeout_secs: u64,
    /// Allowed CORS origins, comma separated. `*` allows any.
    #[arg(long, env = "RULER_CORS_ORIGINS", value_delimiter = ',', default_value = "*")]
    pub cors_origins: Vec<String>,
    /// HS256 secret used to verify bearer tokens.
    #[arg(long, env = "RULER_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,
    /// JSON file listing known datasources.
    #[arg(long, env = "RULER_DATASOURCES_FILE")]
    pub datasources_file: Option<PathBuf>,
    /// JSON rule-state snapshot served by the native backend, keyed by org id.
    #[arg(long, env = "RULER_RULES_FILE")]
    pub rules_file: Option<PathBuf>,
    /// Address for the Prometheus metrics exporter. Disabled when unset.
    #[arg(long, env = "RULER_METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,
    /// Log output format.
    #[arg(long, env = "RULER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,
}

impl ServerConfig {
    #[must_use]
    pub fn network(&self) -> NetworkConfig {
        NetworkConfig {
            host: self.host.clone(),
            port: self.port,
            cors_origins: self.cors_origins.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    #[must_use]
    pub fn proxy_timeout(&self) -> Duration {
        Duration::from_secs(self.proxy_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3100,
            request_timeout_secs: 30,
            proxy_timeout_secs: 30,
            cors_origins: vec!["*".to_string()],
            jwt_secret: String::new(),
            datasources_file: None,
            rules_file: None,
            metrics_addr: None,
            log_format: LogFormat::Plain,
        }
    }
}
