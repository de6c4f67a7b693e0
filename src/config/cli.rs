//! Command-line flags.
//!
//! Flags take precedence over values read from `--config`.

use std::path::PathBuf;

use clap::Parser;

use crate::config::loader::{read_config, ConfigError};
use crate::config::schema::{LbConfig, Policy};
use crate::config::validation::validate_config;

#[derive(Debug, Parser)]
#[command(name = "simple-lb")]
#[command(about = "Layer-7 HTTP load balancer", long_about = None)]
pub struct Cli {
    /// Load balanced backends, use commas to separate
    #[arg(short, long, value_delimiter = ',')]
    pub backends: Vec<String>,

    /// Port to serve
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Peer selection policy (round-robin, least-connections)
    #[arg(long)]
    pub policy: Option<Policy>,

    /// Optional TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level fallback when RUST_LOG is unset
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Cli {
    /// Build the effective configuration and validate it.
    pub fn into_config(self) -> Result<LbConfig, ConfigError> {
        let base = match &self.config {
            Some(path) => read_config(path)?,
            None => LbConfig::default(),
        };
        let config = self.apply(base);
        validate_config(&config)?;
        Ok(config)
    }

    fn apply(self, mut config: LbConfig) -> LbConfig {
        let backends: Vec<String> = self
            .backends
            .into_iter()
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty())
            .collect();
        if !backends.is_empty() {
            config.backends = backends;
        }

        if let Some(port) = self.port {
            config.listener.bind_address = match config.listener.bind_address.rsplit_once(':') {
                Some((host, _)) => format!("{}:{}", host, port),
                None => format!("0.0.0.0:{}", port),
            };
        }

        if let Some(policy) = self.policy {
            config.policy = policy;
        }

        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }

        config
    }
}
