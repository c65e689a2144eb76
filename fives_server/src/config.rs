//! Server configuration from environment and CLI.

use std::net::SocketAddr;

use anyhow::{Context, Error};

pub const DEFAULT_BIND: &str = "127.0.0.1:7400";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind: SocketAddr,
}

impl ServerConfig {
    /// Resolve the bind address: CLI `--bind` wins, then `SERVER_BIND`,
    /// then the default.
    pub fn resolve(cli_bind: Option<String>) -> Result<Self, Error> {
        let raw = cli_bind
            .or_else(|| std::env::var("SERVER_BIND").ok())
            .unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = raw
            .parse()
            .with_context(|| format!("invalid bind address {raw:?}"))?;
        Ok(Self { bind })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_bind_wins() {
        let config = ServerConfig::resolve(Some("0.0.0.0:9000".to_string())).unwrap();
        assert_eq!(config.bind.port(), 9000);
    }

    #[test]
    fn bad_bind_is_an_error() {
        assert!(ServerConfig::resolve(Some("not-an-addr".to_string())).is_err());
    }
}
