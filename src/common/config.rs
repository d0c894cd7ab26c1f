//! Configuration for the coordination client

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Conventional root path for nodes managed by the surrounding system.
///
/// Advisory only: per-operation paths are not forced under it.
pub const DEFAULT_ROOT: &str = "/registry";

/// Client configuration
///
/// The ensemble address and both timeouts are required; there are no
/// built-in fallbacks for them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Ensemble host
    pub host: String,

    /// Ensemble client port
    pub port: u16,

    /// Session timeout in milliseconds
    pub session_timeout_ms: u64,

    /// Connection timeout in milliseconds (bounds the startup barrier)
    pub connection_timeout_ms: u64,

    /// Root namespace convention
    #[serde(default = "default_root")]
    pub root: String,
}

fn default_root() -> String {
    DEFAULT_ROOT.to_string()
}

impl Config {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        session_timeout_ms: u64,
        connection_timeout_ms: u64,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            session_timeout_ms,
            connection_timeout_ms,
            root: default_root(),
        }
    }

    /// Load config from `coordkv.toml` (if present) overlaid with
    /// `COORDKV_*` environment variables.
    pub fn load() -> crate::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("coordkv").required(false))
            .add_source(config::Environment::with_prefix("COORDKV"))
            .build()
            .map_err(|e| crate::Error::InvalidConfig(e.to_string()))?;

        let cfg: Config = settings
            .try_deserialize()
            .map_err(|e| crate::Error::InvalidConfig(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.host.is_empty() {
            return Err(crate::Error::InvalidConfig("host cannot be empty".into()));
        }
        if self.port == 0 {
            return Err(crate::Error::InvalidConfig("port cannot be 0".into()));
        }
        if self.session_timeout_ms == 0 {
            return Err(crate::Error::InvalidConfig(
                "session_timeout_ms cannot be 0".into(),
            ));
        }
        if self.connection_timeout_ms == 0 {
            return Err(crate::Error::InvalidConfig(
                "connection_timeout_ms cannot be 0".into(),
            ));
        }
        if !self.root.starts_with('/') {
            return Err(crate::Error::InvalidConfig(
                "root must be an absolute path".into(),
            ));
        }
        Ok(())
    }

    /// Ensemble endpoint in `host:port` form
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint() {
        let cfg = Config::new("10.0.0.7", 2379, 30_000, 15_000);
        assert_eq!(cfg.endpoint(), "10.0.0.7:2379");
        assert_eq!(cfg.session_timeout(), Duration::from_millis(30_000));
        assert_eq!(cfg.connection_timeout(), Duration::from_millis(15_000));
    }

    #[test]
    fn test_default_root() {
        let cfg = Config::new("localhost", 2379, 30_000, 15_000);
        assert_eq!(cfg.root, DEFAULT_ROOT);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut cfg = Config::new("", 2379, 30_000, 15_000);
        assert!(cfg.validate().is_err());

        cfg = Config::new("localhost", 0, 30_000, 15_000);
        assert!(cfg.validate().is_err());

        cfg = Config::new("localhost", 2379, 0, 15_000);
        assert!(cfg.validate().is_err());

        cfg = Config::new("localhost", 2379, 30_000, 0);
        assert!(cfg.validate().is_err());

        cfg = Config::new("localhost", 2379, 30_000, 15_000);
        cfg.root = "relative".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_serde_round_trip() {
        let cfg = Config::new("zk1.internal", 2181, 60_000, 10_000);
        let s = serde_json::to_string(&cfg).unwrap();
        let back: Config = serde_json::from_str(&s).unwrap();
        assert_eq!(back.host, "zk1.internal");
        assert_eq!(back.port, 2181);
        assert_eq!(back.root, DEFAULT_ROOT);
    }

    #[test]
    fn test_root_defaults_when_absent() {
        let back: Config = serde_json::from_str(
            r#"{"host":"localhost","port":2379,"session_timeout_ms":30000,"connection_timeout_ms":15000}"#,
        )
        .unwrap();
        assert_eq!(back.root, DEFAULT_ROOT);
    }
}
