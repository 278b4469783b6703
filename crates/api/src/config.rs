//! Process configuration, read from the environment.
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `VIGIL_BIND_ADDR` | `0.0.0.0:8080` | HTTP listen address |
//! | `VIGIL_LOG_FORMAT` | `json` | `json` or `pretty` |
//! | `VIGIL_STORE` | `memory` | `memory` or `postgres` |
//! | `DATABASE_URL` | none | required when `VIGIL_STORE=postgres` |
//! | `VIGIL_SWEEP_INTERVAL_SECS` | `300` | background relevance sweep period; `0` disables it |

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, anyhow, bail};

use vigil_observability::LogFormat;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Postgres { database_url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub log_format: LogFormat,
    pub store: StoreBackend,
    /// `None` disables the background sweeper.
    pub sweep_interval: Option<Duration>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            log_format: LogFormat::Json,
            store: StoreBackend::Memory,
            sweep_interval: Some(Duration::from_secs(300)),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("VIGIL_BIND_ADDR") {
            config.bind_addr = addr
                .trim()
                .parse()
                .map_err(|_| anyhow!("Invalid VIGIL_BIND_ADDR value: {addr}"))?;
        }

        if let Some(format) = lookup("VIGIL_LOG_FORMAT") {
            config.log_format = format.parse().context("Invalid VIGIL_LOG_FORMAT")?;
        }

        let backend = lookup("VIGIL_STORE").unwrap_or_else(|| "memory".to_string());
        config.store = match backend.trim().to_ascii_lowercase().as_str() {
            "memory" => StoreBackend::Memory,
            "postgres" => {
                let database_url = lookup("DATABASE_URL")
                    .filter(|url| !url.trim().is_empty())
                    .ok_or_else(|| anyhow!("DATABASE_URL must be set when VIGIL_STORE=postgres"))?;
                StoreBackend::Postgres { database_url }
            }
            other => bail!("Invalid VIGIL_STORE value: {other} (expected 'memory' or 'postgres')"),
        };

        if let Some(secs) = lookup("VIGIL_SWEEP_INTERVAL_SECS") {
            let secs: u64 = secs
                .trim()
                .parse()
                .map_err(|_| anyhow!("Invalid VIGIL_SWEEP_INTERVAL_SECS value: {secs}"))?;
            config.sweep_interval = (secs > 0).then(|| Duration::from_secs(secs));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_env() {
        assert_eq!(load(&[]).unwrap(), AppConfig::default());
    }

    #[test]
    fn postgres_requires_database_url() {
        let err = load(&[("VIGIL_STORE", "postgres")]).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));

        let cfg = load(&[
            ("VIGIL_STORE", "postgres"),
            ("DATABASE_URL", "postgres://vigil@localhost/vigil"),
        ])
        .unwrap();
        assert_eq!(
            cfg.store,
            StoreBackend::Postgres {
                database_url: "postgres://vigil@localhost/vigil".into()
            }
        );
    }

    #[test]
    fn zero_interval_disables_sweeper() {
        let cfg = load(&[("VIGIL_SWEEP_INTERVAL_SECS", "0")]).unwrap();
        assert_eq!(cfg.sweep_interval, None);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(load(&[("VIGIL_BIND_ADDR", "not-an-addr")]).is_err());
        assert!(load(&[("VIGIL_LOG_FORMAT", "xml")]).is_err());
        assert!(load(&[("VIGIL_STORE", "sqlite")]).is_err());
        assert!(load(&[("VIGIL_SWEEP_INTERVAL_SECS", "-5")]).is_err());
    }

    #[test]
    fn pretty_logs_and_custom_addr() {
        let cfg = load(&[
            ("VIGIL_BIND_ADDR", "127.0.0.1:9000"),
            ("VIGIL_LOG_FORMAT", "pretty"),
        ])
        .unwrap();
        assert_eq!(cfg.bind_addr, SocketAddr::from(([127, 0, 0, 1], 9000)));
        assert_eq!(cfg.log_format, LogFormat::Pretty);
    }
}
