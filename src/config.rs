//! Service configuration, read from the environment (and a `.env` file if present).

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Path to the service-account key JSON
    pub credentials_path: PathBuf,
    /// Overrides the key's `project_id`
    pub project_id: Option<String>,
    /// Address to bind the HTTP server to
    pub bind_addr: SocketAddr,
    /// Log filter used when `RUST_LOG` is unset
    pub log_level: String,
    /// Reject ID tokens issued before the user's last sign-out
    pub check_revoked: bool,
    /// Delay before a failed live subscription reconnects
    pub listen_retry: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let credentials_path = lookup("GOOGLE_APPLICATION_CREDENTIALS")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .ok_or(ConfigError::Missing("GOOGLE_APPLICATION_CREDENTIALS"))?;

        let project_id = lookup("FIREBASE_PROJECT_ID").filter(|v| !v.is_empty());

        let bind_addr = parse(&lookup, "ADMIN_BIND_ADDR", "127.0.0.1:8080")?;
        let log_level = lookup("ADMIN_LOG_LEVEL").unwrap_or_else(|| "info".to_string());
        let check_revoked = parse(&lookup, "ADMIN_CHECK_REVOKED", "true")?;
        let listen_retry = Duration::from_secs(parse(&lookup, "ADMIN_LISTEN_RETRY_SECS", "5")?);

        Ok(Self {
            credentials_path,
            project_id,
            bind_addr,
            log_level,
            check_revoked,
            listen_retry,
        })
    }
}

fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: &str,
) -> Result<T, ConfigError> {
    let value = lookup(name).unwrap_or_else(|| default.to_string());
    value
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[("GOOGLE_APPLICATION_CREDENTIALS", "/etc/key.json")]).unwrap();

        assert_eq!(config.credentials_path, PathBuf::from("/etc/key.json"));
        assert_eq!(config.project_id, None);
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
        assert!(config.check_revoked);
        assert_eq!(config.listen_retry, Duration::from_secs(5));
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("GOOGLE_APPLICATION_CREDENTIALS", "key.json"),
            ("FIREBASE_PROJECT_ID", "inventar"),
            ("ADMIN_BIND_ADDR", "0.0.0.0:9000"),
            ("ADMIN_CHECK_REVOKED", "false"),
            ("ADMIN_LISTEN_RETRY_SECS", "30"),
        ])
        .unwrap();

        assert_eq!(config.project_id.as_deref(), Some("inventar"));
        assert_eq!(config.bind_addr.port(), 9000);
        assert!(!config.check_revoked);
        assert_eq!(config.listen_retry, Duration::from_secs(30));
    }

    #[test]
    fn test_missing_credentials() {
        assert_eq!(
            config(&[]),
            Err(ConfigError::Missing("GOOGLE_APPLICATION_CREDENTIALS"))
        );
    }

    #[test]
    fn test_invalid_values() {
        let err = config(&[
            ("GOOGLE_APPLICATION_CREDENTIALS", "key.json"),
            ("ADMIN_BIND_ADDR", "nowhere"),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                name: "ADMIN_BIND_ADDR",
                value: "nowhere".into()
            }
        );
    }
}
