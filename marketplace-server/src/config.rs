//! Server configuration

use std::fmt;

use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use marketplace_core::UserId;

use crate::feed::DEFAULT_CAPACITY;

/// Protected account used when none is configured
pub const DEFAULT_PROTECTED_ACCOUNT: UserId = UserId(Uuid::from_u128(1));

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Port to listen on
    pub port: u16,

    /// SQLite database path; in-memory storage when absent
    pub database: Option<String>,

    /// Account exempt from role changes and deletion
    pub protected_account: UserId,

    /// Credentials used to create the protected account on first start
    pub admin: Option<AdminBootstrap>,

    /// Change feed buffer per subscriber
    pub feed_capacity: usize,
}

#[derive(Clone, Deserialize)]
pub struct AdminBootstrap {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for AdminBootstrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminBootstrap")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            database: None,
            protected_account: DEFAULT_PROTECTED_ACCOUNT,
            admin: None,
            feed_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl Config {
    /// Create config from environment variables
    ///
    /// Optional:
    /// - MARKETPLACE_PORT (default: 3000)
    /// - MARKETPLACE_DATABASE
    /// - MARKETPLACE_PROTECTED_ACCOUNT (UUID)
    /// - MARKETPLACE_ADMIN_EMAIL and MARKETPLACE_ADMIN_PASSWORD
    /// - MARKETPLACE_FEED_CAPACITY (default: 256)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|s| !s.is_empty());
        let mut config = Config::default();

        if let Some(port) = get("MARKETPLACE_PORT") {
            config.port = port.parse().map_err(|_| ConfigError::Invalid {
                key: "MARKETPLACE_PORT",
                value: port,
            })?;
        }

        config.database = get("MARKETPLACE_DATABASE");

        if let Some(id) = get("MARKETPLACE_PROTECTED_ACCOUNT") {
            let uuid = Uuid::parse_str(&id).map_err(|_| ConfigError::Invalid {
                key: "MARKETPLACE_PROTECTED_ACCOUNT",
                value: id,
            })?;
            config.protected_account = UserId(uuid);
        }

        if let (Some(email), Some(password)) =
            (get("MARKETPLACE_ADMIN_EMAIL"), get("MARKETPLACE_ADMIN_PASSWORD"))
        {
            config.admin = Some(AdminBootstrap { email, password });
        }

        if let Some(capacity) = get("MARKETPLACE_FEED_CAPACITY") {
            config.feed_capacity = capacity
                .parse()
                .ok()
                .filter(|c| *c > 0)
                .ok_or(ConfigError::Invalid {
                    key: "MARKETPLACE_FEED_CAPACITY",
                    value: capacity,
                })?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 3000);
        assert!(config.database.is_none());
        assert_eq!(config.protected_account, DEFAULT_PROTECTED_ACCOUNT);
        assert!(config.admin.is_none());
    }

    #[test]
    fn test_overrides() {
        let id = Uuid::new_v4();
        let config = Config::from_lookup(lookup(&[
            ("MARKETPLACE_PORT", "8080"),
            ("MARKETPLACE_DATABASE", "/tmp/market.db"),
            ("MARKETPLACE_PROTECTED_ACCOUNT", &id.to_string()),
            ("MARKETPLACE_ADMIN_EMAIL", "root@example.com"),
            ("MARKETPLACE_ADMIN_PASSWORD", "supersecret"),
            ("MARKETPLACE_FEED_CAPACITY", "16"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.database.as_deref(), Some("/tmp/market.db"));
        assert_eq!(config.protected_account, UserId(id));
        assert_eq!(config.admin.as_ref().map(|a| a.email.as_str()), Some("root@example.com"));
        assert_eq!(config.feed_capacity, 16);
        assert!(!format!("{:?}", config).contains("supersecret"));
    }

    #[test]
    fn test_admin_needs_both_values() {
        let config =
            Config::from_lookup(lookup(&[("MARKETPLACE_ADMIN_EMAIL", "root@example.com")])).unwrap();
        assert!(config.admin.is_none());
    }

    #[test]
    fn test_invalid_values() {
        assert!(Config::from_lookup(lookup(&[("MARKETPLACE_PORT", "http")])).is_err());
        assert!(Config::from_lookup(lookup(&[("MARKETPLACE_PROTECTED_ACCOUNT", "root")])).is_err());
        assert!(Config::from_lookup(lookup(&[("MARKETPLACE_FEED_CAPACITY", "0")])).is_err());
    }
}
