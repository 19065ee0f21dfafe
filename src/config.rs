//! Configuration loaded from environment variables (and an optional `.env`).
//!
//! - `GROCERY_DB_PATH` - SQLite file for the list snapshot, archive and events (default: `grocery.db`)
//! - `GROCERY_CATALOG_CSV` - catalog CSV to use instead of the built-in products
//! - `GROCERY_ADD_POLICY` - `append` (default) or `merge`
//! - `GROCERY_SESSION_TOKEN` - ID token used to scope purchase-archive queries
//! - `LISTEN` - server bind address (default: `0.0.0.0:3000`)
//! - `RUST_LOG` - log filter (default: `info`)

use crate::catalog::StaticCatalog;
use crate::store::AddPolicy;
use anyhow::{anyhow, Result};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub catalog_csv: Option<PathBuf>,
    pub add_policy: AddPolicy,
    pub session_token: Option<String>,
    pub listen_addr: String,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_path: PathBuf::from("grocery.db"),
            catalog_csv: None,
            add_policy: AddPolicy::Append,
            session_token: None,
            listen_addr: "0.0.0.0:3000".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load `.env` (if present) and read the environment
    pub fn from_env() -> Result<Self> {
        load_dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read the environment, skipping keys the command line already set
    ///
    /// Call `load_dotenv` first.
    pub fn from_env_except(settled: &[&str]) -> Result<Self> {
        Self::from_lookup_except(|key| env::var(key).ok(), settled)
    }

    /// Build from any key lookup (environment, test map...)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_lookup_except(lookup, &[])
    }

    pub fn from_lookup_except<F>(lookup: F, settled: &[&str]) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let non_empty = |key: &str| {
            if settled.iter().any(|s| *s == key) {
                return None;
            }
            lookup(key).filter(|v| !v.trim().is_empty())
        };

        let add_policy = match non_empty("GROCERY_ADD_POLICY") {
            Some(raw) => raw
                .parse::<AddPolicy>()
                .map_err(|e| anyhow!("GROCERY_ADD_POLICY: {}", e))?,
            None => defaults.add_policy,
        };

        Ok(Config {
            db_path: non_empty("GROCERY_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            catalog_csv: non_empty("GROCERY_CATALOG_CSV").map(PathBuf::from),
            add_policy,
            session_token: non_empty("GROCERY_SESSION_TOKEN"),
            listen_addr: non_empty("LISTEN").unwrap_or(defaults.listen_addr),
            log_level: non_empty("RUST_LOG").unwrap_or(defaults.log_level),
        })
    }

    /// Configured catalog: the CSV file when set, otherwise the built-in table
    pub fn load_catalog(&self) -> Result<StaticCatalog> {
        match &self.catalog_csv {
            Some(path) => StaticCatalog::from_csv(path),
            None => Ok(StaticCatalog::with_defaults()),
        }
    }
}

/// Load `.env` into the process environment (existing variables win)
pub fn load_dotenv() {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            tracing::warn!("ignoring unreadable .env file: {}", e);
        }
    }
}

/// Install the global `tracing` subscriber (stderr, filter from `RUST_LOG`)
pub fn init_tracing(default_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // A second init (tests, embedding) is harmless
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogProvider;
    use std::collections::HashMap;

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
        assert_eq!(config.db_path, PathBuf::from("grocery.db"));
        assert_eq!(config.add_policy, AddPolicy::Append);
        assert_eq!(config.listen_addr, "0.0.0.0:3000");
        assert!(config.catalog_csv.is_none());
        assert!(config.session_token.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("GROCERY_DB_PATH", "/tmp/list.db"),
            ("GROCERY_ADD_POLICY", "merge"),
            ("GROCERY_SESSION_TOKEN", "a.b.c"),
            ("LISTEN", "127.0.0.1:8080"),
        ]))
        .unwrap();

        assert_eq!(config.db_path, PathBuf::from("/tmp/list.db"));
        assert_eq!(config.add_policy, AddPolicy::MergeByIdentity);
        assert_eq!(config.session_token.as_deref(), Some("a.b.c"));
        assert_eq!(config.listen_addr, "127.0.0.1:8080");
    }

    #[test]
    fn test_blank_values_fall_back() {
        let config = Config::from_lookup(lookup(&[("GROCERY_DB_PATH", "  "), ("GROCERY_SESSION_TOKEN", "")])).unwrap();
        assert_eq!(config.db_path, PathBuf::from("grocery.db"));
        assert!(config.session_token.is_none());
    }

    #[test]
    fn test_invalid_policy_is_error() {
        let result = Config::from_lookup(lookup(&[("GROCERY_ADD_POLICY", "dedupe")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_settled_policy_ignores_bad_env_value() {
        let env = lookup(&[("GROCERY_ADD_POLICY", "dedupe"), ("GROCERY_DB_PATH", "/tmp/list.db")]);

        let config = Config::from_lookup_except(env, &["GROCERY_ADD_POLICY"]).unwrap();

        assert_eq!(config.add_policy, AddPolicy::Append);
        assert_eq!(config.db_path, PathBuf::from("/tmp/list.db"));
    }

    #[test]
    fn test_default_catalog_when_no_csv() {
        let config = Config::default();
        assert_eq!(config.load_catalog().unwrap().items().len(), 16);
    }
}
