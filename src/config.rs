//! Runtime configuration.

use std::env;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://ddlgraph.db?mode=rwc";
pub const DEFAULT_LOG_FILTER: &str = "ddlgraph=info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// SQLite URL of the schema store
    pub database_url: String,

    /// Pool size; in-memory databases always use a single connection
    pub max_connections: u32,

    /// tracing filter directive
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: 5,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Config {
    /// Load from `DDLGRAPH_*` environment variables, falling back to defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            database_url: lookup("DDLGRAPH_DATABASE_URL").unwrap_or(defaults.database_url),

            max_connections: match lookup("DDLGRAPH_MAX_CONNECTIONS") {
                Some(raw) => raw.parse().map_err(|e| {
                    anyhow::anyhow!("invalid DDLGRAPH_MAX_CONNECTIONS {raw:?}: {e}")
                })?,
                None => defaults.max_connections,
            },

            log_filter: lookup("DDLGRAPH_LOG").unwrap_or(defaults.log_filter),
        })
    }
}
