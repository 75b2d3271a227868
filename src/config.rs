//! Runtime configuration from environment variables

use crate::reports::venue_offset;
use chrono::FixedOffset;
use std::path::PathBuf;

pub const DEFAULT_DB_PATH: &str = "playzone.db";
pub const DEFAULT_BIND: &str = "0.0.0.0:3000";
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 7;
pub const DEFAULT_VENUE_NAME: &str = "Playzone & Cafe";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// SQLite database file (env: PLAYZONE_DB)
    pub db_path: PathBuf,
    /// HTTP listen address (env: PLAYZONE_BIND)
    pub bind: String,
    /// Operator API key; auth is off when unset (env: PLAYZONE_API_KEY)
    pub api_key: Option<String>,
    /// Venue local time offset in hours (env: PLAYZONE_UTC_OFFSET_HOURS)
    pub utc_offset_hours: i32,
    /// Printed on invoices (env: PLAYZONE_VENUE_NAME)
    pub venue_name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            bind: DEFAULT_BIND.to_string(),
            api_key: None,
            utc_offset_hours: DEFAULT_UTC_OFFSET_HOURS,
            venue_name: DEFAULT_VENUE_NAME.to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any name -> value source; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        AppConfig {
            db_path: get("PLAYZONE_DB")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
            bind: get("PLAYZONE_BIND").unwrap_or_else(|| DEFAULT_BIND.into()),
            api_key: get("PLAYZONE_API_KEY"),
            utc_offset_hours: get("PLAYZONE_UTC_OFFSET_HOURS")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_UTC_OFFSET_HOURS),
            venue_name: get("PLAYZONE_VENUE_NAME").unwrap_or_else(|| DEFAULT_VENUE_NAME.into()),
        }
    }

    pub fn with_db_path(mut self, path: Option<PathBuf>) -> Self {
        if let Some(path) = path {
            self.db_path = path;
        }
        self
    }

    pub fn offset(&self) -> FixedOffset {
        venue_offset(self.utc_offset_hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> AppConfig {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = lookup(&[]);
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.offset().local_minus_utc(), 7 * 3600);
    }

    #[test]
    fn test_overrides() {
        let config = lookup(&[
            ("PLAYZONE_DB", "/tmp/venue.db"),
            ("PLAYZONE_API_KEY", "secret"),
            ("PLAYZONE_UTC_OFFSET_HOURS", "-3"),
            ("PLAYZONE_BIND", "127.0.0.1:8080"),
        ]);
        assert_eq!(config.db_path, PathBuf::from("/tmp/venue.db"));
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.utc_offset_hours, -3);
        assert_eq!(config.bind, "127.0.0.1:8080");
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config = lookup(&[("PLAYZONE_UTC_OFFSET_HOURS", "seven"), ("PLAYZONE_API_KEY", "  ")]);
        assert_eq!(config.utc_offset_hours, DEFAULT_UTC_OFFSET_HOURS);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_cli_db_override() {
        let config = AppConfig::default().with_db_path(Some(PathBuf::from("other.db")));
        assert_eq!(config.db_path, PathBuf::from("other.db"));
    }
}
