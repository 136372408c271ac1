//! Runtime settings read from the environment.
//!
//! `main` loads a `.env` file with `dotenvy` first, so every variable can
//! live there too. CLI flags take precedence over these values.
//!
//! | Variable                            | Default  |
//! |-------------------------------------|----------|
//! | `RETAIL_INSIGHTS_PORT`              | 3000     |
//! | `RETAIL_INSIGHTS_TREND_WINDOW`      | 200      |
//! | `RETAIL_INSIGHTS_MAX_UPLOAD_BYTES`  | 50 MiB   |
//! | `RETAIL_INSIGHTS_CACHE_CAPACITY`    | 32       |
//! | `RETAIL_INSIGHTS_DATE_COLUMN`       | `year`   |

use std::env;
use std::str::FromStr;

use crate::analytics::DEFAULT_TREND_WINDOW;
use crate::cache::DEFAULT_CAPACITY;
use crate::error::ConfigError;

pub const PORT_VAR: &str = "RETAIL_INSIGHTS_PORT";
pub const TREND_WINDOW_VAR: &str = "RETAIL_INSIGHTS_TREND_WINDOW";
pub const MAX_UPLOAD_VAR: &str = "RETAIL_INSIGHTS_MAX_UPLOAD_BYTES";
pub const CACHE_CAPACITY_VAR: &str = "RETAIL_INSIGHTS_CACHE_CAPACITY";
pub const DATE_COLUMN_VAR: &str = "RETAIL_INSIGHTS_DATE_COLUMN";

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub port: u16,
    pub trend_window: usize,
    pub max_upload_bytes: usize,
    pub cache_capacity: usize,
    pub date_column: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            trend_window: DEFAULT_TREND_WINDOW,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            cache_capacity: DEFAULT_CAPACITY,
            date_column: "year".to_string(),
        }
    }
}

impl Settings {
    /// Read settings from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through an arbitrary lookup (unset or blank = default).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let trend_window = parse_var(TREND_WINDOW_VAR, get(TREND_WINDOW_VAR), defaults.trend_window)?;
        if trend_window == 0 {
            return Err(ConfigError::Invalid {
                key: TREND_WINDOW_VAR.to_string(),
                value: "0".to_string(),
                message: "window must be at least 1".to_string(),
            });
        }

        Ok(Self {
            port: parse_var(PORT_VAR, get(PORT_VAR), defaults.port)?,
            trend_window,
            max_upload_bytes: parse_var(MAX_UPLOAD_VAR, get(MAX_UPLOAD_VAR), defaults.max_upload_bytes)?,
            cache_capacity: parse_var(CACHE_CAPACITY_VAR, get(CACHE_CAPACITY_VAR), defaults.cache_capacity)?,
            date_column: get(DATE_COLUMN_VAR).unwrap_or(defaults.date_column),
        })
    }
}

fn parse_var<T>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key: key.to_string(),
            message: e.to_string(),
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.port, 3000);
        assert_eq!(settings.trend_window, 200);
        assert_eq!(settings.date_column, "year");
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            (PORT_VAR, "8080"),
            (TREND_WINDOW_VAR, " 12 "),
            (CACHE_CAPACITY_VAR, "4"),
            (DATE_COLUMN_VAR, "Order Date"),
        ]))
        .unwrap();

        assert_eq!(settings.port, 8080);
        assert_eq!(settings.trend_window, 12);
        assert_eq!(settings.cache_capacity, 4);
        assert_eq!(settings.date_column, "Order Date");
        assert_eq!(settings.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    }

    #[test]
    fn test_blank_value_uses_default() {
        let settings = Settings::from_lookup(lookup(&[(PORT_VAR, "  ")])).unwrap();
        assert_eq!(settings.port, DEFAULT_PORT);
    }

    #[test]
    fn test_invalid_number_names_variable() {
        let err = Settings::from_lookup(lookup(&[(PORT_VAR, "eighty")])).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains(PORT_VAR));
        assert!(msg.contains("eighty"));
    }

    #[test]
    fn test_zero_window_rejected() {
        let err = Settings::from_lookup(lookup(&[(TREND_WINDOW_VAR, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }
}
