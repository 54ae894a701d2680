//! Client configuration loaded from environment variables.

use reqwest::Url;
use thiserror::Error;

use cellar_core::DomainError;
use cellar_inventory::RackDimensions;

const DEFAULT_API_URL: &str = "http://127.0.0.1:5000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got {value:?}")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
    #[error("invalid rack: {0}")]
    Rack(DomainError),
}

/// Configuration of the inventory client.
///
/// | Env Var               | Default                  |
/// |-----------------------|--------------------------|
/// | `CELLAR_API_URL`      | `http://127.0.0.1:5000`  |
/// | `CELLAR_RACK_COLUMNS` | `4`                      |
/// | `CELLAR_RACK_ROWS`    | `6`                      |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_url: String,
    pub rack: RackDimensions,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            rack: RackDimensions::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup (tests use a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = RackDimensions::default();

        let api_url = lookup("CELLAR_API_URL")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        if Url::parse(&api_url).is_err() {
            return Err(ConfigError::Invalid {
                var: "CELLAR_API_URL",
                expected: "an absolute URL",
                value: api_url,
            });
        }

        let columns = parse_dimension(&lookup, "CELLAR_RACK_COLUMNS", defaults.columns())?;
        let rows = parse_dimension(&lookup, "CELLAR_RACK_ROWS", defaults.rows())?;
        let rack = RackDimensions::new(columns, rows).map_err(ConfigError::Rack)?;

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            rack,
        })
    }
}

fn parse_dimension(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: u16,
) -> Result<u16, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::Invalid {
            var,
            expected: "a positive integer",
            value: raw,
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
    fn defaults_apply_when_unset() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.rack.capacity(), 24);
    }

    #[test]
    fn overrides_are_read() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("CELLAR_API_URL", "https://cellar.example.org/"),
            ("CELLAR_RACK_COLUMNS", "5"),
            ("CELLAR_RACK_ROWS", "8"),
        ]))
        .unwrap();

        assert_eq!(config.api_url, "https://cellar.example.org");
        assert_eq!((config.rack.columns(), config.rack.rows()), (5, 8));
    }

    #[test]
    fn malformed_values_are_errors() {
        let err = ClientConfig::from_lookup(lookup(&[("CELLAR_RACK_ROWS", "six")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "CELLAR_RACK_ROWS", .. }));

        let err = ClientConfig::from_lookup(lookup(&[("CELLAR_RACK_COLUMNS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Rack(_)));

        let err =
            ClientConfig::from_lookup(lookup(&[("CELLAR_API_URL", "not a url")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "CELLAR_API_URL", .. }));
    }
}
