//! Client configuration.

use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3000";
pub const BASE_URL_ENV: &str = "DREAM_API_URL";

/// Where the project server lives.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL every endpoint path is joined onto.
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl ApiConfig {
    /// Read `DREAM_API_URL`, falling back to the default when unset or blank.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        match lookup(BASE_URL_ENV) {
            Some(url) if !url.trim().is_empty() => Self {
                base_url: url.trim().to_string(),
            },
            _ => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_variable_uses_default() {
        let config = ApiConfig::from_lookup(|_| None);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn blank_variable_uses_default() {
        let config = ApiConfig::from_lookup(|_| Some("  ".to_string()));
        assert_eq!(config, ApiConfig::default());
    }

    #[test]
    fn variable_overrides_default() {
        let config = ApiConfig::from_lookup(|key| {
            assert_eq!(key, BASE_URL_ENV);
            Some("http://editor.local:8080/".to_string())
        });
        assert_eq!(config.base_url, "http://editor.local:8080/");
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: ApiConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }
}
