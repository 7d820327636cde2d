//! Configuration for the workspace client.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable holding the workspace URL.
pub const HOST_ENV: &str = "DATABRICKS_HOST";
/// Environment variable holding the personal access token.
pub const TOKEN_ENV: &str = "DATABRICKS_TOKEN";

/// Connection settings for a single workspace.
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Workspace URL, e.g. `https://adb-123.4.azuredatabricks.net`.
    #[serde(default)]
    pub host: String,

    /// Bearer token sent with every request.
    #[serde(default)]
    pub token: String,

    /// Per-request timeout.
    #[serde(with = "duration_secs", default = "default_timeout")]
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            token: String::new(),
            timeout: default_timeout(),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("host", &self.host)
            .field("token", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            token: token.into(),
            ..Default::default()
        }
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load host and token from `DATABRICKS_HOST` / `DATABRICKS_TOKEN`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var(HOST_ENV) {
            config.host = host;
        }

        if let Ok(token) = std::env::var(TOKEN_ENV) {
            config.token = token;
        }

        config
    }
}

const fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

/// Serialization helper for Duration as seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert!(config.host.is_empty());
        assert_eq!(config.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_config_builder() {
        let config = ClientConfig::new("https://example.cloud.databricks.com", "dapi123")
            .timeout(Duration::from_secs(5));

        assert_eq!(config.host, "https://example.cloud.databricks.com");
        assert_eq!(config.token, "dapi123");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = ClientConfig::new("https://example.cloud.databricks.com", "dapi-secret");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("dapi-secret"));
        assert!(rendered.contains("redacted"));
    }

    #[test]
    fn test_timeout_deserializes_from_seconds() -> Result<(), Box<dyn std::error::Error>> {
        let config: ClientConfig =
            serde_json::from_str(r#"{"host": "https://h", "token": "t", "timeout": 15}"#)?;
        assert_eq!(config.timeout, Duration::from_secs(15));
        Ok(())
    }
}
