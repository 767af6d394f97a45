//! Configuration for the NodeScope client
//!
//! Loads configuration from a TOML file; everything has a sensible
//! default so the client also runs without one.

use crate::error::Result;
use crate::scope::DEFAULT_SPAN_MS;
use crate::session::DEFAULT_RATE_HZ;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub discovery: DiscoveryConfig,
    pub plot: PlotConfig,
    pub logging: LoggingConfig,
}

/// Gateway discovery configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscoveryConfig {
    /// Gateway base URL; the `nodes` API and the WebSocket endpoint are
    /// both derived from it
    pub base_url: String,
    /// Preferred node name; first discovered node when empty or unmatched
    #[serde(default)]
    pub node: Option<String>,
}

/// Plot window configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlotConfig {
    /// Total visible span in milliseconds (1000-10000)
    pub span_ms: u64,
    /// Redraw rate in Hz (1-50)
    pub update_rate_hz: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            discovery: DiscoveryConfig {
                base_url: "http://localhost:8080".to_string(),
                node: None,
            },
            plot: PlotConfig {
                span_ms: DEFAULT_SPAN_MS,
                update_rate_hz: DEFAULT_RATE_HZ,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.discovery.base_url, "http://localhost:8080");
        assert_eq!(config.discovery.node, None);
        assert_eq!(config.plot.span_ms, 5000);
        assert_eq!(config.plot.update_rate_hz, 25);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_toml_serialization() {
        let config = AppConfig::default();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        assert!(toml_string.contains("[discovery]"));
        assert!(toml_string.contains("[plot]"));
        assert!(toml_string.contains("[logging]"));
        assert!(toml_string.contains("span_ms = 5000"));
        assert!(toml_string.contains("base_url = \"http://localhost:8080\""));
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_content = r#"
[discovery]
base_url = "https://gateway.example.org"
node = "sine"

[plot]
span_ms = 2000
update_rate_hz = 10

[logging]
level = "debug"
"#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.discovery.base_url, "https://gateway.example.org");
        assert_eq!(config.discovery.node.as_deref(), Some("sine"));
        assert_eq!(config.plot.span_ms, 2000);
        assert_eq!(config.plot.update_rate_hz, 10);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_node_field_optional() {
        let toml_content = r#"
[discovery]
base_url = "http://localhost:8080"

[plot]
span_ms = 5000
update_rate_hz = 25

[logging]
level = "info"
"#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.discovery.node, None);
    }
}
