use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub streaming: StreamingConfig,
    pub logging: LoggingConfig,
}

/// Streaming provider selection and vendor credentials
///
/// Credentials are optional at load time. A provider only fails when an
/// operation that needs the missing credential is invoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Provider used when a booth does not specify one
    pub default_provider: String,
    pub agora: AgoraConfig,
    pub hundredms: HundredMsConfig,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            default_provider: "agora".to_string(),
            agora: AgoraConfig::default(),
            hundredms: HundredMsConfig::default(),
        }
    }
}

/// Agora.io credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgoraConfig {
    pub app_id: Option<String>,
    pub app_certificate: Option<String>,
}

/// 100ms.live credentials and management API settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HundredMsConfig {
    pub access_key: Option<String>,
    pub app_secret: Option<String>,
    /// Room template applied when creating rooms
    pub template_id: Option<String>,
    /// Account subdomain, forwarded to clients for connection
    pub subdomain: Option<String>,
    /// Management API base URL (e.g., "https://api.100ms.live"). When unset,
    /// channel lifecycle calls are answered locally.
    pub management_url: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// "json" or "pretty"
    pub format: String,
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration from an optional file, overlaid with environment
    /// variables (`FAIRCAST_` prefix, `__` separator, e.g.
    /// `FAIRCAST_STREAMING__AGORA__APP_ID`).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(Environment::with_prefix("FAIRCAST").separator("__"));

        builder.build()?.try_deserialize()
    }
}
