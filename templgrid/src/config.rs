//! Configuration for templgrid
//!
//! Settings come from a TOML file; any value can be overridden from the
//! environment with the `TEMPLGRID` prefix and `__` as the section separator,
//! e.g. `TEMPLGRID__SYNC__SENDGRID__API_KEY`.

use crate::error::{Result, TemplgridError};
use crate::sync::SyncOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const ENV_PREFIX: &str = "TEMPLGRID";

/// Main configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub input: InputConfig,
    pub output: OutputConfig,
    pub sync: SyncConfig,
    pub server: ServerConfig,
    pub sender: SenderConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn or error
    pub level: String,
    /// pretty or json
    pub format: String,
}

/// Template source directories
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InputConfig {
    pub email_path: String,
    pub component_path: String,
    pub locale_path: String,
    pub extension: String,
    /// Prepended to every template name
    pub prefix: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: FileOutputConfig,
    pub preview: PreviewOutputConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FileOutputConfig {
    pub enabled: bool,
    pub path: String,
    /// Locale used to render the files, empty for none
    pub locale: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PreviewOutputConfig {
    pub enabled: bool,
    pub path: String,
    /// Locale used to render the preview, empty for none
    pub locale: String,
}

/// Remote synchronization
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    pub enabled: bool,
    /// Delete remote templates that no longer exist locally
    pub delete_not_listed: bool,
    /// Activate each pushed version immediately
    pub activate_new_version: bool,
    /// Locale used to render synced templates, empty for none
    pub locale: String,
    pub sendgrid: SendGridConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SendGridConfig {
    pub host: String,
    pub api_key: String,
}

/// HTTP server
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (e.g., "0.0.0.0:8080")
    pub listen_addr: String,
    /// Expose `POST /email`
    pub api_enabled: bool,
    /// Key expected in the `api_key` query parameter
    pub api_key: String,
    /// Expose the `/preview` routes
    pub preview_enabled: bool,
    /// Maximum number of queued send requests
    pub queue_capacity: usize,
}

/// Outgoing mail through SendGrid
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SenderConfig {
    pub enabled: bool,
    pub api_key: String,
    pub host: String,
    /// Ask SendGrid to validate without delivering
    pub sandbox: bool,
}

fn default_sendgrid_host() -> String {
    crate::sync::sendgrid::DEFAULT_HOST.to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            email_path: "static/emails".to_string(),
            component_path: "static/components".to_string(),
            locale_path: "static/i10n".to_string(),
            extension: "html".to_string(),
            prefix: String::new(),
        }
    }
}

impl Default for FileOutputConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: "build".to_string(),
            locale: String::new(),
        }
    }
}

impl Default for PreviewOutputConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: "build".to_string(),
            locale: String::new(),
        }
    }
}

impl Default for SendGridConfig {
    fn default() -> Self {
        Self {
            host: default_sendgrid_host(),
            api_key: String::new(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            api_enabled: false,
            api_key: String::new(),
            preview_enabled: false,
            queue_capacity: 100,
        }
    }
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            host: default_sendgrid_host(),
            sandbox: false,
        }
    }
}

impl SyncConfig {
    pub fn options(&self) -> SyncOptions {
        SyncOptions {
            delete_not_listed: self.delete_not_listed,
            activate_new_version: self.activate_new_version,
        }
    }
}

impl AppConfig {
    /// Load a TOML file and apply `TEMPLGRID__*` environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(
                ::config::File::from(path)
                    .format(::config::FileFormat::Toml)
                    .required(true),
            )
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| TemplgridError::Config(format!("Failed to load {}: {}", path.display(), e)))?;

        let config: AppConfig = settings
            .try_deserialize()
            .map_err(|e| TemplgridError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document without environment overrides.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)
            .map_err(|e| TemplgridError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(TemplgridError::Config(format!(
                "Unknown log format '{}', expected pretty or json",
                self.logging.format
            )));
        }
        if self.sync.enabled && self.sync.sendgrid.api_key.is_empty() {
            return Err(TemplgridError::Config(
                "sync.sendgrid.api_key is required when sync is enabled".to_string(),
            ));
        }
        if self.sender.enabled && self.sender.api_key.is_empty() {
            return Err(TemplgridError::Config(
                "sender.api_key is required when the sender is enabled".to_string(),
            ));
        }
        if self.server.api_enabled && self.server.api_key.is_empty() {
            return Err(TemplgridError::Config(
                "server.api_key is required when the API is enabled".to_string(),
            ));
        }
        if self.server.api_enabled && !self.sender.enabled {
            return Err(TemplgridError::Config(
                "the sender must be enabled when the API is enabled".to_string(),
            ));
        }
        if self.server.queue_capacity == 0 {
            return Err(TemplgridError::Config(
                "server.queue_capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
