//! Nimbus settings
//!
//! Settings come from a YAML file found on the usual search path, with a
//! handful of environment variables layered on top. Only `database.url`
//! is mandatory in a file; without any file the built-in defaults point
//! at a local SQLite database.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::models::{ActionKind, CreateFeature, ExtraParam};

/// Top-level settings document
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub provisioning: ProvisioningConfig,
    /// Provider types served by external HTTP plugin drivers
    #[serde(default)]
    pub plugins: Vec<PluginConfig>,
}

/// SQLite pool settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    5
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    600
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    /// Where log lines go
    #[serde(default = "default_log_target")]
    pub target: LogTarget,
    /// Log directory for the file and both targets
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// Log file name prefix (default: "nimbus")
    #[serde(default = "default_log_prefix")]
    pub log_prefix: String,
    /// Enable daily log rotation
    #[serde(default = "default_log_rotation")]
    pub daily_rotation: bool,
}

/// Log output target
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    /// Log to console (stdout/stderr)
    #[default]
    Console,
    /// Log to file with optional rotation
    File,
    /// Console and file at once
    Both,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

fn default_log_target() -> LogTarget {
    LogTarget::Console
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("/var/log/nimbus")
}

fn default_log_prefix() -> String {
    "nimbus".to_string()
}

fn default_log_rotation() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            target: default_log_target(),
            log_dir: default_log_dir(),
            log_prefix: default_log_prefix(),
            daily_rotation: default_log_rotation(),
        }
    }
}

/// Node provisioning settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProvisioningConfig {
    /// OpenSSH public key installed on spawned nodes (inline)
    #[serde(default)]
    pub public_key: Option<String>,
    /// Path to the OpenSSH public key (used when `public_key` is unset)
    #[serde(default)]
    pub public_key_path: Option<PathBuf>,
    /// Creator recorded on nodes discovered by sync
    #[serde(default = "default_import_creator")]
    pub import_creator: String,
    /// Length of generated root passwords
    #[serde(default = "default_password_length")]
    pub password_length: usize,
}

fn default_import_creator() -> String {
    "imported by nimbus".to_string()
}

fn default_password_length() -> usize {
    15
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            public_key: None,
            public_key_path: None,
            import_creator: default_import_creator(),
            password_length: default_password_length(),
        }
    }
}

/// A provider type served by an HTTP plugin driver
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PluginConfig {
    /// Registry key, e.g. `HETZNER`
    pub provider_type: String,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Base URL of the plugin endpoint
    pub endpoint: String,
    #[serde(default = "default_plugin_timeout", alias = "timeout")]
    pub timeout_secs: u64,
    /// Label of the access key field (`None` = not used)
    #[serde(default = "default_access_key_label")]
    pub access_key_label: Option<String>,
    /// Label of the secret key field (`None` = not used)
    #[serde(default)]
    pub secret_key_label: Option<String>,
    #[serde(default = "default_plugin_actions")]
    pub supported_actions: Vec<String>,
    #[serde(default)]
    pub extra_param: Option<ExtraParam>,
    /// Node-creation features the plugin declares
    #[serde(default)]
    pub features: Vec<CreateFeature>,
}

fn default_plugin_timeout() -> u64 {
    30
}

fn default_access_key_label() -> Option<String> {
    Some("Access Key".to_string())
}

fn default_plugin_actions() -> Vec<String> {
    ActionKind::all()
        .iter()
        .map(|a| a.as_str().to_string())
        .collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://./data/nimbus.db?mode=rwc".to_string(),
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
            },
            logging: LoggingConfig::default(),
            provisioning: ProvisioningConfig::default(),
            plugins: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Resolve settings: defaults, then the YAML file, then environment
    /// overrides. The result is validated before it is returned.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let config_path = std::env::var("NIMBUS_CONFIG")
            .map(PathBuf::from)
            .ok()
            .or_else(Self::find_config_file);

        let mut config = match config_path {
            Some(ref path) if path.exists() => Self::from_file(path)?,
            Some(ref path) => {
                eprintln!("nimbus: {:?} does not exist, falling back to defaults", path);
                AppConfig::default()
            }
            None => {
                eprintln!("nimbus: no config.yaml on the search path, falling back to defaults");
                AppConfig::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parse a configuration file without applying overrides
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        eprintln!("nimbus: reading settings from {:?}", path);
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        serde_norway::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// First existing file among the working directory, `/etc/nimbus` and
    /// the per-user config directory
    fn find_config_file() -> Option<PathBuf> {
        let paths = [
            PathBuf::from("config.yaml"),
            PathBuf::from("config/config.yaml"),
            PathBuf::from("/etc/nimbus/config.yaml"),
            dirs::config_dir()
                .map(|p| p.join("nimbus/config.yaml"))
                .unwrap_or_default(),
        ];

        paths.into_iter().find(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("NIMBUS_LOG_FORMAT") {
            self.logging.format = match format.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "compact" => LogFormat::Compact,
                _ => LogFormat::Pretty,
            };
        }

        if let Ok(path) = std::env::var("NIMBUS_PUBLIC_KEY_PATH") {
            self.provisioning.public_key_path = Some(PathBuf::from(path));
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.provisioning.password_length < 8 {
            anyhow::bail!("Generated password length must be at least 8");
        }

        let mut seen = HashSet::new();
        for plugin in &self.plugins {
            if plugin.provider_type.trim().is_empty() {
                anyhow::bail!("Plugin provider_type cannot be empty");
            }
            if !seen.insert(plugin.provider_type.as_str()) {
                anyhow::bail!("Duplicate plugin provider_type: {}", plugin.provider_type);
            }
            if !(plugin.endpoint.starts_with("http://") || plugin.endpoint.starts_with("https://"))
            {
                anyhow::bail!(
                    "Plugin {} endpoint must be an http(s) URL: {}",
                    plugin.provider_type,
                    plugin.endpoint
                );
            }
            if let Some(action) = plugin
                .supported_actions
                .iter()
                .find(|a| ActionKind::parse(a).is_none())
            {
                anyhow::bail!(
                    "Plugin {} declares unsupported action \"{}\"",
                    plugin.provider_type,
                    action
                );
            }
        }

        Ok(())
    }
}
