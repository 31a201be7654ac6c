use std::path::PathBuf;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::errors::ControllerError;

/// Controller configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ControllerConfig {
    /// Watchdog, cooldown and grace timings
    pub timing: TimingConfig,

    /// Relay address templates used by the gateway strategies
    pub gateways: GatewayConfig,

    /// Capabilities of the hosting environment
    pub environment: EnvironmentConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Stall watchdog period
    #[serde(serialize_with = "crate::serde_helpers::serialize_duration")]
    #[serde(deserialize_with = "crate::serde_helpers::deserialize_duration")]
    pub watchdog_period: Duration,

    /// Seconds the playback position is pushed forward on a nudge
    pub nudge_step_secs: f64,

    /// Wait after the catalog is exhausted before the next cycle
    #[serde(serialize_with = "crate::serde_helpers::serialize_duration")]
    #[serde(deserialize_with = "crate::serde_helpers::deserialize_duration")]
    pub cooldown_delay: Duration,

    /// Grace before a decode error on the native path escalates
    #[serde(serialize_with = "crate::serde_helpers::serialize_duration")]
    #[serde(deserialize_with = "crate::serde_helpers::deserialize_duration")]
    pub native_grace: Duration,

    /// Budget for an attach to produce its first frames; 0 disables it
    #[serde(serialize_with = "crate::serde_helpers::serialize_optional_duration")]
    #[serde(deserialize_with = "crate::serde_helpers::deserialize_optional_duration")]
    pub connect_timeout: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Template for the first relay; `{url}` is replaced with the encoded address
    pub primary_template: String,

    /// Template for the second relay
    pub secondary_template: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Host only allows secure transport (insecure addresses are blocked)
    pub requires_secure_transport: bool,

    /// Decode runtime supports manifest-driven adaptive delivery
    pub adaptive_supported: bool,

    /// Start on-demand single-file media on the native path instead of
    /// walking the catalog from Direct
    pub prefer_native_for_files: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    pub level: String,

    /// Include the event target in log lines
    pub with_target: bool,

    /// Colored output
    pub ansi: bool,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            watchdog_period: Duration::from_secs(5),
            nudge_step_secs: 0.5,
            cooldown_delay: Duration::from_secs(3),
            native_grace: Duration::from_secs(1),
            connect_timeout: Some(Duration::from_secs(20)),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            primary_template: "https://corsproxy.io/?url={url}".to_string(),
            secondary_template: "https://api.allorigins.win/raw?url={url}".to_string(),
        }
    }
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            requires_secure_transport: false,
            adaptive_supported: true,
            prefer_native_for_files: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            with_target: false,
            ansi: true,
        }
    }
}

impl ControllerConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ControllerError> {
        let timing = &self.timing;

        if timing.watchdog_period.is_zero() {
            return Err(ControllerError::configuration(
                "Watchdog period must be greater than 0",
            ));
        }

        if timing.cooldown_delay.is_zero() {
            return Err(ControllerError::configuration(
                "Cooldown delay must be greater than 0",
            ));
        }

        if !timing.nudge_step_secs.is_finite() || timing.nudge_step_secs <= 0.0 {
            return Err(ControllerError::configuration(
                "Nudge step must be a positive number of seconds",
            ));
        }

        validate_template("primary", &self.gateways.primary_template)?;
        validate_template("secondary", &self.gateways.secondary_template)?;

        if self.logging.level.trim().is_empty() {
            return Err(ControllerError::configuration("Log level cannot be empty"));
        }

        Ok(())
    }
}

fn validate_template(name: &str, template: &str) -> Result<(), ControllerError> {
    if template.trim().is_empty() {
        return Err(ControllerError::configuration(format!(
            "Gateway {} template cannot be empty",
            name
        )));
    }

    if !template.contains("://") {
        return Err(ControllerError::configuration(format!(
            "Gateway {} template must be an absolute address: {}",
            name, template
        )));
    }

    Ok(())
}

/// Configuration manager for loading, saving, and validating configurations
pub struct ConfigManager {
    config_path: PathBuf,
    config: ControllerConfig,
}

impl ConfigManager {
    /// Create a new configuration manager
    pub fn new(config_path: PathBuf) -> Self {
        Self {
            config_path,
            config: ControllerConfig::default(),
        }
    }

    /// Load configuration from file, writing the defaults when it does not exist
    pub async fn load(&mut self) -> Result<(), ControllerError> {
        if !tokio::fs::try_exists(&self.config_path).await? {
            self.save().await?;
            return Ok(());
        }

        let content = tokio::fs::read_to_string(&self.config_path).await
            .map_err(|e| ControllerError::configuration(
                format!("Failed to read config file: {}", e)
            ))?;

        self.config = toml::from_str(&content)
            .map_err(|e| ControllerError::configuration(
                format!("Failed to parse config file: {}", e)
            ))?;

        self.config.validate()?;
        Ok(())
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<(), ControllerError> {
        let content = toml::to_string_pretty(&self.config)
            .map_err(|e| ControllerError::configuration(
                format!("Failed to serialize config: {}", e)
            ))?;

        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await
                    .map_err(|e| ControllerError::configuration(
                        format!("Failed to create config directory: {}", e)
                    ))?;
            }
        }

        tokio::fs::write(&self.config_path, content).await
            .map_err(|e| ControllerError::configuration(
                format!("Failed to write config file: {}", e)
            ))?;

        Ok(())
    }

    /// Get the current configuration
    pub fn get_config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Replace the configuration after validating it
    pub fn update_config(&mut self, config: ControllerConfig) -> Result<(), ControllerError> {
        config.validate()?;
        self.config = config;
        Ok(())
    }
}

/// Environment-based configuration override
pub struct EnvConfigOverride;

impl EnvConfigOverride {
    /// Apply `PLAYBACK_*` environment variable overrides to configuration
    pub fn apply_overrides(config: &mut ControllerConfig) {
        Self::apply_from(config, |key| std::env::var(key).ok());
    }

    /// Apply overrides read through `lookup`
    pub fn apply_from<F>(config: &mut ControllerConfig, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(millis) = lookup("PLAYBACK_COOLDOWN_MS").and_then(|v| v.parse::<u64>().ok()) {
            config.timing.cooldown_delay = Duration::from_millis(millis);
        }
        if let Some(millis) = lookup("PLAYBACK_WATCHDOG_MS").and_then(|v| v.parse::<u64>().ok()) {
            config.timing.watchdog_period = Duration::from_millis(millis);
        }

        if let Some(secure) = lookup("PLAYBACK_SECURE_CONTEXT") {
            config.environment.requires_secure_transport = parse_flag(&secure);
        }
        if let Some(adaptive) = lookup("PLAYBACK_ADAPTIVE_SUPPORTED") {
            config.environment.adaptive_supported = parse_flag(&adaptive);
        }
        if let Some(native) = lookup("PLAYBACK_PREFER_NATIVE_FILES") {
            config.environment.prefer_native_for_files = parse_flag(&native);
        }

        if let Some(template) = lookup("PLAYBACK_GATEWAY_PRIMARY") {
            config.gateways.primary_template = template;
        }
        if let Some(template) = lookup("PLAYBACK_GATEWAY_SECONDARY") {
            config.gateways.secondary_template = template;
        }

        if let Some(level) = lookup("PLAYBACK_LOG_LEVEL") {
            config.logging.level = level;
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
