use crate::models::{INPUT_PLACEHOLDER, UserConfig};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// File name of the user settings inside the config directory
pub const USER_CONFIG_FILE: &str = "DocuMark Settings.yaml";

/// Configuration manager for loading and saving the YAML settings file.
///
/// Owns a single file, `DocuMark Settings.yaml`, holding the converter
/// selection, the conversion timeout and logging preferences.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    user_config_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// # Arguments
    /// * `config_dir` - Directory containing configuration files (e.g., "DocuMark Data")
    ///
    /// # Returns
    /// A new ConfigManager instance
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        // Create config directory if it doesn't exist
        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            user_config_path: config_dir.join(USER_CONFIG_FILE),
        })
    }

    /// Load the user configuration file.
    ///
    /// On first run the defaults are written out so users have a file to
    /// edit. Failing to write them is logged, not returned.
    ///
    /// # Returns
    /// The loaded UserConfig, or default if file doesn't exist
    pub fn load_user_config(&self) -> Result<UserConfig> {
        if !self.user_config_path.exists() {
            tracing::warn!(
                "User config file not found at {}, using defaults",
                self.user_config_path
            );
            let config = UserConfig::default();
            if let Err(e) = self.save_user_config(&config) {
                tracing::warn!("Could not write default settings: {:#}", e);
            }
            return Ok(config);
        }

        let file_contents = fs::read_to_string(&self.user_config_path)
            .with_context(|| format!("Failed to read user config: {}", self.user_config_path))?;

        let config: UserConfig = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse user config: {}", self.user_config_path))?;

        for warning in settings_warnings(&config) {
            tracing::warn!("{}: {}", self.user_config_path, warning);
        }

        tracing::info!("Loaded user config from {}", self.user_config_path);
        Ok(config)
    }

    /// Save the user configuration file.
    ///
    /// # Arguments
    /// * `config` - The UserConfig to save
    pub fn save_user_config(&self, config: &UserConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize user config to YAML")?;

        fs::write(&self.user_config_path, yaml_string)
            .with_context(|| format!("Failed to write user config: {}", self.user_config_path))?;

        tracing::info!("Saved user config to {}", self.user_config_path);
        Ok(())
    }

    pub fn user_config_path(&self) -> &Utf8Path {
        &self.user_config_path
    }
}

/// Settings that parse but will not behave as the user probably expects
fn settings_warnings(config: &UserConfig) -> Vec<String> {
    let settings = &config.settings;
    let converter = &settings.converter;
    let mut warnings = Vec::new();

    if converter.executable.trim().is_empty() && converter.profiles.is_empty() {
        warnings.push("no converter executable and no profiles; initialization will fail".to_string());
    }
    if !converter.executable.trim().is_empty()
        && !converter.arguments.iter().any(|a| a.contains(INPUT_PLACEHOLDER))
    {
        warnings.push(format!(
            "converter arguments have no {} placeholder; the document path is appended",
            INPUT_PLACEHOLDER
        ));
    }
    if converter.block_separator.is_empty() {
        warnings.push("empty block separator; output is kept as a single block".to_string());
    }
    if settings.status_reset_delay == 0 {
        warnings.push("status reset delay is 0; temporary messages vanish immediately".to_string());
    }
    warnings
}
