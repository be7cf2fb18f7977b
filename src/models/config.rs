use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Placeholder replaced with the document path in converter arguments
pub const INPUT_PLACEHOLDER: &str = "{input}";

/// User configuration from DocuMark Settings.yaml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(rename = "DocuMark_Settings")]
    pub settings: AppSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(rename = "Converter", default)]
    pub converter: ConverterSettings,

    /// Seconds before a conversion is abandoned; 0 disables the limit
    #[serde(rename = "Conversion Timeout", default = "default_conversion_timeout")]
    pub conversion_timeout: u32,

    /// Milliseconds a temporary status stays visible
    #[serde(rename = "Status Reset Delay", default = "default_status_reset_delay")]
    pub status_reset_delay: u64,

    #[serde(rename = "Debug Mode", default)]
    pub debug_mode: bool,

    #[serde(rename = "Console Logging", default = "default_console_logging")]
    pub console_logging: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            converter: ConverterSettings::default(),
            conversion_timeout: default_conversion_timeout(),
            status_reset_delay: default_status_reset_delay(),
            debug_mode: false,
            console_logging: default_console_logging(),
        }
    }
}

impl AppSettings {
    pub fn conversion_timeout(&self) -> Option<Duration> {
        match self.conversion_timeout {
            0 => None,
            secs => Some(Duration::from_secs(secs as u64)),
        }
    }

    pub fn status_reset_delay(&self) -> Duration {
        Duration::from_millis(self.status_reset_delay)
    }
}

/// How the external document converter is located and invoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverterSettings {
    /// Explicit converter path. Empty means search `Profiles` on PATH.
    #[serde(rename = "Executable", default)]
    pub executable: String,

    /// Arguments for an explicit executable
    #[serde(rename = "Arguments", default = "default_arguments")]
    pub arguments: Vec<String>,

    /// Executable name -> argument template, searched in order
    #[serde(rename = "Profiles", default = "default_profiles")]
    pub profiles: IndexMap<String, Vec<String>>,

    #[serde(rename = "Probe Argument", default = "default_probe_argument")]
    pub probe_argument: String,

    /// Extra environment passed to the converter process
    #[serde(rename = "Environment", default = "default_environment")]
    pub environment: IndexMap<String, String>,

    /// Separator between text blocks in the converter output
    #[serde(rename = "Block Separator", default = "default_block_separator")]
    pub block_separator: String,
}

impl Default for ConverterSettings {
    fn default() -> Self {
        Self {
            executable: String::new(),
            arguments: default_arguments(),
            profiles: default_profiles(),
            probe_argument: default_probe_argument(),
            environment: default_environment(),
            block_separator: default_block_separator(),
        }
    }
}

fn default_conversion_timeout() -> u32 {
    600
}

fn default_status_reset_delay() -> u64 {
    2500
}

fn default_console_logging() -> bool {
    true
}

fn default_arguments() -> Vec<String> {
    vec![INPUT_PLACEHOLDER.to_string()]
}

fn default_profiles() -> IndexMap<String, Vec<String>> {
    let mut profiles = IndexMap::new();
    profiles.insert("markitdown".to_string(), vec![INPUT_PLACEHOLDER.to_string()]);
    profiles.insert(
        "pandoc".to_string(),
        vec![
            "--to".to_string(),
            "gfm".to_string(),
            INPUT_PLACEHOLDER.to_string(),
        ],
    );
    profiles
}

fn default_probe_argument() -> String {
    "--version".to_string()
}

fn default_environment() -> IndexMap<String, String> {
    let mut environment = IndexMap::new();
    // Model downloads create symlinks, which need elevated rights on Windows
    if cfg!(target_os = "windows") {
        environment.insert("HF_HUB_DISABLE_SYMLINKS".to_string(), "1".to_string());
        environment.insert(
            "HF_HUB_DISABLE_SYMLINKS_WARNING".to_string(),
            "1".to_string(),
        );
    }
    environment
}

fn default_block_separator() -> String {
    "\u{c}".to_string()
}
