//! Integration tests for ConfigManager and the settings file
//!
//! These tests verify:
//! - Loading and saving `DocuMark Settings.yaml`
//! - Defaults for missing files and missing keys
//! - The YAML key names users edit by hand
//! - Settings flowing into the converter loader

use camino::Utf8PathBuf;
use docmark::ConfigManager;
use docmark::config::USER_CONFIG_FILE;
use docmark::services::{EngineError, EngineLoader, ExternalConverterLoader};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

fn create_test_config_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, config_path)
}

#[test]
fn test_create_config_manager() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    assert_eq!(manager.user_config_path(), config_path.join(USER_CONFIG_FILE));
}

#[test]
fn test_load_default_user_config() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let settings = manager.load_user_config().unwrap().settings;

    assert_eq!(settings.conversion_timeout(), Some(Duration::from_secs(600)));
    assert_eq!(settings.status_reset_delay(), Duration::from_millis(2500));
    assert!(settings.console_logging);
    assert!(!settings.debug_mode);

    let profiles: Vec<&str> = settings.converter.profiles.keys().map(String::as_str).collect();
    assert_eq!(profiles, vec!["markitdown", "pandoc"]);
    assert_eq!(settings.converter.block_separator, "\u{c}");
}

#[test]
fn test_hand_written_settings_are_parsed() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let yaml = r#"
DocuMark_Settings:
  Conversion Timeout: 0
  Debug Mode: true
  Converter:
    Executable: /opt/tools/convert
    Arguments: ["--markdown", "{input}"]
"#;
    fs::write(manager.user_config_path(), yaml).unwrap();

    let settings = manager.load_user_config().unwrap().settings;

    assert_eq!(settings.conversion_timeout(), None);
    assert!(settings.debug_mode);
    assert_eq!(settings.converter.executable, "/opt/tools/convert");
    assert_eq!(settings.converter.arguments, vec!["--markdown", "{input}"]);
    // Keys left out keep their defaults
    assert_eq!(settings.status_reset_delay, 2500);
    assert_eq!(settings.converter.probe_argument, "--version");
}

#[test]
fn test_save_then_reload_keeps_profiles_order() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let mut config = manager.load_user_config().unwrap();
    config
        .settings
        .converter
        .profiles
        .insert("docling".to_string(), vec!["{input}".to_string()]);
    config.settings.converter.profiles.shift_remove("markitdown");
    manager.save_user_config(&config).unwrap();

    let written = fs::read_to_string(manager.user_config_path()).unwrap();
    assert!(written.contains("DocuMark_Settings"));
    assert!(written.contains("Conversion Timeout"));

    let reloaded = manager.load_user_config().unwrap();
    let profiles: Vec<&str> = reloaded
        .settings
        .converter
        .profiles
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(profiles, vec!["pandoc", "docling"]);
}

#[test]
fn test_corrupt_settings_reported() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();
    fs::write(manager.user_config_path(), "DocuMark_Settings:\n  Debug Mode: [").unwrap();

    let error = manager.load_user_config().unwrap_err();
    assert!(format!("{:#}", error).contains("Failed to parse user config"));
}

#[test]
fn test_configured_executable_missing_is_a_dependency_error() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let mut settings = manager.load_user_config().unwrap().settings;
    settings.converter.executable = config_path.join("no-such-converter").to_string();

    let loader = ExternalConverterLoader::new(settings.converter).with_search_path("");
    match loader.load() {
        Err(EngineError::MissingDependency(message)) => {
            assert!(message.contains("no-such-converter"))
        }
        other => panic!("expected a missing dependency, got {:?}", other.map(|_| ())),
    }
}
