//! Conversion engine abstraction and the external-converter implementation.
//!
//! The engine is opaque to the rest of the application: it turns a document
//! path into an ordered list of text blocks, may fail, and may take an
//! unbounded amount of time. Both operations here are blocking and are only
//! ever called from the tokio blocking pool.

use crate::models::{ConverterSettings, INPUT_PLACEHOLDER};
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::fmt;
use std::process::{Command, Output};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by an engine or its loader
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A required program, library or module is absent
    #[error("Required component is missing: {0}")]
    MissingDependency(String),

    /// Filesystem, process or privilege fault
    #[error("Operating system error: {0}")]
    Os(String),

    /// Any other failure reported by the engine
    #[error("{0}")]
    Failed(String),
}

impl From<std::io::Error> for EngineError {
    fn from(error: std::io::Error) -> Self {
        EngineError::Os(error.to_string())
    }
}

/// Something that converts one document into text blocks
pub trait ConversionEngine: Send + Sync {
    /// Short human-readable engine name for logs
    fn name(&self) -> &str;

    /// Convert a document. Blocks until the engine returns.
    fn convert(&self, path: &Utf8Path) -> Result<Vec<String>, EngineError>;
}

/// Resolves the conversion engine. Called once per process.
pub trait EngineLoader: Send + Sync {
    fn load(&self) -> Result<EngineHandle, EngineError>;
}

/// Opaque, immutable capability to perform conversions.
///
/// Cloning shares the same engine; nothing can mutate it after creation.
#[derive(Clone)]
pub struct EngineHandle(Arc<dyn ConversionEngine>);

impl EngineHandle {
    pub fn new(engine: impl ConversionEngine + 'static) -> Self {
        Self(Arc::new(engine))
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub fn convert(&self, path: &Utf8Path) -> Result<Vec<String>, EngineError> {
        self.0.convert(path)
    }
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EngineHandle").field(&self.name()).finish()
    }
}

/// Converter run as a child process that prints Markdown on stdout.
///
/// # Fields
///
/// - `missing_dependency_pattern`: matches stderr lines that mean the converter
///   itself is installed but one of its own modules is not
///   - Pattern: `(?i)(ModuleNotFoundError|ImportError|No module named|not installed)`
///   - Example match: "ModuleNotFoundError: No module named 'docling'"
pub struct ExternalConverter {
    executable: Utf8PathBuf,
    arguments: Vec<String>,
    environment: Vec<(String, String)>,
    block_separator: String,
    missing_dependency_pattern: Regex,
}

impl ExternalConverter {
    pub fn new(
        executable: Utf8PathBuf,
        arguments: Vec<String>,
        settings: &ConverterSettings,
    ) -> Self {
        Self {
            executable,
            arguments,
            environment: settings
                .environment
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
            block_separator: settings.block_separator.clone(),
            missing_dependency_pattern: missing_dependency_pattern(),
        }
    }

    pub fn executable(&self) -> &Utf8Path {
        &self.executable
    }

    /// Arguments with the input placeholder substituted.
    ///
    /// The path is appended when the template has no placeholder.
    pub fn build_arguments(&self, input: &Utf8Path) -> Vec<String> {
        let mut substituted = false;
        let mut args: Vec<String> = self
            .arguments
            .iter()
            .map(|arg| {
                if arg.contains(INPUT_PLACEHOLDER) {
                    substituted = true;
                    arg.replace(INPUT_PLACEHOLDER, input.as_str())
                } else {
                    arg.clone()
                }
            })
            .collect();

        if !substituted {
            args.push(input.to_string());
        }
        args
    }

    /// Split converter stdout into text blocks
    pub fn split_blocks(&self, stdout: &str) -> Vec<String> {
        if self.block_separator.is_empty() {
            return vec![stdout.to_string()];
        }
        stdout
            .split(self.block_separator.as_str())
            .map(str::to_string)
            .collect()
    }

    /// Map a failed process run onto the engine error taxonomy
    pub fn classify_failure(&self, output: &Output) -> EngineError {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = last_meaningful_line(&stderr).unwrap_or_else(|| match output.status.code() {
            Some(code) => format!("converter exited with code {}", code),
            None => "converter was terminated by a signal".to_string(),
        });

        if self.missing_dependency_pattern.is_match(&stderr) {
            EngineError::MissingDependency(detail)
        } else if is_os_fault(&stderr) {
            EngineError::Os(detail)
        } else {
            EngineError::Failed(detail)
        }
    }
}

impl ConversionEngine for ExternalConverter {
    fn name(&self) -> &str {
        self.executable.file_stem().unwrap_or(self.executable.as_str())
    }

    fn convert(&self, path: &Utf8Path) -> Result<Vec<String>, EngineError> {
        let args = self.build_arguments(path);
        tracing::info!("Running converter: {} {:?}", self.executable, args);

        let output = Command::new(&self.executable)
            .args(&args)
            .envs(self.environment.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .output()?;

        if !output.status.success() {
            let error = self.classify_failure(&output);
            tracing::warn!("Converter failed for {}: {}", path, error);
            return Err(error);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let blocks = self.split_blocks(&stdout);
        tracing::debug!("Converter produced {} blocks for {}", blocks.len(), path);
        Ok(blocks)
    }
}

/// Locates a converter executable from [`ConverterSettings`] and probes it.
pub struct ExternalConverterLoader {
    settings: ConverterSettings,
    search_path: Option<std::ffi::OsString>,
}

impl ExternalConverterLoader {
    pub fn new(settings: ConverterSettings) -> Self {
        Self {
            settings,
            search_path: std::env::var_os("PATH"),
        }
    }

    /// Use an explicit search path instead of the process PATH
    pub fn with_search_path(mut self, search_path: impl Into<std::ffi::OsString>) -> Self {
        self.search_path = Some(search_path.into());
        self
    }

    /// Find the executable and its argument template.
    ///
    /// An explicit executable wins; otherwise profiles are searched in order.
    pub fn resolve(&self) -> Result<(Utf8PathBuf, Vec<String>), EngineError> {
        if !self.settings.executable.trim().is_empty() {
            let explicit = Utf8PathBuf::from(self.settings.executable.trim());
            if explicit.is_file() {
                return Ok((explicit, self.settings.arguments.clone()));
            }
            if let Some(found) = self.find_on_path(explicit.as_str()) {
                return Ok((found, self.settings.arguments.clone()));
            }
            return Err(EngineError::MissingDependency(format!(
                "configured converter not found: {}",
                explicit
            )));
        }

        for (name, arguments) in &self.settings.profiles {
            if let Some(found) = self.find_on_path(name) {
                tracing::info!("Found converter '{}' at {}", name, found);
                return Ok((found, arguments.clone()));
            }
            tracing::debug!("Converter '{}' not found on PATH", name);
        }

        let names: Vec<&str> = self.settings.profiles.keys().map(String::as_str).collect();
        Err(EngineError::MissingDependency(format!(
            "no document converter found on PATH (looked for: {})",
            names.join(", ")
        )))
    }

    fn find_on_path(&self, name: &str) -> Option<Utf8PathBuf> {
        let search_path = self.search_path.as_ref()?;
        std::env::split_paths(search_path)
            .filter_map(|dir| Utf8PathBuf::try_from(dir).ok())
            .flat_map(|dir| executable_names(name).into_iter().map(move |n| dir.join(n)))
            .find(|candidate| candidate.is_file())
    }

    /// Run the converter's probe argument to check it actually starts
    fn probe(&self, converter: &ExternalConverter) -> Result<(), EngineError> {
        if self.settings.probe_argument.is_empty() {
            return Ok(());
        }

        let output = Command::new(converter.executable())
            .arg(&self.settings.probe_argument)
            .envs(self.settings.environment.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .output()?;

        if output.status.success() {
            let version = String::from_utf8_lossy(&output.stdout);
            tracing::info!(
                "Converter probe ok: {}",
                version.lines().next().unwrap_or("").trim()
            );
            Ok(())
        } else {
            Err(converter.classify_failure(&output))
        }
    }
}

impl EngineLoader for ExternalConverterLoader {
    fn load(&self) -> Result<EngineHandle, EngineError> {
        let (executable, arguments) = self.resolve()?;
        let converter = ExternalConverter::new(executable, arguments, &self.settings);
        self.probe(&converter)?;
        Ok(EngineHandle::new(converter))
    }
}

fn missing_dependency_pattern() -> Regex {
    Regex::new(r"(?i)(ModuleNotFoundError|ImportError|No module named|not installed)")
        .expect("Invalid missing dependency regex")
}

fn is_os_fault(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("oserror")
        || lower.contains("permissionerror")
        || lower.contains("permission denied")
        || lower.contains("winerror")
}

fn last_meaningful_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .rev()
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

fn executable_names(name: &str) -> Vec<String> {
    if cfg!(target_os = "windows") && Utf8Path::new(name).extension().is_none() {
        vec![format!("{}.exe", name), format!("{}.cmd", name), name.to_string()]
    } else {
        vec![name.to_string()]
    }
}
