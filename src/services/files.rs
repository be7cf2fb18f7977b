//! File-system adapters: path resolution, pre-flight checks and saving.

use crate::models::ErrorKind;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs::File;
use std::io::ErrorKind as IoErrorKind;
use std::path::PathBuf;
use thiserror::Error;

/// Extensions offered by the open dialog filter. Advisory only.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "docx", "pptx", "html", "htm"];

/// Save name used when there is no source document
pub const FALLBACK_SAVE_NAME: &str = "converted.txt";

/// Extensions the save dialog offers; the first is appended when none is typed
pub const SAVE_EXTENSIONS: &[&str] = &["md", "txt"];

/// Reasons a path is refused before any task is created
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreflightError {
    #[error("File not found: {path}")]
    FileNotFound { path: Utf8PathBuf },

    #[error("Permission denied: {path}")]
    PermissionDenied { path: Utf8PathBuf },

    #[error("Not a file: {path}")]
    NotAFile { path: Utf8PathBuf },

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

impl PreflightError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PreflightError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            PreflightError::FileNotFound { .. }
            | PreflightError::NotAFile { .. }
            | PreflightError::InvalidPath(_) => ErrorKind::FileNotFound,
        }
    }

    /// Notification title
    pub fn title(&self) -> &'static str {
        self.kind().title()
    }

    /// Notification body
    pub fn user_message(&self) -> String {
        match self {
            PreflightError::FileNotFound { path } => {
                format!("The file could not be found:\n\n{}", path)
            }
            PreflightError::PermissionDenied { path } => {
                format!("The file could not be read (permission denied):\n\n{}", path)
            }
            PreflightError::NotAFile { path } => {
                format!("The selected path is not a file:\n\n{}", path)
            }
            PreflightError::InvalidPath(path) => {
                format!("The path could not be used:\n\n{}", path)
            }
        }
    }
}

/// Turn a picker or drop path into an absolute UTF-8 path
pub fn resolve_dropped_path(path: PathBuf) -> Result<Utf8PathBuf, PreflightError> {
    let absolute = std::path::absolute(&path)
        .map_err(|_| PreflightError::InvalidPath(path.display().to_string()))?;
    Utf8PathBuf::try_from(absolute)
        .map_err(|e| PreflightError::InvalidPath(e.into_path_buf().display().to_string()))
}

/// Check that `path` is an existing, readable regular file.
pub fn preflight(path: &Utf8Path) -> Result<(), PreflightError> {
    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == IoErrorKind::PermissionDenied => {
            return Err(PreflightError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(PreflightError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    };

    if !metadata.is_file() {
        return Err(PreflightError::NotAFile {
            path: path.to_path_buf(),
        });
    }

    match File::open(path) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == IoErrorKind::NotFound => Err(PreflightError::FileNotFound {
            path: path.to_path_buf(),
        }),
        Err(e) => {
            tracing::warn!("Cannot open {}: {}", path, e);
            Err(PreflightError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
    }
}

/// Default save-dialog file name for a source document
pub fn default_save_name(source: Option<&Utf8Path>) -> String {
    source
        .and_then(Utf8Path::file_stem)
        .filter(|stem| !stem.is_empty())
        .map(|stem| format!("{}.md", stem))
        .unwrap_or_else(|| FALLBACK_SAVE_NAME.to_string())
}

/// Append `.md` unless the path already ends in `.md` or `.txt`.
///
/// The save dialog offers a single filter over [`SAVE_EXTENSIONS`]: rfd does not
/// report which filter was chosen, so a typed `.txt` is the only way to get one.
pub fn ensure_markdown_extension(path: Utf8PathBuf) -> Utf8PathBuf {
    let known = path
        .extension()
        .map(|ext| SAVE_EXTENSIONS.iter().any(|k| ext.eq_ignore_ascii_case(k)))
        .unwrap_or(false);

    if known {
        path
    } else {
        Utf8PathBuf::from(format!("{}.{}", path, SAVE_EXTENSIONS[0]))
    }
}

/// Write `text` as UTF-8 and return the final path
pub fn save_markdown(path: Utf8PathBuf, text: &str) -> std::io::Result<Utf8PathBuf> {
    let path = ensure_markdown_extension(path);
    std::fs::write(&path, text.as_bytes())?;
    tracing::info!("Saved {} bytes to {}", text.len(), path);
    Ok(path)
}
