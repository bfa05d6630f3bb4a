//! Error taxonomy.
//!
//! Fatal errors abort the invoking compile/build pass and surface as
//! [`Error`]. Per-file transpile failures are recovered inside a pass and
//! travel as [`TranspileError`] values instead.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A required root directory is missing or unreadable.
    #[error("cannot read {}: {source}", path.display())]
    FileSystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing compiled output failed.
    #[error("cannot write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be read or parsed.
    #[error("invalid configuration in {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    /// File watcher setup failed.
    #[error("file watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// Build manifest serialization failed.
    #[error("manifest error: {0}")]
    Manifest(#[from] serde_json::Error),
}

impl Error {
    pub fn file_system(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileSystem {
            path: path.into(),
            source,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A single source file failed to parse or transform.
///
/// Recovered by the orchestrator: the file is left out of the output tree and
/// the pass continues.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[error("failed to compile {}: {message}", file.display())]
pub struct TranspileError {
    pub file: PathBuf,
    pub message: String,
}

impl TranspileError {
    pub fn new(file: &Path, message: impl Into<String>) -> Self {
        Self {
            file: file.to_path_buf(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_system_error_names_path() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such directory");
        let err = Error::file_system("site/src", io);
        let msg = err.to_string();
        assert!(msg.contains("site/src"));
        assert!(msg.contains("no such directory"));
    }

    #[test]
    fn test_transpile_error_message() {
        let err = TranspileError::new(Path::new("src/pages/index.jsx"), "Unexpected token");
        assert_eq!(
            err.to_string(),
            "failed to compile src/pages/index.jsx: Unexpected token"
        );
    }

    #[test]
    fn test_transpile_error_serializes_camel_case() {
        let err = TranspileError::new(Path::new("a.tsx"), "boom");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["file"], "a.tsx");
        assert_eq!(json["message"], "boom");
    }
}
