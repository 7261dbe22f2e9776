//! Error types for template resolution, extraction and rendering

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for tpl-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the resolve → extract → render pipeline can report.
///
/// All variants abort the operation that produced them; nothing is retried.
#[derive(Error, Debug)]
pub enum Error {
    /// No local path, archive, search-path entry or remote matched
    #[error("template not found: {identifier}")]
    NotFound { identifier: String },

    /// Malformed remote shorthand or URL
    #[error("invalid template identifier '{identifier}': {reason}")]
    InvalidIdentifier { identifier: String, reason: String },

    /// An archive entry or rendered path escapes its destination root
    #[error("illegal path {}: escapes {}", path.display(), root.display())]
    IllegalPath { path: PathBuf, root: PathBuf },

    /// File suffix is not one of the supported archive formats
    #[error("unsupported archive format: {}", path.display())]
    UnsupportedFormat { path: PathBuf },

    /// Clone, fetch or fast-forward failure
    #[error("git operation failed for {target}: {source}")]
    Git {
        target: String,
        #[source]
        source: git2::Error,
    },

    /// Template source text could not be parsed
    #[error("failed to parse template '{path}': {message}")]
    TemplateParse { path: String, message: String },

    /// Template parsed but failed during evaluation
    #[error("failed to render template '{path}': {message}")]
    TemplateExec { path: String, message: String },

    /// Filesystem failure
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Unusable configuration (delimiters, cache location)
    #[error("configuration error: {0}")]
    Config(String),

    /// The values file could not be read as a YAML mapping
    #[error("invalid values file {}: {message}", path.display())]
    Values { path: PathBuf, message: String },
}

impl Error {
    pub(crate) fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub(crate) fn git(target: impl std::fmt::Display, source: git2::Error) -> Self {
        Self::Git {
            target: target.to_string(),
            source,
        }
    }

    pub(crate) fn illegal_path(path: impl AsRef<Path>, root: impl AsRef<Path>) -> Self {
        Self::IllegalPath {
            path: path.as_ref().to_path_buf(),
            root: root.as_ref().to_path_buf(),
        }
    }

    pub(crate) fn invalid_identifier(identifier: &str, reason: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            identifier: identifier.to_string(),
            reason: reason.into(),
        }
    }
}

/// Attach a path to `std::io` results
pub(crate) trait IoResultExt<T> {
    fn at(self, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn at(self, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|e| Error::io(path, e))
    }
}
