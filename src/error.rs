use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised while applying or reversing deployment changes.
#[derive(Debug, Error)]
pub enum Error {
    /// No directory under the root holds both `wsgi.py` and `settings.py`.
    #[error("No Django project found under {}", root.display())]
    ProjectNotFound { root: PathBuf },

    /// Reverse was requested but no history log exists.
    #[error("Deployment history log not found at {}. Setup may not have been run.", path.display())]
    NothingToReverse { path: PathBuf },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid policy file {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to serialize platform descriptor: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Whether this error is a precondition failure that left every file untouched.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::ProjectNotFound { .. } | Self::NothingToReverse { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
