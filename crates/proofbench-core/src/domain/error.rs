//! Domain-level error taxonomy for proofbench.
//!
//! Only configuration and artifact I/O surface as errors. Transport and
//! grading failures are recorded on task traces instead.

use std::path::PathBuf;

/// proofbench domain errors.
#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    #[error("profile '{profile}' not found in {}", path.display())]
    ProfileNotFound { profile: String, path: PathBuf },

    #[error("invalid config {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },

    #[error("invalid suite {}: {reason}", path.display())]
    Suite { path: PathBuf, reason: String },

    #[error("invalid result file {}: {reason}", path.display())]
    ResultFile { path: PathBuf, reason: String },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("non-finite number in canonical JSON")]
    NonFiniteNumber,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("git error: {0}")]
    GitError(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl BenchError {
    /// Wrap an I/O error with the path that was being written.
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BenchError::Write {
            path: path.into(),
            source,
        }
    }
}

/// Result type for proofbench domain operations.
pub type Result<T> = std::result::Result<T, BenchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_not_found_names_profile_and_path() {
        let err = BenchError::ProfileNotFound {
            profile: "nightly".to_string(),
            path: PathBuf::from("bench/config.json"),
        };
        let msg = err.to_string();
        assert!(msg.contains("nightly"));
        assert!(msg.contains("bench/config.json"));
    }

    #[test]
    fn write_error_names_path() {
        let err = BenchError::write(
            "results/x.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("results/x.json"));
        assert!(err.to_string().contains("denied"));
    }
}
