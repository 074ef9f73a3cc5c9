use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = BuildError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("unknown variable context {0:?}")]
    UnknownContext(String),

    #[error("cyclic dependency resolving {0:?}")]
    CyclicDependency(String),

    #[error("target {target:?} has unknown dependency {dependency:?}")]
    UnknownDependency { target: String, dependency: String },

    #[error("no such target {0:?}")]
    UnknownTarget(String),

    #[error("bygg file {0:?} not found")]
    MissingBuildFile(PathBuf),

    #[error("incompatible version: {0}")]
    VersionIncompatible(String),

    #[error("{0}")]
    CommandFailure(String),

    #[error("failed to expand template: {0}")]
    Template(String),

    #[error("download failed: {0}")]
    Network(String),

    #[error("checksum verification failed for {0:?}")]
    ChecksumMismatch(String),

    #[error("unsupported file: {0}")]
    UnsupportedArchiveFormat(String),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BuildError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn command(message: impl Into<String>) -> Self {
        BuildError::CommandFailure(message.into())
    }
}

impl From<reqwest::Error> for BuildError {
    fn from(err: reqwest::Error) -> Self {
        BuildError::Network(err.to_string())
    }
}
