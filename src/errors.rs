use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Mixer file does not exist: {}, can't continue!", .0.display())]
    ManifestNotFound(PathBuf),

    #[error("Services file does not exist: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Failed to serialize services for {}: {message}", path.display())]
    Serialize { path: PathBuf, message: String },

    #[error("I/O error on {}: {message}", path.display())]
    Io { path: PathBuf, message: String },

    #[error("Service '{service}' in scope '{scope}' references unknown service '{reference}' in {field}")]
    UnresolvedReference {
        scope: String,
        service: String,
        field: &'static str,
        reference: String,
    },

    #[error("Service '{service}' in scope '{scope}' is not a mapping")]
    InvalidService { scope: String, service: String },

    #[error("Config is not valid: {0}")]
    InvalidConfig(String),

    #[error("Invalid port definition: {0}")]
    InvalidPort(String),

    #[error("No free host port left above {0}")]
    PortsExhausted(u16),
}

impl Error {
    pub fn parse(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Error::Parse {
            path: path.into(),
            message: err.to_string(),
        }
    }

    pub fn serialize(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Error::Serialize {
            path: path.into(),
            message: err.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}
