/// Core error types shared by the runtime subsystems and the harnesses
use thiserror::Error;

/// Errors raised by the runtime subsystems exercised by the harnesses.
///
/// Harnesses never propagate these: a target returning an error is an
/// expected outcome, only a crash or hang is a finding.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cgroup error: {0}")]
    Cgroup(String),

    #[error("Namespace error: {0}")]
    Namespace(String),

    #[error("Filesystem error: {0}")]
    Filesystem(String),

    #[error("State error: {0}")]
    State(String),

    #[error("Device rule error: {0}")]
    Device(String),

    #[error("Init error: {0}")]
    Init(String),

    #[error("Container {0} already exists")]
    Exists(String),

    #[error("Container {0} does not exist")]
    NotExist(String),
}

impl From<nix::errno::Errno> for RuntimeError {
    fn from(err: nix::errno::Errno) -> Self {
        RuntimeError::Io(std::io::Error::from(err))
    }
}

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_maps_to_io() {
        let err: RuntimeError = nix::errno::Errno::ENOENT.into();
        match err {
            RuntimeError::Io(io) => assert_eq!(io.kind(), std::io::ErrorKind::NotFound),
            other => panic!("unexpected mapping: {other:?}"),
        }
    }

    #[test]
    fn test_error_display() {
        let err = RuntimeError::Exists("abc".to_string());
        assert_eq!(err.to_string(), "Container abc already exists");
    }
}
