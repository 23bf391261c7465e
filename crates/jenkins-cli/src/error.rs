//! CLI error types.

use jenkins_client::{ClientError, exit};
use jenkins_proto::ProtoError;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Failure talking to the server or saving its output.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Output formatting error.
    #[error("format error: {0}")]
    Format(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ProtoError> for CliError {
    fn from(err: ProtoError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}

impl CliError {
    /// Process exit code.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Client(e) => e.exit_code(),
            Self::InvalidArgument(_) | Self::Config(_) => exit::USAGE,
            Self::Format(_) | Self::Io(_) => exit::IO,
        }
    }

    /// A hint printed after the error, when one helps.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Client(ClientError::Auth { .. }) => {
                Some("check the credentials given with --auth or JENKINS_AUTH")
            }
            Self::Client(ClientError::Transport(_)) => {
                Some("check the server URL given with --url or JENKINS_URL")
            }
            Self::Client(ClientError::TriggerRejected { .. }) => {
                Some("the job may be disabled or need parameters; see its info with -i")
            }
            _ => None,
        }
    }
}
