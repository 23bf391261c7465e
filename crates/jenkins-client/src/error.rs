//! Error taxonomy for the build lifecycle client.
//!
//! Every HTTP call is attempted once. Each failure kind maps to a distinct
//! process exit code via [`ClientError::exit_code`].

use std::path::PathBuf;
use std::time::Duration;

use jenkins_proto::{BuildHandle, ProtoError, QueueId};
use thiserror::Error;

/// Process exit codes.
pub mod exit {
    /// Success, build `SUCCESS`, or a non-waiting action completed.
    pub const SUCCESS: u8 = 0;
    /// Build `FAILURE`.
    pub const FAILURE: u8 = 1;
    /// Build `ABORTED`.
    pub const ABORTED: u8 = 2;
    /// Build result not distinguished, or the wait timed out.
    pub const UNKNOWN: u8 = 3;
    /// Bad arguments, configuration, or a rejected trigger.
    pub const USAGE: u8 = 4;
    /// Authentication failure.
    pub const AUTH: u8 = 5;
    /// Unknown job or build.
    pub const NOT_FOUND: u8 = 6;
    /// Network, HTTP, decoding or local IO failure.
    pub const IO: u8 = 7;
    /// Queue item cancelled or never scheduled.
    pub const QUEUE: u8 = 8;
    /// Interrupted by the user.
    pub const INTERRUPTED: u8 = 130;
}

/// Errors produced by the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network, DNS or TLS failure before a response arrived.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server refused the credentials.
    #[error("authentication failed with HTTP {status} for {path}: check the configured user and API token")]
    Auth {
        /// 401 or 403.
        status: u16,
        /// Request path.
        path: String,
    },

    /// Unknown job, build or resource.
    #[error("not found: {0}")]
    NotFound(String),

    /// The server refused to start the build.
    #[error("build trigger rejected with HTTP {status}: {message}")]
    TriggerRejected {
        /// HTTP status.
        status: u16,
        /// Server message, possibly empty.
        message: String,
    },

    /// The queue item was cancelled before a build started.
    #[error("queue item {0} was cancelled before a build started")]
    QueueCancelled(QueueId),

    /// The queue item was not scheduled in time.
    #[error("queue item {id} not scheduled after {}s", waited.as_secs())]
    CorrelationTimeout {
        /// Queue item.
        id: QueueId,
        /// How long the client waited.
        waited: Duration,
    },

    /// The build did not finish in time. It keeps running on the server.
    #[error("build {build} did not finish within {}s", timeout.as_secs())]
    Timeout {
        /// The build being waited on.
        build: BuildHandle,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The user cancelled the operation.
    #[error("interrupted")]
    Interrupted,

    /// A response did not have the expected shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Any other HTTP error status.
    #[error("HTTP {status} for {path}: {message}")]
    Http {
        /// HTTP status.
        status: u16,
        /// Request path.
        path: String,
        /// Server message, possibly empty.
        message: String,
    },

    /// Invalid client configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Local file IO failed.
    #[error("IO error on {}: {source}", path.display())]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Refusing to overwrite an existing file.
    #[error("file exists: {}", .0.display())]
    FileExists(PathBuf),
}

impl ClientError {
    /// Wrap an IO error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Exit code for this failure.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Timeout { .. } => exit::UNKNOWN,
            Self::TriggerRejected { .. } | Self::Config(_) => exit::USAGE,
            Self::Auth { .. } => exit::AUTH,
            Self::NotFound(_) => exit::NOT_FOUND,
            Self::Transport(_)
            | Self::Http { .. }
            | Self::MalformedResponse(_)
            | Self::Io { .. }
            | Self::FileExists(_) => exit::IO,
            Self::QueueCancelled(_) | Self::CorrelationTimeout { .. } => exit::QUEUE,
            Self::Interrupted => exit::INTERRUPTED,
        }
    }
}

impl From<ProtoError> for ClientError {
    fn from(err: ProtoError) -> Self {
        match err {
            ProtoError::Decoding(msg) => Self::MalformedResponse(msg),
            missing @ ProtoError::MissingElement(_) => Self::MalformedResponse(missing.to_string()),
            other => Self::Config(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        // Include the source chain; reqwest's top-level message is terse.
        let mut msg = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(inner) = source {
            msg.push_str(": ");
            msg.push_str(&inner.to_string());
            source = inner.source();
        }
        Self::Transport(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jenkins_proto::BuildNumber;
    use test_case::test_case;

    fn handle() -> BuildHandle {
        BuildHandle::new("demo", BuildNumber::new(7).expect("valid"))
    }

    #[test_case(ClientError::Transport("dns".into()), 7 ; "transport")]
    #[test_case(ClientError::Auth { status: 401, path: "api/json".into() }, 5 ; "auth")]
    #[test_case(ClientError::NotFound("job/x".into()), 6 ; "not found")]
    #[test_case(ClientError::TriggerRejected { status: 400, message: String::new() }, 4 ; "trigger rejected")]
    #[test_case(ClientError::QueueCancelled(QueueId::new(1)), 8 ; "queue cancelled")]
    #[test_case(ClientError::CorrelationTimeout { id: QueueId::new(1), waited: Duration::from_secs(120) }, 8 ; "correlation timeout")]
    #[test_case(ClientError::Timeout { build: handle(), timeout: Duration::from_secs(60) }, 3 ; "timeout")]
    #[test_case(ClientError::Interrupted, 130 ; "interrupted")]
    #[test_case(ClientError::MalformedResponse("x".into()), 7 ; "malformed")]
    #[test_case(ClientError::Config("x".into()), 4 ; "config")]
    #[test_case(ClientError::FileExists("a.zip".into()), 7 ; "file exists")]
    fn exit_codes(err: ClientError, code: u8) {
        assert_eq!(err.exit_code(), code);
    }

    #[test]
    fn auth_error_hints_at_credentials() {
        let err = ClientError::Auth {
            status: 403,
            path: "job/demo/build".into(),
        };
        assert!(err.to_string().contains("check the configured user and API token"));
    }

    #[test]
    fn timeout_display() {
        let err = ClientError::Timeout {
            build: handle(),
            timeout: Duration::from_secs(90),
        };
        assert_eq!(err.to_string(), "build demo/7 did not finish within 90s");
    }

    #[test]
    fn proto_decoding_becomes_malformed() {
        let err = ClientError::from(ProtoError::Decoding("build: eof".into()));
        assert!(matches!(err, ClientError::MalformedResponse(ref m) if m == "build: eof"));
        assert_eq!(err.to_string(), "malformed response: build: eof");
    }
}
