//! Core identifiers and the build state vocabulary.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtoError;

/// Queue item identifier issued by the server when a build is triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueId(u64);

impl QueueId {
    /// Wrap a raw queue id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Extract the queue id from the `Location` header of a trigger response.
    ///
    /// The server answers with an absolute URL such as
    /// `https://ci.example.com/queue/item/42/`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtoError::Decoding`] if the URL has no `queue/item/<id>` part.
    pub fn from_location(location: &str) -> Result<Self, ProtoError> {
        let mut segments = location.trim_end_matches('/').rsplit('/');
        let id = segments.next().unwrap_or_default();
        let item = segments.next().unwrap_or_default();
        let queue = segments.next().unwrap_or_default();
        if queue != "queue" || item != "item" {
            return Err(ProtoError::Decoding(format!(
                "Location header is not a queue item URL: {location}"
            )));
        }
        id.parse::<u64>().map(Self).map_err(|e| {
            ProtoError::Decoding(format!("bad queue id in Location header {location}: {e}"))
        })
    }
}

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Sequential build number, always at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct BuildNumber(u32);

impl BuildNumber {
    /// Create a build number.
    ///
    /// # Errors
    ///
    /// Returns [`ProtoError::Validation`] for zero.
    pub fn new(number: u32) -> Result<Self, ProtoError> {
        if number == 0 {
            return Err(ProtoError::Validation(
                "build number must be at least 1".to_string(),
            ));
        }
        Ok(Self(number))
    }

    /// The raw number.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for BuildNumber {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value).map_err(|e| e.to_string())
    }
}

impl From<BuildNumber> for u32 {
    fn from(value: BuildNumber) -> Self {
        value.0
    }
}

impl fmt::Display for BuildNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A concrete build of a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct BuildHandle {
    /// Job name.
    pub job: String,
    /// Build number.
    pub number: BuildNumber,
}

impl BuildHandle {
    /// Create a handle.
    #[must_use]
    pub fn new(job: impl Into<String>, number: BuildNumber) -> Self {
        Self {
            job: job.into(),
            number,
        }
    }
}

impl fmt::Display for BuildHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.job, self.number)
    }
}

/// Terminal result of a build as reported by the server.
///
/// Only `SUCCESS`, `FAILURE` and `ABORTED` are distinguished. Every other
/// server string (`UNSTABLE`, `NOT_BUILT`, plugin-specific values) is kept
/// verbatim in [`BuildResult::Unknown`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum BuildResult {
    /// Build succeeded.
    Success,
    /// Build failed.
    Failure,
    /// Build was aborted.
    Aborted,
    /// Any other result string.
    Unknown(String),
}

impl BuildResult {
    /// Map a server result string.
    #[must_use]
    pub fn from_server(result: &str) -> Self {
        match result {
            "SUCCESS" => Self::Success,
            "FAILURE" => Self::Failure,
            "ABORTED" => Self::Aborted,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// The server spelling of this result.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
            Self::Aborted => "ABORTED",
            Self::Unknown(raw) => raw,
        }
    }

    /// Whether the build succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl From<BuildResult> for String {
    fn from(value: BuildResult) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for BuildResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a build as seen by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildState {
    /// Waiting in the queue, no build number yet.
    Queued,
    /// Executing.
    Running,
    /// Finished with `SUCCESS`.
    Success,
    /// Finished with `FAILURE`.
    Failure,
    /// Finished with `ABORTED`.
    Aborted,
    /// Finished with a result the client does not distinguish.
    Unknown,
}

impl BuildState {
    /// Whether the build can no longer change.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Queued | Self::Running)
    }
}

impl From<&BuildResult> for BuildState {
    fn from(result: &BuildResult) -> Self {
        match result {
            BuildResult::Success => Self::Success,
            BuildResult::Failure => Self::Failure,
            BuildResult::Aborted => Self::Aborted,
            BuildResult::Unknown(_) => Self::Unknown,
        }
    }
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
            Self::Aborted => "ABORTED",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Last dotted component of a Java class name, e.g. `FreeStyleProject`
/// for `hudson.model.FreeStyleProject`.
#[must_use]
pub fn short_class_name(class: &str) -> &str {
    class.rsplit('.').next().unwrap_or(class)
}
