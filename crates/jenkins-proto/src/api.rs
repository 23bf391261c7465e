//! Response types for the endpoints the client consumes.
//!
//! Field names follow the server's camelCase JSON. Every optional field is
//! defaulted so that `tree=` filtered responses decode into the same types.
//!
//! # Example
//!
//! ```rust
//! use jenkins_proto::{QueueItemResponse, QueueStatus, decode};
//!
//! let body = br#"{"_class":"hudson.model.Queue$LeftItem","id":42,
//!                 "cancelled":false,"executable":{"number":7}}"#;
//! let item: QueueItemResponse = decode("queue item", body).unwrap();
//! assert!(matches!(item.status(), QueueStatus::Scheduled(n) if n.get() == 7));
//! ```

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::selector::SymbolicBuild;
use crate::types::{BuildNumber, BuildResult, BuildState, QueueId, short_class_name};
use crate::ProtoError;

/// Class of the job property that carries parameter definitions.
const PARAMETERS_PROPERTY: &str = "hudson.model.ParametersDefinitionProperty";

/// Decode a JSON response body, naming the endpoint in the error.
///
/// # Errors
///
/// Returns [`ProtoError::Decoding`] if the body does not match `T`.
pub fn decode<T: DeserializeOwned>(what: &str, body: &[u8]) -> Result<T, ProtoError> {
    serde_json::from_slice(body).map_err(|e| ProtoError::Decoding(format!("{what}: {e}")))
}

/// Reference from a queue item or job to a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStub {
    /// Build number.
    pub number: BuildNumber,
    /// Absolute build URL.
    #[serde(default)]
    pub url: Option<String>,
}

/// Task (job) a queue item belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRef {
    /// Job name.
    #[serde(default)]
    pub name: String,
}

/// `queue/item/<id>/api/json` and the entries of `queue/api/json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItemResponse {
    /// Queue id.
    pub id: QueueId,
    /// Java class, e.g. `hudson.model.Queue$WaitingItem`.
    #[serde(rename = "_class", default)]
    pub class: Option<String>,
    /// Set on left items that were cancelled before scheduling.
    #[serde(default)]
    pub cancelled: Option<bool>,
    /// Assigned build, once scheduled.
    #[serde(default)]
    pub executable: Option<BuildStub>,
    /// Human-readable reason the item is still waiting.
    #[serde(default)]
    pub why: Option<String>,
    /// Owning job.
    #[serde(default)]
    pub task: Option<TaskRef>,
    /// Milliseconds since the epoch when the item entered the queue.
    #[serde(default)]
    pub in_queue_since: Option<i64>,
    /// Whether the item is blocked.
    #[serde(default)]
    pub blocked: bool,
    /// Whether the item is ready to run.
    #[serde(default)]
    pub buildable: bool,
}

/// Resolution of a queue item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueStatus {
    /// Not scheduled yet.
    Pending {
        /// Server-provided reason, if any.
        why: Option<String>,
    },
    /// Scheduled as the given build.
    Scheduled(BuildNumber),
    /// Removed from the queue without a build.
    Cancelled,
}

impl QueueItemResponse {
    /// Classify this item.
    #[must_use]
    pub fn status(&self) -> QueueStatus {
        if self.cancelled == Some(true) {
            return QueueStatus::Cancelled;
        }
        match &self.executable {
            Some(stub) => QueueStatus::Scheduled(stub.number),
            None => QueueStatus::Pending {
                why: self.why.clone(),
            },
        }
    }

    /// Job name this item belongs to, or an empty string.
    #[must_use]
    pub fn job_name(&self) -> &str {
        self.task.as_ref().map_or("", |t| t.name.as_str())
    }

    /// Short kind such as `Waiting`, `Blocked`, `Buildable` or `Left`.
    #[must_use]
    pub fn kind(&self) -> String {
        let class = self.class.as_deref().unwrap_or_default();
        short_class_name(class)
            .replace("Queue$", "")
            .replace("Item", "")
    }

    /// Time the item entered the queue.
    #[must_use]
    pub fn queued_at(&self) -> Option<DateTime<Utc>> {
        self.in_queue_since.and_then(millis_to_datetime)
    }
}

/// `queue/api/json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueResponse {
    /// Items currently in the queue.
    #[serde(default)]
    pub items: Vec<QueueItemResponse>,
}

/// An archived build artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Bare file name.
    pub file_name: String,
    /// Path relative to the build's `artifact/` root.
    pub relative_path: String,
    /// Name shown in the UI.
    #[serde(default)]
    pub display_path: Option<String>,
}

/// `job/<name>/<id>/api/json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResponse {
    /// Build number.
    pub number: BuildNumber,
    /// Whether the build is still executing.
    #[serde(default)]
    pub building: bool,
    /// Result string, `null` while building.
    #[serde(default)]
    pub result: Option<String>,
    /// Start time in milliseconds since the epoch.
    #[serde(default)]
    pub timestamp: i64,
    /// Duration in milliseconds, 0 while building.
    #[serde(default)]
    pub duration: i64,
    /// Server estimate in milliseconds, -1 when unknown.
    #[serde(default)]
    pub estimated_duration: i64,
    /// Archived artifacts.
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    /// Absolute build URL.
    #[serde(default)]
    pub url: Option<String>,
}

impl BuildResponse {
    /// Terminal result, present once `building` is false and `result` is non-empty.
    #[must_use]
    pub fn terminal_result(&self) -> Option<BuildResult> {
        if self.building {
            return None;
        }
        self.result
            .as_deref()
            .filter(|r| !r.is_empty())
            .map(BuildResult::from_server)
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> BuildState {
        self.terminal_result()
            .map_or(BuildState::Running, |r| BuildState::from(&r))
    }

    /// Server estimate, `None` when zero, negative or missing.
    #[must_use]
    pub fn estimated(&self) -> Option<Duration> {
        positive_millis(self.estimated_duration)
    }

    /// Recorded duration, `None` while building.
    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        positive_millis(self.duration)
    }

    /// Start time.
    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        millis_to_datetime(self.timestamp)
    }
}

/// A row of `job/<name>/api/json?tree=builds[...]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSummary {
    /// Build number.
    pub number: BuildNumber,
    /// Result string, `null` while building.
    #[serde(default)]
    pub result: Option<String>,
    /// Start time in milliseconds since the epoch.
    #[serde(default)]
    pub timestamp: i64,
    /// Duration in milliseconds.
    #[serde(default)]
    pub duration: i64,
    /// Server estimate in milliseconds.
    #[serde(default)]
    pub estimated_duration: i64,
}

/// `job/<name>/api/json?tree=builds[...]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobBuildsResponse {
    /// Builds, newest first.
    #[serde(default)]
    pub builds: Vec<BuildSummary>,
}

/// Default value holder inside a parameter definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultParameterValue {
    /// Raw JSON value.
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

/// A declared build parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDefinition {
    /// Parameter name.
    pub name: String,
    /// Description from the job config.
    #[serde(default)]
    pub description: Option<String>,
    /// Default value, if declared.
    #[serde(default)]
    pub default_parameter_value: Option<DefaultParameterValue>,
}

impl ParameterDefinition {
    /// Default rendered as text; strings are unquoted.
    #[must_use]
    pub fn default_value(&self) -> Option<String> {
        let value = self.default_parameter_value.as_ref()?.value.as_ref()?;
        Some(match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

/// Entry of a job's `property` array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProperty {
    /// Java class of the property.
    #[serde(rename = "_class", default)]
    pub class: Option<String>,
    /// Present on parameter-definition properties.
    #[serde(default)]
    pub parameter_definitions: Vec<ParameterDefinition>,
}

/// `job/<name>/api/json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    /// Job name.
    pub name: String,
    /// Full name including folders.
    #[serde(default)]
    pub full_name: Option<String>,
    /// Free-text description.
    #[serde(default)]
    pub description: Option<String>,
    /// Java class of the job.
    #[serde(rename = "_class", default)]
    pub class: Option<String>,
    /// Whether the job accepts new builds.
    #[serde(default)]
    pub buildable: Option<bool>,
    /// Job properties.
    #[serde(default)]
    pub property: Vec<JobProperty>,
    /// Most recent build.
    #[serde(default)]
    pub last_build: Option<BuildStub>,
    /// Most recent completed build.
    #[serde(default)]
    pub last_completed_build: Option<BuildStub>,
    /// Most recent failed build.
    #[serde(default)]
    pub last_failed_build: Option<BuildStub>,
    /// Most recent successful build.
    #[serde(default)]
    pub last_successful_build: Option<BuildStub>,
}

impl JobResponse {
    /// Declared build parameters.
    #[must_use]
    pub fn parameters(&self) -> Vec<&ParameterDefinition> {
        self.property
            .iter()
            .filter(|p| p.class.as_deref() == Some(PARAMETERS_PROPERTY))
            .flat_map(|p| p.parameter_definitions.iter())
            .collect()
    }

    /// Whether the job declares any parameters.
    #[must_use]
    pub fn is_parameterized(&self) -> bool {
        !self.parameters().is_empty()
    }

    /// The symbolic builds this response reports, with their numbers.
    #[must_use]
    pub fn symbolic_builds(&self) -> Vec<(SymbolicBuild, BuildNumber)> {
        [
            (SymbolicBuild::Last, &self.last_build),
            (SymbolicBuild::LastCompleted, &self.last_completed_build),
            (SymbolicBuild::LastFailed, &self.last_failed_build),
            (SymbolicBuild::LastSuccessful, &self.last_successful_build),
        ]
        .into_iter()
        .filter_map(|(sym, stub)| stub.as_ref().map(|s| (sym, s.number)))
        .collect()
    }
}

/// Entry of `api/json?tree=jobs[...]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    /// Job name.
    pub name: String,
    /// Java class of the job.
    #[serde(rename = "_class", default)]
    pub class: Option<String>,
    /// Absolute job URL.
    #[serde(default)]
    pub url: Option<String>,
}

/// `api/json?tree=jobs[...]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobListResponse {
    /// All top-level jobs.
    #[serde(default)]
    pub jobs: Vec<JobSummary>,
}

/// Label assigned to a computer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    /// Label name.
    pub name: String,
}

/// Entry of `computer/api/json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputerResponse {
    /// Node name.
    pub display_name: String,
    /// Java class of the computer.
    #[serde(rename = "_class", default)]
    pub class: Option<String>,
    /// Free-text description.
    #[serde(default)]
    pub description: Option<String>,
    /// Assigned labels, including the node's own name.
    #[serde(default)]
    pub assigned_labels: Vec<Label>,
    /// Executor slots.
    #[serde(default)]
    pub num_executors: u32,
    /// Whether no executor is busy.
    #[serde(default)]
    pub idle: bool,
    /// Whether the node is disconnected.
    #[serde(default)]
    pub offline: bool,
}

impl ComputerResponse {
    /// Space-separated label names.
    #[must_use]
    pub fn labels(&self) -> String {
        self.assigned_labels
            .iter()
            .map(|l| l.name.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Short kind, e.g. `Master` or `Slave`.
    #[must_use]
    pub fn kind(&self) -> String {
        let class = self.class.as_deref().unwrap_or_default();
        short_class_name(class)
            .replace("Hudson$", "")
            .replace("Computer", "")
    }

    /// Whether `needle` occurs in the name or the labels.
    #[must_use]
    pub fn matches(&self, needle: &str) -> bool {
        self.display_name.contains(needle) || self.labels().contains(needle)
    }
}

/// `computer/api/json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputerSetResponse {
    /// All computers.
    #[serde(default)]
    pub computer: Vec<ComputerResponse>,
}

fn positive_millis(ms: i64) -> Option<Duration> {
    u64::try_from(ms)
        .ok()
        .filter(|&ms| ms > 0)
        .map(Duration::from_millis)
}

fn millis_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    if ms <= 0 {
        return None;
    }
    Utc.timestamp_millis_opt(ms).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_item_pending() {
        let body = br#"{"_class":"hudson.model.Queue$WaitingItem","id":42,
            "why":"In the quiet period","task":{"name":"demo"},"inQueueSince":1700000000000}"#;
        let item: QueueItemResponse = decode("queue item", body).expect("should decode");
        assert_eq!(
            item.status(),
            QueueStatus::Pending {
                why: Some("In the quiet period".into())
            }
        );
        assert_eq!(item.job_name(), "demo");
        assert_eq!(item.kind(), "Waiting");
        assert!(item.queued_at().is_some());
    }

    #[test]
    fn queue_item_scheduled() {
        let body = br#"{"_class":"hudson.model.Queue$LeftItem","id":42,"cancelled":false,
            "executable":{"_class":"hudson.model.FreeStyleBuild","number":7,"url":"https://ci/job/demo/7/"}}"#;
        let item: QueueItemResponse = decode("queue item", body).expect("should decode");
        let expected = BuildNumber::new(7).expect("valid");
        assert_eq!(item.status(), QueueStatus::Scheduled(expected));
        assert_eq!(item.kind(), "Left");
    }

    #[test]
    fn queue_item_cancelled() {
        let body = br#"{"_class":"hudson.model.Queue$LeftItem","id":42,"cancelled":true,"executable":null}"#;
        let item: QueueItemResponse = decode("queue item", body).expect("should decode");
        assert_eq!(item.status(), QueueStatus::Cancelled);
    }

    #[test]
    fn queue_item_missing_id_is_decoding_error() {
        let err = decode::<QueueItemResponse>("queue item", br#"{"why":null}"#)
            .expect_err("should fail");
        assert!(err.to_string().starts_with("malformed response: queue item"));
    }

    #[test]
    fn build_running_has_no_result() {
        let body = br#"{"number":7,"building":true,"result":null,"timestamp":1700000000000,
            "duration":0,"estimatedDuration":90000}"#;
        let build: BuildResponse = decode("build", body).expect("should decode");
        assert_eq!(build.terminal_result(), None);
        assert_eq!(build.state(), BuildState::Running);
        assert_eq!(build.estimated(), Some(Duration::from_secs(90)));
        assert_eq!(build.elapsed(), None);
    }

    #[test]
    fn build_finished() {
        let body = br#"{"number":7,"building":false,"result":"FAILURE","duration":1500,
            "estimatedDuration":-1,"artifacts":[{"fileName":"a.zip","relativePath":"out/a.zip","displayPath":"a.zip"}]}"#;
        let build: BuildResponse = decode("build", body).expect("should decode");
        assert_eq!(build.terminal_result(), Some(BuildResult::Failure));
        assert_eq!(build.state(), BuildState::Failure);
        assert_eq!(build.estimated(), None);
        assert_eq!(build.artifacts.len(), 1);
        assert_eq!(build.artifacts[0].relative_path, "out/a.zip");
    }

    #[test]
    fn build_not_building_but_empty_result_is_running() {
        let body = br#"{"number":3,"building":false,"result":""}"#;
        let build: BuildResponse = decode("build", body).expect("should decode");
        assert_eq!(build.terminal_result(), None);
    }

    #[test]
    fn job_parameters_and_symbolic_builds() {
        let body = br#"{
            "_class":"org.jenkinsci.plugins.workflow.job.WorkflowJob",
            "name":"deploy","fullName":"deploy","description":"Deploys things",
            "property":[
                {"_class":"jenkins.model.BuildDiscarderProperty"},
                {"_class":"hudson.model.ParametersDefinitionProperty","parameterDefinitions":[
                    {"name":"env","description":"target","defaultParameterValue":{"value":"staging"}},
                    {"name":"dry_run","defaultParameterValue":{"value":true}}
                ]}
            ],
            "lastBuild":{"number":12},"lastSuccessfulBuild":{"number":11},
            "lastFailedBuild":null
        }"#;
        let job: JobResponse = decode("job", body).expect("should decode");
        let params = job.parameters();
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].default_value().as_deref(), Some("staging"));
        assert_eq!(params[1].default_value().as_deref(), Some("true"));
        assert!(job.is_parameterized());

        let syms = job.symbolic_builds();
        assert_eq!(syms.len(), 2);
        assert_eq!(syms[0].0, SymbolicBuild::Last);
        assert_eq!(syms[0].1.get(), 12);
    }

    #[test]
    fn computer_kind_and_labels() {
        let body = br#"{"computer":[{"_class":"hudson.model.Hudson$MasterComputer",
            "displayName":"Built-In Node","assignedLabels":[{"name":"built-in"},{"name":"linux"}],
            "numExecutors":2,"idle":true,"offline":false}]}"#;
        let set: ComputerSetResponse = decode("computers", body).expect("should decode");
        let c = &set.computer[0];
        assert_eq!(c.kind(), "Master");
        assert_eq!(c.labels(), "built-in linux");
        assert!(c.matches("linux"));
        assert!(c.matches("Built-In"));
        assert!(!c.matches("windows"));
    }
}
