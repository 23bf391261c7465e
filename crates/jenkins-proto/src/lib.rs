//! # jenkins-proto
//!
//! Wire vocabulary for the Jenkins remote-access API.
//!
//! The server answers with loosely shaped JSON; this crate pins each endpoint
//! the client consumes to an explicit type so that anything unexpected surfaces
//! as [`ProtoError::Decoding`] instead of leaking a raw parse failure.
//!
//! It also owns the small grammars the command line speaks:
//! - [`JobSelector`] for `JOB[/ID]`
//! - [`BuildParams`] for `key=value,key=value`, and [`TriggerParams`] layering them on defaults
//! - [`script`] for editing the pipeline script inside `config.xml`

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod error;
pub mod params;
pub mod script;
pub mod selector;
pub mod types;

pub use api::{
    Artifact, BuildResponse, BuildSummary, ComputerResponse, ComputerSetResponse, JobBuildsResponse,
    JobListResponse, JobResponse, JobSummary, ParameterDefinition, QueueItemResponse,
    QueueResponse, QueueStatus, decode,
};
pub use error::ProtoError;
pub use params::{BuildParams, TriggerParams};
pub use selector::{BuildId, JobSelector, SymbolicBuild};
pub use types::{BuildHandle, BuildNumber, BuildResult, BuildState, QueueId, short_class_name};
