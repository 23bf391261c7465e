//! # jenkins-client
//!
//! Build lifecycle client for the Jenkins remote-access API.
//!
//! Starting a build only yields a queue item; the build number exists once
//! the server schedules it. This crate covers the whole path from trigger
//! to terminal state:
//!
//! - [`JenkinsClient`] wraps every endpoint and maps HTTP statuses to
//!   [`ClientError`]
//! - [`Correlator`] resolves a queue item to its build
//! - [`CompletionPoller`] waits for a terminal state with back-off
//! - [`tail`](mod@tail) streams console output by byte offset
//! - [`Orchestrator`] sequences the above for one invocation
//!
//! ```text
//! trigger ──► queue item ──► build number ──► poll/tail ──► result
//!   POST        Correlator                   Orchestrator
//! ```
//!
//! All waiting goes through [`Clock`] and all I/O through [`Transport`], so
//! the loops run against scripted doubles in tests.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod artifacts;
pub mod backoff;
pub mod client;
pub mod clock;
pub mod correlate;
pub mod error;
pub mod orchestrator;
pub mod poller;
pub mod tail;
pub mod transport;
pub mod workspace;

#[cfg(test)]
pub(crate) mod testing;

pub use artifacts::download_artifacts;
pub use backoff::BackoffPolicy;
pub use client::JenkinsClient;
pub use clock::{Clock, SystemClock};
pub use correlate::{CorrelationConfig, Correlator};
pub use error::{ClientError, exit};
pub use orchestrator::{Orchestrator, Phase, RunOptions, RunOutcome};
pub use poller::{
    BuildOutcome, CompletionPoller, NoProgress, Progress, ProgressSink, WaitConfig, WaitTimeout,
};
pub use tail::{ConsoleCursor, Tail, follow};
pub use transport::{Credentials, HttpTransport, HttpTransportBuilder, Transport};
pub use workspace::{WorkspaceDownload, WorkspacePath, save_workspace_file};
