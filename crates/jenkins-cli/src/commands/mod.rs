//! CLI command implementations.
//!
//! Each submodule implements one action:
//! - [`build`] - Trigger a build, or wait on an existing one
//! - [`console`] - Console text of existing builds
//! - [`info`] - Job information and build history
//! - [`list`] - Jobs, queue and nodes
//! - [`stop`] - Stop a build and cancel queued items
//! - [`artifacts`] - Artifact download
//! - [`config_xml`] - `config.xml` and pipeline script
//! - [`workspace`] - Workspace download and wipe

pub mod artifacts;
pub mod build;
pub mod config_xml;
pub mod console;
pub mod info;
pub mod list;
pub mod stop;
pub mod workspace;

use std::path::PathBuf;

use jenkins_proto::JobSelector;

use crate::cli::Cli;
use crate::error::CliError;

pub use artifacts::ArtifactsCommand;
pub use build::{BuildCommand, WaitCommand};
pub use config_xml::ConfigCommand;
pub use console::ConsoleCommand;
pub use info::{BuildsCommand, InfoCommand};
pub use list::{ListCommand, Listing};
pub use stop::StopCommand;
pub use workspace::WorkspaceCommand;

/// The parsed `JOB[/ID]` argument.
///
/// # Errors
///
/// [`CliError::InvalidArgument`] when it is missing or malformed.
pub fn selector(cli: &Cli) -> Result<JobSelector, CliError> {
    cli.target
        .as_deref()
        .ok_or_else(|| CliError::InvalidArgument("a JOB argument is required".into()))?
        .parse()
        .map_err(CliError::from)
}

/// Download directory, `.` by default.
#[must_use]
pub fn outdir(cli: &Cli) -> PathBuf {
    cli.outdir.clone().unwrap_or_else(|| PathBuf::from("."))
}
