//! # jenkins-cli
//!
//! Command-line client for a Jenkins server.
//!
//! Provides commands for:
//! - Triggering builds, waiting for them and streaming their console
//! - Job information, build history, queue and node listings
//! - Stopping builds and cancelling queued items
//! - Artifacts, workspace files and job configuration
//!
//! # Architecture
//!
//! Flags resolve to exactly one [`cli::Action`]. Settings merge flags,
//! environment and the TOML config file into a [`session::Session`], which
//! hands the commands a [`jenkins_client::JenkinsClient`] and the build
//! lifecycle orchestrator.
//!
//! ```text
//! ┌─────────────┐  Action   ┌──────────┐  HTTP/JSON  ┌─────────┐
//! │ jenkins-cli │──────────►│ Session  │◄───────────►│ Jenkins │
//! └─────────────┘           └──────────┘             └─────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use cli::{Action, Cli, Format};
pub use config::{Config, Settings};
pub use error::CliError;
pub use output::OutputFormat;
pub use session::Session;
