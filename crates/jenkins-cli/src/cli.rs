//! Command-line argument parsing with clap.
//!
//! The grammar is flat: one `JOB[/ID]` positional plus action flags. At
//! most one primary action may be given; `-w`, `-c` and `--arti` either
//! modify `-b` or act on an existing build on their own.

use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};

use crate::error::CliError;

/// Jenkins command-line client.
#[derive(Parser, Debug, Clone)]
#[command(name = "jenkins")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Job and optional build: `JOB`, `JOB/7`, `JOB/3..9` or `JOB/lastSuc`.
    #[arg(value_name = "JOB[/ID]")]
    pub target: Option<String>,

    /// Server URL.
    #[arg(short = 'u', long = "url", env = "JENKINS_URL")]
    pub url: Option<String>,

    /// Credentials as `user:token`.
    #[arg(long, env = "JENKINS_AUTH", hide_env_values = true)]
    pub auth: Option<String>,

    /// Config file path.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print a config template and exit.
    #[arg(long)]
    pub makeconf: bool,

    /// Output format for info and listings.
    #[arg(short, long, value_enum, default_value_t = Format::Table)]
    pub format: Format,

    /// More detail; repeat for more logging.
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Log every HTTP request and response.
    #[arg(short = 'd', long = "debug-http")]
    pub debug_http: bool,

    /// Skip TLS certificate verification.
    #[arg(long)]
    pub insecure: bool,

    /// Trigger a build.
    #[arg(short = 'b', long = "build")]
    pub build: bool,

    /// Build parameters: `key=value,key=value`.
    #[arg(short = 'p', long = "params", value_name = "K=V,...")]
    pub params: Option<String>,

    /// Wait for the build to finish.
    #[arg(short = 'w', long = "wait")]
    pub wait: bool,

    /// Stream console output.
    #[arg(short = 'c', long = "console")]
    pub console: bool,

    /// Wait timeout in seconds; default derives from the build estimate.
    #[arg(short = 't', long = "timeout", value_name = "SECS", allow_negative_numbers = true)]
    pub timeout: Option<i64>,

    /// Stop the build; twice also cancels the job's queued items.
    #[arg(short = 'B', long = "stop", action = ArgAction::Count)]
    pub stop: u8,

    /// Show job information.
    #[arg(short = 'i', long = "info")]
    pub info: bool,

    /// List every build of the job.
    #[arg(short = 'a', long = "all-builds")]
    pub all_builds: bool,

    /// List all jobs.
    #[arg(long)]
    pub list: bool,

    /// List the build queue.
    #[arg(long = "que")]
    pub queue: bool,

    /// List build nodes.
    #[arg(long)]
    pub nodes: bool,

    /// Download build artifacts.
    #[arg(long)]
    pub arti: bool,

    /// Directory for downloads.
    #[arg(short = 'o', long = "outdir", value_name = "DIR")]
    pub outdir: Option<PathBuf>,

    /// Print the job's config.xml.
    #[arg(long)]
    pub get_config: bool,

    /// Replace the job's config.xml with FILE.
    #[arg(long, value_name = "FILE")]
    pub post_config: Option<PathBuf>,

    /// Print the job's pipeline script.
    #[arg(long)]
    pub get_groovy: bool,

    /// Replace the job's pipeline script with FILE.
    #[arg(long, value_name = "FILE")]
    pub groovy: Option<PathBuf>,

    /// Download a workspace file; `/zip` for the whole workspace.
    #[arg(long = "ws", value_name = "PATH")]
    pub workspace: Option<String>,

    /// Delete the job's workspace.
    #[arg(long)]
    pub wipews: bool,

    /// Do not print wait progress on stderr.
    #[arg(long)]
    pub no_progress: bool,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    /// Human-readable format.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

/// The one thing an invocation does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Trigger a build, optionally following it.
    Build,
    /// Stream the console of an existing build.
    Console,
    /// Wait for an existing build.
    Wait,
    /// Stop a build; `force` also cancels queued items.
    Stop {
        /// Cancel the job's queue items too.
        force: bool,
    },
    /// Job information.
    Info,
    /// Every build of a job.
    AllBuilds,
    /// All jobs.
    ListJobs,
    /// The build queue.
    ListQueue,
    /// Build nodes.
    ListNodes,
    /// Download artifacts of an existing build.
    Artifacts,
    /// Print config.xml.
    GetConfig,
    /// Post config.xml.
    PostConfig(PathBuf),
    /// Print the pipeline script.
    GetGroovy,
    /// Replace the pipeline script.
    SetGroovy(PathBuf),
    /// Download a workspace file.
    Workspace(String),
    /// Wipe the workspace.
    WipeWorkspace,
}

impl Action {
    /// Whether the action needs a `JOB` argument.
    #[must_use]
    pub const fn needs_job(&self) -> bool {
        !matches!(self, Self::ListJobs | Self::ListQueue | Self::ListNodes)
    }
}

impl Cli {
    /// Resolve the flags to a single action.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::InvalidArgument`] for conflicting actions, a
    /// missing job, or modifiers without anything to modify.
    pub fn action(&self) -> Result<Action, CliError> {
        let mut primary = Vec::new();
        if self.build {
            primary.push(Action::Build);
        }
        if self.stop > 0 {
            primary.push(Action::Stop { force: self.stop > 1 });
        }
        if self.info {
            primary.push(Action::Info);
        }
        if self.all_builds {
            primary.push(Action::AllBuilds);
        }
        if self.list {
            primary.push(Action::ListJobs);
        }
        if self.queue {
            primary.push(Action::ListQueue);
        }
        if self.nodes {
            primary.push(Action::ListNodes);
        }
        if self.get_config {
            primary.push(Action::GetConfig);
        }
        if let Some(file) = &self.post_config {
            primary.push(Action::PostConfig(file.clone()));
        }
        if self.get_groovy {
            primary.push(Action::GetGroovy);
        }
        if let Some(file) = &self.groovy {
            primary.push(Action::SetGroovy(file.clone()));
        }
        if let Some(path) = &self.workspace {
            primary.push(Action::Workspace(path.clone()));
        }
        if self.wipews {
            primary.push(Action::WipeWorkspace);
        }

        if primary.len() > 1 {
            return Err(CliError::InvalidArgument(format!(
                "only one action may be given, got {primary:?}"
            )));
        }
        let action = match primary.pop() {
            Some(action) => action,
            None if self.wait || (self.console && self.arti) => Action::Wait,
            None if self.arti => Action::Artifacts,
            None if self.console => Action::Console,
            None => Action::Info,
        };

        if action != Action::Build && self.params.is_some() {
            return Err(CliError::InvalidArgument("-p only applies to -b".into()));
        }
        if action.needs_job() && self.target.is_none() {
            return Err(CliError::InvalidArgument("a JOB argument is required".into()));
        }
        Ok(action)
    }
}
