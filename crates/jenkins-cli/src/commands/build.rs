//! Trigger a build, or wait on an existing one.

use std::io::Write;

use jenkins_client::{Clock, NoProgress, ProgressSink, RunOptions, RunOutcome, Transport, WaitTimeout};
use jenkins_proto::{BuildHandle, BuildParams};
use serde::Serialize;

use crate::cli::Cli;
use crate::commands::console::ConsoleOut;
use crate::commands::{outdir, selector};
use crate::error::CliError;
use crate::output::{OutputFormat, StderrProgress, TableDisplay, format_duration};
use crate::session::Session;

/// Wait behaviour requested on the command line.
///
/// # Errors
///
/// Returns [`CliError::Client`] with a configuration error for a
/// non-positive timeout.
pub fn run_options(cli: &Cli) -> Result<RunOptions, CliError> {
    let timeout = cli
        .timeout
        .map(WaitTimeout::from_secs)
        .transpose()?
        .unwrap_or_default();
    Ok(RunOptions {
        wait: cli.wait,
        console: cli.console,
        timeout,
        artifacts_dir: cli.arti.then(|| outdir(cli)),
    })
}

fn progress_sink(cli: &Cli) -> Box<dyn ProgressSink> {
    if cli.no_progress {
        Box::new(NoProgress)
    } else {
        Box::new(StderrProgress)
    }
}

/// Report of a started or finished build.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct RunReport(pub RunOutcome);

impl TableDisplay for RunReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        let outcome = &self.0;
        match &outcome.finished {
            Some(finished) => {
                let took = finished
                    .duration
                    .map_or_else(|| "-".into(), format_duration);
                writeln!(writer, "Build {} finished: {} ({took})", outcome.handle, finished.result)?;
            }
            None => match outcome.queue_id {
                Some(id) => writeln!(writer, "Build {} started (queue item {id})", outcome.handle)?,
                None => writeln!(writer, "Build {} started", outcome.handle)?,
            },
        }
        for path in &outcome.saved_artifacts {
            writeln!(writer, "  saved {}", path.display())?;
        }
        Ok(())
    }
}

/// Build command executor.
pub struct BuildCommand<'a, T, C> {
    session: &'a Session<T, C>,
}

impl<'a, T: Transport + Clone, C: Clock + Clone> BuildCommand<'a, T, C> {
    /// Create a new build command.
    #[must_use]
    pub const fn new(session: &'a Session<T, C>) -> Self {
        Self { session }
    }

    /// Trigger the job and follow it as the flags ask. Returns the exit code.
    ///
    /// # Errors
    ///
    /// Argument errors before anything is sent, then any lifecycle failure.
    pub async fn execute<W: Write + Send>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        cli: &Cli,
    ) -> Result<u8, CliError> {
        let selector = selector(cli)?;
        if selector.build.is_some() {
            return Err(CliError::InvalidArgument(format!(
                "-b takes a job name, not a build: {selector}"
            )));
        }
        let user = cli
            .params
            .as_deref()
            .map(str::parse::<BuildParams>)
            .transpose()?
            .unwrap_or_default();
        let settings = self.session.settings();
        let params = settings.build_params(user);
        let options = run_options(cli)?;
        let log_dir = options.console.then(|| settings.console_log_dir.clone()).flatten();

        let mut sink = progress_sink(cli);
        let screen = &mut *writer;
        let outcome = self
            .session
            .orchestrator()
            .run(
                &selector.job,
                &params,
                &options,
                move |handle: &BuildHandle| ConsoleOut::open(Some(screen), log_dir.as_deref(), handle),
                sink.as_mut(),
            )
            .await?;

        let code = outcome.exit_code();
        format.write(writer, &RunReport(outcome))?;
        Ok(code)
    }
}

/// Wait command executor for an existing build.
pub struct WaitCommand<'a, T, C> {
    session: &'a Session<T, C>,
}

impl<'a, T: Transport + Clone, C: Clock + Clone> WaitCommand<'a, T, C> {
    /// Create a new wait command.
    #[must_use]
    pub const fn new(session: &'a Session<T, C>) -> Self {
        Self { session }
    }

    /// Wait for the selected build (default `lastBuild`). Returns the exit code.
    ///
    /// # Errors
    ///
    /// Any lookup or lifecycle failure.
    pub async fn execute<W: Write + Send>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        cli: &Cli,
    ) -> Result<u8, CliError> {
        let options = RunOptions {
            wait: true,
            ..run_options(cli)?
        };
        let handle: BuildHandle = self.session.resolve(&selector(cli)?).await?;

        let outcome = {
            let mut sink = progress_sink(cli);
            let mut out = ConsoleOut::open(
                Some(&mut *writer),
                if options.console {
                    self.session.settings().console_log_dir.as_deref()
                } else {
                    None
                },
                &handle,
            )?;
            self.session
                .orchestrator()
                .watch(&handle, &options, &mut out, sink.as_mut())
                .await?
        };

        let code = outcome.exit_code();
        format.write(writer, &RunReport(outcome))?;
        Ok(code)
    }
}
