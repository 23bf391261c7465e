//! Job information and build history.

use std::io::Write;

use chrono::{DateTime, Utc};
use jenkins_client::{Clock, Transport};
use jenkins_proto::{BuildNumber, JobResponse, SymbolicBuild, short_class_name};
use serde::Serialize;
use tracing::debug;

use crate::cli::Cli;
use crate::commands::selector;
use crate::error::CliError;
use crate::output::{OutputFormat, TableDisplay, format_duration, format_epoch_millis, millis};
use crate::session::Session;

/// A declared parameter.
#[derive(Debug, Clone, Serialize)]
pub struct ParameterView {
    /// Name.
    pub name: String,
    /// Default value.
    pub default: Option<String>,
    /// Description.
    pub description: Option<String>,
}

/// One of the job's permalinked builds.
#[derive(Debug, Clone, Serialize)]
pub struct BuildView {
    /// Build number.
    pub number: BuildNumber,
    /// Result, `None` while building.
    pub result: Option<String>,
    /// Still running.
    pub building: bool,
    /// Start, epoch milliseconds.
    pub timestamp: i64,
    /// Duration in milliseconds.
    pub duration: i64,
    /// Estimate in milliseconds.
    pub estimated_duration: i64,
    /// Permalinks pointing here.
    pub labels: Vec<&'static str>,
}

/// Job information.
#[derive(Debug, Clone, Serialize)]
pub struct JobInfo {
    /// Job name.
    pub name: String,
    /// Name including folders.
    pub full_name: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Short class name.
    pub kind: String,
    /// Declared parameters.
    pub parameters: Vec<ParameterView>,
    /// Distinct permalinked builds.
    pub builds: Vec<BuildView>,
    /// Queue items waiting for the job, when asked for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queued: Option<usize>,
    #[serde(skip)]
    now: DateTime<Utc>,
}

impl TableDisplay for JobInfo {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Job:          {} ({})", self.name, self.kind)?;
        if let Some(full) = self.full_name.as_deref().filter(|f| *f != self.name) {
            writeln!(writer, "Full name:    {full}")?;
        }
        if let Some(description) = self.description.as_deref().filter(|d| !d.is_empty()) {
            writeln!(writer, "Description:  {description}")?;
        }
        if !self.parameters.is_empty() {
            writeln!(writer, "Parameters:")?;
            for p in &self.parameters {
                write!(writer, "  {} = {}", p.name, p.default.as_deref().unwrap_or(""))?;
                match p.description.as_deref().filter(|d| !d.is_empty()) {
                    Some(d) => writeln!(writer, "    ({d})")?,
                    None => writeln!(writer)?,
                }
            }
        }
        if !self.builds.is_empty() {
            writeln!(writer, "Builds:")?;
        }
        for b in &self.builds {
            let result = if b.building {
                "RUNNING"
            } else {
                b.result.as_deref().unwrap_or("-")
            };
            let took = millis(b.duration).map_or_else(|| "-".into(), format_duration);
            let estimated = millis(b.estimated_duration).map_or_else(|| "-".into(), format_duration);
            writeln!(
                writer,
                "  #{:<5} {:<10} started {}  took {took}  estimated {estimated}  [{}]",
                b.number,
                result,
                format_epoch_millis(b.timestamp, self.now),
                b.labels.join(", ")
            )?;
        }
        if let Some(queued) = self.queued {
            writeln!(writer, "Queued:       {queued}")?;
        }
        Ok(())
    }
}

/// Group permalinks by the build they point at, keeping first-seen order.
fn distinct_builds(job: &JobResponse) -> Vec<(BuildNumber, Vec<SymbolicBuild>)> {
    let mut grouped: Vec<(BuildNumber, Vec<SymbolicBuild>)> = Vec::new();
    for (symbolic, number) in job.symbolic_builds() {
        match grouped.iter_mut().find(|(n, _)| *n == number) {
            Some((_, labels)) => labels.push(symbolic),
            None => grouped.push((number, vec![symbolic])),
        }
    }
    grouped
}

/// Info command executor.
pub struct InfoCommand<'a, T, C> {
    session: &'a Session<T, C>,
}

impl<'a, T: Transport + Clone, C: Clock + Clone> InfoCommand<'a, T, C> {
    /// Create a new info command.
    #[must_use]
    pub const fn new(session: &'a Session<T, C>) -> Self {
        Self { session }
    }

    /// Print job information.
    ///
    /// # Errors
    ///
    /// Returns an error if a request or write fails.
    pub async fn execute<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        cli: &Cli,
    ) -> Result<(), CliError> {
        let selector = selector(cli)?;
        let client = self.session.client();
        let job = client.job(&selector.job).await?;

        let mut builds = Vec::new();
        for (number, labels) in distinct_builds(&job) {
            let build = client.build_info(&job.name, &number.to_string()).await?;
            builds.push(BuildView {
                number,
                result: build.result,
                building: build.building,
                timestamp: build.timestamp,
                duration: build.duration,
                estimated_duration: build.estimated_duration,
                labels: labels.into_iter().map(SymbolicBuild::api_name).collect(),
            });
        }

        let queued = if cli.verbose > 0 {
            let queue = client.queue().await?;
            Some(queue.items.iter().filter(|i| i.job_name() == job.name).count())
        } else {
            None
        };
        debug!(job = %job.name, builds = builds.len(), "job info fetched");

        let info = JobInfo {
            kind: short_class_name(job.class.as_deref().unwrap_or_default()).to_string(),
            parameters: job
                .parameters()
                .into_iter()
                .map(|p| ParameterView {
                    name: p.name.clone(),
                    default: p.default_value(),
                    description: p.description.clone(),
                })
                .collect(),
            name: job.name,
            full_name: job.full_name,
            description: job.description,
            builds,
            queued,
            now: Utc::now(),
        };
        format.write(writer, &info)
    }
}

/// One row of the build history.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryRow {
    /// Build number.
    pub number: BuildNumber,
    /// Result, `None` while building.
    pub result: Option<String>,
    /// Duration in milliseconds.
    pub duration: i64,
    /// Start, epoch milliseconds.
    pub timestamp: i64,
    /// Permalinks pointing here.
    pub labels: Vec<&'static str>,
}

/// Every build of a job, oldest first.
#[derive(Debug, Clone, Serialize)]
pub struct BuildHistory {
    /// Job name.
    pub job: String,
    /// Builds.
    pub builds: Vec<HistoryRow>,
    #[serde(skip)]
    now: DateTime<Utc>,
}

impl TableDisplay for BuildHistory {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        for row in &self.builds {
            let duration = millis(row.duration).map_or_else(|| "-".into(), format_duration);
            writeln!(
                writer,
                "{:>4} {:<10} {:>10}  {}  {}",
                row.number,
                row.result.as_deref().unwrap_or("RUNNING"),
                duration,
                format_epoch_millis(row.timestamp, self.now),
                row.labels.join(" ")
            )?;
        }
        Ok(())
    }
}

/// All-builds command executor.
pub struct BuildsCommand<'a, T, C> {
    session: &'a Session<T, C>,
}

impl<'a, T: Transport + Clone, C: Clock + Clone> BuildsCommand<'a, T, C> {
    /// Create a new all-builds command.
    #[must_use]
    pub const fn new(session: &'a Session<T, C>) -> Self {
        Self { session }
    }

    /// Print every build of the job.
    ///
    /// # Errors
    ///
    /// Returns an error if a request or write fails.
    pub async fn execute<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        cli: &Cli,
    ) -> Result<(), CliError> {
        let selector = selector(cli)?;
        let client = self.session.client();
        let job = client.job(&selector.job).await?;
        let history = client.job_builds(&selector.job).await?;
        let permalinks = job.symbolic_builds();

        let builds = history
            .builds
            .into_iter()
            .rev()
            .map(|b| HistoryRow {
                labels: permalinks
                    .iter()
                    .filter(|(_, n)| *n == b.number)
                    .map(|(s, _)| s.api_name())
                    .collect(),
                number: b.number,
                result: b.result,
                duration: b.duration,
                timestamp: b.timestamp,
            })
            .collect();

        format.write(
            writer,
            &BuildHistory {
                job: selector.job,
                builds,
                now: Utc::now(),
            },
        )
    }
}
