//! Server-wide listings: jobs, queue and nodes.

use std::io::Write;

use chrono::{DateTime, Utc};
use jenkins_client::{Clock, Transport};
use jenkins_proto::{QueueId, short_class_name};
use serde::Serialize;

use crate::cli::Cli;
use crate::error::CliError;
use crate::output::{OutputFormat, TableDisplay, format_timestamp, truncate_why};
use crate::session::Session;

/// Queue item kinds worth showing; `Left` items already became builds.
const PENDING_KINDS: [&str; 3] = ["Waiting", "Blocked", "Buildable"];

/// Which listing to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listing {
    /// Top-level jobs.
    Jobs,
    /// Pending queue items, optionally for one job.
    Queue,
    /// Build nodes, optionally matching a name or label.
    Nodes,
}

/// A job row.
#[derive(Debug, Clone, Serialize)]
pub struct JobRow {
    /// Job name.
    pub name: String,
    /// Short class name.
    pub kind: String,
}

/// Jobs listing.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct JobList {
    rows: Vec<JobRow>,
    #[serde(skip)]
    verbose: bool,
}

impl TableDisplay for JobList {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        for row in &self.rows {
            if self.verbose {
                writeln!(writer, "{:<40} {}", row.name, row.kind)?;
            } else {
                writeln!(writer, "{}", row.name)?;
            }
        }
        Ok(())
    }
}

/// A queue row.
#[derive(Debug, Clone, Serialize)]
pub struct QueueRow {
    /// Queue item id.
    pub id: QueueId,
    /// `Waiting`, `Blocked` or `Buildable`.
    pub kind: String,
    /// Job the item belongs to.
    pub job: String,
    /// Time the item entered the queue.
    pub since: Option<DateTime<Utc>>,
    /// Server-provided reason.
    pub why: Option<String>,
}

/// Queue listing.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct QueueList {
    rows: Vec<QueueRow>,
    #[serde(skip)]
    now: DateTime<Utc>,
}

impl TableDisplay for QueueList {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        for (index, row) in self.rows.iter().enumerate() {
            let since = row
                .since
                .map_or_else(|| "-".into(), |at| format_timestamp(at, self.now));
            writeln!(
                writer,
                "{:>3} {:<9} {} (id {})  since {since}",
                index + 1,
                row.kind,
                row.job,
                row.id
            )?;
            if let Some(why) = row.why.as_deref() {
                writeln!(writer, "    {}", truncate_why(why))?;
            }
        }
        Ok(())
    }
}

/// A node row.
#[derive(Debug, Clone, Serialize)]
pub struct NodeRow {
    /// Display name.
    pub name: String,
    /// Short kind.
    pub kind: String,
    /// No executor busy.
    pub idle: bool,
    /// Executor count.
    pub executors: u32,
    /// Disconnected or marked offline.
    pub offline: bool,
    /// Space-separated labels.
    pub labels: String,
    /// Description.
    pub description: Option<String>,
}

/// Nodes listing.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct NodeList {
    rows: Vec<NodeRow>,
}

impl TableDisplay for NodeList {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        for row in &self.rows {
            writeln!(
                writer,
                "{:<8} {:<4} {:>2} {:<7} {:<20} [{}]  {}",
                row.kind,
                if row.idle { "idle" } else { "busy" },
                row.executors,
                if row.offline { "offline" } else { "online" },
                row.name,
                row.labels,
                row.description.as_deref().unwrap_or_default()
            )?;
        }
        Ok(())
    }
}

/// Listing command executor.
pub struct ListCommand<'a, T, C> {
    session: &'a Session<T, C>,
    listing: Listing,
}

impl<'a, T: Transport + Clone, C: Clock + Clone> ListCommand<'a, T, C> {
    /// Create a new listing command.
    #[must_use]
    pub const fn new(session: &'a Session<T, C>, listing: Listing) -> Self {
        Self { session, listing }
    }

    /// Print the listing. The `JOB` argument, when given, filters it.
    ///
    /// # Errors
    ///
    /// Returns an error if the request or write fails.
    pub async fn execute<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        cli: &Cli,
    ) -> Result<(), CliError> {
        let client = self.session.client();
        let filter = cli.target.as_deref();
        match self.listing {
            Listing::Jobs => {
                let rows = client
                    .jobs()
                    .await?
                    .jobs
                    .into_iter()
                    .filter(|j| filter.is_none_or(|f| j.name.contains(f)))
                    .map(|j| JobRow {
                        kind: short_class_name(j.class.as_deref().unwrap_or_default()).to_string(),
                        name: j.name,
                    })
                    .collect();
                format.write(
                    writer,
                    &JobList {
                        rows,
                        verbose: cli.verbose > 0,
                    },
                )
            }
            Listing::Queue => {
                let rows = client
                    .queue()
                    .await?
                    .items
                    .into_iter()
                    .filter(|i| PENDING_KINDS.contains(&i.kind().as_str()))
                    .filter(|i| filter.is_none_or(|f| i.job_name() == f))
                    .map(|i| QueueRow {
                        kind: i.kind(),
                        job: i.job_name().to_string(),
                        since: i.queued_at(),
                        id: i.id,
                        why: i.why,
                    })
                    .collect();
                format.write(
                    writer,
                    &QueueList {
                        rows,
                        now: Utc::now(),
                    },
                )
            }
            Listing::Nodes => {
                let rows = client
                    .computers()
                    .await?
                    .computer
                    .into_iter()
                    .filter(|c| filter.is_none_or(|f| c.matches(f)))
                    .map(|c| NodeRow {
                        kind: c.kind(),
                        labels: c.labels(),
                        name: c.display_name,
                        idle: c.idle,
                        executors: c.num_executors,
                        offline: c.offline,
                        description: c.description,
                    })
                    .collect();
                format.write(writer, &NodeList { rows })
            }
        }
    }
}
