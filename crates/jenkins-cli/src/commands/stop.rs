//! Stop a build and cancel queued items.

use std::io::Write;

use jenkins_client::{Clock, Transport};
use jenkins_proto::{BuildId, QueueId, QueueStatus};
use serde::Serialize;
use tracing::debug;

use crate::cli::Cli;
use crate::commands::selector;
use crate::error::CliError;
use crate::output::{OutputFormat, TableDisplay};
use crate::session::Session;

/// What the stop request did.
#[derive(Debug, Clone, Serialize)]
pub struct StopReport {
    /// Job name.
    pub job: String,
    /// Build number or permalink that was stopped.
    pub build: String,
    /// Queue items removed.
    pub cancelled: Vec<QueueId>,
}

impl TableDisplay for StopReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Stop requested for {}/{}", self.job, self.build)?;
        for id in &self.cancelled {
            writeln!(writer, "Cancelled queue item {id}")?;
        }
        Ok(())
    }
}

/// Stop command executor.
pub struct StopCommand<'a, T, C> {
    session: &'a Session<T, C>,
    force: bool,
}

impl<'a, T: Transport + Clone, C: Clock + Clone> StopCommand<'a, T, C> {
    /// Create a new stop command; `force` also empties the job's queue.
    #[must_use]
    pub const fn new(session: &'a Session<T, C>, force: bool) -> Self {
        Self { session, force }
    }

    /// Stop the selected build (default `lastBuild`).
    ///
    /// # Errors
    ///
    /// [`CliError::InvalidArgument`] for a range, or any request failure.
    pub async fn execute<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        cli: &Cli,
    ) -> Result<(), CliError> {
        let selector = selector(cli)?;
        let build = match selector.build_or_last() {
            BuildId::Range { lo, hi } if lo == hi => Some(lo.to_string()),
            id => id.path_segment(),
        }
        .ok_or_else(|| CliError::InvalidArgument(format!("cannot stop a range of builds: {selector}")))?;

        let client = self.session.client();
        client.stop(&selector.job, &build).await?;

        let mut cancelled = Vec::new();
        if self.force {
            let pending = client.queue().await?.items.into_iter().filter(|i| {
                i.job_name() == selector.job && matches!(i.status(), QueueStatus::Pending { .. })
            });
            for item in pending {
                client.cancel_queue_item(item.id).await?;
                cancelled.push(item.id);
            }
            debug!(job = %selector.job, count = cancelled.len(), "queue emptied");
        }

        format.write(
            writer,
            &StopReport {
                job: selector.job,
                build,
                cancelled,
            },
        )
    }
}
