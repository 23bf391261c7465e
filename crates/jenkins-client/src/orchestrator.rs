//! Build lifecycle orchestration.
//!
//! ```text
//! Idle -> Triggered -> Correlating -> Waiting <-> Tailing -> Terminal -> Done
//! ```
//!
//! Each wait cycle fetches new console output (when requested) and then
//! polls the build once. Cancellation is checked between requests, never
//! during one, and output already written stays written.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use jenkins_proto::{BuildHandle, QueueId, TriggerParams};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::artifacts::download_artifacts;
use crate::client::JenkinsClient;
use crate::clock::{Clock, pause};
use crate::correlate::{CorrelationConfig, Correlator};
use crate::error::{ClientError, exit};
use crate::poller::{BuildOutcome, ProgressSink, WaitBudget, WaitConfig, WaitTimeout};
use crate::tail::{ConsoleCursor, emit, tail};
use crate::transport::Transport;

/// Console fetches allowed after the build finished while the server still
/// reports more data.
const MAX_DRAIN_FETCHES: usize = 10;

/// Lifecycle position of an orchestrated build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing sent yet.
    Idle,
    /// Trigger accepted; a queue item exists.
    Triggered,
    /// Waiting for the queue item to become a build.
    Correlating,
    /// Polling build status.
    Waiting,
    /// Fetching console output.
    Tailing,
    /// Terminal state observed.
    Terminal,
    /// Finished.
    Done,
}

/// What to do after a build is started.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Wait for completion.
    pub wait: bool,
    /// Stream console output while waiting; implies `wait`.
    pub console: bool,
    /// Wait limit.
    pub timeout: WaitTimeout,
    /// Download artifacts of a successful build here; implies `wait`.
    pub artifacts_dir: Option<PathBuf>,
}

impl RunOptions {
    /// Whether the build is followed to completion.
    #[must_use]
    pub const fn waits(&self) -> bool {
        self.wait || self.console || self.artifacts_dir.is_some()
    }
}

/// Result of an orchestrated run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    /// The build.
    pub handle: BuildHandle,
    /// Queue item it came from, when this run triggered it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_id: Option<QueueId>,
    /// Terminal state, when the run waited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished: Option<BuildOutcome>,
    /// Downloaded artifact files.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub saved_artifacts: Vec<PathBuf>,
}

impl RunOutcome {
    /// 0 for a build that was only started, otherwise the build's code.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        self.finished
            .as_ref()
            .map_or(exit::SUCCESS, BuildOutcome::exit_code)
    }
}

/// Drives trigger, correlation, waiting and tailing for one build.
#[derive(Debug)]
pub struct Orchestrator<T, C> {
    client: JenkinsClient<T>,
    clock: C,
    correlation: CorrelationConfig,
    wait: WaitConfig,
    cancel: CancellationToken,
    phase: Phase,
}

impl<T: Transport, C: Clock> Orchestrator<T, C> {
    /// Orchestrator with default polling policies.
    pub fn new(client: JenkinsClient<T>, clock: C, cancel: CancellationToken) -> Self {
        Self {
            client,
            clock,
            correlation: CorrelationConfig::default(),
            wait: WaitConfig::default(),
            cancel,
            phase: Phase::Idle,
        }
    }

    /// Replace the correlation policy.
    #[must_use]
    pub fn with_correlation(mut self, config: CorrelationConfig) -> Self {
        self.correlation = config;
        self
    }

    /// Replace the wait policy.
    #[must_use]
    pub fn with_wait(mut self, config: WaitConfig) -> Self {
        self.wait = config;
        self
    }

    /// Current phase.
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// The endpoint client.
    pub const fn client(&self) -> &JenkinsClient<T> {
        &self.client
    }

    fn enter(&mut self, next: Phase) {
        if self.phase != next {
            debug!(from = ?self.phase, to = ?next, "phase transition");
            self.phase = next;
        }
    }

    fn check_options(&self, options: &RunOptions) -> Result<(), ClientError> {
        self.correlation.validate()?;
        if options.waits() {
            self.wait.validate()?;
            if let WaitTimeout::Explicit(_) = options.timeout {
                self.wait.resolve_timeout(options.timeout, None)?;
            }
        }
        Ok(())
    }

    /// Start a build of `job` and follow it as `options` ask.
    ///
    /// Invalid options fail before the trigger is sent. A rejected trigger
    /// fails without polling. `open_out` is called with the new build only
    /// when the run waits, and receives its console output.
    ///
    /// # Errors
    ///
    /// Any [`ClientError`] from the phases or from `open_out`;
    /// [`ClientError::Interrupted`] on cancellation.
    pub async fn run<O, F>(
        &mut self,
        job: &str,
        params: &TriggerParams,
        options: &RunOptions,
        open_out: F,
        sink: &mut dyn ProgressSink,
    ) -> Result<RunOutcome, ClientError>
    where
        O: Write + Send,
        F: FnOnce(&BuildHandle) -> Result<O, ClientError>,
    {
        let (queue_id, handle) = self.start(job, params, options).await?;

        let mut outcome = if options.waits() {
            let mut out = open_out(&handle)?;
            self.follow(&handle, options, &mut out, sink).await?
        } else {
            info!(build = %handle, "build started");
            RunOutcome {
                handle,
                queue_id: None,
                finished: None,
                saved_artifacts: Vec::new(),
            }
        };
        outcome.queue_id = Some(queue_id);
        self.enter(Phase::Done);
        Ok(outcome)
    }

    /// Trigger a build of `job` and wait until it has a number.
    ///
    /// `options` are validated first so a bad wait policy never leaves a
    /// build started behind.
    ///
    /// # Errors
    ///
    /// Configuration, trigger and correlation failures.
    pub async fn start(
        &mut self,
        job: &str,
        params: &TriggerParams,
        options: &RunOptions,
    ) -> Result<(QueueId, BuildHandle), ClientError> {
        self.phase = Phase::Idle;
        self.check_options(options)?;

        let queue_id = self.client.trigger(job, params).await?;
        self.enter(Phase::Triggered);

        self.enter(Phase::Correlating);
        let handle = Correlator::new(&self.client, &self.clock, self.correlation)
            .correlate(job, queue_id, &self.cancel)
            .await?;
        Ok((queue_id, handle))
    }

    /// Follow an already started build as `options` ask.
    ///
    /// # Errors
    ///
    /// Same as [`Self::run`] minus the trigger and queue failures.
    pub async fn watch<W: Write + Send>(
        &mut self,
        handle: &BuildHandle,
        options: &RunOptions,
        out: &mut W,
        sink: &mut dyn ProgressSink,
    ) -> Result<RunOutcome, ClientError> {
        self.check_options(options)?;
        let outcome = self.follow(handle, options, out, sink).await?;
        self.enter(Phase::Done);
        Ok(outcome)
    }

    async fn follow<W: Write + Send>(
        &mut self,
        handle: &BuildHandle,
        options: &RunOptions,
        out: &mut W,
        sink: &mut dyn ProgressSink,
    ) -> Result<RunOutcome, ClientError> {
        let mut budget = WaitBudget::start(handle.clone(), self.wait, options.timeout, self.clock.now())?;
        let mut cursor = options.console.then(|| ConsoleCursor::new(handle.clone()));
        let mut more = false;

        let finished = loop {
            if let Some(current) = cursor.take() {
                self.check_cancel()?;
                self.enter(Phase::Tailing);
                let next = tail(&self.client, &current).await?;
                emit(out, &next.chunk)?;
                more = next.has_more;
                cursor = Some(next.cursor);
            }

            self.check_cancel()?;
            self.enter(Phase::Waiting);
            let build = self.client.build(handle).await?;
            budget.observe(&build, self.clock.now(), sink)?;
            if let Some(result) = build.terminal_result() {
                self.enter(Phase::Terminal);
                info!(build = %handle, result = %result, "build finished");
                break BuildOutcome::new(handle.clone(), result, build);
            }

            let delay = budget.next_delay(self.clock.now())?;
            pause(&self.clock, delay, &self.cancel).await?;
        };

        if let Some(current) = cursor {
            if more {
                self.drain(current, budget.initial_interval(), out).await?;
            }
        }

        let saved_artifacts = match &options.artifacts_dir {
            Some(dir) if finished.result.is_success() => {
                self.check_cancel()?;
                download_artifacts(&self.client, handle, &finished.artifacts, dir).await?
            }
            Some(_) => {
                warn!(build = %handle, result = %finished.result, "build did not succeed; skipping artifacts");
                Vec::new()
            }
            None => Vec::new(),
        };

        Ok(RunOutcome {
            handle: handle.clone(),
            queue_id: None,
            finished: Some(finished),
            saved_artifacts,
        })
    }

    /// Fetch the console tail written after the last poll.
    async fn drain<W: Write + Send>(
        &mut self,
        mut cursor: ConsoleCursor,
        interval: Duration,
        out: &mut W,
    ) -> Result<(), ClientError> {
        for attempt in 1..=MAX_DRAIN_FETCHES {
            self.check_cancel()?;
            let next = tail(&self.client, &cursor).await?;
            emit(out, &next.chunk)?;
            cursor = next.cursor;
            if !next.has_more {
                return Ok(());
            }
            if attempt < MAX_DRAIN_FETCHES {
                pause(&self.clock, interval, &self.cancel).await?;
            }
        }
        warn!(build = %cursor.build(), position = cursor.position(), "console still reports more data after the build finished");
        Ok(())
    }

    fn check_cancel(&self) -> Result<(), ClientError> {
        if self.cancel.is_cancelled() {
            info!(phase = ?self.phase, "interrupted");
            return Err(ClientError::Interrupted);
        }
        Ok(())
    }
}
