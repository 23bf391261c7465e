//! Completion Poller: wait for a build to reach a terminal state.
//!
//! Polls start fast and slow down geometrically ([`BackoffPolicy`]) so short
//! builds report quickly and long builds cost few requests. Without an
//! explicit timeout the limit is derived from the server's estimate:
//! `max(estimate * safety_factor, floor)`, or just `floor` when there is no
//! usable estimate. Polling is read-only; giving up never touches the build.

use std::time::{Duration, Instant};

use jenkins_proto::{Artifact, BuildHandle, BuildResponse, BuildResult, BuildState};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::backoff::{Backoff, BackoffPolicy};
use crate::client::JenkinsClient;
use crate::clock::{Clock, pause};
use crate::error::{ClientError, exit};
use crate::transport::Transport;

/// How long to wait for a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitTimeout {
    /// Derive from the server's estimate.
    #[default]
    Auto,
    /// Fixed limit.
    Explicit(Duration),
}

impl WaitTimeout {
    /// Timeout from a user-supplied number of seconds.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] for zero or negative values.
    pub fn from_secs(secs: i64) -> Result<Self, ClientError> {
        u64::try_from(secs)
            .ok()
            .filter(|&s| s > 0)
            .map(|s| Self::Explicit(Duration::from_secs(s)))
            .ok_or_else(|| ClientError::Config(format!("timeout must be positive, got {secs}s")))
    }
}

/// Poll policy and timeout derivation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaitConfig {
    /// Interval growth between polls.
    pub backoff: BackoffPolicy,
    /// Multiplier applied to the server's estimate.
    pub safety_factor: f64,
    /// Lower bound on a derived timeout.
    pub floor: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffPolicy::default(),
            safety_factor: 3.0,
            floor: Duration::from_secs(60),
        }
    }
}

impl WaitConfig {
    /// Check the policy.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] for an invalid back-off, a
    /// non-positive safety factor or a zero floor.
    pub fn validate(&self) -> Result<(), ClientError> {
        self.backoff.validate()?;
        if !self.safety_factor.is_finite() || self.safety_factor <= 0.0 {
            return Err(ClientError::Config(format!(
                "safety factor must be positive, got {}",
                self.safety_factor
            )));
        }
        if self.floor.is_zero() {
            return Err(ClientError::Config("timeout floor must be positive".into()));
        }
        Ok(())
    }

    /// `max(estimate * safety_factor, floor)`, or `floor` without an estimate.
    #[must_use]
    pub fn computed_timeout(&self, estimate: Option<Duration>) -> Duration {
        estimate
            .filter(|d| !d.is_zero())
            .map_or(self.floor, |d| {
                Duration::try_from_secs_f64(d.as_secs_f64() * self.safety_factor)
                    .unwrap_or(Duration::MAX)
                    .max(self.floor)
            })
    }

    /// The timeout that applies to a wait.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] for an explicit zero timeout.
    pub fn resolve_timeout(
        &self,
        timeout: WaitTimeout,
        estimate: Option<Duration>,
    ) -> Result<Duration, ClientError> {
        match timeout {
            WaitTimeout::Explicit(d) if d.is_zero() => {
                Err(ClientError::Config("timeout must be positive".into()))
            }
            WaitTimeout::Explicit(d) => Ok(d),
            WaitTimeout::Auto => Ok(self.computed_timeout(estimate)),
        }
    }
}

/// Snapshot handed to a [`ProgressSink`] after each poll.
#[derive(Debug, Clone, Copy)]
pub struct Progress<'a> {
    /// Build being waited on.
    pub build: &'a BuildHandle,
    /// Time since the wait started.
    pub elapsed: Duration,
    /// Server estimate, if any.
    pub estimated: Option<Duration>,
    /// Timeout in force.
    pub timeout: Duration,
    /// State seen by this poll.
    pub state: BuildState,
}

/// Receives one [`Progress`] per poll.
pub trait ProgressSink: Send {
    /// Called after every poll.
    fn on_poll(&mut self, progress: &Progress<'_>);
}

/// Sink that discards progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_poll(&mut self, _progress: &Progress<'_>) {}
}

/// A finished build.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildOutcome {
    /// The build.
    pub handle: BuildHandle,
    /// Terminal result.
    pub result: BuildResult,
    /// Recorded duration.
    pub duration: Option<Duration>,
    /// Archived artifacts.
    pub artifacts: Vec<Artifact>,
}

impl BuildOutcome {
    pub(crate) fn new(handle: BuildHandle, result: BuildResult, build: BuildResponse) -> Self {
        Self {
            handle,
            result,
            duration: build.elapsed(),
            artifacts: build.artifacts,
        }
    }

    /// Terminal state.
    #[must_use]
    pub fn state(&self) -> BuildState {
        BuildState::from(&self.result)
    }

    /// `SUCCESS` 0, `FAILURE` 1, `ABORTED` 2, anything else 3.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self.result {
            BuildResult::Success => exit::SUCCESS,
            BuildResult::Failure => exit::FAILURE,
            BuildResult::Aborted => exit::ABORTED,
            BuildResult::Unknown(_) => exit::UNKNOWN,
        }
    }
}

/// Elapsed time, timeout and interval bookkeeping for one wait.
///
/// The timeout is fixed at the first observed poll, because that is where
/// the server's estimate becomes known.
#[derive(Debug)]
pub struct WaitBudget {
    handle: BuildHandle,
    config: WaitConfig,
    requested: WaitTimeout,
    timeout: Option<Duration>,
    started: Instant,
    intervals: Backoff,
}

impl WaitBudget {
    /// Start a wait at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] for an invalid policy or an explicit
    /// zero timeout, before any request is made.
    pub fn start(
        handle: BuildHandle,
        config: WaitConfig,
        requested: WaitTimeout,
        now: Instant,
    ) -> Result<Self, ClientError> {
        config.validate()?;
        if let WaitTimeout::Explicit(_) = requested {
            config.resolve_timeout(requested, None)?;
        }
        Ok(Self {
            handle,
            config,
            requested,
            timeout: None,
            started: now,
            intervals: config.backoff.intervals(),
        })
    }

    /// Record a poll and report it; returns the timeout in force.
    pub fn observe(
        &mut self,
        build: &BuildResponse,
        now: Instant,
        sink: &mut dyn ProgressSink,
    ) -> Result<Duration, ClientError> {
        let timeout = match self.timeout {
            Some(t) => t,
            None => {
                let t = self.config.resolve_timeout(self.requested, build.estimated())?;
                debug!(build = %self.handle, timeout_secs = t.as_secs(), "wait timeout resolved");
                *self.timeout.get_or_insert(t)
            }
        };
        sink.on_poll(&Progress {
            build: &self.handle,
            elapsed: self.elapsed(now),
            estimated: build.estimated(),
            timeout,
            state: build.state(),
        });
        Ok(timeout)
    }

    /// Time since the wait started.
    #[must_use]
    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started)
    }

    /// Delay before the next poll.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Timeout`] once the timeout has elapsed.
    pub fn next_delay(&mut self, now: Instant) -> Result<Duration, ClientError> {
        let timeout = self.timeout.unwrap_or(self.config.floor);
        let elapsed = self.elapsed(now);
        if elapsed >= timeout {
            return Err(ClientError::Timeout {
                build: self.handle.clone(),
                timeout,
            });
        }
        Ok(self.intervals.next_interval().min(timeout - elapsed))
    }

    /// The first interval of the policy.
    #[must_use]
    pub const fn initial_interval(&self) -> Duration {
        self.config.backoff.initial
    }
}

/// Waits for builds to finish.
#[derive(Debug)]
pub struct CompletionPoller<'a, T, C> {
    client: &'a JenkinsClient<T>,
    clock: &'a C,
    config: WaitConfig,
}

impl<'a, T: Transport, C: Clock> CompletionPoller<'a, T, C> {
    /// Create a poller.
    pub const fn new(client: &'a JenkinsClient<T>, clock: &'a C, config: WaitConfig) -> Self {
        Self {
            client,
            clock,
            config,
        }
    }

    /// One status read.
    pub async fn poll_once(&self, handle: &BuildHandle) -> Result<BuildResponse, ClientError> {
        self.client.build(handle).await
    }

    /// Poll until the build is terminal.
    ///
    /// # Errors
    ///
    /// [`ClientError::Timeout`] if the build is still running when the
    /// timeout elapses, [`ClientError::Interrupted`] on cancellation,
    /// [`ClientError::Config`] for an invalid policy or timeout, or any
    /// request error.
    pub async fn await_completion(
        &self,
        handle: &BuildHandle,
        timeout: WaitTimeout,
        sink: &mut dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<BuildOutcome, ClientError> {
        let mut budget = WaitBudget::start(handle.clone(), self.config, timeout, self.clock.now())?;

        loop {
            if cancel.is_cancelled() {
                return Err(ClientError::Interrupted);
            }
            let build = self.poll_once(handle).await?;
            budget.observe(&build, self.clock.now(), sink)?;
            if let Some(result) = build.terminal_result() {
                info!(build = %handle, result = %result, "build finished");
                return Ok(BuildOutcome::new(handle.clone(), result, build));
            }
            let delay = budget.next_delay(self.clock.now())?;
            pause(self.clock, delay, cancel).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeTransport, ManualClock, finished, running};
    use crate::transport::Method;
    use jenkins_proto::BuildNumber;
    use proptest::prelude::*;
    use test_case::test_case;

    const BUILD: &str = "job/demo/7/api/json";

    fn handle() -> BuildHandle {
        BuildHandle::new("demo", BuildNumber::new(7).expect("valid"))
    }

    #[derive(Default)]
    struct Recorder(Vec<(Duration, BuildState)>);

    impl ProgressSink for Recorder {
        fn on_poll(&mut self, progress: &Progress<'_>) {
            self.0.push((progress.elapsed, progress.state));
        }
    }

    #[test_case(Some(100), 300 ; "estimate times factor")]
    #[test_case(Some(10), 60 ; "floor wins over small estimate")]
    #[test_case(None, 60 ; "missing estimate uses floor")]
    #[test_case(Some(0), 60 ; "zero estimate uses floor")]
    fn computed_timeout(estimate_secs: Option<u64>, expected_secs: u64) {
        let config = WaitConfig::default();
        let timeout = config.computed_timeout(estimate_secs.map(Duration::from_secs));
        assert_eq!(timeout, Duration::from_secs(expected_secs));
    }

    #[test_case(0 ; "zero")]
    #[test_case(-5 ; "negative")]
    fn non_positive_timeout_is_config_error(secs: i64) {
        assert!(matches!(WaitTimeout::from_secs(secs), Err(ClientError::Config(_))));
    }

    #[tokio::test]
    async fn explicit_zero_timeout_fails_before_polling() {
        let fake = FakeTransport::new().get(BUILD, running(7, 1000));
        let client = JenkinsClient::new(fake.clone());
        let clock = ManualClock::new();
        let err = CompletionPoller::new(&client, &clock, WaitConfig::default())
            .await_completion(
                &handle(),
                WaitTimeout::Explicit(Duration::ZERO),
                &mut NoProgress,
                &CancellationToken::new(),
            )
            .await
            .expect_err("config error");
        assert!(matches!(err, ClientError::Config(_)));
        assert!(fake.requests().is_empty());
    }

    #[tokio::test]
    async fn invalid_policy_fails_before_polling() {
        let fake = FakeTransport::new().get(BUILD, running(7, 1000));
        let client = JenkinsClient::new(fake.clone());
        let clock = ManualClock::new();
        let config = WaitConfig {
            safety_factor: -1.0,
            ..WaitConfig::default()
        };
        let err = CompletionPoller::new(&client, &clock, config)
            .await_completion(&handle(), WaitTimeout::Auto, &mut NoProgress, &CancellationToken::new())
            .await
            .expect_err("config error");
        assert!(matches!(err, ClientError::Config(_)));
        assert!(fake.requests().is_empty());
    }

    #[tokio::test]
    async fn waits_with_growing_intervals() {
        let fake = FakeTransport::new().on(
            Method::Get,
            BUILD,
            vec![running(7, 90_000), running(7, 90_000), running(7, 90_000), finished(7, "FAILURE")],
        );
        let client = JenkinsClient::new(fake.clone());
        let clock = ManualClock::new();
        let mut recorder = Recorder::default();
        let outcome = CompletionPoller::new(&client, &clock, WaitConfig::default())
            .await_completion(&handle(), WaitTimeout::Auto, &mut recorder, &CancellationToken::new())
            .await
            .expect("should finish");

        assert_eq!(outcome.result, BuildResult::Failure);
        assert_eq!(outcome.exit_code(), 1);
        assert_eq!(outcome.duration, Some(Duration::from_millis(4200)));
        assert_eq!(
            clock.sleeps(),
            vec![
                Duration::from_millis(1000),
                Duration::from_millis(1500),
                Duration::from_millis(2250)
            ]
        );
        let states: Vec<_> = recorder.0.iter().map(|(_, s)| *s).collect();
        assert_eq!(
            states,
            vec![BuildState::Running, BuildState::Running, BuildState::Running, BuildState::Failure]
        );
        assert_eq!(fake.post_count(), 0);
    }

    #[tokio::test]
    async fn times_out_at_computed_limit() {
        // estimate 10s -> timeout is the 60s floor
        let fake = FakeTransport::new().get(BUILD, running(7, 10_000));
        let client = JenkinsClient::new(fake.clone());
        let clock = ManualClock::new();
        let err = CompletionPoller::new(&client, &clock, WaitConfig::default())
            .await_completion(&handle(), WaitTimeout::Auto, &mut NoProgress, &CancellationToken::new())
            .await
            .expect_err("timeout");
        assert!(matches!(err, ClientError::Timeout { timeout, .. } if timeout == Duration::from_secs(60)));
        assert_eq!(clock.elapsed(), Duration::from_secs(60));
        assert_eq!(fake.post_count(), 0);
    }

    #[tokio::test]
    async fn unknown_result_maps_to_exit_three() {
        let fake = FakeTransport::new().get(BUILD, finished(7, "UNSTABLE"));
        let client = JenkinsClient::new(fake);
        let clock = ManualClock::new();
        let outcome = CompletionPoller::new(&client, &clock, WaitConfig::default())
            .await_completion(&handle(), WaitTimeout::Auto, &mut NoProgress, &CancellationToken::new())
            .await
            .expect("should finish");
        assert_eq!(outcome.state(), BuildState::Unknown);
        assert_eq!(outcome.exit_code(), 3);
    }

    proptest! {
        #[test]
        fn computed_timeout_is_max_of_scaled_estimate_and_floor(
            estimate_ms in 1u64..10_000_000,
            factor in 0.1f64..10.0,
            floor_s in 1u64..3_600,
        ) {
            let config = WaitConfig {
                safety_factor: factor,
                floor: Duration::from_secs(floor_s),
                ..WaitConfig::default()
            };
            let estimate = Duration::from_millis(estimate_ms);
            let timeout = config.computed_timeout(Some(estimate));
            let scaled = estimate.as_secs_f64() * factor;
            let expected = scaled.max(floor_s as f64);
            prop_assert!((timeout.as_secs_f64() - expected).abs() < 1e-6);
        }
    }
}
