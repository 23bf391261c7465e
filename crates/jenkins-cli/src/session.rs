//! Per-invocation server session.

use jenkins_client::{
    Clock, HttpTransport, JenkinsClient, Orchestrator, SystemClock, Transport,
};
use jenkins_proto::{BuildHandle, BuildId, BuildNumber, JobSelector};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::Settings;
use crate::error::CliError;

/// Client, settings and cancellation shared by every command.
#[derive(Debug)]
pub struct Session<T = HttpTransport, C = SystemClock> {
    client: JenkinsClient<T>,
    clock: C,
    settings: Settings,
    cancel: CancellationToken,
}

impl Session {
    /// Connect to the configured server.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be configured.
    pub fn connect(settings: Settings, cancel: CancellationToken) -> Result<Self, CliError> {
        let transport = HttpTransport::builder(settings.url.clone())
            .credentials(settings.credentials.clone())
            .timeout(settings.request_timeout)
            .check_certificate(settings.check_certificate)
            .build()?;
        debug!(url = %transport.base_url(), "session ready");
        Ok(Self::new(JenkinsClient::new(transport), SystemClock, settings, cancel))
    }
}

impl<T: Transport + Clone, C: Clock + Clone> Session<T, C> {
    /// Session over an existing client.
    pub const fn new(
        client: JenkinsClient<T>,
        clock: C,
        settings: Settings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            clock,
            settings,
            cancel,
        }
    }

    /// The endpoint client.
    pub const fn client(&self) -> &JenkinsClient<T> {
        &self.client
    }

    /// The clock used for waiting.
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    /// Resolved settings.
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Token tripped by Ctrl-C.
    pub const fn cancel(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Orchestrator configured from the settings.
    pub fn orchestrator(&self) -> Orchestrator<T, C> {
        Orchestrator::new(self.client.clone(), self.clock.clone(), self.cancel.clone())
            .with_correlation(self.settings.correlation)
            .with_wait(self.settings.wait)
    }

    /// Resolve a selector to one numbered build; symbolic ids cost a request.
    ///
    /// # Errors
    ///
    /// [`CliError::InvalidArgument`] for a range, or the lookup failure.
    pub async fn resolve(&self, selector: &JobSelector) -> Result<BuildHandle, CliError> {
        match selector.build_or_last() {
            BuildId::Number(number) => Ok(BuildHandle::new(selector.job.clone(), number)),
            BuildId::Range { lo, hi } if lo == hi => Ok(BuildHandle::new(selector.job.clone(), lo)),
            BuildId::Range { .. } => Err(CliError::InvalidArgument(format!(
                "{selector} selects several builds; this action needs one"
            ))),
            BuildId::Symbolic(symbolic) => {
                let build = self
                    .client
                    .build_info(&selector.job, symbolic.api_name())
                    .await?;
                debug!(job = %selector.job, %symbolic, number = %build.number, "resolved permalink");
                Ok(BuildHandle::new(selector.job.clone(), build.number))
            }
        }
    }

    /// Every build a selector covers, resolving a permalink to its number.
    ///
    /// # Errors
    ///
    /// Returns the lookup failure for a permalink.
    pub async fn resolve_all(&self, selector: &JobSelector) -> Result<Vec<BuildNumber>, CliError> {
        match selector.build_or_last() {
            id @ (BuildId::Number(_) | BuildId::Range { .. }) => Ok(id.numbers().collect()),
            BuildId::Symbolic(_) => Ok(vec![self.resolve(selector).await?.number]),
        }
    }
}
