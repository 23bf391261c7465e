//! Build Correlator: resolve a queue item to the build it became.
//!
//! The queue item is polled at a fixed short interval. The server normally
//! schedules within seconds, so there is no back-off, only a bound on the
//! total wait that is independent of the build timeout.

use std::time::Duration;

use jenkins_proto::{BuildHandle, QueueId, QueueStatus};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::JenkinsClient;
use crate::clock::{Clock, pause};
use crate::error::ClientError;
use crate::transport::Transport;

/// Polling parameters for correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelationConfig {
    /// Delay between queue item polls.
    pub interval: Duration,
    /// Total time allowed for the item to be scheduled.
    pub timeout: Duration,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(120),
        }
    }
}

impl CorrelationConfig {
    /// Check both durations are positive.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] otherwise.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.interval.is_zero() || self.timeout.is_zero() {
            return Err(ClientError::Config(
                "correlation interval and timeout must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Resolves queue items to builds.
#[derive(Debug)]
pub struct Correlator<'a, T, C> {
    client: &'a JenkinsClient<T>,
    clock: &'a C,
    config: CorrelationConfig,
}

impl<'a, T: Transport, C: Clock> Correlator<'a, T, C> {
    /// Create a correlator.
    pub const fn new(client: &'a JenkinsClient<T>, clock: &'a C, config: CorrelationConfig) -> Self {
        Self {
            client,
            clock,
            config,
        }
    }

    /// Wait until queue item `id` of `job` is scheduled.
    ///
    /// An item that resolves after `k` pending polls costs exactly `k + 1`
    /// requests.
    ///
    /// # Errors
    ///
    /// [`ClientError::QueueCancelled`] if the item is cancelled,
    /// [`ClientError::CorrelationTimeout`] if it is not scheduled in time,
    /// [`ClientError::Interrupted`] on cancellation, or any request error.
    pub async fn correlate(
        &self,
        job: &str,
        id: QueueId,
        cancel: &CancellationToken,
    ) -> Result<BuildHandle, ClientError> {
        self.config.validate()?;
        let started = self.clock.now();

        loop {
            if cancel.is_cancelled() {
                return Err(ClientError::Interrupted);
            }
            let item = self.client.queue_item(id).await?;
            match item.status() {
                QueueStatus::Scheduled(number) => {
                    let handle = BuildHandle::new(job, number);
                    info!(queue_id = %id, build = %handle, "queue item resolved");
                    return Ok(handle);
                }
                QueueStatus::Cancelled => return Err(ClientError::QueueCancelled(id)),
                QueueStatus::Pending { why } => {
                    debug!(queue_id = %id, why = why.as_deref().unwrap_or(""), "queue item pending");
                }
            }

            let waited = self.clock.now().saturating_duration_since(started);
            if waited >= self.config.timeout {
                return Err(ClientError::CorrelationTimeout { id, waited });
            }
            let delay = self.config.interval.min(self.config.timeout - waited);
            pause(self.clock, delay, cancel).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeTransport, ManualClock, json, queue_pending, queue_scheduled};
    use crate::transport::Method;
    use proptest::prelude::*;

    const ITEM: &str = "queue/item/42/api/json";

    fn scripted(pending: usize) -> FakeTransport {
        let mut responses: Vec<_> = (0..pending).map(|_| queue_pending(42)).collect();
        responses.push(queue_scheduled(42, 7));
        FakeTransport::new().on(Method::Get, ITEM, responses)
    }

    async fn run(fake: &FakeTransport, clock: &ManualClock) -> Result<BuildHandle, ClientError> {
        let client = JenkinsClient::new(fake.clone());
        Correlator::new(&client, clock, CorrelationConfig::default())
            .correlate("demo", QueueId::new(42), &CancellationToken::new())
            .await
    }

    #[tokio::test]
    async fn resolves_immediately() {
        let fake = scripted(0);
        let clock = ManualClock::new();
        let handle = run(&fake, &clock).await.expect("should resolve");
        assert_eq!(handle.to_string(), "demo/7");
        assert_eq!(fake.requests_to(ITEM).len(), 1);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn cancelled_item() {
        let fake = FakeTransport::new().get(
            ITEM,
            json(r#"{"_class":"hudson.model.Queue$LeftItem","id":42,"cancelled":true}"#),
        );
        let err = run(&fake, &ManualClock::new()).await.expect_err("cancelled");
        assert!(matches!(err, ClientError::QueueCancelled(id) if id.get() == 42));
    }

    #[tokio::test]
    async fn times_out_when_never_scheduled() {
        let fake = FakeTransport::new().get(ITEM, queue_pending(42));
        let clock = ManualClock::new();
        let err = run(&fake, &clock).await.expect_err("timeout");
        assert!(matches!(err, ClientError::CorrelationTimeout { .. }));
        assert_eq!(clock.elapsed(), Duration::from_secs(120));
        // one poll at t=0 and one after every second up to the bound
        assert_eq!(fake.requests_to(ITEM).len(), 121);
    }

    #[tokio::test]
    async fn interrupted_before_polling() {
        let fake = scripted(3);
        let client = JenkinsClient::new(fake.clone());
        let clock = ManualClock::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = Correlator::new(&client, &clock, CorrelationConfig::default())
            .correlate("demo", QueueId::new(42), &cancel)
            .await
            .expect_err("interrupted");
        assert!(matches!(err, ClientError::Interrupted));
        assert!(fake.requests().is_empty());
    }

    proptest! {
        #[test]
        fn k_pending_polls_cost_k_plus_one_requests(k in 0usize..40) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("runtime");
            let fake = scripted(k);
            let clock = ManualClock::new();
            let handle = rt.block_on(run(&fake, &clock)).expect("should resolve");
            prop_assert_eq!(handle.number.get(), 7);
            prop_assert_eq!(fake.requests_to(ITEM).len(), k + 1);
            prop_assert_eq!(clock.sleeps().len(), k);
            prop_assert!(clock.sleeps().iter().all(|d| *d == Duration::from_secs(1)));
        }
    }
}
