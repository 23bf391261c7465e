//! Time source for the polling loops.
//!
//! Polling components read time and sleep only through [`Clock`], so tests
//! can drive them with a manual clock instead of real delays.

use std::future::Future;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::ClientError;

/// Monotonic time and sleeping.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Instant;

    /// Sleep for `duration`.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Wall-clock implementation backed by tokio's timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

/// Sleep unless cancelled first.
///
/// Cancellation wins when both are ready, so a cancelled token never lets
/// another poll through.
pub(crate) async fn pause<C: Clock>(
    clock: &C,
    duration: Duration,
    cancel: &CancellationToken,
) -> Result<(), ClientError> {
    if cancel.is_cancelled() {
        return Err(ClientError::Interrupted);
    }
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(ClientError::Interrupted),
        () = clock.sleep(duration) => Ok(()),
    }
}
