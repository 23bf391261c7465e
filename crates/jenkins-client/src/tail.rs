//! Console Tail Streamer.
//!
//! Console text is fetched from a position in the server's raw log. The raw
//! log still carries console annotations that the returned text has lost, so
//! the next position is the server's `X-Text-Size`, not the chunk length.
//! Without that header the cursor advances by the chunk length. `X-More-Data`
//! tells whether the build may still produce output.

use std::io::Write;
use std::time::Duration;

use bytes::Bytes;
use jenkins_proto::BuildHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::client::JenkinsClient;
use crate::clock::{Clock, pause};
use crate::error::ClientError;
use crate::transport::Transport;

const MORE_DATA: &str = "x-more-data";
const TEXT_SIZE: &str = "x-text-size";

/// Position in a build's console already consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleCursor {
    build: BuildHandle,
    position: u64,
    emitted: u64,
}

impl ConsoleCursor {
    /// Cursor at the start of the console.
    #[must_use]
    pub const fn new(build: BuildHandle) -> Self {
        Self::at(build, 0)
    }

    /// Cursor at server position `position`.
    #[must_use]
    pub const fn at(build: BuildHandle, position: u64) -> Self {
        Self {
            build,
            position,
            emitted: 0,
        }
    }

    /// The build this cursor reads.
    #[must_use]
    pub const fn build(&self) -> &BuildHandle {
        &self.build
    }

    /// Where the next fetch starts in the server's log.
    #[must_use]
    pub const fn position(&self) -> u64 {
        self.position
    }

    /// Text bytes received through this cursor.
    #[must_use]
    pub const fn emitted(&self) -> u64 {
        self.emitted
    }

    fn advanced(&self, len: usize, text_size: Option<u64>) -> Self {
        Self {
            build: self.build.clone(),
            position: text_size.unwrap_or(self.position + len as u64),
            emitted: self.emitted + len as u64,
        }
    }
}

/// Result of one console fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tail {
    /// New bytes, possibly empty.
    pub chunk: Bytes,
    /// Cursor after `chunk`.
    pub cursor: ConsoleCursor,
    /// Whether the server may still append output.
    pub has_more: bool,
}

/// Fetch console output after `cursor`.
pub async fn tail<T: Transport>(
    client: &JenkinsClient<T>,
    cursor: &ConsoleCursor,
) -> Result<Tail, ClientError> {
    let response = client.progressive_text(&cursor.build, cursor.position).await?;
    let has_more = response
        .header(MORE_DATA)
        .is_some_and(|v| v.eq_ignore_ascii_case("true"));
    let text_size = response.header(TEXT_SIZE).and_then(|s| s.trim().parse::<u64>().ok());
    if text_size.is_none() {
        trace!(build = %cursor.build, "no text size header, advancing by chunk length");
    }
    let next = cursor.advanced(response.body.len(), text_size);
    debug!(
        build = %cursor.build,
        start = cursor.position,
        next = next.position,
        bytes = response.body.len(),
        has_more,
        "console chunk"
    );

    Ok(Tail {
        chunk: response.body,
        cursor: next,
        has_more,
    })
}

/// Write a chunk to `out` and flush it.
pub(crate) fn emit<W: Write>(out: &mut W, chunk: &[u8]) -> Result<(), ClientError> {
    if chunk.is_empty() {
        return Ok(());
    }
    out.write_all(chunk)
        .and_then(|()| out.flush())
        .map_err(|e| ClientError::io("console output", e))
}

/// Stream a console to `out` until the server reports no more data.
///
/// Returns the final cursor.
///
/// # Errors
///
/// [`ClientError::Interrupted`] on cancellation; output already written
/// stays written.
pub async fn follow<T, C, W>(
    client: &JenkinsClient<T>,
    clock: &C,
    interval: Duration,
    mut cursor: ConsoleCursor,
    out: &mut W,
    cancel: &CancellationToken,
) -> Result<ConsoleCursor, ClientError>
where
    T: Transport,
    C: Clock,
    W: Write + Send,
{
    loop {
        if cancel.is_cancelled() {
            return Err(ClientError::Interrupted);
        }
        let next = tail(client, &cursor).await?;
        emit(out, &next.chunk)?;
        cursor = next.cursor;
        if !next.has_more {
            return Ok(cursor);
        }
        pause(clock, interval, cancel).await?;
    }
}
