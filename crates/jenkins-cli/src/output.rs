//! Output formatting for CLI commands.
//!
//! Supports table (human-readable) and JSON output formats. Build console
//! text bypasses this and is written raw.

use std::io::Write;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use jenkins_client::{Progress, ProgressSink};
use serde::Serialize;

use crate::cli::Format;
use crate::error::CliError;

/// Output formatter that handles both table and JSON output.
#[derive(Debug, Clone)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Check if JSON format is selected.
    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self.format, Format::Json)
    }

    /// Write a serializable value to the output.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + TableDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, value)
                    .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
                writeln!(writer)?;
            }
            Format::Table => value.write_table(writer)?,
        }
        Ok(())
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(Format::Table)
    }
}

/// Trait for types that can be displayed as a table.
pub trait TableDisplay {
    /// Write the value in human-readable form.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError>;
}

/// `6d 14h 44m 55s`, `2m 3s`, `0s`. Leading zero units are dropped.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let units = [
        (secs / 86_400, "d"),
        (secs / 3_600 % 24, "h"),
        (secs / 60 % 60, "m"),
        (secs % 60, "s"),
    ];
    let first = units.iter().position(|(v, _)| *v > 0).unwrap_or(units.len() - 1);
    units[first..]
        .iter()
        .map(|(v, unit)| format!("{v}{unit}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Milliseconds as a duration; `None` for zero or negative.
#[must_use]
pub fn millis(ms: i64) -> Option<Duration> {
    u64::try_from(ms)
        .ok()
        .filter(|&ms| ms > 0)
        .map(Duration::from_millis)
}

/// `2024-03-01 12:00:00 (5m 0s ago)` in local time.
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let ago = (now - at).to_std().unwrap_or_default();
    format!(
        "{} ({} ago)",
        at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
        format_duration(ago)
    )
}

/// Epoch milliseconds rendered with [`format_timestamp`], or `-`.
#[must_use]
pub fn format_epoch_millis(ms: i64, now: DateTime<Utc>) -> String {
    if ms <= 0 {
        return "-".into();
    }
    DateTime::from_timestamp_millis(ms).map_or_else(|| "-".into(), |at| format_timestamp(at, now))
}

const WHY_LIMIT: usize = 70;
const WHY_KEEP: usize = 60;
const WHY_MIN_CUT: usize = 12;

/// Shorten a queue "why" text to about 70 characters.
///
/// Texts only a little too long are kept whole; cutting them would save
/// less than the marker costs.
#[must_use]
pub fn truncate_why(why: &str) -> String {
    let len = why.chars().count();
    let over = len.saturating_sub(WHY_KEEP);
    if len <= WHY_LIMIT || over < WHY_MIN_CUT {
        return why.to_string();
    }
    let kept: String = why.chars().take(WHY_KEEP).collect();
    format!("{kept} ... [{over} more]")
}

/// Prints wait progress to stderr, one line per poll.
#[derive(Debug, Default)]
pub struct StderrProgress;

impl ProgressSink for StderrProgress {
    fn on_poll(&mut self, progress: &Progress<'_>) {
        let estimated = progress
            .estimated
            .map_or_else(|| "unknown".into(), format_duration);
        eprintln!(
            "Waiting for build {}: {} elapsed, estimated {estimated}, timeout {}, {}",
            progress.build,
            format_duration(progress.elapsed),
            format_duration(progress.timeout),
            progress.state
        );
    }
}
