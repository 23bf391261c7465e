//! Console text of existing builds.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use jenkins_client::{Clock, ClientError, ConsoleCursor, Transport, follow};
use jenkins_proto::BuildHandle;
use tracing::{info, warn};

use crate::cli::Cli;
use crate::commands::selector;
use crate::error::CliError;
use crate::session::Session;

/// Console destination: the terminal, a log file, or both.
pub struct ConsoleOut<'w, W> {
    screen: Option<&'w mut W>,
    log: Option<File>,
}

impl<'w, W: Write> ConsoleOut<'w, W> {
    /// Open `<log_dir>/<job>-<build>-console.log` when a directory is set.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the directory or file cannot be created.
    pub fn open(
        screen: Option<&'w mut W>,
        log_dir: Option<&Path>,
        build: &BuildHandle,
    ) -> Result<Self, ClientError> {
        let log = match log_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir).map_err(|e| ClientError::io(dir, e))?;
                let path = dir.join(format!("{}-{}-console.log", build.job, build.number));
                let file = File::create(&path).map_err(|e| ClientError::io(&path, e))?;
                info!(path = %path.display(), "writing console log");
                Some(file)
            }
            None => None,
        };
        Ok(Self { screen, log })
    }
}

impl<W: Write> Write for ConsoleOut<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(screen) = self.screen.as_mut() {
            screen.write_all(buf)?;
        }
        if let Some(log) = self.log.as_mut() {
            log.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(screen) = self.screen.as_mut() {
            screen.flush()?;
        }
        if let Some(log) = self.log.as_mut() {
            log.flush()?;
        }
        Ok(())
    }
}

/// Console command executor.
pub struct ConsoleCommand<'a, T, C> {
    session: &'a Session<T, C>,
}

impl<'a, T: Transport + Clone, C: Clock + Clone> ConsoleCommand<'a, T, C> {
    /// Create a new console command.
    #[must_use]
    pub const fn new(session: &'a Session<T, C>) -> Self {
        Self { session }
    }

    /// Stream the console of the selected builds.
    ///
    /// A single build is printed; a range goes to the console log
    /// directory only, skipping builds that no longer exist.
    ///
    /// # Errors
    ///
    /// [`CliError::InvalidArgument`] for a range without a log directory,
    /// or any fetch or write failure.
    pub async fn execute<W: Write + Send>(&self, writer: &mut W, cli: &Cli) -> Result<(), CliError> {
        let selector = selector(cli)?;
        let numbers = self.session.resolve_all(&selector).await?;
        let settings = self.session.settings();
        let log_dir = settings.console_log_dir.as_deref();

        if let [number] = numbers.as_slice() {
            let handle = BuildHandle::new(selector.job.clone(), *number);
            let mut out = ConsoleOut::open(Some(writer), log_dir, &handle)?;
            return self.stream(&handle, &mut out).await;
        }

        if log_dir.is_none() {
            return Err(CliError::InvalidArgument(format!(
                "{selector} selects several builds; set console_log_dir to save their consoles"
            )));
        }
        for number in numbers {
            let handle = BuildHandle::new(selector.job.clone(), number);
            let mut out = ConsoleOut::<W>::open(None, log_dir, &handle)?;
            match self.stream(&handle, &mut out).await {
                Err(CliError::Client(ClientError::NotFound(_))) => {
                    warn!(build = %handle, "build not found, skipping");
                }
                other => other?,
            }
        }
        Ok(())
    }

    async fn stream<O: Write + Send>(&self, handle: &BuildHandle, out: &mut O) -> Result<(), CliError> {
        follow(
            self.session.client(),
            self.session.clock(),
            self.session.settings().wait.backoff.initial,
            ConsoleCursor::new(handle.clone()),
            out,
            self.session.cancel(),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubTransport, session, session_with, settings};
    use clap::Parser;
    use jenkins_client::transport::{HttpResponse, Method};

    fn cli(target: &str) -> Cli {
        Cli::parse_from(["jenkins", target, "-c"])
    }

    #[tokio::test]
    async fn prints_single_build() {
        let stub = StubTransport::default().on(
            Method::Get,
            "job/demo/7/logText/progressiveText",
            HttpResponse::new(200, "done\n"),
        );
        let session = session(&stub);
        let mut out = Vec::new();
        ConsoleCommand::new(&session)
            .execute(&mut out, &cli("demo/7"))
            .await
            .expect("should print");
        assert_eq!(out, b"done\n");
    }

    #[tokio::test]
    async fn range_needs_log_dir() {
        let stub = StubTransport::default();
        let session = session(&stub);
        let err = ConsoleCommand::new(&session)
            .execute(&mut Vec::new(), &cli("demo/1..3"))
            .await
            .expect_err("needs dir");
        assert!(matches!(err, CliError::InvalidArgument(_)));
        assert!(stub.requests().is_empty());
    }

    #[tokio::test]
    async fn range_writes_log_files_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let stub = StubTransport::default()
            .get("job/demo/1/logText/progressiveText", "one\n")
            .get("job/demo/3/logText/progressiveText", "three\n");
        let settings = crate::config::Settings {
            console_log_dir: Some(dir.path().to_path_buf()),
            ..settings()
        };
        let session = session_with(&stub, settings);
        let mut out = Vec::new();

        ConsoleCommand::new(&session)
            .execute(&mut out, &cli("demo/3..1"))
            .await
            .expect("should save");

        assert!(out.is_empty());
        let read = |n: u32| std::fs::read_to_string(dir.path().join(format!("demo-{n}-console.log")));
        assert_eq!(read(1).expect("log 1"), "one\n");
        assert_eq!(read(3).expect("log 3"), "three\n");
        // build 2 answers 404 and leaves at most an empty log behind
        assert!(read(2).unwrap_or_default().is_empty());
    }
}
