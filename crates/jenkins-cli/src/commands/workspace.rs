//! Workspace download and wipe.

use std::io::Write;
use std::path::PathBuf;

use jenkins_client::{Clock, Transport, WorkspaceDownload, save_workspace_file};
use serde::Serialize;

use crate::cli::Cli;
use crate::commands::{outdir, selector};
use crate::error::CliError;
use crate::output::{OutputFormat, TableDisplay};
use crate::session::Session;

/// What a workspace command did.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkspaceReport {
    /// File saved.
    Saved {
        /// Local path.
        path: PathBuf,
        /// Bytes written.
        bytes: usize,
    },
    /// The remote path is a directory.
    Directory {
        /// Remote path.
        path: String,
    },
    /// Workspace deleted.
    Wiped {
        /// Job name.
        job: String,
    },
}

impl TableDisplay for WorkspaceReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        match self {
            Self::Saved { path, bytes } => writeln!(writer, "saved {} ({bytes} bytes)", path.display())?,
            Self::Directory { path } => writeln!(
                writer,
                "{path} is a directory; append /zip to download it as an archive"
            )?,
            Self::Wiped { job } => writeln!(writer, "Wiped workspace of {job}")?,
        }
        Ok(())
    }
}

/// Workspace command executor.
pub struct WorkspaceCommand<'a, T, C> {
    session: &'a Session<T, C>,
}

impl<'a, T: Transport + Clone, C: Clock + Clone> WorkspaceCommand<'a, T, C> {
    /// Create a new workspace command.
    #[must_use]
    pub const fn new(session: &'a Session<T, C>) -> Self {
        Self { session }
    }

    /// Save a workspace file of the job into `-o`.
    ///
    /// # Errors
    ///
    /// Returns an error if the destination exists, or on request or file
    /// failure.
    pub async fn download<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        cli: &Cli,
        path: &str,
    ) -> Result<(), CliError> {
        let job = selector(cli)?.job;
        let report = match save_workspace_file(self.session.client(), &job, path, &outdir(cli)).await? {
            WorkspaceDownload::Saved { path, bytes } => WorkspaceReport::Saved { path, bytes },
            WorkspaceDownload::Directory(path) => WorkspaceReport::Directory { path },
        };
        format.write(writer, &report)
    }

    /// Delete the job's workspace.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn wipe<W: Write>(&self, writer: &mut W, format: &OutputFormat, cli: &Cli) -> Result<(), CliError> {
        let job = selector(cli)?.job;
        self.session.client().wipe_workspace(&job).await?;
        format.write(writer, &WorkspaceReport::Wiped { job })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Format;
    use crate::testing::{StubTransport, session};
    use clap::Parser;
    use jenkins_client::ClientError;
    use jenkins_client::transport::HttpResponse;

    fn cli(dir: &std::path::Path, args: &[&str]) -> Cli {
        let mut argv = vec!["jenkins", "demo", "-o", dir.to_str().expect("utf8 path")];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    #[tokio::test]
    async fn downloads_whole_workspace_as_zip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let stub = StubTransport::default().post("job/demo/ws/*zip*/demo.zip", HttpResponse::new(200, "PK"));
        let session = session(&stub);
        let mut out = Vec::new();

        WorkspaceCommand::new(&session)
            .download(&mut out, &OutputFormat::default(), &cli(dir.path(), &["--ws", "/zip"]), "/zip")
            .await
            .expect("should save");

        let saved = dir.path().join("demo.zip");
        assert_eq!(std::fs::read(&saved).expect("zip"), b"PK");
        assert_eq!(
            String::from_utf8(out).expect("utf8"),
            format!("saved {} (2 bytes)\n", saved.display())
        );
    }

    #[tokio::test]
    async fn directory_is_reported_not_saved() {
        let dir = tempfile::tempdir().expect("tempdir");
        let stub = StubTransport::default().post(
            "job/demo/ws/build",
            HttpResponse::new(200, "<html/>").with_header("X-Instance-Identity", "abc"),
        );
        let session = session(&stub);
        let mut out = Vec::new();

        WorkspaceCommand::new(&session)
            .download(&mut out, &OutputFormat::new(Format::Json), &cli(dir.path(), &["--ws", "build"]), "build")
            .await
            .expect("should report");

        let report: serde_json::Value = serde_json::from_slice(&out).expect("json");
        assert_eq!(report["status"], "directory");
        assert_eq!(report["path"], "build");
        assert!(!dir.path().join("build").exists());
    }

    #[tokio::test]
    async fn existing_file_is_not_overwritten() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("app.log"), "keep").expect("seed");
        let stub = StubTransport::default();
        let session = session(&stub);

        let err = WorkspaceCommand::new(&session)
            .download(&mut Vec::new(), &OutputFormat::default(), &cli(dir.path(), &["--ws", "app.log"]), "app.log")
            .await
            .expect_err("exists");
        assert!(matches!(err, CliError::Client(ClientError::FileExists(_))));
        assert!(stub.requests().is_empty());
    }

    #[tokio::test]
    async fn wipes_workspace() {
        let dir = tempfile::tempdir().expect("tempdir");
        let stub = StubTransport::default().post("job/demo/doWipeOutWorkspace", HttpResponse::new(302, ""));
        let session = session(&stub);
        let mut out = Vec::new();
        WorkspaceCommand::new(&session)
            .wipe(&mut out, &OutputFormat::default(), &cli(dir.path(), &["--wipews"]))
            .await
            .expect("should wipe");
        assert_eq!(out, b"Wiped workspace of demo\n");
    }
}
