//! Artifact download for an existing build.

use std::io::Write;
use std::path::PathBuf;

use jenkins_client::{Clock, Transport, download_artifacts};
use jenkins_proto::BuildHandle;
use serde::Serialize;

use crate::cli::Cli;
use crate::commands::{outdir, selector};
use crate::error::CliError;
use crate::output::{OutputFormat, TableDisplay};
use crate::session::Session;

/// Files saved from one build.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactsReport {
    /// The build.
    pub build: BuildHandle,
    /// Local paths written.
    pub saved: Vec<PathBuf>,
}

impl TableDisplay for ArtifactsReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.saved.is_empty() {
            writeln!(writer, "Build {} has no artifacts", self.build)?;
        }
        for path in &self.saved {
            writeln!(writer, "saved {}", path.display())?;
        }
        Ok(())
    }
}

/// Artifacts command executor.
pub struct ArtifactsCommand<'a, T, C> {
    session: &'a Session<T, C>,
}

impl<'a, T: Transport + Clone, C: Clock + Clone> ArtifactsCommand<'a, T, C> {
    /// Create a new artifacts command.
    #[must_use]
    pub const fn new(session: &'a Session<T, C>) -> Self {
        Self { session }
    }

    /// Save the selected build's artifacts (default `lastBuild`) into `-o`.
    ///
    /// # Errors
    ///
    /// Any lookup, download or file error.
    pub async fn execute<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        cli: &Cli,
    ) -> Result<(), CliError> {
        let handle = self.session.resolve(&selector(cli)?).await?;
        let client = self.session.client();
        let build = client.build(&handle).await?;
        let saved = download_artifacts(client, &handle, &build.artifacts, &outdir(cli)).await?;
        format.write(writer, &ArtifactsReport { build: handle, saved })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubTransport, session};
    use clap::Parser;

    #[tokio::test]
    async fn saves_artifacts_of_resolved_build() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out_dir = dir.path().join("out");
        let stub = StubTransport::default()
            .get("job/demo/lastSuccessfulBuild/api/json", r#"{"number":4}"#)
            .get(
                "job/demo/4/api/json",
                r#"{"number":4,"result":"SUCCESS","artifacts":[
                    {"fileName":"app.jar","relativePath":"target/app.jar"}
                ]}"#,
            )
            .get("job/demo/4/artifact/target/app.jar", "jar-bytes");
        let session = session(&stub);
        let cli = Cli::parse_from([
            "jenkins",
            "demo/lastSuc",
            "--arti",
            "-o",
            out_dir.to_str().expect("utf8 path"),
        ]);
        let mut out = Vec::new();

        ArtifactsCommand::new(&session)
            .execute(&mut out, &OutputFormat::default(), &cli)
            .await
            .expect("should save");

        let saved = out_dir.join("app.jar");
        assert_eq!(std::fs::read_to_string(&saved).expect("saved"), "jar-bytes");
        assert_eq!(String::from_utf8(out).expect("utf8"), format!("saved {}\n", saved.display()));
    }

    #[tokio::test]
    async fn reports_build_without_artifacts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let stub = StubTransport::default().get("job/demo/3/api/json", r#"{"number":3}"#);
        let session = session(&stub);
        let cli = Cli::parse_from([
            "jenkins",
            "demo/3",
            "--arti",
            "-o",
            dir.path().to_str().expect("utf8 path"),
        ]);
        let mut out = Vec::new();
        ArtifactsCommand::new(&session)
            .execute(&mut out, &OutputFormat::default(), &cli)
            .await
            .expect("should succeed");
        assert_eq!(out, b"Build demo/3 has no artifacts\n");
    }
}
