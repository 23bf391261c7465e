//! Job `config.xml` and its pipeline script.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use jenkins_client::{ClientError, Clock, Transport};
use jenkins_proto::script::{extract_script, replace_script};
use serde::Serialize;
use tracing::info;

use crate::cli::Cli;
use crate::commands::{outdir, selector};
use crate::error::CliError;
use crate::output::{OutputFormat, TableDisplay};
use crate::session::Session;

/// Result of replacing a job's configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigUpdate {
    /// Job name.
    pub job: String,
    /// Copy of the configuration before the change.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<PathBuf>,
    /// Configuration that was posted, when written locally.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posted: Option<PathBuf>,
}

impl TableDisplay for ConfigUpdate {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if let Some(backup) = &self.backup {
            writeln!(writer, "Previous config saved to {}", backup.display())?;
        }
        if let Some(posted) = &self.posted {
            writeln!(writer, "New config saved to {}", posted.display())?;
        }
        writeln!(writer, "Updated config of {}", self.job)?;
        Ok(())
    }
}

async fn read_file(path: &Path) -> Result<String, CliError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ClientError::io(path, e).into())
}

async fn write_file(path: &Path, contents: &str) -> Result<(), CliError> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| ClientError::io(dir, e))?;
    }
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| ClientError::io(path, e))?;
    Ok(())
}

/// Config command executor.
pub struct ConfigCommand<'a, T, C> {
    session: &'a Session<T, C>,
}

impl<'a, T: Transport + Clone, C: Clock + Clone> ConfigCommand<'a, T, C> {
    /// Create a new config command.
    #[must_use]
    pub const fn new(session: &'a Session<T, C>) -> Self {
        Self { session }
    }

    /// Print the job's `config.xml` as received.
    ///
    /// # Errors
    ///
    /// Returns an error if the request or write fails.
    pub async fn get<W: Write>(&self, writer: &mut W, cli: &Cli) -> Result<(), CliError> {
        let job = selector(cli)?.job;
        let xml = self.session.client().get_config(&job).await?;
        writer.write_all(xml.as_bytes())?;
        if !xml.ends_with('\n') {
            writeln!(writer)?;
        }
        Ok(())
    }

    /// Replace the job's `config.xml` with the contents of `file`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the server refuses it.
    pub async fn post<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        cli: &Cli,
        file: &Path,
    ) -> Result<(), CliError> {
        let job = selector(cli)?.job;
        let xml = read_file(file).await?;
        self.post_xml(&job, xml).await?;
        format.write(
            writer,
            &ConfigUpdate {
                job,
                backup: None,
                posted: None,
            },
        )
    }

    /// Print the pipeline script of the job.
    ///
    /// # Errors
    ///
    /// [`CliError::InvalidArgument`] if the job has no `<script>` element,
    /// or any request failure.
    pub async fn get_groovy<W: Write>(&self, writer: &mut W, cli: &Cli) -> Result<(), CliError> {
        let job = selector(cli)?.job;
        let xml = self.session.client().get_config(&job).await?;
        let script = extract_script(&xml)?;
        writer.write_all(script.as_bytes())?;
        if !script.ends_with('\n') {
            writeln!(writer)?;
        }
        Ok(())
    }

    /// Replace the pipeline script with the contents of `file`.
    ///
    /// The current configuration is saved as
    /// `<outdir>/<job>-config.xml.<timestamp>` and the new one as
    /// `<outdir>/<job>-new-config.xml` before it is posted.
    ///
    /// # Errors
    ///
    /// [`CliError::InvalidArgument`] if the job has no `<script>` element,
    /// file errors, or any request failure.
    pub async fn set_groovy<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        cli: &Cli,
        file: &Path,
    ) -> Result<(), CliError> {
        let job = selector(cli)?.job;
        let script = read_file(file).await?;
        let current = self.session.client().get_config(&job).await?;
        let updated = replace_script(&current, &script)?;

        let dir = outdir(cli);
        let backup = dir.join(format!(
            "{job}-config.xml.{}",
            Local::now().format("%Y%m%d-%H%M%S")
        ));
        write_file(&backup, &current).await?;
        let posted = dir.join(format!("{job}-new-config.xml"));
        write_file(&posted, &updated).await?;
        info!(job, backup = %backup.display(), "config backed up");

        self.post_xml(&job, updated).await?;
        format.write(
            writer,
            &ConfigUpdate {
                job,
                backup: Some(backup),
                posted: Some(posted),
            },
        )
    }

    async fn post_xml(&self, job: &str, xml: String) -> Result<(), CliError> {
        match self.session.client().post_config(job, xml).await {
            Err(ClientError::Http {
                status: 500,
                path,
                message,
            }) => Err(ClientError::Http {
                status: 500,
                path,
                message: format!(
                    "{message} (server log: {}/log/all)",
                    self.session.settings().url.trim_end_matches('/')
                ),
            }
            .into()),
            other => other.map_err(CliError::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubTransport, session};
    use clap::Parser;
    use jenkins_client::transport::HttpResponse;

    const CONFIG: &str = "<?xml version='1.1' encoding='UTF-8'?>\n<flow-definition>\n  <definition>\n    \
                          <script>echo &apos;old&apos;</script>\n  </definition>\n</flow-definition>\n";

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["jenkins", "demo"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    #[tokio::test]
    async fn prints_config_and_script() {
        let stub = StubTransport::default().get("job/demo/config.xml", CONFIG);
        let session = session(&stub);
        let command = ConfigCommand::new(&session);

        let mut out = Vec::new();
        command.get(&mut out, &cli(&["--get-config"])).await.expect("config");
        assert_eq!(String::from_utf8(out).expect("utf8"), CONFIG);

        let mut out = Vec::new();
        command
            .get_groovy(&mut out, &cli(&["--get-groovy"]))
            .await
            .expect("script");
        assert_eq!(out, b"echo 'old'\n");
    }

    #[tokio::test]
    async fn missing_script_is_an_argument_error() {
        let stub = StubTransport::default().get("job/demo/config.xml", "<?xml version='1.1'?><project/>");
        let session = session(&stub);
        let err = ConfigCommand::new(&session)
            .get_groovy(&mut Vec::new(), &cli(&["--get-groovy"]))
            .await
            .expect_err("no script");
        assert!(matches!(err, CliError::InvalidArgument(_)));
        assert_eq!(err.exit_code(), 4);
    }

    #[tokio::test]
    async fn set_groovy_backs_up_and_posts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = dir.path().join("Jenkinsfile");
        std::fs::write(&script, "echo \"new\"\n").expect("write script");
        let out_dir = dir.path().join("out");
        let stub = StubTransport::default()
            .get("job/demo/config.xml", CONFIG)
            .post("job/demo/config.xml", HttpResponse::new(200, ""));
        let session = session(&stub);
        let cli = cli(&[
            "--groovy",
            script.to_str().expect("utf8 path"),
            "-o",
            out_dir.to_str().expect("utf8 path"),
        ]);

        let mut out = Vec::new();
        ConfigCommand::new(&session)
            .set_groovy(&mut out, &OutputFormat::default(), &cli, &script)
            .await
            .expect("should update");

        let posts = stub.posts();
        assert_eq!(posts.len(), 1);
        let body = String::from_utf8(posts[0].body.clone().expect("body").to_vec()).expect("utf8");
        assert_eq!(extract_script(&body).expect("script"), "echo \"new\"\n");
        assert_eq!(
            std::fs::read_to_string(out_dir.join("demo-new-config.xml")).expect("new config"),
            body
        );

        let backups: Vec<_> = std::fs::read_dir(&out_dir)
            .expect("outdir")
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with("demo-config.xml."))
            .collect();
        assert_eq!(backups.len(), 1);
        assert_eq!(std::fs::read_to_string(backups[0].path()).expect("backup"), CONFIG);
        assert!(String::from_utf8(out).expect("utf8").ends_with("Updated config of demo\n"));
    }

    #[tokio::test]
    async fn server_error_points_at_the_log() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("config.xml");
        std::fs::write(&file, CONFIG).expect("write config");
        let stub = StubTransport::default().post("job/demo/config.xml", HttpResponse::new(500, "boom"));
        let session = session(&stub);

        let err = ConfigCommand::new(&session)
            .post(&mut Vec::new(), &OutputFormat::default(), &cli(&["--post-config", "x"]), &file)
            .await
            .expect_err("server error");
        assert!(err.to_string().contains("https://ci.example.com/log/all"), "{err}");
    }
}
