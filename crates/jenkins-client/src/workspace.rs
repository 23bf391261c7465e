//! Workspace file download and wipe.
//!
//! A path ending in `zip` asks the server to archive a directory:
//! `/zip` is the whole workspace, `dir/zip` is `dir` alone. A directory
//! fetched without the `zip` suffix comes back as an HTML listing, which is
//! recognised by the `X-Instance-Identity` header the server only attaches
//! to its own pages.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::client::JenkinsClient;
use crate::error::ClientError;
use crate::transport::Transport;

const PAGE_MARKER: &str = "x-instance-identity";

/// Server path and local file name for a workspace request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspacePath {
    /// Path below `job/<name>/ws/`.
    pub remote: String,
    /// Name of the local file.
    pub file_name: String,
}

impl WorkspacePath {
    /// Resolve a user path for `job`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] for an empty path.
    pub fn resolve(job: &str, path: &str) -> Result<Self, ClientError> {
        let path = path.trim_start_matches('/');
        let remote = if path == "zip" {
            format!("*zip*/{job}.zip")
        } else if let Some(dir) = path.strip_suffix("/zip") {
            let dir = dir.trim_end_matches('/');
            let base = dir.rsplit('/').next().unwrap_or(dir);
            format!("{dir}/*zip*/{base}.zip")
        } else {
            path.trim_end_matches('/').to_string()
        };
        let file_name = remote.rsplit('/').next().unwrap_or_default().to_string();
        if file_name.is_empty() {
            return Err(ClientError::Config("workspace path is empty".into()));
        }
        Ok(Self { remote, file_name })
    }
}

/// Result of a workspace fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceDownload {
    /// File written.
    Saved {
        /// Local path.
        path: PathBuf,
        /// Bytes written.
        bytes: usize,
    },
    /// The path is a directory; nothing was written.
    Directory(String),
}

/// Fetch a workspace file of `job` into `dest_dir`.
///
/// # Errors
///
/// [`ClientError::FileExists`] if the destination exists (checked before
/// any request), request errors, or [`ClientError::Io`].
pub async fn save_workspace_file<T: Transport>(
    client: &JenkinsClient<T>,
    job: &str,
    path: &str,
    dest_dir: &Path,
) -> Result<WorkspaceDownload, ClientError> {
    let target = WorkspacePath::resolve(job, path)?;
    let dest = dest_dir.join(&target.file_name);
    if tokio::fs::try_exists(&dest)
        .await
        .map_err(|e| ClientError::io(&dest, e))?
    {
        return Err(ClientError::FileExists(dest));
    }

    let response = client.workspace(job, &target.remote).await?;
    if response.header(PAGE_MARKER).is_some() {
        info!(job, path = %target.remote, "workspace path is a directory");
        return Ok(WorkspaceDownload::Directory(target.remote));
    }

    tokio::fs::create_dir_all(dest_dir)
        .await
        .map_err(|e| ClientError::io(dest_dir, e))?;
    tokio::fs::write(&dest, &response.body)
        .await
        .map_err(|e| ClientError::io(&dest, e))?;
    info!(job, path = %dest.display(), bytes = response.body.len(), "saved workspace file");
    Ok(WorkspaceDownload::Saved {
        path: dest,
        bytes: response.body.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTransport;
    use crate::transport::HttpResponse;
    use test_case::test_case;

    #[test_case("/zip", "*zip*/demo.zip", "demo.zip" ; "whole workspace")]
    #[test_case("zip", "*zip*/demo.zip", "demo.zip" ; "whole workspace without slash")]
    #[test_case("build/out/zip", "build/out/*zip*/out.zip", "out.zip" ; "directory as zip")]
    #[test_case("build/app.log", "build/app.log", "app.log" ; "plain file")]
    #[test_case("/build/app.log", "build/app.log", "app.log" ; "leading slash")]
    fn resolves_paths(input: &str, remote: &str, file: &str) {
        let resolved = WorkspacePath::resolve("demo", input).expect("should resolve");
        assert_eq!(resolved.remote, remote);
        assert_eq!(resolved.file_name, file);
    }

    #[test]
    fn empty_path_is_rejected() {
        assert!(matches!(WorkspacePath::resolve("demo", "/"), Err(ClientError::Config(_))));
    }

    #[tokio::test]
    async fn saves_file() {
        let fake = FakeTransport::new().post("job/demo/ws/build/app.log", HttpResponse::new(200, "log"));
        let client = JenkinsClient::new(fake);
        let dir = tempfile::tempdir().expect("tempdir");
        let result = save_workspace_file(&client, "demo", "build/app.log", dir.path())
            .await
            .expect("should save");
        assert_eq!(
            result,
            WorkspaceDownload::Saved {
                path: dir.path().join("app.log"),
                bytes: 3
            }
        );
        assert_eq!(std::fs::read(dir.path().join("app.log")).expect("read"), b"log");
    }

    #[tokio::test]
    async fn refuses_to_overwrite_before_requesting() {
        let fake = FakeTransport::new();
        let client = JenkinsClient::new(fake.clone());
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("demo.zip"), b"old").expect("write");
        let err = save_workspace_file(&client, "demo", "/zip", dir.path())
            .await
            .expect_err("exists");
        assert!(matches!(err, ClientError::FileExists(_)));
        assert!(fake.requests().is_empty());
        assert_eq!(std::fs::read(dir.path().join("demo.zip")).expect("read"), b"old");
    }

    #[tokio::test]
    async fn directory_listing_is_not_written() {
        let fake = FakeTransport::new().post(
            "job/demo/ws/build",
            HttpResponse::new(200, "<html>listing</html>").with_header("X-Instance-Identity", "MIIB..."),
        );
        let client = JenkinsClient::new(fake);
        let dir = tempfile::tempdir().expect("tempdir");
        let result = save_workspace_file(&client, "demo", "build", dir.path())
            .await
            .expect("should answer");
        assert_eq!(result, WorkspaceDownload::Directory("build".into()));
        assert!(!dir.path().join("build").exists());
    }
}
