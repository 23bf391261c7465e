//! Artifact download.

use std::path::{Path, PathBuf};

use jenkins_proto::{Artifact, BuildHandle};
use tracing::info;

use crate::client::JenkinsClient;
use crate::error::ClientError;
use crate::transport::Transport;

/// Download `artifacts` of `handle` into `dest_dir`, each saved under its
/// bare file name. Returns the written paths.
///
/// # Errors
///
/// Request errors, [`ClientError::MalformedResponse`] for an artifact with
/// no usable file name, and [`ClientError::Io`] for local write failures.
pub async fn download_artifacts<T: Transport>(
    client: &JenkinsClient<T>,
    handle: &BuildHandle,
    artifacts: &[Artifact],
    dest_dir: &Path,
) -> Result<Vec<PathBuf>, ClientError> {
    if artifacts.is_empty() {
        info!(build = %handle, "build has no artifacts");
        return Ok(Vec::new());
    }
    tokio::fs::create_dir_all(dest_dir)
        .await
        .map_err(|e| ClientError::io(dest_dir, e))?;

    let mut saved = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let name = Path::new(&artifact.file_name).file_name().ok_or_else(|| {
            ClientError::MalformedResponse(format!("artifact has no file name: {:?}", artifact.file_name))
        })?;
        let body = client.artifact(handle, &artifact.relative_path).await?;
        let path = dest_dir.join(name);
        tokio::fs::write(&path, &body)
            .await
            .map_err(|e| ClientError::io(&path, e))?;
        info!(build = %handle, path = %path.display(), bytes = body.len(), "saved artifact");
        saved.push(path);
    }
    Ok(saved)
}
