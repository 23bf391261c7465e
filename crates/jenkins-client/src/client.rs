//! Endpoint client.
//!
//! [`JenkinsClient`] is the session object constructed once per invocation.
//! It knows every endpoint path and performs the single mapping from HTTP
//! status codes to [`ClientError`] variants.

use bytes::Bytes;
use jenkins_proto::{
    BuildHandle, BuildResponse, ComputerSetResponse, JobBuildsResponse,
    JobListResponse, JobResponse, QueueId, QueueItemResponse, QueueResponse, TriggerParams, decode,
};
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::error::ClientError;
use crate::transport::{HttpRequest, HttpResponse, Transport};

const BUILDS_TREE: &str = "builds[number,result,timestamp,duration,estimatedDuration]";
const JOBS_TREE: &str = "jobs[name,url]";

/// Longest server message carried in an error.
const MAX_MESSAGE_LEN: usize = 200;

/// Which status mapping applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    /// Build trigger: 400/405/409/500 mean the server refused to start.
    Trigger,
    /// Everything else.
    Other,
}

/// Path of a job.
#[must_use]
pub fn job_path(job: &str) -> String {
    format!("job/{job}")
}

/// Path of a build; `build` is a number or a permalink name.
#[must_use]
pub fn build_path(job: &str, build: &str) -> String {
    format!("job/{job}/{build}")
}

/// Client for the endpoints the CLI consumes.
#[derive(Debug, Clone)]
pub struct JenkinsClient<T> {
    transport: T,
}

impl<T: Transport> JenkinsClient<T> {
    /// Wrap a transport.
    pub const fn new(transport: T) -> Self {
        Self { transport }
    }

    /// The underlying transport.
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    async fn execute(&self, request: HttpRequest, endpoint: Endpoint) -> Result<HttpResponse, ClientError> {
        let path = request.path.clone();
        let response = self.transport.send(request).await?;
        check_status(response, &path, endpoint)
    }

    async fn get_json<R: DeserializeOwned>(
        &self,
        request: HttpRequest,
        what: &str,
    ) -> Result<R, ClientError> {
        let response = self.execute(request, Endpoint::Other).await?;
        Ok(decode(what, &response.body)?)
    }

    /// Trigger a build and return the queue item it created.
    ///
    /// User parameters select `buildWithParameters`. Defaults and user
    /// parameters are all sent as query arguments.
    pub async fn trigger(&self, job: &str, params: &TriggerParams) -> Result<QueueId, ClientError> {
        let endpoint = if params.is_parameterized() { "buildWithParameters" } else { "build" };
        let mut request = HttpRequest::post(format!("{}/{endpoint}", job_path(job)));
        for (k, v) in params.query().iter() {
            request = request.query(k, v);
        }

        let response = self.execute(request, Endpoint::Trigger).await?;
        let location = response.header("location").ok_or_else(|| {
            ClientError::MalformedResponse(format!(
                "trigger of {job} returned HTTP {} without a Location header",
                response.status
            ))
        })?;
        let id = QueueId::from_location(location)?;
        info!(job, queue_id = %id, "build triggered");
        Ok(id)
    }

    /// Status of a queue item.
    pub async fn queue_item(&self, id: QueueId) -> Result<QueueItemResponse, ClientError> {
        self.get_json(HttpRequest::get(format!("queue/item/{id}/api/json")), "queue item")
            .await
    }

    /// Status of a build by number or permalink name.
    pub async fn build_info(&self, job: &str, build: &str) -> Result<BuildResponse, ClientError> {
        self.get_json(
            HttpRequest::get(format!("{}/api/json", build_path(job, build))),
            "build",
        )
        .await
    }

    /// Status of a numbered build.
    pub async fn build(&self, handle: &BuildHandle) -> Result<BuildResponse, ClientError> {
        self.build_info(&handle.job, &handle.number.to_string()).await
    }

    /// Console text from byte `start` on.
    ///
    /// The raw response is returned so the caller can read `X-More-Data`.
    pub async fn progressive_text(
        &self,
        handle: &BuildHandle,
        start: u64,
    ) -> Result<HttpResponse, ClientError> {
        let request = HttpRequest::get(format!(
            "{}/logText/progressiveText",
            build_path(&handle.job, &handle.number.to_string())
        ))
        .query("start", start.to_string());
        self.execute(request, Endpoint::Other).await
    }

    /// Download one archived artifact.
    pub async fn artifact(&self, handle: &BuildHandle, relative_path: &str) -> Result<Bytes, ClientError> {
        let request = HttpRequest::get(format!(
            "{}/artifact/{relative_path}",
            build_path(&handle.job, &handle.number.to_string())
        ));
        Ok(self.execute(request, Endpoint::Other).await?.body)
    }

    /// Job description, properties and permalinks.
    pub async fn job(&self, job: &str) -> Result<JobResponse, ClientError> {
        self.get_json(HttpRequest::get(format!("{}/api/json", job_path(job))), "job")
            .await
    }

    /// Every build of a job, newest first.
    pub async fn job_builds(&self, job: &str) -> Result<JobBuildsResponse, ClientError> {
        let request = HttpRequest::get(format!("{}/api/json", job_path(job))).query("tree", BUILDS_TREE);
        self.get_json(request, "job builds").await
    }

    /// All top-level jobs.
    pub async fn jobs(&self) -> Result<JobListResponse, ClientError> {
        self.get_json(HttpRequest::get("api/json").query("tree", JOBS_TREE), "job list")
            .await
    }

    /// The build queue.
    pub async fn queue(&self) -> Result<QueueResponse, ClientError> {
        self.get_json(HttpRequest::get("queue/api/json"), "queue").await
    }

    /// All build nodes.
    pub async fn computers(&self) -> Result<ComputerSetResponse, ClientError> {
        self.get_json(HttpRequest::get("computer/api/json"), "computers")
            .await
    }

    /// Ask a running build to stop.
    pub async fn stop(&self, job: &str, build: &str) -> Result<(), ClientError> {
        self.execute(
            HttpRequest::post(format!("{}/stop", build_path(job, build))),
            Endpoint::Other,
        )
        .await?;
        info!(job, build, "stop requested");
        Ok(())
    }

    /// Remove an item from the queue.
    pub async fn cancel_queue_item(&self, id: QueueId) -> Result<(), ClientError> {
        self.execute(
            HttpRequest::post("queue/cancelItem").query("id", id.to_string()),
            Endpoint::Other,
        )
        .await?;
        info!(queue_id = %id, "queue item cancelled");
        Ok(())
    }

    /// The job's `config.xml`.
    pub async fn get_config(&self, job: &str) -> Result<String, ClientError> {
        let response = self
            .execute(
                HttpRequest::get(format!("{}/config.xml", job_path(job))),
                Endpoint::Other,
            )
            .await?;
        let xml = String::from_utf8(response.body.to_vec())
            .map_err(|e| ClientError::MalformedResponse(format!("config.xml is not UTF-8: {e}")))?;
        if !xml.starts_with("<?xml") {
            warn!(job, "config.xml does not start with an XML declaration");
        }
        Ok(xml)
    }

    /// Replace the job's `config.xml`.
    pub async fn post_config(&self, job: &str, xml: String) -> Result<(), ClientError> {
        let request = HttpRequest::post(format!("{}/config.xml", job_path(job)))
            .body(xml, "application/xml");
        self.execute(request, Endpoint::Other).await?;
        info!(job, "config.xml updated");
        Ok(())
    }

    /// Fetch a workspace path.
    ///
    /// Directories come back as an HTML listing; see
    /// [`crate::workspace`] for how those are told apart.
    pub async fn workspace(&self, job: &str, path: &str) -> Result<HttpResponse, ClientError> {
        self.execute(
            HttpRequest::post(format!("{}/ws/{path}", job_path(job))),
            Endpoint::Other,
        )
        .await
    }

    /// Delete the job's workspace.
    pub async fn wipe_workspace(&self, job: &str) -> Result<(), ClientError> {
        self.execute(
            HttpRequest::post(format!("{}/doWipeOutWorkspace", job_path(job))),
            Endpoint::Other,
        )
        .await?;
        info!(job, "workspace wiped");
        Ok(())
    }
}

fn check_status(response: HttpResponse, path: &str, endpoint: Endpoint) -> Result<HttpResponse, ClientError> {
    let status = response.status;
    if response.is_success() {
        return Ok(response);
    }
    let message = server_message(&response);
    match (status, endpoint) {
        (401 | 403, _) => Err(ClientError::Auth {
            status,
            path: path.to_string(),
        }),
        (404, _) => Err(ClientError::NotFound(path.to_string())),
        (400 | 405 | 409 | 500, Endpoint::Trigger) => {
            Err(ClientError::TriggerRejected { status, message })
        }
        _ => Err(ClientError::Http {
            status,
            path: path.to_string(),
            message,
        }),
    }
}

/// `X-Error` if the server set it, else the first non-empty body line.
fn server_message(response: &HttpResponse) -> String {
    let text = match response.header("x-error") {
        Some(err) => err.to_string(),
        None => response
            .text()
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or_default()
            .to_string(),
    };
    match text.char_indices().nth(MAX_MESSAGE_LEN) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text,
    }
}
