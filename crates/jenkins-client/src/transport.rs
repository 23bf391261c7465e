//! HTTP transport capability.
//!
//! The lifecycle components only need `request(method, path) -> (status,
//! headers, body)`. [`Transport`] is that seam; [`HttpTransport`] implements
//! it with reqwest against a configured base URL. Status codes are returned
//! as-is; mapping them to errors is the endpoint client's job.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, trace};
use url::Url;

use crate::error::ClientError;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Redirects followed before giving up.
const MAX_REDIRECTS: usize = 5;

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
        })
    }
}

/// A request relative to the server base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Method.
    pub method: Method,
    /// Unencoded path, `/`-separated, relative to the base URL.
    pub path: String,
    /// Query parameters.
    pub query: Vec<(String, String)>,
    /// Request body.
    pub body: Option<Bytes>,
    /// `Content-Type` of the body.
    pub content_type: Option<&'static str>,
}

impl HttpRequest {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            content_type: None,
        }
    }

    /// A GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    /// A POST request with an empty body.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    /// Append a query parameter.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Attach a body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>, content_type: &'static str) -> Self {
        self.body = Some(body.into());
        self.content_type = Some(content_type);
        self
    }
}

/// A response as received, before any status interpretation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Headers, names lowercased.
    pub headers: BTreeMap<String, String>,
    /// Raw body.
    pub body: Bytes,
}

impl HttpResponse {
    /// A response with the given status and body and no headers.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Header value, case-insensitive.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Whether the status is below 400.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status < 400
    }

    /// Body decoded as UTF-8, lossily.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Sends requests to the server.
pub trait Transport: Send + Sync {
    /// Send one request. Never retries.
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, ClientError>> + Send;
}

/// User name and API token for HTTP basic authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    user: String,
    token: String,
}

impl Credentials {
    /// Create credentials.
    pub fn new(user: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            token: token.into(),
        }
    }

    /// Parse `user:token`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] unless both parts are non-empty.
    pub fn parse(s: &str) -> Result<Self, ClientError> {
        match s.split_once(':') {
            Some((user, token)) if !user.is_empty() && !token.is_empty() => {
                Ok(Self::new(user, token))
            }
            _ => Err(ClientError::Config(
                "credentials must be of the form user:token".into(),
            )),
        }
    }

    /// User name.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// reqwest-backed [`Transport`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base: Url,
    credentials: Option<Credentials>,
}

impl HttpTransport {
    /// Start configuring a transport for `base_url`.
    pub fn builder(base_url: impl Into<String>) -> HttpTransportBuilder {
        HttpTransportBuilder::new(base_url)
    }

    /// The server base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Absolute URL for a relative path.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if the base URL cannot carry a path.
    pub fn url_for(&self, path: &str) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::Config(format!("{} cannot be a base URL", self.base)))?
            .pop_if_empty()
            .extend(path.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ClientError> {
        let url = self.url_for(&request.path)?;
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };
        debug!(method = %request.method, url = %url, query = ?request.query, "sending request");

        let mut builder = self.client.request(method, url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(creds) = &self.credentials {
            builder = builder.basic_auth(&creds.user, Some(&creds.token));
        }
        if let Some(content_type) = request.content_type {
            builder = builder.header(reqwest::header::CONTENT_TYPE, content_type);
        }
        builder = match request.body {
            Some(body) => builder.body(body),
            // Some endpoints reject a bodiless POST without Content-Length.
            None if request.method == Method::Post => builder.body(Bytes::new()),
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect::<BTreeMap<_, _>>();
        let body = response.bytes().await?;

        debug!(status, bytes = body.len(), path = %request.path, "received response");
        trace!(headers = ?headers, "response headers");

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Builder for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransportBuilder {
    base_url: String,
    credentials: Option<Credentials>,
    timeout: Duration,
    check_certificate: bool,
}

impl HttpTransportBuilder {
    fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            credentials: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            check_certificate: true,
        }
    }

    /// Authenticate every request with these credentials.
    #[must_use]
    pub fn credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Per-request timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether to verify the server's TLS certificate.
    #[must_use]
    pub const fn check_certificate(mut self, check: bool) -> Self {
        self.check_certificate = check;
        self
    }

    /// Build the transport.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] for a URL that is not `http(s)` or a
    /// zero timeout, and [`ClientError::Transport`] if the TLS backend
    /// cannot be initialized.
    pub fn build(self) -> Result<HttpTransport, ClientError> {
        let base = Url::parse(&self.base_url)
            .map_err(|e| ClientError::Config(format!("invalid server URL '{}': {e}", self.base_url)))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ClientError::Config(format!(
                "server URL must start with http:// or https://, got '{}'",
                self.base_url
            )));
        }
        if self.timeout.is_zero() {
            return Err(ClientError::Config("request timeout must be positive".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .danger_accept_invalid_certs(!self.check_certificate)
            .user_agent(concat!("jenkins-cli/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(HttpTransport {
            client,
            base,
            credentials: self.credentials,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn transport(base: &str) -> HttpTransport {
        HttpTransport::builder(base).build().expect("should build")
    }

    #[test_case("https://ci.example.com", "job/demo/api/json", "https://ci.example.com/job/demo/api/json" ; "bare host")]
    #[test_case("https://ci.example.com/", "job/demo/api/json", "https://ci.example.com/job/demo/api/json" ; "trailing slash")]
    #[test_case("https://ci.example.com/jenkins/", "queue/item/42/api/json", "https://ci.example.com/jenkins/queue/item/42/api/json" ; "context path")]
    #[test_case("http://localhost:8080", "job/my job/ws/*zip*/my job.zip", "http://localhost:8080/job/my%20job/ws/*zip*/my%20job.zip" ; "segments are encoded")]
    fn url_for(base: &str, path: &str, expected: &str) {
        let url = transport(base).url_for(path).expect("should join");
        assert_eq!(url.as_str(), expected);
    }

    #[test_case("ftp://ci.example.com" ; "wrong scheme")]
    #[test_case("ci.example.com" ; "no scheme")]
    fn rejects_bad_base_url(base: &str) {
        assert!(matches!(
            HttpTransport::builder(base).build(),
            Err(ClientError::Config(_))
        ));
    }

    #[test]
    fn rejects_zero_timeout() {
        let result = HttpTransport::builder("https://ci")
            .timeout(Duration::ZERO)
            .build();
        assert!(matches!(result, Err(ClientError::Config(_))));
    }

    #[test]
    fn credentials_debug_is_redacted() {
        let creds = Credentials::new("alice", "11aa22bb");
        let debug = format!("{creds:?}");
        assert!(debug.contains("alice"));
        assert!(!debug.contains("11aa22bb"));
    }

    #[test_case("alice:token", true ; "valid")]
    #[test_case("alice", false ; "no colon")]
    #[test_case(":token", false ; "empty user")]
    #[test_case("alice:", false ; "empty token")]
    fn credentials_parse(input: &str, ok: bool) {
        assert_eq!(Credentials::parse(input).is_ok(), ok);
    }

    #[test]
    fn response_headers_are_case_insensitive() {
        let resp = HttpResponse::new(200, "x").with_header("X-More-Data", "true");
        assert_eq!(resp.header("x-more-data"), Some("true"));
        assert_eq!(resp.header("X-MORE-DATA"), Some("true"));
        assert_eq!(resp.text(), "x");
    }
}
