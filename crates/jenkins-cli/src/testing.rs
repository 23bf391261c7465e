//! Test doubles for command tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jenkins_client::transport::{HttpRequest, HttpResponse, Method};
use jenkins_client::{
    ClientError, Clock, CorrelationConfig, JenkinsClient, Transport, WaitConfig,
};
use jenkins_proto::BuildParams;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::session::Session;

/// One fixed response per route; everything else is a 404.
#[derive(Clone, Default)]
pub struct StubTransport {
    routes: Arc<Mutex<HashMap<(Method, String), HttpResponse>>>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl StubTransport {
    pub fn on(self, method: Method, path: &str, response: HttpResponse) -> Self {
        self.routes.lock().insert((method, path.to_string()), response);
        self
    }

    pub fn get(self, path: &str, body: &str) -> Self {
        self.on(Method::Get, path, HttpResponse::new(200, body.to_string()))
    }

    pub fn post(self, path: &str, response: HttpResponse) -> Self {
        self.on(Method::Post, path, response)
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    pub fn requests_to(&self, path: &str) -> usize {
        self.requests().iter().filter(|r| r.path == path).count()
    }

    pub fn posts(&self) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == Method::Post)
            .collect()
    }
}

impl Transport for StubTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ClientError> {
        let key = (request.method, request.path.clone());
        self.requests.lock().push(request);
        Ok(self
            .routes
            .lock()
            .get(&key)
            .cloned()
            .unwrap_or_else(|| HttpResponse::new(404, "Not Found")))
    }
}

/// Clock whose sleeps return at once.
#[derive(Clone, Copy, Default)]
pub struct InstantClock;

impl Clock for InstantClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, _duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        std::future::ready(())
    }
}

pub fn settings() -> Settings {
    Settings {
        url: "https://ci.example.com".into(),
        credentials: None,
        check_certificate: true,
        request_timeout: Duration::from_secs(30),
        default_params: BuildParams::new(),
        console_log_dir: None,
        wait: WaitConfig::default(),
        correlation: CorrelationConfig::default(),
    }
}

pub fn session(stub: &StubTransport) -> Session<StubTransport, InstantClock> {
    session_with(stub, settings())
}

pub fn session_with(stub: &StubTransport, settings: Settings) -> Session<StubTransport, InstantClock> {
    Session::new(
        JenkinsClient::new(stub.clone()),
        InstantClock,
        settings,
        CancellationToken::new(),
    )
}
