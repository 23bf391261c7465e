//! Test doubles: a scripted transport and a manual clock.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::error::ClientError;
use crate::transport::{HttpRequest, HttpResponse, Method, Transport};

#[derive(Default)]
struct Routes {
    scripted: HashMap<(Method, String), VecDeque<HttpResponse>>,
    requests: Vec<HttpRequest>,
    trip: Option<(usize, CancellationToken)>,
}

/// Transport that answers from per-route scripts and records every request.
///
/// Each route replays its responses in order; the last one repeats once the
/// script runs out. Unscripted routes answer 404.
#[derive(Clone, Default)]
pub struct FakeTransport {
    routes: Arc<Mutex<Routes>>,
}

impl FakeTransport {
    /// Transport with no routes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the responses for `method path`.
    #[must_use]
    pub fn on(self, method: Method, path: &str, responses: Vec<HttpResponse>) -> Self {
        self.routes
            .lock()
            .scripted
            .entry((method, path.to_string()))
            .or_default()
            .extend(responses);
        self
    }

    /// Script a single GET response.
    #[must_use]
    pub fn get(self, path: &str, response: HttpResponse) -> Self {
        self.on(Method::Get, path, vec![response])
    }

    /// Script a single POST response.
    #[must_use]
    pub fn post(self, path: &str, response: HttpResponse) -> Self {
        self.on(Method::Post, path, vec![response])
    }

    /// Cancel `token` as soon as `count` requests have been answered.
    #[must_use]
    pub fn cancel_after(self, count: usize, token: CancellationToken) -> Self {
        self.routes.lock().trip = Some((count, token));
        self
    }

    /// Every request sent so far.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.routes.lock().requests.clone()
    }

    /// Requests sent to `path`, any method.
    pub fn requests_to(&self, path: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }

    /// Number of POST requests sent.
    pub fn post_count(&self) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == Method::Post)
            .count()
    }
}

impl Transport for FakeTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ClientError> {
        let mut routes = self.routes.lock();
        let key = (request.method, request.path.clone());
        routes.requests.push(request);

        let response = match routes.scripted.get_mut(&key) {
            Some(script) if script.len() > 1 => script.pop_front().unwrap_or_default(),
            Some(script) => script.front().cloned().unwrap_or_default(),
            None => HttpResponse::new(404, "Not Found"),
        };

        let sent = routes.requests.len();
        if let Some((count, token)) = &routes.trip {
            if sent >= *count {
                token.cancel();
            }
        }
        Ok(response)
    }
}

/// JSON response with status 200.
pub fn json(body: &str) -> HttpResponse {
    HttpResponse::new(200, body.to_string()).with_header("Content-Type", "application/json")
}

/// Console chunk response.
pub fn console(text: &str, total: u64, more: bool) -> HttpResponse {
    let resp = HttpResponse::new(200, text.to_string()).with_header("X-Text-Size", total.to_string());
    if more {
        resp.with_header("X-More-Data", "true")
    } else {
        resp
    }
}

/// Running build JSON.
pub fn running(number: u32, estimated_ms: i64) -> HttpResponse {
    json(&format!(
        r#"{{"number":{number},"building":true,"result":null,"timestamp":1700000000000,"duration":0,"estimatedDuration":{estimated_ms}}}"#
    ))
}

/// Finished build JSON.
pub fn finished(number: u32, result: &str) -> HttpResponse {
    json(&format!(
        r#"{{"number":{number},"building":false,"result":"{result}","timestamp":1700000000000,"duration":4200,"estimatedDuration":5000,"artifacts":[]}}"#
    ))
}

/// Queue item JSON that has not been scheduled.
pub fn queue_pending(id: u64) -> HttpResponse {
    json(&format!(
        r#"{{"_class":"hudson.model.Queue$WaitingItem","id":{id},"why":"In the quiet period","task":{{"name":"demo"}}}}"#
    ))
}

/// Queue item JSON scheduled as `number`.
pub fn queue_scheduled(id: u64, number: u32) -> HttpResponse {
    json(&format!(
        r#"{{"_class":"hudson.model.Queue$LeftItem","id":{id},"cancelled":false,"executable":{{"number":{number}}}}}"#
    ))
}

/// Trigger response pointing at queue item `id`.
pub fn created(id: u64) -> HttpResponse {
    HttpResponse::new(201, "").with_header("Location", format!("https://ci.example.com/queue/item/{id}/"))
}

#[derive(Default)]
struct ClockState {
    elapsed: Duration,
    sleeps: Vec<Duration>,
}

/// Clock whose `sleep` returns immediately after advancing time.
#[derive(Clone)]
pub struct ManualClock {
    start: Instant,
    state: Arc<Mutex<ClockState>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    /// Clock starting now with nothing slept.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            state: Arc::default(),
        }
    }

    /// Total time slept.
    pub fn elapsed(&self) -> Duration {
        self.state.lock().elapsed
    }

    /// Every requested sleep, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.state.lock().sleeps.clone()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + self.state.lock().elapsed
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        let mut state = self.state.lock();
        state.elapsed += duration;
        state.sleeps.push(duration);
        std::future::ready(())
    }
}
