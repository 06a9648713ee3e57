//! Shared test utilities: a recording downstream server, a scripted
//! transport, and signed request construction.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, Request, StatusCode, Uri};
use tokio::task::JoinHandle;

use crate::forward::{AttemptResult, OutboundRequest, Transport};
use crate::webhooks::{
    HEADER_DELIVERY, HEADER_EVENT, HEADER_SIGNATURE, compute_signature, format_signature_header,
};

/// Builds a `POST /` carrying a valid signature for `body` under `secret`.
pub fn signed_request(secret: &[u8], body: &[u8]) -> Request<Body> {
    let signature = format_signature_header(&compute_signature(body, secret));
    Request::builder()
        .method("POST")
        .uri("/")
        .header(HEADER_SIGNATURE, signature)
        .header(HEADER_EVENT, "push")
        .header(HEADER_DELIVERY, "abc123")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_vec()))
        .unwrap()
}

/// One request as seen by a [`Downstream`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub path: String,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// How a [`Downstream`] answers.
#[derive(Debug, Clone, Copy)]
pub enum DownstreamBehavior {
    /// Answer immediately with this status.
    Respond(StatusCode),

    /// Hold the request open this long before answering 200.
    Stall(Duration),
}

#[derive(Clone)]
struct DownstreamState {
    behavior: DownstreamBehavior,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

/// A real HTTP server on `127.0.0.1:0` standing in for the function gateway.
///
/// Every request is recorded before the configured behavior runs, so stalled
/// requests are counted too. The server stops when the value is dropped.
pub struct Downstream {
    addr: SocketAddr,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    server: JoinHandle<()>,
}

impl Downstream {
    pub async fn start(behavior: DownstreamBehavior) -> Self {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new().fallback(record).with_state(DownstreamState {
            behavior,
            calls: calls.clone(),
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Downstream {
            addr,
            calls,
            server,
        }
    }

    /// Endpoint base pointing at this server, e.g. `http://127.0.0.1:PORT/function/`.
    pub fn base_url(&self) -> String {
        format!("http://{}/function/", self.addr)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Polls until at least `count` calls have arrived. Returns `false` if
    /// `within` elapses first.
    pub async fn wait_for_calls(&self, count: usize, within: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + within;
        while self.call_count() < count {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        true
    }
}

impl Drop for Downstream {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn record(
    State(state): State<DownstreamState>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    state.calls.lock().unwrap().push(RecordedCall {
        path: uri.path().to_string(),
        content_type: headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    });

    match state.behavior {
        DownstreamBehavior::Respond(status) => status,
        DownstreamBehavior::Stall(duration) => {
            tokio::time::sleep(duration).await;
            StatusCode::OK
        }
    }
}

/// A [`Transport`] that replays scripted results without any I/O.
///
/// Results are consumed in order; the last one repeats forever.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<AttemptResult>>,
    requests: Mutex<Vec<OutboundRequest>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<AttemptResult>) -> Self {
        assert!(!script.is_empty(), "script needs at least one result");
        ScriptedTransport {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn always(result: AttemptResult) -> Self {
        Self::new(vec![result])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_result(&self) -> AttemptResult {
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().cloned().unwrap()
        }
    }
}

impl Transport for ScriptedTransport {
    async fn send(&self, request: &OutboundRequest) -> AttemptResult {
        self.requests.lock().unwrap().push(request.clone());
        self.next_result()
    }
}
