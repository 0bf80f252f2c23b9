//! Shared helpers for unit tests: an in-process stub of the remote API, a
//! scriptable in-memory transport for the session runner, and a process-wide
//! lock for tests that mutate environment variables.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::{json, Value};

use crate::backend::{BackendError, SessionTransport};
use crate::domain::{ResultSummary, SessionToken};

/// Serializes tests that touch `std::env`, which is process-global.
pub(crate) fn env_lock() -> Arc<Mutex<()>> {
    static LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();
    Arc::clone(LOCK.get_or_init(|| Arc::new(Mutex::new(()))))
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub(crate) method: String,
    pub(crate) path: String,
    pub(crate) query: Option<String>,
    pub(crate) authorization: Option<String>,
    pub(crate) body: Value,
}

#[derive(Default)]
pub(crate) struct StubState {
    responses: Mutex<HashMap<(String, String), (u16, Value)>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl StubState {
    pub(crate) fn script(&self, method: &str, path: &str, status: u16, body: Value) {
        self.responses
            .lock()
            .unwrap()
            .insert((method.to_string(), path.to_string()), (status, body));
    }

    pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

pub(crate) struct StubBackend {
    pub(crate) base_url: String,
    pub(crate) state: Arc<StubState>,
}

/// Starts a catch-all HTTP server on an ephemeral port. Every request is
/// recorded; responses come from the scripted table, keyed by method and
/// path. A scripted `Value::Null` body is served as an empty body.
pub(crate) async fn spawn_stub_backend() -> StubBackend {
    let state = Arc::new(StubState::default());
    let router = Router::new().fallback(handle_any).with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind stub backend listener");
    let addr = listener.local_addr().expect("stub backend has no local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    StubBackend { base_url: format!("http://{addr}"), state }
}

async fn handle_any(
    State(state): State<Arc<StubState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let parsed = if body.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&body).unwrap_or(Value::Null)
    };
    state.requests.lock().unwrap().push(RecordedRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(ToString::to_string),
        authorization: headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(ToString::to_string),
        body: parsed,
    });

    let scripted = state
        .responses
        .lock()
        .unwrap()
        .get(&(method.to_string(), uri.path().to_string()))
        .cloned();
    match scripted {
        Some((status, body)) => {
            let status =
                StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            if body.is_null() {
                (status, String::new()).into_response()
            } else {
                (status, axum::Json(body)).into_response()
            }
        }
        None => (
            StatusCode::NOT_FOUND,
            axum::Json(json!({"detail": "no scripted response"})),
        )
            .into_response(),
    }
}

/// In-memory [`SessionTransport`]. Answer calls always succeed and are
/// logged; completion responses are popped from a scripted queue, falling
/// back to an empty success once the queue runs dry.
#[derive(Default)]
pub(crate) struct FakeTransport {
    complete_script: Mutex<VecDeque<Result<ResultSummary, BackendError>>>,
    complete_calls: Mutex<usize>,
    answers: Mutex<Vec<(u32, Option<String>)>>,
}

impl FakeTransport {
    pub(crate) fn script_complete(&self, result: Result<ResultSummary, BackendError>) {
        self.complete_script.lock().unwrap().push_back(result);
    }

    pub(crate) fn complete_calls(&self) -> usize {
        *self.complete_calls.lock().unwrap()
    }

    pub(crate) fn recorded_answers(&self) -> Vec<(u32, Option<String>)> {
        self.answers.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionTransport for FakeTransport {
    async fn record_answer(
        &self,
        _token: &SessionToken,
        question_number: u32,
        option: &str,
    ) -> Result<(), BackendError> {
        self.answers.lock().unwrap().push((question_number, Some(option.to_string())));
        Ok(())
    }

    async fn clear_answer(
        &self,
        _token: &SessionToken,
        question_number: u32,
    ) -> Result<(), BackendError> {
        self.answers.lock().unwrap().push((question_number, None));
        Ok(())
    }

    async fn complete_session(&self, _token: &SessionToken) -> Result<ResultSummary, BackendError> {
        *self.complete_calls.lock().unwrap() += 1;
        self.complete_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ResultSummary::default()))
    }
}
