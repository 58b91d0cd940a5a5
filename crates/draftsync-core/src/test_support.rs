//! In-process task backend for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub domain: String,
    pub owner: String,
    pub authorization: Option<String>,
    pub query_token: Option<String>,
    pub body: Value,
}

#[derive(Default)]
struct MockState {
    requests: Mutex<Vec<RecordedRequest>>,
    task: Mutex<Option<Value>>,
    write_status: Mutex<HashMap<Method, StatusCode>>,
    patch_delay: Mutex<Option<Duration>>,
}

/// Records every write and serves a configurable task record.
pub struct MockBackend {
    pub base_url: String,
    state: Arc<MockState>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let router = Router::new()
            .route(
                "/upload/{domain}/{owner}",
                get(get_task).patch(record_write).post(record_write),
            )
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock backend");
        let addr = listener.local_addr().expect("mock backend address");
        tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    /// URL of a port nobody listens on
    pub async fn unreachable_url() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind probe listener");
        let addr = listener.local_addr().expect("probe address");
        drop(listener);
        format!("http://{addr}")
    }

    /// Body returned by GET as `{"data": task}`; `None` answers 404
    pub fn set_task(&self, task: Option<Value>) {
        *self.state.task.lock().unwrap() = task;
    }

    /// Status answered to PATCH and POST (200 when unset)
    pub fn set_write_status(&self, status: u16) {
        self.set_status_for(Method::PATCH, status);
        self.set_status_for(Method::POST, status);
    }

    pub fn set_status_for(&self, method: Method, status: u16) {
        let status = StatusCode::from_u16(status).unwrap();
        self.state.write_status.lock().unwrap().insert(method, status);
    }

    /// Hold every PATCH response for `delay` after recording the request
    pub fn set_patch_delay(&self, delay: Duration) {
        *self.state.patch_delay.lock().unwrap() = Some(delay);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn writes(&self, method: &Method) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|request| &request.method == method)
            .collect()
    }
}

async fn get_task(
    State(state): State<Arc<MockState>>,
    Path((domain, owner)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    record(&state, Method::GET, domain, owner, &headers, None, Value::Null);
    let task = state.task.lock().unwrap().clone();
    match task {
        Some(task) => Json(serde_json::json!({ "data": task })).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn record_write(
    State(state): State<Arc<MockState>>,
    method: Method,
    Path((domain, owner)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let body = serde_json::from_str(&body).unwrap_or(Value::Null);
    let token = query.get("token").cloned();
    record(&state, method.clone(), domain, owner, &headers, token, body);

    if method == Method::PATCH {
        let delay = *state.patch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
    let status = state
        .write_status
        .lock()
        .unwrap()
        .get(&method)
        .copied()
        .unwrap_or(StatusCode::OK);
    if status.is_success() {
        (status, Json(serde_json::json!({ "ok": true }))).into_response()
    } else {
        (status, Json(serde_json::json!({ "message": "write rejected" }))).into_response()
    }
}

fn record(
    state: &MockState,
    method: Method,
    domain: String,
    owner: String,
    headers: &HeaderMap,
    query_token: Option<String>,
    body: Value,
) {
    let authorization = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    state.requests.lock().unwrap().push(RecordedRequest {
        method,
        domain,
        owner,
        authorization,
        query_token,
        body,
    });
}
