//! Backend client for partial saves, hydration and final submission.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::auth::TokenProvider;
use crate::config::normalize_base_url;
use crate::models::{Draft, FieldEntry, OwnerId, TaskDomain};

const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(20);
const MAX_ERROR_BODY_CHARS: usize = 180;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Invalid remote configuration: {0}")]
    InvalidConfiguration(String),
    #[error("No auth token available")]
    MissingToken,
    #[error("Task API request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Task API error: {0}")]
    Api(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// A task record as the backend reports it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskRecord {
    pub is_done: bool,
    pub subdomain: Vec<String>,
    /// `questionN` → first answer
    pub answers: BTreeMap<String, String>,
}

impl TaskRecord {
    fn from_value(data: &Value) -> Option<Self> {
        let object = data.as_object()?;

        let is_done = object
            .get("isDone")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let subdomain = object
            .get("subdomain")
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let answers = object
            .iter()
            .filter(|(key, _)| key.starts_with("question"))
            .filter_map(|(key, value)| {
                let first = value.as_array()?.first()?.as_str()?;
                Some((key.clone(), first.to_string()))
            })
            .collect();

        Some(Self {
            is_done,
            subdomain,
            answers,
        })
    }

    /// Editable draft for this record; finalized records never reopen.
    ///
    /// Prompts are empty and the version starts at 0 because the backend does
    /// not carry either.
    #[must_use]
    pub fn into_draft(self, owner: OwnerId) -> Option<Draft> {
        if self.is_done {
            return None;
        }
        let mut draft = Draft::new(owner);
        draft.form_fields = self
            .answers
            .into_iter()
            .map(|(field, answer)| (field, FieldEntry::new("", answer)))
            .collect();
        draft.selected_categories = self.subdomain.into_iter().collect();
        Some(draft)
    }
}

/// Request body shared by PATCH, POST and the unload beacon: the category set
/// under `subdomain` plus each non-blank answer as a one-element array.
#[must_use]
pub fn task_payload(draft: &Draft) -> Value {
    let mut payload = Map::new();
    payload.insert(
        "subdomain".to_string(),
        Value::from(draft.selected_categories.as_slice().to_vec()),
    );
    for (field, answer) in draft.answered_fields() {
        payload.insert(field.to_string(), Value::from(vec![answer.to_string()]));
    }
    Value::Object(payload)
}

#[derive(Debug, Deserialize)]
struct TaskResponse {
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct TaskApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// Client for `{base}/upload/{domain}/{owner}`.
///
/// Every call asks the [`TokenProvider`] first and fails with
/// [`RemoteError::MissingToken`] before touching the network when there is
/// no token.
#[derive(Clone)]
pub struct RemoteSyncClient {
    task_url: String,
    owner: OwnerId,
    client: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
    submit_timeout: Duration,
}

impl RemoteSyncClient {
    pub fn new(
        base_url: impl Into<String>,
        domain: TaskDomain,
        owner: OwnerId,
        tokens: Arc<dyn TokenProvider>,
    ) -> RemoteResult<Self> {
        let base_url = match normalize_base_url(&base_url.into()) {
            Ok(Some(url)) => url,
            Ok(None) => {
                return Err(RemoteError::InvalidConfiguration(
                    "api base URL must not be empty".to_string(),
                ))
            }
            Err(message) => {
                return Err(RemoteError::InvalidConfiguration(format!(
                    "api base URL {message}"
                )))
            }
        };
        let task_url = format!(
            "{base_url}/upload/{domain}/{}",
            urlencoding::encode(owner.as_str())
        );
        Ok(Self {
            task_url,
            owner,
            client: reqwest::Client::builder().build()?,
            tokens,
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
        })
    }

    #[must_use]
    pub const fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout = timeout;
        self
    }

    pub fn task_url(&self) -> &str {
        &self.task_url
    }

    pub fn has_token(&self) -> bool {
        self.tokens.access_token().is_some()
    }

    fn token(&self) -> RemoteResult<String> {
        self.tokens.access_token().ok_or(RemoteError::MissingToken)
    }

    /// Fetch the user's task record; `None` when the backend has none
    pub async fn fetch_task(&self) -> RemoteResult<Option<TaskRecord>> {
        let token = self.token()?;
        let response = self
            .client
            .get(&self.task_url)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let payload = response.json::<TaskResponse>().await?;
        Ok(payload.data.as_ref().and_then(TaskRecord::from_value))
    }

    /// Initial draft from a submitted-but-incomplete task record.
    ///
    /// Finalized records, missing records and any failure all yield `None`.
    pub async fn fetch_initial(&self) -> Option<Draft> {
        match self.fetch_task().await {
            Ok(Some(record)) if record.is_done => {
                tracing::debug!(url = %self.task_url, "Task already submitted; not hydrating");
                None
            }
            Ok(Some(record)) => record.into_draft(self.owner.clone()),
            Ok(None) => None,
            Err(RemoteError::MissingToken) => {
                tracing::debug!("Skipping draft hydration without auth token");
                None
            }
            Err(error) => {
                tracing::warn!("Failed to fetch draft from backend: {}", error);
                None
            }
        }
    }

    /// PATCH the non-blank answers and categories (idempotent partial update)
    pub async fn push_partial(&self, draft: &Draft) -> RemoteResult<()> {
        let token = self.token()?;
        let response = self
            .client
            .patch(&self.task_url)
            .bearer_auth(token)
            .json(&task_payload(draft))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        tracing::debug!(version = draft.version, "Draft pushed to backend");
        Ok(())
    }

    /// POST the final submission
    pub async fn submit_final(&self, draft: &Draft) -> RemoteResult<()> {
        let token = self.token()?;
        let response = self
            .client
            .post(&self.task_url)
            .bearer_auth(token)
            .timeout(self.submit_timeout)
            .json(&task_payload(draft))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        tracing::info!(url = %self.task_url, "Task submitted");
        Ok(())
    }

    /// Fire-and-forget POST with the token in the query string, for use
    /// while the page is going away. Returns `None` without a token.
    pub fn send_beacon(&self, draft: &Draft) -> Option<JoinHandle<()>> {
        let token = self.tokens.access_token()?;
        let request = self
            .client
            .post(&self.task_url)
            .query(&[("token", token)])
            .json(&task_payload(draft));

        Some(tokio::spawn(async move {
            match request.send().await {
                Ok(response) if response.status().is_success() => {}
                Ok(response) => {
                    tracing::debug!(status = response.status().as_u16(), "Beacon rejected");
                }
                Err(error) => tracing::debug!("Beacon failed: {}", error),
            }
        }))
    }
}

async fn api_error(response: reqwest::Response) -> RemoteError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    RemoteError::Api(parse_api_error(status, &body))
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<TaskApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed: String = body.trim().chars().take(MAX_ERROR_BODY_CHARS).collect();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SharedToken;
    use crate::test_support::MockBackend;
    use axum::http::Method;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn owner() -> OwnerId {
        OwnerId::new("u1").unwrap()
    }

    fn client(base_url: &str, token: Option<&str>) -> RemoteSyncClient {
        let tokens = Arc::new(SharedToken::new(token.map(str::to_string)));
        RemoteSyncClient::new(base_url, TaskDomain::Tech, owner(), tokens).unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_base_url() {
        let tokens = Arc::new(SharedToken::default());
        for raw in ["", "  ", "api.example.com"] {
            let error = RemoteSyncClient::new(raw, TaskDomain::Tech, owner(), tokens.clone())
                .err()
                .unwrap();
            assert!(matches!(error, RemoteError::InvalidConfiguration(_)));
        }
    }

    #[test]
    fn test_task_url_encodes_owner() {
        let tokens = Arc::new(SharedToken::default());
        let client = RemoteSyncClient::new(
            "https://api.example.com/",
            TaskDomain::Design,
            OwnerId::new("a b").unwrap(),
            tokens,
        )
        .unwrap();
        assert_eq!(client.task_url(), "https://api.example.com/upload/design/a%20b");
    }

    #[test]
    fn test_payload_skips_blank_answers() {
        let mut draft = Draft::new(owner());
        draft.selected_categories.insert("frontend");
        draft.set_answer("question1", "Prompt", "an answer");
        draft.set_answer("question2", "Prompt", "  ");

        assert_eq!(
            task_payload(&draft),
            json!({"subdomain": ["frontend"], "question1": ["an answer"]})
        );
    }

    #[test]
    fn test_parse_api_error_prefers_message() {
        let message = parse_api_error(StatusCode::BAD_REQUEST, r#"{"message":" nope "}"#);
        assert_eq!(message, "nope (400)");
        assert_eq!(parse_api_error(StatusCode::BAD_GATEWAY, ""), "HTTP 502");
        assert_eq!(
            parse_api_error(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
            "boom (500)"
        );
        let long = parse_api_error(StatusCode::BAD_GATEWAY, &"x".repeat(500));
        assert_eq!(long, format!("{} (502)", "x".repeat(180)));
    }

    #[test]
    fn test_task_record_reads_question_keys_only() {
        let record = TaskRecord::from_value(&json!({
            "subdomain": ["backend", 7],
            "question1": ["first"],
            "question2": [],
            "question3": [42],
            "notes": ["ignored"],
            "isDone": false
        }))
        .unwrap();

        assert_eq!(record.subdomain, vec!["backend".to_string()]);
        assert_eq!(record.answers.len(), 1);
        assert_eq!(record.answers["question1"], "first");
    }

    #[tokio::test]
    async fn test_push_partial_sends_patch_with_bearer() {
        let backend = MockBackend::start().await;
        let client = client(&backend.base_url, Some("jwt"));

        let mut draft = Draft::new(owner());
        draft.set_answer("question1", "", "draft answer");
        client.push_partial(&draft).await.unwrap();

        let patches = backend.writes(&Method::PATCH);
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].domain, "tech");
        assert_eq!(patches[0].owner, "u1");
        assert_eq!(patches[0].authorization.as_deref(), Some("Bearer jwt"));
        assert_eq!(
            patches[0].body,
            json!({"subdomain": [], "question1": ["draft answer"]})
        );
    }

    #[tokio::test]
    async fn test_push_partial_reports_non_success() {
        let backend = MockBackend::start().await;
        backend.set_write_status(503);
        let client = client(&backend.base_url, Some("jwt"));

        let error = client.push_partial(&Draft::new(owner())).await.unwrap_err();
        assert!(matches!(error, RemoteError::Api(ref message) if message.contains("503")));
    }

    #[tokio::test]
    async fn test_missing_token_skips_request() {
        let backend = MockBackend::start().await;
        let client = client(&backend.base_url, None);

        let error = client.push_partial(&Draft::new(owner())).await.unwrap_err();
        assert!(matches!(error, RemoteError::MissingToken));
        assert!(client.fetch_initial().await.is_none());
        assert!(client.send_beacon(&Draft::new(owner())).is_none());
        assert!(backend.requests().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_initial_hydrates_open_task() {
        let backend = MockBackend::start().await;
        backend.set_task(Some(json!({
            "subdomain": ["frontend"],
            "question1": ["saved answer"],
            "isDone": false
        })));
        let client = client(&backend.base_url, Some("jwt"));

        let draft = client.fetch_initial().await.unwrap();
        assert_eq!(draft.version, 0);
        assert_eq!(draft.owner_id, owner());
        assert_eq!(draft.form_fields["question1"], FieldEntry::new("", "saved answer"));
        assert_eq!(draft.selected_categories.as_slice(), ["frontend"]);
    }

    #[tokio::test]
    async fn test_fetch_initial_ignores_finalized_task() {
        let backend = MockBackend::start().await;
        backend.set_task(Some(json!({
            "subdomain": ["frontend"],
            "question1": ["final answer"],
            "isDone": true
        })));
        let client = client(&backend.base_url, Some("jwt"));

        assert!(client.fetch_initial().await.is_none());
    }

    #[tokio::test]
    async fn test_fetch_initial_treats_missing_record_as_absent() {
        let backend = MockBackend::start().await;
        let client = client(&backend.base_url, Some("jwt"));
        assert!(client.fetch_task().await.unwrap().is_none());
        assert!(client.fetch_initial().await.is_none());
    }

    #[tokio::test]
    async fn test_fetch_initial_swallows_network_failure() {
        let url = MockBackend::unreachable_url().await;
        let client = client(&url, Some("jwt"));
        assert!(client.fetch_initial().await.is_none());
    }

    #[tokio::test]
    async fn test_beacon_posts_with_query_token() {
        let backend = MockBackend::start().await;
        let client = client(&backend.base_url, Some("jwt"));

        let mut draft = Draft::new(owner());
        draft.selected_categories.insert("ml");
        client.send_beacon(&draft).unwrap().await.unwrap();

        let posts = backend.writes(&Method::POST);
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].query_token.as_deref(), Some("jwt"));
        assert_eq!(posts[0].authorization, None);
        assert_eq!(posts[0].body, json!({"subdomain": ["ml"]}));
    }

    #[tokio::test]
    async fn test_submit_final_posts_payload() {
        let backend = MockBackend::start().await;
        let client = client(&backend.base_url, Some("jwt"));

        let mut draft = Draft::new(owner());
        draft.set_answer("question2", "", "done");
        client.submit_final(&draft).await.unwrap();

        let posts = backend.writes(&Method::POST);
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].authorization.as_deref(), Some("Bearer jwt"));
        assert_eq!(posts[0].body, json!({"subdomain": [], "question2": ["done"]}));
    }
}
