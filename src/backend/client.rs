use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::Value;

use super::error::BackendError;
use super::wire;
use crate::authoring::QuestionDraft;
use crate::core::config::BackendSettings;
use crate::domain::{DragDropQuestion, ResultSummary, SessionBundle, SessionToken};

/// HTTP client for the CBT API. The bearer token lives on the instance and
/// is attached per request; nothing process-global is mutated.
#[derive(Debug, Clone)]
pub(crate) struct BackendClient {
    client: Client,
    base_url: String,
    auth_token: String,
}

impl BackendClient {
    pub(crate) fn from_settings(settings: &BackendSettings) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(settings.connect_timeout_seconds))
            .timeout(Duration::from_secs(settings.request_timeout_seconds))
            .build()
            .context("Failed to build CBT backend HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            auth_token: settings.auth_token.clone(),
        })
    }

    #[cfg(test)]
    pub(crate) fn for_base_url(base_url: &str, auth_token: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token: auth_token.to_string(),
        }
    }

    pub(crate) async fn fetch_session_questions(
        &self,
        token: &SessionToken,
    ) -> Result<SessionBundle, BackendError> {
        const ENDPOINT: &str = "session questions";
        let url = format!("{}/sessions/{}/questions", self.base_url, token.as_str());
        let payload = self.execute(ENDPOINT, self.client.get(&url)).await?;
        wire::decode_session_bundle(token, &payload)
            .map_err(|reason| BackendError::payload(ENDPOINT, reason))
    }

    pub(crate) async fn record_answer(
        &self,
        token: &SessionToken,
        question_number: u32,
        option: &str,
    ) -> Result<(), BackendError> {
        const ENDPOINT: &str = "record answer";
        let url = format!("{}/sessions/{}/answers", self.base_url, token.as_str());
        let request = self.client.post(&url).json(&wire::encode_record_answer(question_number, option));
        self.execute(ENDPOINT, request).await?;
        Ok(())
    }

    pub(crate) async fn clear_answer(
        &self,
        token: &SessionToken,
        question_number: u32,
    ) -> Result<(), BackendError> {
        const ENDPOINT: &str = "clear answer";
        let url = format!("{}/sessions/{}/clear-answer", self.base_url, token.as_str());
        let request = self.client.post(&url).json(&wire::encode_clear_answer(question_number));
        self.execute(ENDPOINT, request).await?;
        Ok(())
    }

    pub(crate) async fn complete_session(
        &self,
        token: &SessionToken,
    ) -> Result<ResultSummary, BackendError> {
        const ENDPOINT: &str = "complete session";
        let url = format!("{}/sessions/{}/complete", self.base_url, token.as_str());
        let payload = self.execute(ENDPOINT, self.client.post(&url)).await?;
        Ok(wire::decode_result_summary(&payload))
    }

    pub(crate) async fn fetch_drag_drop_questions(
        &self,
        topic_id: Option<&str>,
    ) -> Result<Vec<DragDropQuestion>, BackendError> {
        const ENDPOINT: &str = "drag-drop questions";
        let url = format!("{}/drag-drop-questions", self.base_url);
        let mut request = self.client.get(&url);
        if let Some(topic_id) = topic_id {
            request = request.query(&[("topicId", topic_id)]);
        }
        let payload = self.execute(ENDPOINT, request).await?;
        wire::decode_drag_drop_questions(&payload)
            .map_err(|reason| BackendError::payload(ENDPOINT, reason))
    }

    pub(crate) async fn create_drag_drop_question(
        &self,
        draft: &QuestionDraft,
    ) -> Result<DragDropQuestion, BackendError> {
        const ENDPOINT: &str = "create drag-drop question";
        let url = format!("{}/drag-drop-questions", self.base_url);
        let request = self.client.post(&url).json(&wire::encode_question_draft(draft));
        let payload = self.execute(ENDPOINT, request).await?;
        wire::decode_drag_drop_question(&payload)
            .map_err(|reason| BackendError::payload(ENDPOINT, reason))
    }

    pub(crate) async fn update_drag_drop_question(
        &self,
        id: &str,
        draft: &QuestionDraft,
    ) -> Result<DragDropQuestion, BackendError> {
        const ENDPOINT: &str = "update drag-drop question";
        let url = format!("{}/drag-drop-questions/{id}", self.base_url);
        let request = self.client.put(&url).json(&wire::encode_question_draft(draft));
        let payload = self.execute(ENDPOINT, request).await?;
        wire::decode_drag_drop_question(&payload)
            .map_err(|reason| BackendError::payload(ENDPOINT, reason))
    }

    fn with_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.auth_token.is_empty() {
            request
        } else {
            request.bearer_auth(&self.auth_token)
        }
    }

    async fn execute(
        &self,
        endpoint: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<Value, BackendError> {
        let response = self
            .with_auth(request)
            .send()
            .await
            .map_err(|err| BackendError::transport(endpoint, err))?;

        let status = response.status();
        let raw_body =
            response.text().await.map_err(|err| BackendError::transport(endpoint, err))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<Value>(&raw_body)
                .map(|parsed| extract_error_detail(&parsed))
                .unwrap_or_else(|_| truncated(&raw_body));
            return Err(BackendError::Status { endpoint, status: status.as_u16(), detail });
        }

        if raw_body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str::<Value>(&raw_body)
            .map_err(|err| BackendError::payload(endpoint, format!("non-JSON body: {err}")))
    }
}

fn extract_error_detail(payload: &Value) -> String {
    if let Some(detail) = payload.get("detail") {
        if let Some(text) = detail.as_str() {
            return text.to_string();
        }
        if let Some(items) = detail.as_array() {
            let joined = items
                .iter()
                .filter_map(|item| {
                    item.get("msg")
                        .and_then(Value::as_str)
                        .or_else(|| item.get("message").and_then(Value::as_str))
                })
                .collect::<Vec<_>>()
                .join("; ");
            if !joined.is_empty() {
                return joined;
            }
        }
    }

    payload
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| payload.get("error").and_then(Value::as_str))
        .unwrap_or("unknown_error")
        .to_string()
}

fn truncated(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return "empty body".to_string();
    }
    let mut end = trimmed.len().min(200);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_stub_backend;
    use serde_json::json;
    use time::macros::datetime;

    fn token() -> SessionToken {
        SessionToken::new("tok-42")
    }

    #[tokio::test]
    async fn fetch_session_questions_decodes_and_sends_bearer_token() {
        let stub = spawn_stub_backend().await;
        stub.state.script(
            "GET",
            "/sessions/tok-42/questions",
            200,
            json!({
                "questions": [
                    {"questionNumber": 1, "promptText": "Q1", "options": ["a", "b"]}
                ],
                "deadline": "2026-03-01T10:00:00Z"
            }),
        );

        let client = BackendClient::for_base_url(&stub.base_url, "secret-token");
        let bundle = client.fetch_session_questions(&token()).await.unwrap();

        assert_eq!(bundle.questions.len(), 1);
        assert_eq!(bundle.deadline, datetime!(2026-03-01 10:00:00 UTC));

        let requests = stub.state.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].authorization.as_deref(), Some("Bearer secret-token"));
    }

    #[tokio::test]
    async fn record_answer_posts_canonical_payload() {
        let stub = spawn_stub_backend().await;
        stub.state.script("POST", "/sessions/tok-42/answers", 200, json!({"ok": true}));

        let client = BackendClient::for_base_url(&stub.base_url, "");
        client.record_answer(&token(), 3, "B").await.unwrap();

        let requests = stub.state.requests();
        assert_eq!(requests[0].body["questionNumber"], 3);
        assert_eq!(requests[0].body["selectedOption"], "B");
        assert_eq!(requests[0].authorization, None);
    }

    #[tokio::test]
    async fn server_errors_carry_extracted_detail() {
        let stub = spawn_stub_backend().await;
        stub.state.script(
            "POST",
            "/sessions/tok-42/complete",
            409,
            json!({"detail": "session already completed"}),
        );

        let client = BackendClient::for_base_url(&stub.base_url, "");
        let err = client.complete_session(&token()).await.unwrap_err();

        match err {
            BackendError::Status { status, detail, .. } => {
                assert_eq!(status, 409);
                assert_eq!(detail, "session already completed");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn complete_session_tolerates_empty_ack() {
        let stub = spawn_stub_backend().await;
        stub.state.script("POST", "/sessions/tok-42/complete", 200, Value::Null);

        let client = BackendClient::for_base_url(&stub.base_url, "");
        let summary = client.complete_session(&token()).await.unwrap();
        assert!(summary.is_empty());
    }

    #[tokio::test]
    async fn fetch_drag_drop_questions_passes_topic_filter() {
        let stub = spawn_stub_backend().await;
        stub.state.script(
            "GET",
            "/drag-drop-questions",
            200,
            json!({"questions": []}),
        );

        let client = BackendClient::for_base_url(&stub.base_url, "");
        let questions = client.fetch_drag_drop_questions(Some("topic-9")).await.unwrap();
        assert!(questions.is_empty());

        let requests = stub.state.requests();
        assert_eq!(requests[0].query.as_deref(), Some("topicId=topic-9"));
    }
}
