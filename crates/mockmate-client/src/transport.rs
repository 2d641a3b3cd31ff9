//! # Turn Transport
//!
//! Both the streaming and the synchronous variant of a turn are built from one
//! [`TurnRequest`]: the same JSON body is posted to
//! [`TurnRequest::stream_path`] or [`TurnRequest::sync_path`].

use std::time::Duration;

use async_trait::async_trait;
use mockmate_core::{InterviewFeedback, SessionId, TurnOutcome, TurnRequest};
use mockmate_settings::ClientSettings;
use reqwest::header::{ACCEPT, HeaderValue};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::consumer::{ChannelHandle, ConsumerLimits};
use crate::errors::{ClientError, Result};
use crate::source::HttpByteSource;

/// Opens turn channels and issues their synchronous equivalent.
#[async_trait]
pub trait TurnTransport: Send + Sync {
    /// Open the streaming channel for `request`.
    async fn open_stream(&self, request: &TurnRequest) -> Result<ChannelHandle>;

    /// Run `request` without streaming.
    async fn send_sync(&self, request: &TurnRequest) -> Result<TurnOutcome>;
}

/// reqwest-backed transport against a MockMate server.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    limits: ConsumerLimits,
    idle_timeout: Duration,
}

impl HttpTransport {
    /// Transport for `base_url` with the given timeouts and decoding limits.
    pub fn new(
        base_url: impl Into<String>,
        connect_timeout: Duration,
        idle_timeout: Duration,
        limits: ConsumerLimits,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            limits,
            idle_timeout,
        })
    }

    /// Transport configured from the client settings.
    pub fn from_settings(settings: &ClientSettings) -> Result<Self> {
        Self::new(
            settings.base_url.clone(),
            Duration::from_millis(settings.connect_timeout_ms),
            Duration::from_millis(settings.idle_timeout_ms),
            ConsumerLimits::from_settings(settings),
        )
    }

    /// Server base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn post(&self, path: &str, body: &Value) -> Result<reqwest::Response> {
        debug!(path, "posting turn request");
        let response = self.client.post(self.url(path)).json(body).send().await?;
        check_status(response).await
    }

    /// End a session early and return its final feedback.
    pub async fn end_interview(&self, session_id: &SessionId) -> Result<InterviewFeedback> {
        #[derive(Deserialize)]
        struct EndResponse {
            final_feedback: InterviewFeedback,
        }

        let response = self
            .post("/api/interview/end", &json!({ "session_id": session_id }))
            .await?;
        let body: EndResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;
        Ok(body.final_feedback)
    }
}

#[async_trait]
impl TurnTransport for HttpTransport {
    async fn open_stream(&self, request: &TurnRequest) -> Result<ChannelHandle> {
        let response = self
            .client
            .post(self.url(request.stream_path()))
            .header(ACCEPT, HeaderValue::from_static("text/event-stream"))
            .json(&request.body())
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(ChannelHandle::open(
            HttpByteSource::new(response, self.idle_timeout),
            self.limits,
        ))
    }

    async fn send_sync(&self, request: &TurnRequest) -> Result<TurnOutcome> {
        let response = self.post(request.sync_path(), &request.body()).await?;
        response
            .json::<TurnOutcome>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("detail").and_then(Value::as_str).map(str::to_owned))
        .unwrap_or(body);
    Err(ClientError::Status {
        status: status.as_u16(),
        message,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use mockmate_core::{AnswerTurn, EventKind, StartInterview};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport(server: &MockServer) -> HttpTransport {
        HttpTransport::new(
            server.uri(),
            Duration::from_secs(2),
            Duration::from_secs(2),
            ConsumerLimits::default(),
        )
        .unwrap()
    }

    fn start() -> TurnRequest {
        TurnRequest::Start(StartInterview::new("u1", "resume", "job"))
    }

    #[tokio::test]
    async fn both_paths_post_the_same_body() {
        let server = MockServer::start().await;
        let request = start();
        Mock::given(method("POST"))
            .and(path("/api/interview/start"))
            .and(header("accept", "text/event-stream"))
            .and(body_json(request.body()))
            .respond_with(ResponseTemplate::new(200).set_body_string("data: [DONE]\n\n"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/interview/start/sync"))
            .and(body_json(request.body()))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"completed": false})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let t = transport(&server);
        let events: Vec<_> = t.open_stream(&request).await.unwrap().collect().await;
        assert!(events.is_empty());
        let outcome = t.send_sync(&request).await.unwrap();
        assert!(!outcome.completed);
    }

    #[tokio::test]
    async fn stream_body_is_decoded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/interview/respond-stream"))
            .respond_with(ResponseTemplate::new(200).set_body_string(concat!(
                "data: {\"type\":\"channel-opened\",\"data\":{\"session_id\":\"s1\"}}\n\n",
                "data: {\"type\":\"domain-terminal\",\"data\":{\"completed\":false}}\n\n",
                "data: [DONE]\n\n",
            )))
            .mount(&server)
            .await;

        let request = TurnRequest::Answer(AnswerTurn::new(SessionId::from_raw("s1"), "hi"));
        let mut handle = transport(&server).open_stream(&request).await.unwrap();
        let kinds: Vec<EventKind> = (&mut handle).map(|e| e.kind()).collect().await;
        assert_eq!(kinds, vec![EventKind::ChannelOpened, EventKind::DomainTerminal]);
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn non_success_status_carries_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/interview/start/sync"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"detail": "Session not found"})),
            )
            .mount(&server)
            .await;

        let err = transport(&server).send_sync(&start()).await.unwrap_err();
        match err {
            ClientError::Status { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Session not found");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn stream_open_fails_on_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/interview/start"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = transport(&server).open_stream(&start()).await.err().unwrap();
        assert!(matches!(err, ClientError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn end_interview_returns_feedback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/interview/end"))
            .and(body_json(json!({"session_id": "s1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "final_feedback": {"overall_score": 70.0, "summary": "ok"}
            })))
            .mount(&server)
            .await;

        let feedback = transport(&server)
            .end_interview(&SessionId::from_raw("s1"))
            .await
            .unwrap();
        assert_eq!(feedback.summary, "ok");
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let t = HttpTransport::new(
            "http://localhost:8000/",
            Duration::from_secs(1),
            Duration::from_secs(1),
            ConsumerLimits::default(),
        )
        .unwrap();
        assert_eq!(t.url("/api/health"), "http://localhost:8000/api/health");
    }
}
