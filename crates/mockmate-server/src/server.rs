//! `MockmateServer`: axum HTTP server hosting the interview channels.

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use mockmate_core::interview::{
    RESPOND_STREAM_PATH, RESPOND_SYNC_PATH, START_STREAM_PATH, START_SYNC_PATH,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::generation::TextGenerator;
use crate::producer::ChannelProducer;
use crate::routes::{self, AppState};
use crate::sessions::{InMemorySessions, SessionCollaborator};
use crate::shutdown::ShutdownCoordinator;

/// The MockMate HTTP server.
pub struct MockmateServer {
    config: ServerConfig,
    producer: ChannelProducer,
    generator_name: Arc<str>,
    shutdown: Arc<ShutdownCoordinator>,
    metrics: Option<PrometheusHandle>,
    start_time: Instant,
}

impl MockmateServer {
    /// Server with in-memory sessions backed by `generator`.
    pub fn new(config: ServerConfig, generator: Arc<dyn TextGenerator>) -> Self {
        let sessions: Arc<dyn SessionCollaborator> = Arc::new(InMemorySessions::new(
            Arc::clone(&generator),
            config.temperatures,
        ));
        Self::with_sessions(config, generator, sessions)
    }

    /// Server with a custom session collaborator.
    pub fn with_sessions(
        config: ServerConfig,
        generator: Arc<dyn TextGenerator>,
        sessions: Arc<dyn SessionCollaborator>,
    ) -> Self {
        let generator_name: Arc<str> = Arc::from(generator.name());
        let shutdown = Arc::new(ShutdownCoordinator::new(config.drain_timeout));
        Self {
            producer: ChannelProducer::new(sessions, generator, config.pacing),
            config,
            generator_name,
            shutdown,
            metrics: None,
            start_time: Instant::now(),
        }
    }

    /// Expose `/metrics` through this handle.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Use `coordinator` for shutdown.
    #[must_use]
    pub fn with_shutdown(mut self, coordinator: Arc<ShutdownCoordinator>) -> Self {
        self.shutdown = coordinator;
        self
    }

    /// Build the axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            producer: self.producer.clone(),
            start_time: self.start_time,
            generator_name: Arc::clone(&self.generator_name),
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route(START_STREAM_PATH, post(routes::start_stream))
            .route(START_SYNC_PATH, post(routes::start_sync))
            .route(RESPOND_STREAM_PATH, post(routes::respond_stream))
            .route(RESPOND_SYNC_PATH, post(routes::respond_sync))
            .route("/api/interview/end", post(routes::end_interview))
            .route("/api/interview/history", get(routes::history))
            .route("/api/interview/session/{id}", get(routes::session_detail))
            .route("/api/health", get(routes::health_handler))
            .route("/metrics", get(routes::metrics_handler))
            .layer(self.cors_layer())
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    fn cors_layer(&self) -> CorsLayer {
        let origins: Vec<HeaderValue> = self
            .config
            .cors_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }

    /// Serve on `listener` until the shutdown coordinator is cancelled, then
    /// give open channels the drain timeout to finish.
    pub async fn serve(&self, listener: TcpListener) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        info!(%addr, generator = %self.generator_name, "mockmate server listening");
        let token = self.shutdown.token();
        let graceful = token.clone();
        let serving = axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { graceful.cancelled().await });
        let mut task = tokio::spawn(async move { serving.await });

        tokio::select! {
            joined = &mut task => {
                return joined.unwrap_or_else(|e| Err(std::io::Error::other(e)));
            }
            () = token.cancelled() => {}
        }
        let result = self.shutdown.drain(task).await.unwrap_or(Ok(()));
        info!("mockmate server stopped");
        result
    }

    /// Shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::ScriptedGenerator;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use mockmate_core::{EventKind, LogicalEvent};
    use mockmate_protocol::decode;
    use serde_json::{Value, json};
    use std::time::Duration;
    use tower::ServiceExt;

    fn make_server() -> MockmateServer {
        let config = ServerConfig {
            pacing: Duration::ZERO,
            ..ServerConfig::default()
        };
        MockmateServer::new(config, Arc::new(ScriptedGenerator::new()))
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_bytes(resp: axum::response::Response) -> bytes::Bytes {
        axum::body::to_bytes(resp.into_body(), 1_000_000).await.unwrap()
    }

    async fn body_json(resp: axum::response::Response) -> Value {
        serde_json::from_slice(&body_bytes(resp).await).unwrap()
    }

    fn start_body(count: u32) -> Value {
        json!({
            "user_id": "u1",
            "resume_summary": "Rust engineer",
            "job_description": "Backend role",
            "question_count": count,
        })
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let app = make_server().router();
        let resp = app.oneshot(get("/api/health")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let parsed = body_json(resp).await;
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["generator"], "scripted");
    }

    #[tokio::test]
    async fn stream_endpoint_headers_and_frames() {
        let app = make_server().router();
        let resp = app
            .oneshot(post_json(START_STREAM_PATH, &start_body(2)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(resp.headers()[header::CACHE_CONTROL], "no-cache");

        let bytes = body_bytes(resp).await;
        assert!(bytes.ends_with(b"data: [DONE]\n\n"));
        let decoded = decode(&bytes);
        assert!(decoded.terminated);
        assert_eq!(decoded.consumed, bytes.len());
        assert_eq!(decoded.events[0].kind(), EventKind::ChannelOpened);
        assert_eq!(
            decoded.events.last().map(LogicalEvent::kind),
            Some(EventKind::DomainTerminal)
        );
    }

    #[tokio::test]
    async fn stream_endpoint_reports_unknown_session_in_band() {
        let app = make_server().router();
        let resp = app
            .oneshot(post_json(
                RESPOND_STREAM_PATH,
                &json!({"session_id": "nope", "answer": "hi"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let decoded = decode(&body_bytes(resp).await);
        assert!(decoded.terminated);
        assert_eq!(
            decoded.events,
            vec![LogicalEvent::transport_error("Session not found")]
        );
    }

    #[tokio::test]
    async fn sync_flow_start_answer_conclude() {
        let server = make_server();

        let resp = server
            .router()
            .oneshot(post_json(START_SYNC_PATH, &start_body(1)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let started = body_json(resp).await;
        assert_eq!(started["completed"], false);
        assert!(started["prompt"]["text"].is_string());
        let session_id = started["session_id"].as_str().unwrap().to_string();

        let resp = server
            .router()
            .oneshot(post_json(
                RESPOND_SYNC_PATH,
                &json!({"session_id": session_id, "answer": "I built a cache."}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let done = body_json(resp).await;
        assert_eq!(done["completed"], true);
        assert_eq!(done["feedback"]["overall_score"], 78.0);

        let resp = server
            .router()
            .oneshot(post_json(
                RESPOND_SYNC_PATH,
                &json!({"session_id": session_id, "answer": "again"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(resp).await["detail"], "Interview already completed");
    }

    #[tokio::test]
    async fn sync_unknown_session_is_404() {
        let resp = make_server()
            .router()
            .oneshot(post_json(
                RESPOND_SYNC_PATH,
                &json!({"session_id": "nope", "answer": "hi"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(resp).await["detail"], "Session not found");
    }

    #[tokio::test]
    async fn invalid_question_count_is_400() {
        let resp = make_server()
            .router()
            .oneshot(post_json(START_SYNC_PATH, &start_body(40)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn end_history_and_detail() {
        let server = make_server();
        let started = body_json(
            server
                .router()
                .oneshot(post_json(START_SYNC_PATH, &start_body(3)))
                .await
                .unwrap(),
        )
        .await;
        let session_id = started["session_id"].as_str().unwrap().to_string();

        let resp = server
            .router()
            .oneshot(post_json("/api/interview/end", &json!({"session_id": session_id})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_json(resp).await["final_feedback"]["summary"].is_string());

        let resp = server
            .router()
            .oneshot(get("/api/interview/history?user_id=u1"))
            .await
            .unwrap();
        let items = body_json(resp).await;
        assert_eq!(items.as_array().map(Vec::len), Some(1));
        assert_eq!(items[0]["session_id"], session_id.as_str());

        let resp = server
            .router()
            .oneshot(get(&format!("/api/interview/session/{session_id}")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["user_id"], "u1");
    }

    #[tokio::test]
    async fn history_requires_user_id() {
        let resp = make_server()
            .router()
            .oneshot(get("/api/interview/history"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn metrics_without_recorder_is_404() {
        let resp = make_server().router().oneshot(get("/metrics")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cors_preflight_allows_dev_origin() {
        let req = Request::builder()
            .method("OPTIONS")
            .uri(START_STREAM_PATH)
            .header(header::ORIGIN, "http://localhost:5173")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();
        let resp = make_server().router().oneshot(req).await.unwrap();
        assert_eq!(
            resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:5173"
        );
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let resp = make_server().router().oneshot(get("/nonexistent")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn serve_stops_on_shutdown() {
        let server = make_server();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        server.shutdown().shutdown();
        server.serve(listener).await.unwrap();
    }

    /// Streams nothing and never finishes.
    struct StalledGenerator;

    #[async_trait::async_trait]
    impl TextGenerator for StalledGenerator {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn stream(
            &self,
            _request: &crate::generation::GenerationRequest,
        ) -> crate::generation::GenerationResult<crate::generation::FragmentStream> {
            Ok(Box::pin(futures::stream::pending::<
                crate::generation::GenerationResult<String>,
            >()))
        }

        async fn complete(
            &self,
            _request: &crate::generation::GenerationRequest,
        ) -> crate::generation::GenerationResult<String> {
            futures::future::pending().await
        }
    }

    #[tokio::test]
    async fn shutdown_aborts_channels_that_outlive_the_drain() {
        let config = ServerConfig {
            pacing: Duration::ZERO,
            drain_timeout: Duration::from_millis(100),
            ..ServerConfig::default()
        };
        let server = Arc::new(MockmateServer::new(config, Arc::new(StalledGenerator)));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}{START_STREAM_PATH}", listener.local_addr().unwrap());
        let serving = Arc::clone(&server);
        let handle = tokio::spawn(async move { serving.serve(listener).await });

        let resp = reqwest::Client::new()
            .post(url)
            .json(&json!({"user_id": "u1", "resume_summary": "r", "job_description": "j"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        server.shutdown().shutdown();
        let stopped = tokio::time::timeout(Duration::from_secs(5), handle).await;
        assert!(stopped.is_ok(), "serve kept waiting for the stalled channel");
        drop(resp);
    }
}
