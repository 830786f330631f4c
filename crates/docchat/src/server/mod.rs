//! HTTP server for the docchat system

pub mod routes;
pub mod state;

use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::RagConfig;
use crate::error::{Error, Result};
use state::AppState;

/// Docchat HTTP server
pub struct DocchatServer {
    config: RagConfig,
    state: AppState,
}

impl DocchatServer {
    /// Create a new server. Must be called inside a Tokio runtime.
    pub fn new(config: RagConfig) -> Result<Self> {
        let state = AppState::new(config.clone())?;
        Ok(Self { config, state })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Start the server
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.server.host, self.config.server.port)
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address: {}", e)))?;

        let router = build_router(self.state);

        tracing::info!("Starting docchat server on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind {}: {}", addr, e)))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| Error::internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

/// Build the router with all routes
pub fn build_router(state: AppState) -> Router {
    let server_config = &state.config().server;
    let router = Router::new()
        .route("/health", get(health_check))
        .nest("/chat", routes::chat_routes(server_config.max_upload_size));

    let router = if server_config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        router.layer(cors)
    } else {
        router
    };

    router
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let embedding_ok = state.embedder().health_check().await.unwrap_or(false);
    let llm_ok = state.llm().health_check().await.unwrap_or(false);

    Json(json!({
        "status": "ok",
        "service": "docchat",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": state.registry().len(),
        "jobs": state.job_queue().stats(),
        "providers": {
            "embedding": { "name": state.embedder().name(), "healthy": embedding_ok },
            "llm": { "name": state.llm().name(), "model": state.llm().model(), "healthy": llm_ok },
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedLlm, StubEmbedder, StubExtractor};
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tower::util::ServiceExt;

    const BOUNDARY: &str = "docchat-test-boundary";

    fn app() -> Router {
        let mut config = RagConfig::default();
        config.retrieval.similarity_threshold = 0.01;
        config.embeddings.dimensions = 8;
        let state = AppState::with_providers(
            config,
            Arc::new(StubEmbedder::new(8)),
            Arc::new(ScriptedLlm::answering("Rent is due on the first.")),
            Arc::new(StubExtractor),
        )
        .unwrap();
        build_router(state)
    }

    fn multipart(session_id: Option<&str>, files: &[(&str, &str)]) -> Request<Body> {
        let mut body = String::new();
        if let Some(session_id) = session_id {
            body.push_str(&format!(
                "--{}\r\nContent-Disposition: form-data; name=\"session_id\"\r\n\r\n{}\r\n",
                BOUNDARY, session_id
            ));
        }
        for (filename, content) in files {
            body.push_str(&format!(
                "--{}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{}\"\r\nContent-Type: text/plain\r\n\r\n{}\r\n",
                BOUNDARY, filename, content
            ));
        }
        body.push_str(&format!("--{}--\r\n", BOUNDARY));

        Request::builder()
            .method(Method::POST)
            .uri("/chat/index")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app().oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["providers"]["llm"]["healthy"], true);
    }

    #[tokio::test]
    async fn test_query_unknown_session_is_i_dont_know() {
        let response = app()
            .oneshot(json_request(
                Method::POST,
                "/chat/query",
                json!({"question": "When is rent due?", "session_id": "nobody"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["answer"], "I don't know");
        assert_eq!(body["grounded"], false);
    }

    #[tokio::test]
    async fn test_query_validation_errors() {
        let response = app()
            .oneshot(json_request(
                Method::POST,
                "/chat/query",
                json!({"question": "ok?", "session_id": "s1", "top_k": 50}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["type"], "invalid_query");
    }

    #[tokio::test]
    async fn test_index_then_query() {
        let app = app();
        let text = "Rent is due on the first day of each month.";

        let response = app
            .clone()
            .oneshot(multipart(Some("lease"), &[("lease.txt", text)]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = body_json(response).await;
        assert_eq!(body["session_id"], "lease");
        assert_eq!(body["total_chunks"], 0);
        let job_id = body["job_id"].as_str().unwrap().to_string();

        let mut status = Value::Null;
        for _ in 0..100 {
            let response = app
                .clone()
                .oneshot(get(&format!("/chat/jobs/{}", job_id)))
                .await
                .unwrap();
            status = body_json(response).await;
            if status["status"] == "complete" || status["status"] == "failed" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(status["status"], "complete");
        assert_eq!(status["total_chunks"], 1);

        let response = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/chat/query",
                json!({"question": text, "session_id": "lease"}),
            ))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["grounded"], true);
        assert_eq!(body["answer"], "Rent is due on the first.");
        assert_eq!(body["sources"][0]["filename"], "lease.txt");

        let body = body_json(app.clone().oneshot(get("/chat/sessions/lease")).await.unwrap()).await;
        assert_eq!(body["index"]["chunk_count"], 1);
        assert_eq!(body["ingestion"]["status"], "complete");

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::DELETE)
                    .uri("/chat/sessions/lease")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_json(response).await["evicted"], true);

        let body = body_json(app.oneshot(get("/chat/sessions/lease")).await.unwrap()).await;
        assert!(body["index"].is_null());
    }

    #[tokio::test]
    async fn test_index_generates_session_id() {
        let response = app()
            .oneshot(multipart(None, &[("notes.txt", "some notes")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = body_json(response).await;
        assert!(body["session_id"].as_str().unwrap().starts_with("session_"));
    }

    #[tokio::test]
    async fn test_index_without_files() {
        let response = app().oneshot(multipart(Some("s1"), &[])).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_job_is_404() {
        let response = app()
            .oneshot(get(&format!("/chat/jobs/{}", uuid::Uuid::new_v4())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
