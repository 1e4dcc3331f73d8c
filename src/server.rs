//! HTTP front end

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Multipart, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::bootstrap::Services;
use crate::config::ServerConfig;
use crate::types::OrchestratorError;

/// Application state shared across handlers
pub struct AppState {
    pub services: Services,
    pub default_timeout_secs: u64,
    pub uploads_dir: PathBuf,
}

impl AppState {
    pub fn new(services: Services, config: &ServerConfig) -> Self {
        Self {
            services,
            default_timeout_secs: config.default_timeout_secs,
            uploads_dir: config.uploads_dir.clone(),
        }
    }
}

type AppStateArc = Arc<AppState>;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    Ok,
    Error,
    Timeout,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub request_id: String,
    pub timeout_seconds: u64,
    pub status: QueryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ToolsResponse {
    pub tools: Vec<ToolInfo>,
}

#[derive(Debug, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub upload_id: String,
    pub filepath: String,
}

pub fn router(state: AppStateArc) -> Router {
    Router::new()
        .route("/v1/query", post(query))
        .route("/v1/tools", get(list_tools))
        .route("/v1/upload", post(upload))
        .route("/health", get(health))
        .with_state(state)
}

/// Serve until the process is stopped
pub async fn run(state: AppState, bind: &str) -> Result<(), OrchestratorError> {
    let app = router(Arc::new(state));
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("Listening on http://{}", bind);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn query(
    State(state): State<AppStateArc>,
    Json(req): Json<QueryRequest>,
) -> (StatusCode, Json<QueryResponse>) {
    let request_id = uuid::Uuid::new_v4().to_string();
    let timeout_seconds = req
        .timeout
        .filter(|&t| t > 0)
        .unwrap_or(state.default_timeout_secs);
    let question = req.query.trim().to_string();

    let reply = |status: QueryStatus, response: Option<String>, error: Option<String>| {
        Json(QueryResponse {
            request_id: request_id.clone(),
            timeout_seconds,
            status,
            response,
            error,
        })
    };

    if question.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            reply(QueryStatus::Error, None, Some("query must not be empty".to_string())),
        );
    }
    info!(%request_id, timeout_seconds, "Query received");

    let cancel = CancellationToken::new();
    let dispatcher = Arc::clone(&state.services.dispatcher);
    let run_cancel = cancel.clone();
    let handle =
        tokio::spawn(async move { dispatcher.run_with_cancel(&question, &run_cancel).await });
    let abort = handle.abort_handle();

    match tokio::time::timeout(Duration::from_secs(timeout_seconds), handle).await {
        Ok(Ok(answer)) => (StatusCode::OK, reply(QueryStatus::Ok, Some(answer), None)),
        Ok(Err(e)) => {
            error!(%request_id, error = %e, "Query task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                reply(QueryStatus::Error, None, Some(e.to_string())),
            )
        }
        Err(_) => {
            warn!(%request_id, timeout_seconds, "Query timed out");
            cancel.cancel();
            abort.abort();
            (
                StatusCode::GATEWAY_TIMEOUT,
                reply(
                    QueryStatus::Timeout,
                    None,
                    Some(format!("query exceeded {} seconds", timeout_seconds)),
                ),
            )
        }
    }
}

async fn list_tools(State(state): State<AppStateArc>) -> Json<ToolsResponse> {
    let tools = state
        .services
        .registry
        .iter()
        .map(|tool| ToolInfo {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
        })
        .collect();
    Json(ToolsResponse { tools })
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn upload(
    State(state): State<AppStateArc>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, (StatusCode, String)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .and_then(basename)
            .ok_or_else(|| (StatusCode::BAD_REQUEST, "missing filename".to_string()))?;
        let data = field
            .bytes()
            .await
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

        let upload_id = uuid::Uuid::new_v4().to_string();
        let path = store_upload(&state.uploads_dir, &upload_id, &filename, &data)
            .await
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
        info!(%upload_id, bytes = data.len(), "Stored upload");

        return Ok(Json(UploadResponse {
            upload_id,
            filepath: path.display().to_string(),
        }));
    }
    Err((StatusCode::BAD_REQUEST, "missing 'file' field".to_string()))
}

/// Write `data` to `<root>/<upload_id>/<filename>` and return its absolute path
async fn store_upload(
    root: &Path,
    upload_id: &str,
    filename: &str,
    data: &[u8],
) -> std::io::Result<PathBuf> {
    let dir = root.join(upload_id);
    tokio::fs::create_dir_all(&dir).await?;
    let path = dir.join(filename);
    tokio::fs::write(&path, data).await?;
    tokio::fs::canonicalize(&path).await
}

/// Final path component of a client-supplied file name
fn basename(name: &str) -> Option<String> {
    let name = name.rsplit(['/', '\\']).next()?;
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use axum::body::Body;
    use axum::http::{Request, header};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::dispatcher::Dispatcher;
    use crate::fallback::FallbackOrchestrator;
    use crate::registry::{Tool, ToolRegistry};

    const MISS: &str = "No relevant documents found in the local dataset.";

    fn app(rag: Tool, uploads_dir: PathBuf) -> Router {
        let mut registry = ToolRegistry::new();
        registry.register(rag).unwrap();
        registry
            .register_executor("wikipedia_search", "Search Wikipedia.", |_| {
                Ok("Mars is the fourth planet.".to_string())
            })
            .unwrap();
        let registry = Arc::new(registry);
        let fallback =
            FallbackOrchestrator::from_registry(&registry, "rag_search", "wikipedia_search");
        let services = Services {
            dispatcher: Arc::new(Dispatcher::fallback_only(fallback)),
            registry,
        };
        let config = ServerConfig {
            uploads_dir,
            ..Default::default()
        };
        router(Arc::new(AppState::new(services, &config)))
    }

    fn missing_rag() -> Tool {
        Tool::new("rag_search", "Search local documents.", |_| Ok(MISS.to_string()))
    }

    async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_query(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/v1/query")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_query_ok() {
        let app = app(missing_rag(), PathBuf::from("uploads"));
        let (status, json) = call(app, post_query(json!({"query": "What is Mars?"}))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["timeout_seconds"], 60);
        assert_eq!(json["response"], "[Wikipedia]\n\nMars is the fourth planet.");
        assert!(json.get("error").is_none());
    }

    #[tokio::test]
    async fn test_query_zero_timeout_uses_default() {
        let app = app(missing_rag(), PathBuf::from("uploads"));
        let (status, json) =
            call(app, post_query(json!({"query": "What is Mars?", "timeout": 0}))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["timeout_seconds"], 60);
    }

    #[tokio::test]
    async fn test_query_empty_is_bad_request() {
        let app = app(missing_rag(), PathBuf::from("uploads"));
        let (status, json) = call(app, post_query(json!({"query": "   "}))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["status"], "error");
        assert!(json.get("response").is_none());
    }

    #[tokio::test]
    async fn test_query_timeout_cancels_run() {
        let saw_cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&saw_cancel);
        let slow_rag = Tool::cancellable("rag_search", "Never finishes.", move |_, token| {
            for _ in 0..1_000 {
                if token.is_cancelled() {
                    flag.store(true, Ordering::SeqCst);
                    return Err("cancelled".to_string());
                }
                std::thread::sleep(Duration::from_millis(5));
            }
            Ok(MISS.to_string())
        });
        let app = app(slow_rag, PathBuf::from("uploads"));

        let (status, json) =
            call(app, post_query(json!({"query": "What is Mars?", "timeout": 1}))).await;

        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(json["status"], "timeout");
        assert_eq!(json["timeout_seconds"], 1);
        assert_eq!(json["error"], "query exceeded 1 seconds");

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(saw_cancel.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_list_tools() {
        let app = app(missing_rag(), PathBuf::from("uploads"));
        let request = Request::builder()
            .uri("/v1/tools")
            .body(Body::empty())
            .unwrap();
        let (status, json) = call(app, request).await;

        assert_eq!(status, StatusCode::OK);
        let tools = json["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0]["name"], "rag_search");
        assert_eq!(tools[1]["description"], "Search Wikipedia.");
    }

    #[tokio::test]
    async fn test_health() {
        let app = app(missing_rag(), PathBuf::from("uploads"));
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, json) = call(app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_store_upload_returns_absolute_path() {
        let root = tempfile::tempdir().unwrap();
        let uploads = root.path().join("uploads");

        let path = store_upload(&uploads, "abc", "refs.bib", b"@book{k, title={T}}")
            .await
            .unwrap();

        assert!(path.is_absolute());
        assert!(path.ends_with("uploads/abc/refs.bib"));
        assert_eq!(std::fs::read(&path).unwrap(), b"@book{k, title={T}}");
    }

    #[test]
    fn test_basename_strips_directories() {
        assert_eq!(basename("refs.bib").as_deref(), Some("refs.bib"));
        assert_eq!(basename("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(basename("C:\\docs\\paper.pdf").as_deref(), Some("paper.pdf"));
        assert_eq!(basename(""), None);
        assert_eq!(basename(".."), None);
    }

    #[test]
    fn test_query_response_shape() {
        let response = QueryResponse {
            request_id: "id".to_string(),
            timeout_seconds: 60,
            status: QueryStatus::Timeout,
            response: None,
            error: Some("query exceeded 60 seconds".to_string()),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "timeout");
        assert!(json.get("response").is_none());
    }

    #[test]
    fn test_query_request_timeout_optional() {
        let req: QueryRequest = serde_json::from_str(r#"{"query": "What is Mars?"}"#).unwrap();
        assert_eq!(req.timeout, None);
    }
}
