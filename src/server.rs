// HTTP request layer
//
// Thin axum front end over the Toolkit: JSON in, JSON out, one route per
// capability. Tool errors are mapped to status codes here and nowhere else.
// Also serves /health, /metrics (Prometheus text) and /api/jobs.

use crate::config::ServerConfig;
use crate::error::{ToolError, ValidationError};
use crate::logging::RequestId;
use crate::metrics::ToolMetrics;
use crate::models::{
    CommandOutput, CrackStarted, CrackStatus, DiscoveryResult, ExploitResult, HashExtraction,
    ScanResult,
};
use crate::registry::RegistrySnapshot;
use crate::services::{ScanType, Toolkit};
use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, Request, State},
    http::{HeaderName, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span, warn, Instrument};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    toolkit: Arc<Toolkit>,
    metrics: Option<Arc<ToolMetrics>>,
}

impl AppState {
    pub fn new(toolkit: Toolkit, metrics: Option<Arc<ToolMetrics>>) -> Self {
        Self {
            toolkit: Arc::new(toolkit),
            metrics,
        }
    }
}

/// A failed capability call, rendered as `{"detail": "..."}`
#[derive(Debug)]
pub struct ApiError(ToolError);

impl From<ToolError> for ApiError {
    fn from(err: ToolError) -> Self {
        Self(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self(err.into())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            ToolError::Validation(_) => StatusCode::BAD_REQUEST,
            ToolError::NotInstalled { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ToolError::Execution { .. } | ToolError::OutputParse { .. } => StatusCode::BAD_GATEWAY,
            ToolError::TimedOut { .. } => StatusCode::GATEWAY_TIMEOUT,
            ToolError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(kind = self.0.kind(), "{}", self.0);
        } else {
            warn!(kind = self.0.kind(), "{}", self.0);
        }
        (status, Json(json!({ "detail": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DiscoverRequest {
    pub interface: Option<String>,
    pub range: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub target: String,
    pub ports: Option<String>,
    pub scan_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct ExploitRequest {
    pub exploit_name: String,
    pub rhosts: String,
    pub rport: Option<u32>,
    pub payload: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub session_id: String,
    pub command: String,
}

#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    pub session_id: String,
    pub shadow_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CrackRequest {
    pub hash_file: String,
    pub wordlist: Option<String>,
}

/// Build the application router
pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .route("/api/network/interfaces", get(list_interfaces))
        .route("/api/network/discover", post(discover))
        .route("/api/nmap/scan", post(scan))
        .route("/api/metasploit/search", get(search))
        .route("/api/metasploit/exploit", post(exploit))
        .route("/api/metasploit/sessions", get(sessions))
        .route("/api/metasploit/command", post(session_command))
        .route("/api/hashes/extract", post(extract_hashes))
        .route("/api/john/crack", post(crack))
        .route("/api/john/status/{*hash_file}", get(crack_status))
        .route("/api/jobs", get(jobs))
        .layer(middleware::from_fn(request_id))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Tag each request with a fresh id, in its span and in the response headers
async fn request_id(mut req: Request, next: Next) -> Response {
    let id = RequestId::new();
    req.extensions_mut().insert(id);

    let span = info_span!("request", request_id = %id, method = %req.method(), path = %req.uri().path());
    let mut response = next.run(req).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    response
}

/// Listen on the configured address until Ctrl-C
pub async fn serve(config: &ServerConfig, state: AppState) -> Result<()> {
    let app = router(state, &config.cors_origins);
    let addr = config.bind_address();

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "Recon Orchestrator API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    let Some(metrics) = state.metrics else {
        return (StatusCode::NOT_FOUND, "Metrics are disabled").into_response();
    };
    match metrics.gather() {
        Ok(text) => (StatusCode::OK, text).into_response(),
        Err(e) => {
            error!("Failed to gather metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error gathering metrics: {}", e),
            )
                .into_response()
        }
    }
}

async fn list_interfaces(State(state): State<AppState>) -> ApiResult<Value> {
    let interfaces = state.toolkit.network.list_interfaces().await?;
    Ok(Json(json!({ "interfaces": interfaces })))
}

async fn discover(
    State(state): State<AppState>,
    Json(req): Json<DiscoverRequest>,
) -> ApiResult<DiscoveryResult> {
    let result = state
        .toolkit
        .network
        .discover_hosts(req.interface.as_deref(), req.range.as_deref())
        .await?;
    Ok(Json(result))
}

async fn scan(State(state): State<AppState>, Json(req): Json<ScanRequest>) -> ApiResult<ScanResult> {
    let scan_type = match req.scan_type.as_deref() {
        Some(s) if !s.trim().is_empty() => s.parse::<ScanType>()?,
        _ => ScanType::default(),
    };
    let result = state
        .toolkit
        .scanner
        .scan_ports(&req.target, req.ports.as_deref(), scan_type)
        .await?;
    Ok(Json(result))
}

async fn search(State(state): State<AppState>, Query(q): Query<SearchQuery>) -> ApiResult<Value> {
    let exploits = state.toolkit.metasploit.search_exploits(&q.query).await?;
    Ok(Json(json!({ "exploits": exploits })))
}

async fn exploit(
    State(state): State<AppState>,
    Json(req): Json<ExploitRequest>,
) -> ApiResult<ExploitResult> {
    let result = state
        .toolkit
        .metasploit
        .run_exploit(&req.exploit_name, &req.rhosts, req.rport, req.payload.as_deref())
        .await?;
    Ok(Json(result))
}

async fn sessions(State(state): State<AppState>) -> ApiResult<Value> {
    let sessions = state.toolkit.metasploit.list_sessions().await?;
    Ok(Json(json!({ "sessions": sessions })))
}

async fn session_command(
    State(state): State<AppState>,
    Query(req): Query<CommandRequest>,
) -> ApiResult<CommandOutput> {
    let output = state
        .toolkit
        .metasploit
        .run_session_command(&req.session_id, &req.command)
        .await?;
    Ok(Json(output))
}

async fn extract_hashes(
    State(state): State<AppState>,
    Json(req): Json<ExtractRequest>,
) -> ApiResult<HashExtraction> {
    let result = state
        .toolkit
        .metasploit
        .extract_credentials(&req.session_id, req.shadow_path.as_deref())
        .await?;
    Ok(Json(result))
}

async fn crack(State(state): State<AppState>, Json(req): Json<CrackRequest>) -> ApiResult<CrackStarted> {
    let result = state
        .toolkit
        .cracking
        .start_cracking(&req.hash_file, req.wordlist.as_deref())
        .await?;
    Ok(Json(result))
}

async fn crack_status(
    State(state): State<AppState>,
    Path(hash_file): Path<String>,
) -> ApiResult<CrackStatus> {
    let status = state.toolkit.cracking.get_cracking_status(&hash_file).await?;
    Ok(Json(status))
}

async fn jobs(State(state): State<AppState>) -> Json<RegistrySnapshot> {
    Json(state.toolkit.registry.snapshot().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::registry::JobRegistry;
    use crate::tools::testing::RecordingRunner;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method};
    use std::time::Duration;
    use tower::ServiceExt;

    fn app_with(runner: RecordingRunner, metrics: Option<Arc<ToolMetrics>>) -> (Router, Arc<RecordingRunner>) {
        let runner = Arc::new(runner);
        let config = Config::default();
        let toolkit = Toolkit::new(&config, runner.clone(), JobRegistry::new());
        let app = router(AppState::new(toolkit, metrics), &config.server.cors_origins);
        (app, runner)
    }

    fn app(runner: RecordingRunner) -> (Router, Arc<RecordingRunner>) {
        app_with(runner, None)
    }

    async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = axum::http::Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app.oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ToolError::NotInstalled { binary: "nmap".into() }, StatusCode::SERVICE_UNAVAILABLE),
            (
                ToolError::Execution { tool: "nmap".into(), exit_code: Some(1), stderr: "x".into() },
                StatusCode::BAD_GATEWAY,
            ),
            (
                ToolError::OutputParse { tool: "nmap".into(), reason: "x".into() },
                StatusCode::BAD_GATEWAY,
            ),
            (
                ToolError::TimedOut { tool: "nmap".into(), after: Duration::from_secs(1) },
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (ToolError::Io(std::io::Error::other("disk")), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[tokio::test]
    async fn test_root_and_health() {
        let (router, _) = app(RecordingRunner::new());
        let (status, body) = send(router.clone(), Method::GET, "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Recon Orchestrator API");

        let (status, body) = send(router, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_request_id_header() {
        let (router, _) = app(RecordingRunner::new());
        let response = router
            .oneshot(axum::http::Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let id = response.headers().get(REQUEST_ID_HEADER).unwrap();
        assert_eq!(id.len(), 36);
    }

    #[tokio::test]
    async fn test_scan_route() {
        let report = r#"<nmaprun><host><status state="up"/><ports>
<port protocol="tcp" portid="21"><state state="open"/><service name="ftp" product="vsftpd" version="2.3.4"/></port>
</ports></host></nmaprun>"#;
        let (router, runner) = app(RecordingRunner::new().completed(report));

        let (status, body) = send(
            router,
            Method::POST,
            "/api/nmap/scan",
            Some(json!({"target": "10.0.0.5", "ports": "21", "scan_type": "tcp"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["vsftpd_detected"], true);
        assert_eq!(runner.invocations()[0].args[0], "-sT");
    }

    #[tokio::test]
    async fn test_unknown_scan_type_is_bad_request() {
        let (router, runner) = app(RecordingRunner::new());
        let (status, body) = send(
            router,
            Method::POST,
            "/api/nmap/scan",
            Some(json!({"target": "10.0.0.5", "scan_type": "xmas"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains("scan_type"));
        assert!(runner.invocations().is_empty());
    }

    #[tokio::test]
    async fn test_exploit_validation_is_bad_request() {
        let (router, runner) = app(RecordingRunner::new());
        let (status, body) = send(
            router,
            Method::POST,
            "/api/metasploit/exploit",
            Some(json!({"exploit_name": "evil;rm -rf", "rhosts": "10.0.0.5"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains("exploit_name"));
        assert!(runner.invocations().is_empty());
    }

    #[tokio::test]
    async fn test_missing_tool_is_service_unavailable() {
        let (router, _) = app(RecordingRunner::new().failing(|| ToolError::NotInstalled {
            binary: "msfconsole".to_string(),
        }));
        let (status, body) = send(router, Method::GET, "/api/metasploit/sessions", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            body["detail"],
            "msfconsole command not found. Please install msfconsole."
        );
    }

    #[tokio::test]
    async fn test_search_route() {
        let (router, runner) = app(
            RecordingRunner::new().completed("exploit/unix/ftp/vsftpd_234_backdoor excellent VSFTPD Backdoor\n"),
        );
        let (status, body) = send(router, Method::GET, "/api/metasploit/search?query=vsftpd", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["exploits"][0]["rank"], "excellent");
        assert_eq!(runner.invocations()[0].args[2], "search vsftpd; exit");
    }

    #[tokio::test]
    async fn test_session_command_route_uses_query() {
        let (router, runner) = app(RecordingRunner::new().completed("root\n"));
        let (status, body) = send(
            router,
            Method::POST,
            "/api/metasploit/command?session_id=2&command=whoami",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["output"], "root\n");
        assert_eq!(runner.scripts()[0], "sessions -i 2\nwhoami\n");
    }

    #[tokio::test]
    async fn test_crack_status_with_encoded_absolute_path() {
        let (router, runner) = app(RecordingRunner::new().completed("root:toor:0:0:::\n"));
        let (status, body) = send(router, Method::GET, "/api/john/status/%2Ftmp%2Fhashes.txt", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cracked_count"], 1);
        assert_eq!(runner.invocations()[0].args[2], "/tmp/hashes.txt");
    }

    #[tokio::test]
    async fn test_crack_missing_file_is_bad_request() {
        let (router, _) = app(RecordingRunner::new());
        let (status, body) = send(
            router,
            Method::POST,
            "/api/john/crack",
            Some(json!({"hash_file": "/nonexistent/hashes.txt"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Validation failed: hash_file does not exist");
    }

    #[tokio::test]
    async fn test_jobs_snapshot_empty() {
        let (router, _) = app(RecordingRunner::new());
        let (status, body) = send(router, Method::GET, "/api/jobs", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"jobs": [], "sessions": []}));
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let metrics = Arc::new(ToolMetrics::new().unwrap());
        metrics.observe("nmap", "completed", Duration::from_millis(5));
        let (router, _) = app_with(RecordingRunner::new(), Some(metrics));

        let response = router
            .oneshot(axum::http::Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let text = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&text).contains("tool_invocations_total"));
    }

    #[tokio::test]
    async fn test_metrics_disabled() {
        let (router, _) = app(RecordingRunner::new());
        let (status, _) = send(router, Method::GET, "/metrics", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
