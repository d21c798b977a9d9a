use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;

use super::error::ApiError;
use super::types::*;
use super::BackendApi;
use crate::config::ClientConfig;
use crate::upload::SelectedFile;

/// `reqwest`-backed client for the Health Navigator backend.
///
/// Every request carries the configured timeout individually, so a slow
/// cold start on one call does not affect the budget of the next.
pub struct HttpBackend {
    config: ClientConfig,
    base: Url,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let base = Url::parse(config.base_url())
            .map_err(|e| ApiError::HttpClient(format!("Invalid base URL: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::HttpClient(format!(
                "Invalid base URL: {}",
                config.base_url()
            )));
        }
        let client = reqwest::Client::builder()
            .user_agent(concat!("health-navigator/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::HttpClient(e.to_string()))?;

        Ok(Self {
            config,
            base,
            client,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Base URL plus path segments, each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let response = request
            .timeout(self.config.timeout())
            .send()
            .await
            .map_err(|e| {
                ApiError::from_transport(e, self.config.base_url(), self.config.timeout())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status.as_u16(), &body));
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = self.send(request).await?;
        let body = response.bytes().await.map_err(|e| {
            ApiError::from_transport(e, self.config.base_url(), self.config.timeout())
        })?;
        serde_json::from_slice(&body).map_err(|e| ApiError::ResponseParsing(e.to_string()))
    }
}

#[async_trait]
impl BackendApi for HttpBackend {
    async fn health(&self) -> Result<(), ApiError> {
        self.send(self.client.get(self.url(&["health"]))).await?;
        Ok(())
    }

    async fn upload(&self, file: &SelectedFile) -> Result<UploadResponse, ApiError> {
        let part = Part::bytes(file.bytes().to_vec())
            .file_name(file.file_name().to_string())
            .mime_str(file.mime())
            .map_err(|e| ApiError::HttpClient(e.to_string()))?;
        let form = Form::new().part("file", part);

        tracing::debug!(file = file.file_name(), size = file.size(), "Uploading report");
        self.send_json(self.client.post(self.url(&["api", "upload"])).multipart(form))
            .await
    }

    async fn analyze(&self, report_id: &str) -> Result<AnalysisResponse, ApiError> {
        self.send_json(self.client.post(self.url(&["api", "analyze", report_id])))
            .await
    }

    async fn ask(&self, request: &AskRequest) -> Result<AskResponse, ApiError> {
        self.send_json(self.client.post(self.url(&["api", "ask"])).json(request))
            .await
    }

    async fn get_report(&self, report_id: &str) -> Result<ReportInfo, ApiError> {
        self.send_json(self.client.get(self.url(&["api", "report", report_id])))
            .await
    }

    async fn list_reports(&self) -> Result<ReportListing, ApiError> {
        self.send_json(self.client.get(self.url(&["api", "reports"])))
            .await
    }

    async fn delete_report(&self, report_id: &str) -> Result<DeleteResponse, ApiError> {
        self.send_json(self.client.delete(self.url(&["api", "report", report_id])))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::extract::{Multipart, Path, State};
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;

    /// What the fake backend saw.
    #[derive(Default)]
    struct Seen {
        upload_field: Option<String>,
        upload_file_name: Option<String>,
        upload_content_type: Option<String>,
        upload_len: usize,
        analyzed: Vec<String>,
        asked: Vec<serde_json::Value>,
    }

    type Shared = Arc<Mutex<Seen>>;

    async fn upload(State(seen): State<Shared>, mut multipart: Multipart) -> impl IntoResponse {
        while let Some(field) = multipart.next_field().await.unwrap() {
            let name = field.name().map(str::to_string);
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let data = field.bytes().await.unwrap();
            let mut seen = seen.lock().unwrap();
            seen.upload_field = name;
            seen.upload_file_name = file_name;
            seen.upload_content_type = content_type;
            seen.upload_len = data.len();
        }
        Json(json!({
            "report_id": "rep-123",
            "filename": "labs.pdf",
            "file_size": 15,
            "message": "File uploaded successfully.",
            "status": "uploaded"
        }))
    }

    async fn analyze(State(seen): State<Shared>, Path(id): Path<String>) -> impl IntoResponse {
        seen.lock().unwrap().analyzed.push(id.clone());
        if id == "missing" {
            return (StatusCode::NOT_FOUND, Json(json!({"detail": "Report not found"})))
                .into_response();
        }
        Json(json!({
            "report_id": id,
            "report_type": "Lipid Panel",
            "key_findings": [{"metric": "LDL", "value": "160", "status": "elevated", "range": "<100"}],
            "summary": "LDL is high.",
            "next_steps": ["Discuss statins"],
            "urgency": "moderate",
            "confidence_score": 0.9
        }))
        .into_response()
    }

    async fn ask(State(seen): State<Shared>, Json(body): Json<serde_json::Value>) -> impl IntoResponse {
        seen.lock().unwrap().asked.push(body);
        Json(json!({"answer": "LDL is bad cholesterol.", "confidence": 0.8, "sources": ["Section 1"]}))
    }

    async fn report(Path(id): Path<String>) -> impl IntoResponse {
        Json(json!({"report_id": id, "status": "uploaded", "filename": "labs.pdf", "message": "Processing..."}))
    }

    async fn reports() -> impl IntoResponse {
        Json(json!({"total": 1, "reports": [{"report_id": "rep-123", "filename": "labs.pdf", "status": "analyzed", "file_size": 15}]}))
    }

    async fn remove(Path(id): Path<String>) -> impl IntoResponse {
        Json(json!({"message": "Report deleted successfully", "report_id": id}))
    }

    async fn broken() -> impl IntoResponse {
        (StatusCode::BAD_GATEWAY, "<html>upstream down</html>")
    }

    async fn slow() -> impl IntoResponse {
        tokio::time::sleep(Duration::from_secs(5)).await;
        "late"
    }

    async fn start_backend() -> (String, Shared, tokio::task::JoinHandle<()>) {
        let seen: Shared = Arc::default();
        let app = Router::new()
            .route("/health", get(|| async { Json(json!({"status": "healthy"})) }))
            .route("/api/upload", post(upload))
            .route("/api/analyze/:id", post(analyze))
            .route("/api/ask", post(ask))
            .route("/api/report/:id", get(report).delete(remove))
            .route("/api/reports", get(reports))
            .route("/broken/health", get(broken))
            .route("/slow/health", get(slow))
            .route("/garbage/api/reports", get(|| async { "not json" }))
            .with_state(seen.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://127.0.0.1:{}", addr.port()), seen, handle)
    }

    fn backend(base_url: &str) -> HttpBackend {
        HttpBackend::new(ClientConfig::new(base_url, Duration::from_secs(5)).unwrap()).unwrap()
    }

    fn pdf() -> SelectedFile {
        SelectedFile::new("labs.pdf", "application/pdf", b"%PDF-1.4 sample".to_vec()).unwrap()
    }

    #[tokio::test]
    async fn health_ok() {
        let (url, _seen, server) = start_backend().await;
        backend(&url).health().await.unwrap();
        server.abort();
    }

    #[tokio::test]
    async fn health_non_2xx_is_status_error() {
        let (url, _seen, server) = start_backend().await;
        let err = backend(&format!("{url}/broken")).health().await.unwrap_err();
        assert_eq!(err, ApiError::Status { status: 502, message: "HTTP 502".into() });
        server.abort();
    }

    #[tokio::test]
    async fn health_times_out() {
        let (url, _seen, server) = start_backend().await;
        let config = ClientConfig::new(&format!("{url}/slow"), Duration::from_millis(100)).unwrap();
        let err = HttpBackend::new(config).unwrap().health().await.unwrap_err();
        assert_eq!(err, ApiError::Timeout(Duration::from_millis(100)));
        server.abort();
    }

    #[tokio::test]
    async fn connection_refused_is_connection_error() {
        // Bind then drop to get a port nobody listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let url = format!("http://127.0.0.1:{port}");
        let err = backend(&url).health().await.unwrap_err();
        assert_eq!(err, ApiError::Connection(url));
    }

    #[tokio::test]
    async fn upload_sends_multipart_file_field() {
        let (url, seen, server) = start_backend().await;
        let resp = backend(&url).upload(&pdf()).await.unwrap();
        assert_eq!(resp.report_id, "rep-123");
        assert_eq!(resp.file_size, Some(15));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.upload_field.as_deref(), Some("file"));
        assert_eq!(seen.upload_file_name.as_deref(), Some("labs.pdf"));
        assert_eq!(seen.upload_content_type.as_deref(), Some("application/pdf"));
        assert_eq!(seen.upload_len, b"%PDF-1.4 sample".len());
        server.abort();
    }

    #[tokio::test]
    async fn analyze_posts_to_report_path() {
        let (url, seen, server) = start_backend().await;
        let resp = backend(&url).analyze("rep-123").await.unwrap();
        assert_eq!(resp.report_type.as_deref(), Some("Lipid Panel"));
        assert_eq!(resp.key_findings.as_ref().map(Vec::len), Some(1));
        assert!(resp.patient_name.is_none());
        assert_eq!(seen.lock().unwrap().analyzed, vec!["rep-123"]);
        server.abort();
    }

    #[tokio::test]
    async fn analyze_error_uses_detail() {
        let (url, _seen, server) = start_backend().await;
        let err = backend(&url).analyze("missing").await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.to_string(), "Report not found");
        server.abort();
    }

    #[tokio::test]
    async fn report_id_is_percent_encoded() {
        let (url, seen, server) = start_backend().await;
        backend(&url).analyze("a b/c").await.unwrap();
        assert_eq!(seen.lock().unwrap().analyzed, vec!["a b/c"]);
        server.abort();
    }

    #[tokio::test]
    async fn ask_sends_json_body() {
        let (url, seen, server) = start_backend().await;
        let request = AskRequest {
            report_id: "rep-123".into(),
            question: "What is LDL?".into(),
            conversation_history: Vec::new(),
        };
        let resp = backend(&url).ask(&request).await.unwrap();
        assert_eq!(resp.answer.as_deref(), Some("LDL is bad cholesterol."));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.asked[0]["report_id"], "rep-123");
        assert_eq!(seen.asked[0]["question"], "What is LDL?");
        assert!(seen.asked[0]["conversation_history"].as_array().unwrap().is_empty());
        server.abort();
    }

    #[tokio::test]
    async fn report_management_calls() {
        let (url, _seen, server) = start_backend().await;
        let client = backend(&url);

        let info = client.get_report("rep-123").await.unwrap();
        assert_eq!(info.status, "uploaded");
        assert_eq!(info.message.as_deref(), Some("Processing..."));

        let listing = client.list_reports().await.unwrap();
        assert_eq!(listing.total, 1);
        assert_eq!(listing.reports[0].status, "analyzed");

        let deleted = client.delete_report("rep-123").await.unwrap();
        assert_eq!(deleted.report_id, "rep-123");
        server.abort();
    }

    #[tokio::test]
    async fn invalid_json_is_parsing_error() {
        let (url, _seen, server) = start_backend().await;
        let err = backend(&format!("{url}/garbage")).list_reports().await.unwrap_err();
        assert!(matches!(err, ApiError::ResponseParsing(_)));
        server.abort();
    }

    #[test]
    fn url_joins_under_base_path() {
        let client = backend("https://example.org/backend/");
        assert_eq!(
            client.url(&["api", "analyze", "r-1"]).as_str(),
            "https://example.org/backend/api/analyze/r-1"
        );
        assert_eq!(client.url(&["health"]).as_str(), "https://example.org/backend/health");
    }
}
