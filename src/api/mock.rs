use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::error::ApiError;
use super::types::*;
use super::BackendApi;
use crate::upload::SelectedFile;

/// A call received by [`MockBackend`], in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Health,
    Upload(String),
    Analyze(String),
    Ask(AskRequest),
    GetReport(String),
    ListReports,
    DeleteReport(String),
}

/// Scripted backend for tests. Replays queued results per endpoint.
///
/// When a queue runs dry the endpoint succeeds with a neutral default.
/// An optional delay is applied to every call (use with paused tokio time).
#[derive(Default)]
pub struct MockBackend {
    health: Mutex<VecDeque<Result<(), ApiError>>>,
    upload: Mutex<VecDeque<Result<UploadResponse, ApiError>>>,
    analyze: Mutex<VecDeque<Result<AnalysisResponse, ApiError>>>,
    ask: Mutex<VecDeque<Result<AskResponse, ApiError>>>,
    calls: Mutex<Vec<MockCall>>,
    delay: Duration,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_health(self, result: Result<(), ApiError>) -> Self {
        push(&self.health, result);
        self
    }

    pub fn with_upload(self, result: Result<UploadResponse, ApiError>) -> Self {
        push(&self.upload, result);
        self
    }

    pub fn with_analysis(self, result: Result<AnalysisResponse, ApiError>) -> Self {
        push(&self.analyze, result);
        self
    }

    pub fn with_answer(self, result: Result<AskResponse, ApiError>) -> Self {
        push(&self.ask, result);
        self
    }

    /// Everything received so far.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn count(&self, matches: impl Fn(&MockCall) -> bool) -> usize {
        self.calls().iter().filter(|c| matches(c)).count()
    }

    async fn record(&self, call: MockCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

fn push<T>(queue: &Mutex<VecDeque<T>>, item: T) {
    if let Ok(mut q) = queue.lock() {
        q.push_back(item);
    }
}

fn pop<T>(queue: &Mutex<VecDeque<T>>) -> Option<T> {
    queue.lock().ok()?.pop_front()
}

#[async_trait]
impl BackendApi for MockBackend {
    async fn health(&self) -> Result<(), ApiError> {
        self.record(MockCall::Health).await;
        pop(&self.health).unwrap_or(Ok(()))
    }

    async fn upload(&self, file: &SelectedFile) -> Result<UploadResponse, ApiError> {
        self.record(MockCall::Upload(file.file_name().to_string())).await;
        pop(&self.upload).unwrap_or_else(|| {
            Ok(UploadResponse {
                report_id: "mock-report".into(),
                filename: Some(file.file_name().to_string()),
                file_size: Some(file.size()),
                message: None,
                status: Some("uploaded".into()),
            })
        })
    }

    async fn analyze(&self, report_id: &str) -> Result<AnalysisResponse, ApiError> {
        self.record(MockCall::Analyze(report_id.to_string())).await;
        pop(&self.analyze).unwrap_or_else(|| Ok(AnalysisResponse::default()))
    }

    async fn ask(&self, request: &AskRequest) -> Result<AskResponse, ApiError> {
        self.record(MockCall::Ask(request.clone())).await;
        pop(&self.ask).unwrap_or_else(|| Ok(AskResponse::default()))
    }

    async fn get_report(&self, report_id: &str) -> Result<ReportInfo, ApiError> {
        self.record(MockCall::GetReport(report_id.to_string())).await;
        Ok(ReportInfo {
            report_id: report_id.to_string(),
            status: "uploaded".into(),
            filename: None,
            analysis: None,
            message: None,
        })
    }

    async fn list_reports(&self) -> Result<ReportListing, ApiError> {
        self.record(MockCall::ListReports).await;
        Ok(ReportListing::default())
    }

    async fn delete_report(&self, report_id: &str) -> Result<DeleteResponse, ApiError> {
        self.record(MockCall::DeleteReport(report_id.to_string())).await;
        Ok(DeleteResponse {
            message: None,
            report_id: report_id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_queue_then_defaults() {
        let mock = MockBackend::new()
            .with_health(Err(ApiError::Connection("x".into())))
            .with_health(Ok(()));

        assert!(mock.health().await.is_err());
        assert!(mock.health().await.is_ok());
        assert!(mock.health().await.is_ok());
        assert_eq!(mock.count(|c| *c == MockCall::Health), 3);
    }

    #[tokio::test]
    async fn records_calls_in_order() {
        let mock = MockBackend::new();
        mock.analyze("r-1").await.unwrap();
        mock.list_reports().await.unwrap();
        assert_eq!(
            mock.calls(),
            vec![MockCall::Analyze("r-1".into()), MockCall::ListReports]
        );
    }
}
