//! Typed access to the Health Navigator backend.
//!
//! [`BackendApi`] is the seam between the client logic (prober, workflow
//! controller, CLI) and the transport. [`HttpBackend`] talks to the real
//! service over `reqwest`; [`MockBackend`] returns scripted results.

pub mod client;
pub mod error;
pub mod mock;
pub mod types;

pub use client::HttpBackend;
pub use error::ApiError;
pub use mock::{MockBackend, MockCall};
pub use types::*;

use async_trait::async_trait;

use crate::upload::SelectedFile;

/// Remote operations offered by the backend.
///
/// Each call is independent; implementations carry no per-pipeline state.
#[async_trait]
pub trait BackendApi: Send + Sync {
    /// `GET /health`. Any 2xx counts as healthy.
    async fn health(&self) -> Result<(), ApiError>;

    /// `POST /api/upload` with the file as multipart field `file`.
    async fn upload(&self, file: &SelectedFile) -> Result<UploadResponse, ApiError>;

    /// `POST /api/analyze/{report_id}`, no body.
    async fn analyze(&self, report_id: &str) -> Result<AnalysisResponse, ApiError>;

    /// `POST /api/ask` with a JSON body.
    async fn ask(&self, request: &AskRequest) -> Result<AskResponse, ApiError>;

    /// `GET /api/report/{report_id}`.
    async fn get_report(&self, report_id: &str) -> Result<ReportInfo, ApiError>;

    /// `GET /api/reports`.
    async fn list_reports(&self) -> Result<ReportListing, ApiError>;

    /// `DELETE /api/report/{report_id}`.
    async fn delete_report(&self, report_id: &str) -> Result<DeleteResponse, ApiError>;
}
