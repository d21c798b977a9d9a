//! Wire types for the Health Navigator backend.
//!
//! Every field the backend may leave out is optional here; display defaults
//! are applied later by [`crate::models::Report::from_analysis`].

use serde::{Deserialize, Serialize};

use crate::models::{FindingStatus, Urgency};

// ═══════════════════════════════════════════════════════════
// Upload
// ═══════════════════════════════════════════════════════════

/// Body of `POST /api/upload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub report_id: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

// ═══════════════════════════════════════════════════════════
// Analyze
// ═══════════════════════════════════════════════════════════

/// One metric row as sent by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFinding {
    #[serde(default)]
    pub metric: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub status: Option<FindingStatus>,
    #[serde(default)]
    pub range: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
}

/// Body of `POST /api/analyze/{report_id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    #[serde(default)]
    pub report_id: Option<String>,
    #[serde(default)]
    pub patient_name: Option<String>,
    #[serde(default)]
    pub report_type: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub key_findings: Option<Vec<RawFinding>>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub next_steps: Option<Vec<String>>,
    #[serde(default)]
    pub urgency: Option<Urgency>,
    #[serde(default)]
    pub confidence_score: Option<f64>,
    #[serde(default)]
    pub processed_at: Option<String>,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
}

// ═══════════════════════════════════════════════════════════
// Ask
// ═══════════════════════════════════════════════════════════

/// Prior turn forwarded so the backend can keep conversational context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
}

/// Body sent to `POST /api/ask`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AskRequest {
    pub report_id: String,
    pub question: String,
    #[serde(default)]
    pub conversation_history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AskResponse {
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub sources: Option<Vec<String>>,
}

// ═══════════════════════════════════════════════════════════
// Report management
// ═══════════════════════════════════════════════════════════

/// Body of `GET /api/report/{report_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportInfo {
    pub report_id: String,
    pub status: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub analysis: Option<AnalysisResponse>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub report_id: String,
    #[serde(default)]
    pub filename: Option<String>,
    pub status: String,
    #[serde(default)]
    pub file_size: Option<u64>,
}

/// Body of `GET /api/reports`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportListing {
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub reports: Vec<ReportSummary>,
}

/// Body of `DELETE /api/report/{report_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteResponse {
    #[serde(default)]
    pub message: Option<String>,
    pub report_id: String,
}
