use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::api::types::{AnalysisResponse, RawFinding};

pub const UNKNOWN_PATIENT: &str = "Unknown";
pub const UNKNOWN_REPORT_TYPE: &str = "Unknown Report";
pub const NO_SUMMARY: &str = "No summary available.";

/// How a single lab value compares to its reference range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingStatus {
    Normal,
    Elevated,
    Low,
    Critical,
    /// Anything the backend sends that we do not recognise.
    #[serde(other)]
    Unknown,
}

impl FindingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Elevated => "elevated",
            Self::Low => "low",
            Self::Critical => "critical",
            Self::Unknown => "unknown",
        }
    }

    /// Whether the value falls outside its reference range.
    pub fn is_abnormal(&self) -> bool {
        matches!(self, Self::Elevated | Self::Low | Self::Critical)
    }
}

impl std::fmt::Display for FindingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall follow-up urgency assigned by the analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Moderate,
    Urgent,
    #[default]
    #[serde(other)]
    Routine,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Routine => "routine",
            Self::Moderate => "moderate",
            Self::Urgent => "urgent",
        }
    }
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyFinding {
    pub metric: String,
    pub value: String,
    pub status: FindingStatus,
    pub range: String,
    pub unit: Option<String>,
}

impl From<RawFinding> for KeyFinding {
    fn from(raw: RawFinding) -> Self {
        Self {
            metric: raw.metric.unwrap_or_default(),
            value: raw.value.unwrap_or_default(),
            status: raw.status.unwrap_or(FindingStatus::Unknown),
            range: raw.range.unwrap_or_default(),
            unit: raw.unit,
        }
    }
}

/// Plain-language analysis of one uploaded lab report.
///
/// Built once per successful analyze call and never edited afterwards; a new
/// analysis replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub report_id: String,
    pub patient_name: String,
    pub report_type: String,
    /// Day the analysis was received on this machine (ISO `YYYY-MM-DD`).
    pub date: String,
    pub key_findings: Vec<KeyFinding>,
    pub summary: String,
    pub next_steps: Vec<String>,
    pub urgency: Urgency,
    /// Date the backend read from the document itself, when it found one.
    pub backend_date: Option<String>,
    pub confidence_score: Option<f64>,
    pub model_name: Option<String>,
    pub provider: Option<String>,
}

impl Report {
    /// Map an analyze response onto display defaults.
    ///
    /// `report_id` is the id the upload returned; the response's own copy is
    /// ignored so the chat always addresses the document that was sent.
    pub fn from_analysis(report_id: &str, analysis: AnalysisResponse, received_on: NaiveDate) -> Self {
        Self {
            report_id: report_id.to_string(),
            patient_name: non_blank(analysis.patient_name)
                .unwrap_or_else(|| UNKNOWN_PATIENT.to_string()),
            report_type: non_blank(analysis.report_type)
                .unwrap_or_else(|| UNKNOWN_REPORT_TYPE.to_string()),
            date: received_on.format("%Y-%m-%d").to_string(),
            key_findings: analysis
                .key_findings
                .unwrap_or_default()
                .into_iter()
                .map(KeyFinding::from)
                .collect(),
            summary: non_blank(analysis.summary).unwrap_or_else(|| NO_SUMMARY.to_string()),
            next_steps: analysis.next_steps.unwrap_or_default(),
            urgency: analysis.urgency.unwrap_or_default(),
            backend_date: non_blank(analysis.date),
            confidence_score: analysis.confidence_score,
            model_name: analysis.model_name,
            provider: analysis.provider,
        }
    }

    pub fn abnormal_findings(&self) -> impl Iterator<Item = &KeyFinding> {
        self.key_findings.iter().filter(|f| f.status.is_abnormal())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
