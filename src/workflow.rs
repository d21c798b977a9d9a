//! Report workflow controller.
//!
//! Drives the dependent backend calls for one document:
//!
//! ```text
//! select file ─▶ upload ─▶ analyze ─▶ Report ─▶ ask, ask, ...
//! ```
//!
//! and keeps the display state a front end renders: the active tab, which
//! tabs are enabled, the current report, the chat log, and the in-flight
//! flags. The controller is `Send + Sync`; share it behind an `Arc`.
//!
//! Single flight is explicit: a second pipeline run while one is
//! outstanding fails with [`WorkflowError::Busy`], and a second question
//! while one is pending is ignored. The flags are cleared by RAII guards, so
//! they reset on every exit path, including a cancelled future.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;
use serde::Serialize;

use crate::api::{ApiError, AskRequest, BackendApi};
use crate::models::{ChatLog, ChatMessage, Report};
use crate::upload::{SelectedFile, UploadError};

/// How many earlier messages accompany a question.
const HISTORY_LIMIT: usize = 5;

pub const NO_ANSWER: &str = "No answer available.";
pub const CHAT_FAILURE_REPLY: &str = "Sorry, something went wrong.";

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tab {
    Upload,
    Results,
    Chat,
    Actions,
}

impl Tab {
    pub const ALL: [Tab; 4] = [Tab::Upload, Tab::Results, Tab::Chat, Tab::Actions];

    /// Every tab except `Upload` needs an analyzed report.
    pub fn requires_report(&self) -> bool {
        !matches!(self, Tab::Upload)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tab::Upload => "upload",
            Tab::Results => "results",
            Tab::Chat => "chat",
            Tab::Actions => "actions",
        }
    }
}

impl std::fmt::Display for Tab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    InvalidFile(#[from] UploadError),

    #[error("No file selected")]
    NoFileSelected,

    #[error("An analysis is already in progress")]
    Busy,

    #[error("File upload failed: {0}")]
    Upload(#[source] ApiError),

    #[error("Analysis failed: {0}")]
    Analysis(#[source] ApiError),

    #[error("The {0} tab is not available until a report has been analyzed")]
    TabLocked(Tab),

    #[error("The workflow was reset while the analysis was running")]
    Superseded,

    #[error("Internal lock error")]
    LockPoisoned,
}

/// Everything a front end needs to render the workflow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowSnapshot {
    pub active_tab: Tab,
    pub enabled_tabs: Vec<Tab>,
    pub selected_file: Option<String>,
    pub report: Option<Report>,
    pub chat: Vec<ChatMessage>,
    pub analyzing: bool,
    pub asking: bool,
}

struct WorkflowState {
    active_tab: Tab,
    file: Option<SelectedFile>,
    report: Option<Report>,
    chat: ChatLog,
    /// Bumped by `reset()`; a pipeline started under an older generation
    /// does not publish its result.
    generation: u64,
}

impl WorkflowState {
    fn new() -> Self {
        Self {
            active_tab: Tab::Upload,
            file: None,
            report: None,
            chat: ChatLog::new(),
            generation: 0,
        }
    }

    fn tab_enabled(&self, tab: Tab) -> bool {
        !tab.requires_report() || self.report.is_some()
    }
}

// ═══════════════════════════════════════════════════════════
// InFlight
// ═══════════════════════════════════════════════════════════

/// Holds an in-flight flag for as long as it lives.
struct InFlight<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlight<'a> {
    /// `None` if the flag is already held.
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

// ═══════════════════════════════════════════════════════════
// ReportWorkflow
// ═══════════════════════════════════════════════════════════

type Clock = Box<dyn Fn() -> NaiveDate + Send + Sync>;

pub struct ReportWorkflow {
    backend: Arc<dyn BackendApi>,
    state: Mutex<WorkflowState>,
    analyzing: AtomicBool,
    asking: AtomicBool,
    today: Clock,
}

impl ReportWorkflow {
    pub fn new(backend: Arc<dyn BackendApi>) -> Self {
        Self {
            backend,
            state: Mutex::new(WorkflowState::new()),
            analyzing: AtomicBool::new(false),
            asking: AtomicBool::new(false),
            today: Box::new(|| chrono::Local::now().date_naive()),
        }
    }

    /// Replace the source of "today" used to date new reports.
    pub fn with_clock(mut self, today: impl Fn() -> NaiveDate + Send + Sync + 'static) -> Self {
        self.today = Box::new(today);
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, WorkflowState>, WorkflowError> {
        self.state.lock().map_err(|_| WorkflowError::LockPoisoned)
    }

    // ── File selection ──────────────────────────────────────

    /// Accept an already validated file, replacing any earlier selection.
    pub fn select_file(&self, file: SelectedFile) -> Result<(), WorkflowError> {
        tracing::info!(file = file.file_name(), size = file.size(), "File selected");
        self.lock()?.file = Some(file);
        Ok(())
    }

    /// Validate in-memory content and select it.
    ///
    /// A rejected file leaves the previous selection in place.
    pub fn select_bytes(&self, file_name: &str, mime: &str, bytes: Vec<u8>) -> Result<(), WorkflowError> {
        match SelectedFile::new(file_name, mime, bytes) {
            Ok(file) => self.select_file(file),
            Err(e) => {
                tracing::warn!(file = file_name, mime, error = %e, "File rejected");
                Err(e.into())
            }
        }
    }

    /// Validate a file on disk and select it.
    pub async fn select_path(&self, path: &Path) -> Result<(), WorkflowError> {
        match SelectedFile::from_path(path).await {
            Ok(file) => self.select_file(file),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "File rejected");
                Err(e.into())
            }
        }
    }

    // ── Pipeline ────────────────────────────────────────────

    /// Upload the selected file, analyze it, and publish the resulting report.
    ///
    /// On success the chat starts over and the `results` tab becomes active.
    /// On failure no report is published and the selected file is kept, so
    /// the user can retry without choosing it again.
    pub async fn run_pipeline(&self) -> Result<Report, WorkflowError> {
        let _in_flight = InFlight::acquire(&self.analyzing).ok_or(WorkflowError::Busy)?;
        self.pipeline().await
    }

    /// Select `file` and run the pipeline on it.
    ///
    /// Fails with `Busy`, leaving the current selection alone, while
    /// another run is in flight.
    pub async fn analyze_file(&self, file: SelectedFile) -> Result<Report, WorkflowError> {
        let _in_flight = InFlight::acquire(&self.analyzing).ok_or(WorkflowError::Busy)?;
        self.select_file(file)?;
        self.pipeline().await
    }

    /// Caller holds the `analyzing` flag.
    async fn pipeline(&self) -> Result<Report, WorkflowError> {
        let (file, generation) = {
            let state = self.lock()?;
            let file = state.file.clone().ok_or(WorkflowError::NoFileSelected)?;
            (file, state.generation)
        };

        let uploaded = self.backend.upload(&file).await.map_err(|e| {
            tracing::error!(file = file.file_name(), error = %e, "Upload failed");
            WorkflowError::Upload(e)
        })?;
        let report_id = uploaded.report_id;
        tracing::info!(report_id = %report_id, "Report uploaded");

        let analysis = self.backend.analyze(&report_id).await.map_err(|e| {
            tracing::error!(report_id = %report_id, error = %e, "Analysis failed");
            WorkflowError::Analysis(e)
        })?;

        let report = Report::from_analysis(&report_id, analysis, (self.today)());

        let mut state = self.lock()?;
        if state.generation != generation {
            tracing::info!(report_id = %report_id, "Discarding analysis finished after reset");
            return Err(WorkflowError::Superseded);
        }
        tracing::info!(
            report_id = %report_id,
            findings = report.key_findings.len(),
            urgency = %report.urgency,
            "Report analyzed"
        );
        state.report = Some(report.clone());
        state.chat = ChatLog::new();
        state.active_tab = Tab::Results;
        Ok(report)
    }

    // ── Chat ────────────────────────────────────────────────

    /// Ask a follow-up question about the current report.
    ///
    /// Ignored (returns `None`, nothing recorded, nothing sent) when the
    /// question is blank, there is no report yet, or another question is
    /// still pending. Otherwise the question is recorded immediately and the
    /// reply is returned once it has been appended. Backend failures become
    /// a fallback reply instead of an error.
    pub async fn ask(&self, question: &str) -> Option<ChatMessage> {
        if question.trim().is_empty() {
            return None;
        }
        let _in_flight = InFlight::acquire(&self.asking)?;

        let request = {
            let mut state = self.state.lock().ok()?;
            let report_id = state.report.as_ref()?.report_id.clone();
            let conversation_history = state.chat.history(HISTORY_LIMIT);
            state.chat.push(ChatMessage::user(question));
            AskRequest {
                report_id,
                question: question.to_string(),
                conversation_history,
            }
        };

        let reply = match self.backend.ask(&request).await {
            Ok(response) => ChatMessage::ai(
                response
                    .answer
                    .filter(|a| !a.trim().is_empty())
                    .unwrap_or_else(|| NO_ANSWER.to_string()),
            ),
            Err(e) => {
                tracing::warn!(report_id = %request.report_id, error = %e, "Question failed");
                ChatMessage::ai(CHAT_FAILURE_REPLY)
            }
        };

        let mut state = self.state.lock().ok()?;
        let same_report = state
            .report
            .as_ref()
            .is_some_and(|r| r.report_id == request.report_id);
        if !same_report {
            tracing::debug!(report_id = %request.report_id, "Dropping reply for a replaced report");
            return None;
        }
        state.chat.push(reply.clone());
        Some(reply)
    }

    // ── Navigation ──────────────────────────────────────────

    pub fn select_tab(&self, tab: Tab) -> Result<(), WorkflowError> {
        let mut state = self.lock()?;
        if !state.tab_enabled(tab) {
            return Err(WorkflowError::TabLocked(tab));
        }
        state.active_tab = tab;
        Ok(())
    }

    /// Forget the report, chat, and selected file; back to `upload`.
    pub fn reset(&self) -> Result<(), WorkflowError> {
        let mut state = self.lock()?;
        let generation = state.generation + 1;
        *state = WorkflowState::new();
        state.generation = generation;
        tracing::debug!("Workflow reset");
        Ok(())
    }

    // ── Observation ─────────────────────────────────────────

    pub fn is_analyzing(&self) -> bool {
        self.analyzing.load(Ordering::Acquire)
    }

    pub fn is_asking(&self) -> bool {
        self.asking.load(Ordering::Acquire)
    }

    pub fn is_tab_enabled(&self, tab: Tab) -> bool {
        self.lock().is_ok_and(|s| s.tab_enabled(tab))
    }

    pub fn active_tab(&self) -> Tab {
        self.lock().map_or(Tab::Upload, |s| s.active_tab)
    }

    pub fn report(&self) -> Option<Report> {
        self.lock().ok()?.report.clone()
    }

    pub fn chat(&self) -> Vec<ChatMessage> {
        self.lock()
            .map(|s| s.chat.messages().to_vec())
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> Result<WorkflowSnapshot, WorkflowError> {
        let state = self.lock()?;
        Ok(WorkflowSnapshot {
            active_tab: state.active_tab,
            enabled_tabs: Tab::ALL
                .into_iter()
                .filter(|t| state.tab_enabled(*t))
                .collect(),
            selected_file: state.file.as_ref().map(|f| f.file_name().to_string()),
            report: state.report.clone(),
            chat: state.chat.messages().to_vec(),
            analyzing: self.is_analyzing(),
            asking: self.is_asking(),
        })
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
