//! Report job status and download outcome structures.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Processing state derived from the report status page.
///
/// `Ready` is the only terminal state. A job that never reaches `Ready`
/// before the poll deadline surfaces as [`PollOutcome::TimedOut`], which is
/// an outcome of the wait, not a state of the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportState {
    Unknown,
    InProgress,
    Processed,
    Ready,
}

impl fmt::Display for ReportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unknown => "DESCONHECIDO",
            Self::InProgress => "EM_PROCESSAMENTO",
            Self::Processed => "PROCESSADO",
            Self::Ready => "PRONTO",
        };
        f.write_str(label)
    }
}

/// One step of the server-side processing pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Step label as shown on the status page
    pub label: String,

    /// Whether the step is flagged complete
    pub done: bool,
}

/// Complete snapshot of a report's status page.
///
/// Each poll produces a fresh record; records are never partially updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    /// Numeric report job id
    pub id: String,

    /// Derived processing state
    pub state: ReportState,

    /// Processing steps in page order
    pub steps: Vec<Step>,

    /// Details panel: normalized label -> scraped value
    pub details: BTreeMap<String, String>,

    /// Applied-filters panel: label -> value, placeholders skipped
    pub filters: BTreeMap<String, String>,

    /// Absolute download URL, present once the file is ready
    pub download_url: Option<String>,

    /// Page title, if any
    pub title: Option<String>,
}

impl StatusRecord {
    /// Empty record for a job id, in the `Unknown` state.
    pub fn empty(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: ReportState::Unknown,
            steps: Vec::new(),
            details: BTreeMap::new(),
            filters: BTreeMap::new(),
            download_url: None,
            title: None,
        }
    }

    /// Label of the last parsed step, if any.
    pub fn last_step(&self) -> Option<&Step> {
        self.steps.last()
    }

    /// Human-readable multi-line summary of the record.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        lines.push(format!("RELATÓRIO #{}", self.id));
        lines.push("=".repeat(50));

        if let Some(title) = &self.title {
            lines.push(format!("Título: {}", title));
        }
        lines.push(format!("Status: {}", self.state));

        for key in ["criado em", "enviado para processamento em", "processado em"] {
            if let Some(value) = self.details.get(key) {
                if !value.is_empty() && value != "---" {
                    lines.push(format!("{}: {}", key, value));
                }
            }
        }

        if !self.filters.is_empty() {
            lines.push(String::new());
            lines.push("FILTROS APLICADOS:".to_string());
            lines.push("-".repeat(30));
            for (key, value) in &self.filters {
                lines.push(format!("  {}: {}", key, value));
            }
        }

        if !self.steps.is_empty() {
            lines.push(String::new());
            lines.push("ETAPAS DO PROCESSAMENTO:".to_string());
            lines.push("-".repeat(30));
            for (i, step) in self.steps.iter().enumerate() {
                let marker = if step.done { "(Concluída)" } else { "(Em andamento)" };
                lines.push(format!("  Etapa {}: {} {}", i + 1, step.label, marker));
            }
        }

        lines.join("\n")
    }
}

/// Result of waiting for a report to finish processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The report reached the `Ready` state before the deadline.
    Ready(StatusRecord),

    /// The deadline elapsed without the report becoming ready.
    TimedOut,
}

/// A report file written to local storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadedReport {
    /// Path of the written file
    pub path: PathBuf,

    /// Program the report was requested for
    pub program: String,

    /// Academic term the report was requested for
    pub term: String,

    /// Bytes written
    pub bytes: u64,

    /// Whether the file parsed as a well-formed spreadsheet.
    ///
    /// Advisory: a `false` value is surfaced to the caller but does not
    /// invalidate the path.
    pub valid: bool,
}

/// Recorded outcome of one batch job (program x term).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub program: String,
    pub term: String,
    pub success: bool,

    /// Report id, once the submission was accepted
    #[serde(default)]
    pub report_id: Option<String>,

    /// Path of the downloaded file on success
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Advisory spreadsheet validation result for the downloaded file
    #[serde(default)]
    pub file_valid: bool,

    /// Failure description when `success` is false
    #[serde(default)]
    pub error: Option<String>,
}

impl JobOutcome {
    /// Failed outcome with a reason, keeping program/term context.
    pub fn failure(
        program: impl Into<String>,
        term: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            program: program.into(),
            term: term.into(),
            success: false,
            report_id: None,
            file: None,
            file_valid: false,
            error: Some(error.into()),
        }
    }
}
