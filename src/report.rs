//! Aggregated run reporting.
//!
//! One entry per requested stage, appended as stages finish and read-only
//! afterwards. Rendering targets a terminal table by default with a JSON
//! alternative for machine consumers.

use chrono::{DateTime, Utc};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde::Serialize;

use crate::stage::StageId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Success,
    /// Cut short by the budget but some output was salvaged.
    Partial,
    Failed,
    Skipped,
}

impl StageStatus {
    fn label(&self) -> &'static str {
        match self {
            StageStatus::Success => "success",
            StageStatus::Partial => "partial",
            StageStatus::Failed => "failed",
            StageStatus::Skipped => "skipped",
        }
    }

    fn colored_label(&self) -> String {
        match self {
            StageStatus::Success => self.label().green().to_string(),
            StageStatus::Partial => self.label().yellow().to_string(),
            StageStatus::Failed => self.label().red().to_string(),
            StageStatus::Skipped => self.label().dimmed().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReportEntry {
    pub stage: StageId,
    pub status: StageStatus,
    pub duration_ms: u64,
    /// Dataset name (or input file) the stage consumed.
    pub selected_input: Option<String>,
    /// Dataset name the stage registered, if any.
    pub output: Option<String>,
    pub records: usize,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub target: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub entries: Vec<RunReportEntry>,
}

impl RunReport {
    pub fn any_failed(&self) -> bool {
        self.entries
            .iter()
            .any(|e| e.status == StageStatus::Failed)
    }

    /// Process exit status for this run: zero iff no stage failed.
    pub fn exit_code(&self) -> i32 {
        if self.any_failed() {
            1
        } else {
            0
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Terminal summary table, one row per requested stage.
    pub fn render_table(&self) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                "stage", "status", "input", "output", "records", "time", "detail",
            ]);
        for entry in &self.entries {
            table.add_row(vec![
                Cell::new(entry.stage.as_str()),
                Cell::new(entry.status.colored_label()),
                Cell::new(entry.selected_input.as_deref().unwrap_or("-")),
                Cell::new(entry.output.as_deref().unwrap_or("-")),
                Cell::new(entry.records.to_string()),
                Cell::new(format_duration(entry.duration_ms)),
                Cell::new(entry.detail.as_deref().unwrap_or("")),
            ]);
        }
        format!(
            "{}\n{}\n",
            format!("target: {}", self.target).bold(),
            table
        )
    }
}

fn format_duration(ms: u64) -> String {
    if ms >= 60_000 {
        format!("{}m{:02}s", ms / 60_000, (ms % 60_000) / 1000)
    } else if ms >= 1000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{ms}ms")
    }
}
