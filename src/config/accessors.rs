//! Typed views over the effective configuration.
//!
//! Components never walk the raw tree themselves; the readers here give
//! each consumer its own section plus the global ones (timeouts, proxy,
//! tool paths) with defaults matching the baseline.

use std::time::Duration;

use crate::config::value::EffectiveConfig;
use crate::stage::{StageCategory, StageId};

impl EffectiveConfig {
    /// Timeout budget for a stage category.
    pub fn stage_timeout(&self, category: StageCategory) -> Duration {
        let secs = self.u64_or(&["timeouts", category.timeout_key()], 300);
        Duration::from_secs(secs)
    }

    /// Whether the first failed stage aborts the remainder of the run.
    pub fn abort_on_failure(&self) -> bool {
        self.bool_or(&["pipeline", "abort_on_failure"], false)
    }

    /// Resolved program name or path for an external tool.
    pub fn tool_path(&self, tool: &str) -> String {
        self.opt_str(&["tools", tool])
            .unwrap_or(tool)
            .to_string()
    }

    pub fn gather_mode(&self) -> String {
        self.str_or(&["discovery", "gather_mode"], "gwk").to_string()
    }

    pub fn katana_depth(&self) -> u64 {
        self.u64_or(&["discovery", "katana_depth"], 2)
    }

    pub fn excluded_extensions(&self) -> Vec<String> {
        self.str_seq(&["excluded_extensions"])
    }

    pub fn allowed_download_extensions(&self) -> Vec<String> {
        self.str_seq(&["download", "allowed_extensions"])
    }

    pub fn download_concurrency(&self) -> u64 {
        self.u64_or(&["download", "max_concurrent"], 20)
    }

    pub fn validation_workers(&self) -> u64 {
        self.u64_or(&["validation", "max_workers"], 50)
    }

    pub fn fuzz_threads(&self) -> u64 {
        self.u64_or(&["fuzzing", "threads"], 40)
    }

    /// Directory name for a stage's materialized output, under the
    /// per-target output root.
    pub fn dir_for(&self, stage: StageId) -> String {
        let key = match stage {
            StageId::Download => "downloaded_files",
            StageId::Fuzzing => "fuzzing_results",
            StageId::RepoScan => "repo_scan",
            _ => "results",
        };
        self.str_or(&["dirs", key], key).to_string()
    }

    /// Well-known file name for a dataset, falling back to `<name>.txt`.
    pub fn file_for(&self, dataset: &str) -> String {
        self.opt_str(&["files", dataset])
            .map(str::to_string)
            .unwrap_or_else(|| format!("{dataset}.txt"))
    }
}
