//! Pipeline sequencing and aggregation.
//!
//! Stages run strictly sequentially, in the caller-specified order. The
//! conventional discovery-before-validation ordering is a documented
//! usage convention, surfaced as a warning, never enforced. A failed or
//! skipped stage does not abort the run: later stages may still find a
//! usable fallback dataset through the priority policy, or be entirely
//! target-driven. Only the configurable abort-on-failure policy stops a
//! run early, and even then every requested stage gets a report entry.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;

use crate::capabilities::CapabilitySet;
use crate::config::EffectiveConfig;
use crate::errors::PipelineError;
use crate::proxy::ProxyDescriptor;
use crate::registry::DatasetRegistry;
use crate::report::{RunReport, RunReportEntry, StageStatus};
use crate::runner::StageRunner;
use crate::stage::{descriptor, StageId};

/// One pipeline invocation over a single target.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub stages: Vec<StageId>,
    pub target: String,
    pub output_root: PathBuf,
    /// Independent-mode input file; present iff independent mode.
    pub input: Option<PathBuf>,
}

pub struct Orchestrator {
    config: EffectiveConfig,
    proxy: ProxyDescriptor,
    capabilities: CapabilitySet,
}

impl Orchestrator {
    pub fn new(
        config: EffectiveConfig,
        proxy: ProxyDescriptor,
        capabilities: CapabilitySet,
    ) -> Orchestrator {
        Orchestrator {
            config,
            proxy,
            capabilities,
        }
    }

    pub fn config(&self) -> &EffectiveConfig {
        &self.config
    }

    /// Run the requested stages against one target and aggregate the
    /// report. The registry starts empty: datasets never outlive a run.
    pub async fn run_pipeline(
        &self,
        request: &PipelineRequest,
    ) -> Result<RunReport, PipelineError> {
        self.validate_independent_mode(request)?;
        warn_on_unconventional_order(&request.stages);

        let started_at = Utc::now();
        let started = Instant::now();
        let mut registry = DatasetRegistry::new();
        let runner = StageRunner::new(&self.config, &self.proxy);
        let target_dir = request.output_root.join(&request.target);
        let mut entries: Vec<RunReportEntry> = Vec::new();
        let mut abort_reason: Option<String> = None;

        for stage in &request.stages {
            if let Some(reason) = &abort_reason {
                entries.push(skipped_entry(*stage, reason.clone()));
                continue;
            }

            let capability =
                self.capabilities
                    .get(*stage)
                    .ok_or_else(|| PipelineError::MissingCapability {
                        stage: stage.to_string(),
                    })?;

            log::info!("[{}] executing stage [{}]", request.target, stage);
            let stage_dir = target_dir.join(self.config.dir_for(*stage));
            let entry = runner
                .run(
                    descriptor(*stage),
                    capability,
                    &mut registry,
                    &request.target,
                    &stage_dir,
                    request.input.as_deref(),
                )
                .await?;

            if let Some(output) = &entry.output {
                if let Some(dataset) = registry.get(output) {
                    match crate::persist::write_dataset(dataset, &stage_dir, &self.config) {
                        Ok(path) => log::debug!("materialized `{output}` to {}", path.display()),
                        Err(err) => {
                            log::warn!("could not materialize `{output}`: {err}")
                        }
                    }
                }
            }

            if entry.status == StageStatus::Failed && self.config.abort_on_failure() {
                abort_reason = Some(format!("aborted after `{stage}` failed"));
            }
            entries.push(entry);
        }

        Ok(RunReport {
            target: request.target.clone(),
            started_at,
            duration_ms: started.elapsed().as_millis() as u64,
            entries,
        })
    }

    fn validate_independent_mode(&self, request: &PipelineRequest) -> Result<(), PipelineError> {
        let Some(input) = &request.input else {
            return Ok(());
        };
        if request.stages.len() != 1 {
            return Err(PipelineError::IndependentStageCount {
                count: request.stages.len(),
            });
        }
        let stage = request.stages[0];
        if !descriptor(stage).independent {
            return Err(PipelineError::IndependentUnsupported {
                stage: stage.to_string(),
            });
        }
        log::info!(
            "independent mode: running `{stage}` with input {}",
            display_path(input)
        );
        Ok(())
    }
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}

fn skipped_entry(stage: StageId, reason: String) -> RunReportEntry {
    RunReportEntry {
        stage,
        status: StageStatus::Skipped,
        duration_ms: 0,
        selected_input: None,
        output: None,
        records: 0,
        detail: Some(reason),
    }
}

/// Warn when the requested order deviates from the documented convention.
/// The order is advisory: the engine executes exactly what was asked.
fn warn_on_unconventional_order(stages: &[StageId]) {
    let conventional = StageId::conventional_order();
    let positions: Vec<usize> = stages
        .iter()
        .filter_map(|s| conventional.iter().position(|c| c == s))
        .collect();
    if positions.windows(2).any(|w| w[0] > w[1]) {
        log::warn!(
            "requested stage order deviates from the conventional \
             discovery → validation → processing → download → analysis order; \
             downstream stages may fall back to less processed datasets"
        );
    }
}
