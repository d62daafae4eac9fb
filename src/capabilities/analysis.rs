//! Secret analysis of downloaded files via `trufflehog`.

use std::collections::BTreeSet;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::capabilities::process::ToolCommand;
use crate::capabilities::Capability;
use crate::errors::CapabilityError;
use crate::registry::DatasetValue;
use crate::runner::{InvocationContext, Record, StageInput};
use crate::stage::StageId;

pub struct AnalysisCapability;

#[async_trait]
impl Capability for AnalysisCapability {
    fn stage(&self) -> StageId {
        StageId::Analysis
    }

    async fn invoke(
        &self,
        input: StageInput,
        ctx: &InvocationContext<'_>,
    ) -> Result<DatasetValue, CapabilityError> {
        let files = match &input.records {
            Some(DatasetValue::Files(files)) => files.clone(),
            _ => Vec::new(),
        };
        if files.is_empty() {
            log::warn!("[{}] nothing to analyze", input.target);
            return Ok(DatasetValue::Findings(Vec::new()));
        }

        // Scan each distinct directory once rather than file by file.
        let scan_dirs: BTreeSet<PathBuf> = files
            .iter()
            .filter_map(|f| f.parent().map(PathBuf::from))
            .collect();

        let program = ctx.config.tool_path("trufflehog");
        let mut findings: Vec<serde_json::Value> = Vec::new();
        for dir in scan_dirs {
            let dir = dir.display().to_string();
            ToolCommand::new(&program)
                .args(["filesystem", dir.as_str(), "--json", "--no-update"])
                .envs(&ctx.proxy_env)
                .stream_lines(|line| match serde_json::from_str::<serde_json::Value>(&line) {
                    Ok(value) => {
                        ctx.collector.push(Record::Finding(value.clone()));
                        findings.push(value);
                    }
                    Err(_) => log::debug!("skipping non-JSON analyzer line"),
                })
                .await?;
        }

        log::info!("[{}] {} findings", input.target, findings.len());
        Ok(DatasetValue::Findings(findings))
    }
}
