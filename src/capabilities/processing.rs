//! URL deduplication via `uro`.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::capabilities::process::ToolCommand;
use crate::capabilities::{input_urls, Capability};
use crate::errors::CapabilityError;
use crate::registry::DatasetValue;
use crate::runner::{InvocationContext, StageInput};
use crate::stage::StageId;

pub struct ProcessingCapability;

#[async_trait]
impl Capability for ProcessingCapability {
    fn stage(&self) -> StageId {
        StageId::Processing
    }

    async fn invoke(
        &self,
        input: StageInput,
        ctx: &InvocationContext<'_>,
    ) -> Result<DatasetValue, CapabilityError> {
        let candidates = input_urls(&input);
        if candidates.is_empty() {
            return Ok(DatasetValue::Urls(BTreeSet::new()));
        }

        if !ctx.config.bool_or(&["processing", "use_uro"], true) {
            // Identity pass: the input set is already unique by exact URL.
            let set: BTreeSet<String> = candidates.into_iter().collect();
            for url in &set {
                ctx.collector.push_url(url.clone());
            }
            return Ok(DatasetValue::Urls(set));
        }

        let mut deduplicated: BTreeSet<String> = BTreeSet::new();
        ToolCommand::new(ctx.config.tool_path("uro"))
            .envs(&ctx.proxy_env)
            .stdin_lines(candidates)
            .stream_lines(|line| {
                if deduplicated.insert(line.clone()) {
                    ctx.collector.push_url(line);
                }
            })
            .await?;

        log::info!(
            "[{}] {} URLs after deduplication",
            input.target,
            deduplicated.len()
        );
        Ok(DatasetValue::Urls(deduplicated))
    }
}
