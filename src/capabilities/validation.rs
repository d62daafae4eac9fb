//! Liveness validation via `httpx`.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::capabilities::process::ToolCommand;
use crate::capabilities::{input_urls, Capability};
use crate::errors::CapabilityError;
use crate::registry::DatasetValue;
use crate::runner::{InvocationContext, StageInput};
use crate::stage::StageId;

pub struct ValidationCapability;

#[async_trait]
impl Capability for ValidationCapability {
    fn stage(&self) -> StageId {
        StageId::Validation
    }

    async fn invoke(
        &self,
        input: StageInput,
        ctx: &InvocationContext<'_>,
    ) -> Result<DatasetValue, CapabilityError> {
        let candidates = input_urls(&input);
        if candidates.is_empty() {
            log::warn!("[{}] no URLs to validate", input.target);
            return Ok(DatasetValue::Urls(BTreeSet::new()));
        }

        let threads = ctx.config.validation_workers().to_string();
        let mut live: BTreeSet<String> = BTreeSet::new();
        ToolCommand::new(ctx.config.tool_path("httpx"))
            .args(["-silent", "-threads", threads.as_str()])
            .envs(&ctx.proxy_env)
            .stdin_lines(candidates)
            .stream_lines(|line| {
                if live.insert(line.clone()) {
                    ctx.collector.push_url(line);
                }
            })
            .await?;

        log::info!("[{}] {} URLs are live", input.target, live.len());
        Ok(DatasetValue::Urls(live))
    }
}
