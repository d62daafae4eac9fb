//! URL discovery via `gau`, `waybackurls`, and `katana`.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::capabilities::process::ToolCommand;
use crate::capabilities::urls;
use crate::capabilities::Capability;
use crate::errors::CapabilityError;
use crate::registry::DatasetValue;
use crate::runner::{InvocationContext, StageInput};
use crate::stage::StageId;

const GATHER_TOOLS: &[(char, &str)] = &[('g', "gau"), ('w', "waybackurls"), ('k', "katana")];

pub struct DiscoveryCapability;

#[async_trait]
impl Capability for DiscoveryCapability {
    fn stage(&self) -> StageId {
        StageId::Discovery
    }

    async fn invoke(
        &self,
        input: StageInput,
        ctx: &InvocationContext<'_>,
    ) -> Result<DatasetValue, CapabilityError> {
        let mode = ctx.config.gather_mode();
        let excluded = ctx.config.excluded_extensions();
        let mut discovered: BTreeSet<String> = BTreeSet::new();
        let mut last_error: Option<CapabilityError> = None;

        for (flag, tool) in GATHER_TOOLS {
            if !mode.contains(*flag) {
                continue;
            }
            let program = ctx.config.tool_path(tool);
            let command = match *tool {
                "katana" => {
                    let url = format!("https://{}", input.target);
                    let depth = ctx.config.katana_depth().to_string();
                    ToolCommand::new(program)
                        .args(["-u", url.as_str(), "-d", depth.as_str(), "-silent", "-jc"])
                }
                _ => ToolCommand::new(program).arg(&input.target),
            }
            .envs(&ctx.proxy_env);

            let result = command
                .stream_lines(|line| {
                    if urls::has_any_extension(&line, &excluded) {
                        return;
                    }
                    if discovered.insert(line.clone()) {
                        ctx.collector.push_url(line);
                    }
                })
                .await;

            if let Err(err) = result {
                // One source failing is survivable; the others still feed
                // the merged set.
                log::warn!("discovery source `{tool}` failed: {err}");
                last_error = Some(err);
            }
        }

        if discovered.is_empty() {
            if let Some(err) = last_error {
                return Err(err);
            }
        }
        log::info!(
            "[{}] discovered {} unique URLs",
            input.target,
            discovered.len()
        );
        Ok(DatasetValue::Urls(discovered))
    }
}
