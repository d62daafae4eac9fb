//! Repository scanning via `trufflehog`'s GitHub source.

use async_trait::async_trait;

use crate::capabilities::process::ToolCommand;
use crate::capabilities::Capability;
use crate::errors::CapabilityError;
use crate::registry::DatasetValue;
use crate::runner::{InvocationContext, Record, StageInput};
use crate::stage::StageId;

pub struct RepoScanCapability;

#[async_trait]
impl Capability for RepoScanCapability {
    fn stage(&self) -> StageId {
        StageId::RepoScan
    }

    async fn invoke(
        &self,
        input: StageInput,
        ctx: &InvocationContext<'_>,
    ) -> Result<DatasetValue, CapabilityError> {
        // The org name is the bare target, without any subdomain parts.
        let org = input
            .target
            .rsplit('.')
            .nth(1)
            .unwrap_or(&input.target)
            .to_string();

        let org_flag = format!("--org={org}");
        let mut command = ToolCommand::new(ctx.config.tool_path("trufflehog"))
            .args(["github", org_flag.as_str(), "--json", "--no-update"])
            .envs(&ctx.proxy_env);

        // An unresolved `${GITHUB_TOKEN}` reads as "not configured"; the
        // scan still runs, rate-limited, against public repositories.
        match ctx.config.opt_str(&["github_scanner", "api_token"]) {
            Some(token) => command = command.env("GITHUB_TOKEN", token),
            None => log::warn!("github token not configured; scanning unauthenticated"),
        }

        let mut findings: Vec<serde_json::Value> = Vec::new();
        command
            .stream_lines(|line| {
                if let Ok(value) = serde_json::from_str::<serde_json::Value>(&line) {
                    ctx.collector.push(Record::Finding(value.clone()));
                    findings.push(value);
                }
            })
            .await?;

        log::info!("[{}] {} repository findings", input.target, findings.len());
        Ok(DatasetValue::Findings(findings))
    }
}
