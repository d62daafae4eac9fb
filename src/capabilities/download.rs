//! File download via `curl`.
//!
//! The one capability that drives its own outbound requests rather than
//! delegating routing to a tool's environment handling: proxy settings
//! come in as structured client options and are translated to explicit
//! `curl` flags. Downloads run concurrently up to the configured limit;
//! each saved file is pushed to the collector as it lands, so a timeout
//! still salvages everything fetched so far.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::capabilities::urls;
use crate::capabilities::{input_urls, Capability};
use crate::errors::CapabilityError;
use crate::proxy::ProxyClientOptions;
use crate::registry::DatasetValue;
use crate::runner::{InvocationContext, Record, StageInput};
use crate::stage::StageId;

pub struct DownloadCapability;

#[async_trait]
impl Capability for DownloadCapability {
    fn stage(&self) -> StageId {
        StageId::Download
    }

    async fn invoke(
        &self,
        input: StageInput,
        ctx: &InvocationContext<'_>,
    ) -> Result<DatasetValue, CapabilityError> {
        let allowed = ctx.config.allowed_download_extensions();
        let targets: Vec<String> = input_urls(&input)
            .into_iter()
            .filter(|url| urls::has_any_extension(url, &allowed))
            .collect();
        if targets.is_empty() {
            log::warn!("[{}] no downloadable URLs", input.target);
            return Ok(DatasetValue::Files(Vec::new()));
        }

        tokio::fs::create_dir_all(ctx.output_dir).await?;
        log::info!(
            "[{}] downloading {} files to {}",
            input.target,
            targets.len(),
            ctx.output_dir.display()
        );

        let program = ctx.config.tool_path("curl");
        let request_timeout = ctx.config.u64_or(&["download", "request_timeout"], 30);
        let semaphore = Arc::new(Semaphore::new(
            ctx.config.download_concurrency().max(1) as usize
        ));
        let mut tasks: JoinSet<Option<PathBuf>> = JoinSet::new();

        for url in targets {
            let dest = ctx.output_dir.join(urls::filename_for(&url));
            let program = program.clone();
            let proxy_env = ctx.proxy_env.clone();
            let client = ctx.client_options.clone();
            let collector = Arc::clone(&ctx.collector);
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                let mut command = Command::new(&program);
                command
                    .arg("-sSf")
                    .arg("--max-time")
                    .arg(request_timeout.to_string())
                    .arg("-o")
                    .arg(&dest)
                    .arg(&url)
                    .envs(&proxy_env)
                    .kill_on_drop(true);
                apply_client_options(&mut command, client.as_ref());

                match command.status().await {
                    Ok(status) if status.success() => {
                        collector.push(Record::File(dest.clone()));
                        Some(dest)
                    }
                    Ok(status) => {
                        log::debug!("curl {url} exited with {status}");
                        None
                    }
                    Err(err) => {
                        log::debug!("curl {url} failed to spawn: {err}");
                        None
                    }
                }
            });
        }

        let mut downloaded = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            if let Ok(Some(path)) = joined {
                downloaded.push(path);
            }
        }

        log::info!(
            "[{}] downloaded {} of the requested files",
            input.target,
            downloaded.len()
        );
        Ok(DatasetValue::Files(downloaded))
    }
}

fn apply_client_options(command: &mut Command, options: Option<&ProxyClientOptions>) {
    let Some(options) = options else { return };
    command.arg("--proxy").arg(&options.url);
    command
        .arg("--connect-timeout")
        .arg(options.timeout.as_secs().to_string());
    if !options.bypass.is_empty() {
        command.arg("--noproxy").arg(options.bypass.join(","));
    }
    if !options.verify_ssl {
        command.arg("-k");
    }
}
