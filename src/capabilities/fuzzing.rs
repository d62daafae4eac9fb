//! URL fuzzing: expand a wordlist against known origins, probe with
//! `httpx`.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::capabilities::process::ToolCommand;
use crate::capabilities::urls;
use crate::capabilities::{input_urls, Capability};
use crate::errors::CapabilityError;
use crate::registry::DatasetValue;
use crate::runner::{InvocationContext, StageInput};
use crate::stage::StageId;

pub struct FuzzingCapability;

#[async_trait]
impl Capability for FuzzingCapability {
    fn stage(&self) -> StageId {
        StageId::Fuzzing
    }

    async fn invoke(
        &self,
        input: StageInput,
        ctx: &InvocationContext<'_>,
    ) -> Result<DatasetValue, CapabilityError> {
        let mode = ctx.config.str_or(&["fuzzing", "mode"], "off").to_string();
        if mode == "off" {
            log::warn!(
                "[{}] fuzzing requested but the fuzz mode is off; nothing to do",
                input.target
            );
            return Ok(DatasetValue::Urls(BTreeSet::new()));
        }

        let known: BTreeSet<String> = input_urls(&input).into_iter().collect();
        let origins: BTreeSet<String> = known.iter().filter_map(|u| urls::origin(u)).collect();
        if origins.is_empty() {
            log::warn!("[{}] no origins to fuzz", input.target);
            return Ok(DatasetValue::Urls(BTreeSet::new()));
        }

        let words = self.load_words(ctx, &mode, &known)?;
        let candidates: Vec<String> = origins
            .iter()
            .flat_map(|origin| words.iter().map(move |w| format!("{origin}/{w}")))
            .filter(|candidate| !known.contains(candidate))
            .collect();
        log::info!(
            "[{}] probing {} fuzzing candidates across {} origins",
            input.target,
            candidates.len(),
            origins.len()
        );

        let threads = ctx.config.fuzz_threads().to_string();
        let mut hits: BTreeSet<String> = BTreeSet::new();
        ToolCommand::new(ctx.config.tool_path("httpx"))
            .args(["-silent", "-threads", threads.as_str()])
            .envs(&ctx.proxy_env)
            .stdin_lines(candidates)
            .stream_lines(|line| {
                if hits.insert(line.clone()) {
                    ctx.collector.push_url(line);
                }
            })
            .await?;

        Ok(DatasetValue::Urls(hits))
    }
}

impl FuzzingCapability {
    /// Wordlist entries for the selected mode: the configured file, name
    /// permutations of the scripts already observed, or both.
    fn load_words(
        &self,
        ctx: &InvocationContext<'_>,
        mode: &str,
        known: &BTreeSet<String>,
    ) -> Result<Vec<String>, CapabilityError> {
        let mut words: BTreeSet<String> = BTreeSet::new();

        if matches!(mode, "wordlist" | "both") {
            let path = ctx
                .config
                .opt_str(&["fuzzing", "wordlist"])
                .ok_or_else(|| {
                    CapabilityError::other("wordlist fuzz mode without a configured wordlist")
                })?;
            let contents =
                std::fs::read_to_string(path).map_err(|e| CapabilityError::BadInput {
                    path: path.into(),
                    message: e.to_string(),
                })?;
            words.extend(
                contents
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(|w| w.trim_start_matches('/').to_string()),
            );
        }

        if matches!(mode, "permutation" | "both") {
            for url in known {
                if let Some(name) = url.rsplit('/').next() {
                    let name = name.split(['?', '#']).next().unwrap_or(name);
                    if let Some(base) = name.strip_suffix(".js") {
                        for variant in ["min", "bundle", "prod", "old", "bak"] {
                            words.insert(format!("{base}.{variant}.js"));
                        }
                    }
                }
            }
        }

        Ok(words.into_iter().collect())
    }
}
