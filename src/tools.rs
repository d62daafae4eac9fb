//! Startup check for the external tools the requested stages need.

use std::collections::BTreeSet;

use crate::config::EffectiveConfig;
use crate::stage::StageId;

/// Tools a stage shells out to. Discovery's set depends on the gather
/// mode, so it is computed against the effective configuration.
fn tools_for(stage: StageId, config: &EffectiveConfig) -> Vec<&'static str> {
    match stage {
        StageId::Discovery => {
            let mode = config.gather_mode();
            let mut tools = Vec::new();
            if mode.contains('g') {
                tools.push("gau");
            }
            if mode.contains('w') {
                tools.push("waybackurls");
            }
            if mode.contains('k') {
                tools.push("katana");
            }
            tools
        }
        StageId::Validation | StageId::Fuzzing => vec!["httpx"],
        StageId::Processing => {
            if config.bool_or(&["processing", "use_uro"], true) {
                vec!["uro"]
            } else {
                vec![]
            }
        }
        StageId::Download => vec!["curl"],
        StageId::Analysis | StageId::RepoScan => vec!["trufflehog"],
    }
}

/// Verify every tool the requested stages need, honoring configured path
/// overrides. Returns the missing ones; empty means good to go.
pub fn missing_tools(stages: &[StageId], config: &EffectiveConfig) -> Vec<String> {
    let needed: BTreeSet<&str> = stages
        .iter()
        .flat_map(|stage| tools_for(*stage, config))
        .collect();

    needed
        .into_iter()
        .filter_map(|tool| {
            let program = config.tool_path(tool);
            match which::which(&program) {
                Ok(path) => {
                    log::debug!("found {tool} at {}", path.display());
                    None
                }
                Err(_) => Some(program),
            }
        })
        .collect()
}
