//! Command-line surface and cross-validation.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::ConfigValue;
use crate::proxy::ProxyOverride;
use crate::stage::StageId;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum EnvProfile {
    Development,
    Production,
    Testing,
}

impl EnvProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvProfile::Development => "development",
            EnvProfile::Production => "production",
            EnvProfile::Testing => "testing",
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FuzzMode {
    Wordlist,
    Permutation,
    Both,
    Off,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "mjsrecon")]
#[command(about = "Modular JavaScript reconnaissance pipeline", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Stages to run, in order (discovery, validation, processing,
    /// download, analysis, fuzzing, repo-scan)
    #[arg(required = true)]
    pub stages: Vec<String>,

    /// Target domain (e.g. example.com)
    #[arg(short = 't', long)]
    pub target: Option<String>,

    /// File with multiple targets, one per line
    #[arg(long, conflicts_with = "target")]
    pub targets_file: Option<PathBuf>,

    /// Base output directory
    #[arg(short = 'o', long, default_value = "./output")]
    pub output: PathBuf,

    /// Configuration directory
    #[arg(long, default_value = "config")]
    pub config_dir: PathBuf,

    /// Configuration environment profile
    #[arg(long = "env", value_enum, default_value = "development")]
    pub environment: EnvProfile,

    /// Run a single stage independently (requires --input)
    #[arg(long)]
    pub independent: bool,

    /// Input file for independent mode
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Override the command timeout in seconds
    #[arg(long)]
    pub command_timeout: Option<u64>,

    /// Abort the run at the first failed stage
    #[arg(long)]
    pub abort_on_failure: bool,

    /// Proxy URL (e.g. socks5://127.0.0.1:40000, http://proxy:8080)
    #[arg(long)]
    pub proxy: Option<String>,

    /// Proxy authentication (username:password)
    #[arg(long)]
    pub proxy_auth: Option<String>,

    /// Comma-separated hosts that bypass the proxy
    #[arg(long)]
    pub no_proxy: Option<String>,

    /// Proxy connection timeout in seconds
    #[arg(long, default_value = "30")]
    pub proxy_timeout: u64,

    /// Verify TLS certificates when using the proxy
    #[arg(long)]
    pub proxy_verify_ssl: bool,

    /// Discovery tools to use: g=gau, w=waybackurls, k=katana
    #[arg(long)]
    pub gather_mode: Option<String>,

    /// Katana crawl depth
    #[arg(short = 'd', long)]
    pub depth: Option<u64>,

    /// Fuzzing mode
    #[arg(long, value_enum, default_value = "off")]
    pub fuzz_mode: FuzzMode,

    /// Custom wordlist for fuzzing
    #[arg(long)]
    pub fuzz_wordlist: Option<PathBuf>,

    /// Report output format
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Enable verbose (debug) logging
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Suppress console output except warnings and errors
    #[arg(short = 'q', long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    /// Parse and cross-validate the stage list and mode flags.
    pub fn validated_stages(&self) -> Result<Vec<StageId>, String> {
        let stages: Vec<StageId> = self
            .stages
            .iter()
            .map(|s| s.parse())
            .collect::<Result<_, _>>()?;

        if self.independent {
            if stages.len() != 1 {
                return Err("independent mode requires exactly one stage".to_string());
            }
            let Some(input) = &self.input else {
                return Err(format!(
                    "the `{}` stage in independent mode requires an --input file",
                    stages[0]
                ));
            };
            if !input.exists() {
                return Err(format!("input file not found: {}", input.display()));
            }
        } else if self.target.is_none() && self.targets_file.is_none() {
            return Err(
                "a target is required: use -t <domain> or --targets-file <file>".to_string(),
            );
        }

        if matches!(self.fuzz_mode, FuzzMode::Wordlist | FuzzMode::Both)
            && self.fuzz_wordlist.is_none()
        {
            return Err(
                "--fuzz-wordlist is required for the wordlist and both fuzz modes".to_string(),
            );
        }

        Ok(stages)
    }

    /// Targets for this run, in file order for batch runs.
    pub fn targets(&self) -> Result<Vec<String>, String> {
        if let Some(target) = &self.target {
            return Ok(vec![target.clone()]);
        }
        if let Some(path) = &self.targets_file {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| format!("could not read targets file {}: {e}", path.display()))?;
            let targets: Vec<String> = contents
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect();
            if targets.is_empty() {
                return Err(format!("targets file {} is empty", path.display()));
            }
            return Ok(targets);
        }
        // Independent mode runs without a target; stages only see the
        // supplied input file.
        Ok(vec!["independent".to_string()])
    }

    /// The call-time configuration layer derived from CLI flags.
    pub fn config_overrides(&self) -> ConfigValue {
        let mut root = BTreeMap::new();

        if let Some(secs) = self.command_timeout {
            root.insert(
                "timeouts".to_string(),
                mapping([("command", ConfigValue::Integer(secs as i64))]),
            );
        }

        let mut discovery = BTreeMap::new();
        if let Some(mode) = &self.gather_mode {
            discovery.insert(
                "gather_mode".to_string(),
                ConfigValue::String(mode.clone()),
            );
        }
        if let Some(depth) = self.depth {
            discovery.insert("katana_depth".to_string(), ConfigValue::Integer(depth as i64));
        }
        if !discovery.is_empty() {
            root.insert("discovery".to_string(), ConfigValue::Mapping(discovery));
        }

        let mut fuzzing = BTreeMap::new();
        if !matches!(self.fuzz_mode, FuzzMode::Off) {
            let mode = match self.fuzz_mode {
                FuzzMode::Wordlist => "wordlist",
                FuzzMode::Permutation => "permutation",
                FuzzMode::Both => "both",
                FuzzMode::Off => unreachable!(),
            };
            fuzzing.insert("mode".to_string(), ConfigValue::String(mode.to_string()));
        }
        if let Some(wordlist) = &self.fuzz_wordlist {
            fuzzing.insert(
                "wordlist".to_string(),
                ConfigValue::String(wordlist.display().to_string()),
            );
        }
        if !fuzzing.is_empty() {
            root.insert("fuzzing".to_string(), ConfigValue::Mapping(fuzzing));
        }

        if self.abort_on_failure {
            root.insert(
                "pipeline".to_string(),
                mapping([("abort_on_failure", ConfigValue::Bool(true))]),
            );
        }

        if root.is_empty() {
            ConfigValue::Null
        } else {
            ConfigValue::Mapping(root)
        }
    }

    /// The all-or-nothing CLI proxy override.
    pub fn proxy_override(&self) -> Option<ProxyOverride> {
        self.proxy.as_ref().map(|url| ProxyOverride {
            url: url.clone(),
            auth: self.proxy_auth.clone(),
            no_proxy: self.no_proxy.clone(),
            timeout_secs: self.proxy_timeout,
            verify_ssl: self.proxy_verify_ssl,
        })
    }
}

fn mapping<const N: usize>(entries: [(&str, ConfigValue); N]) -> ConfigValue {
    ConfigValue::Mapping(
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    )
}
