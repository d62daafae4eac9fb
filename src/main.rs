use anyhow::{bail, Context, Result};
use clap::Parser;
use log::LevelFilter;

use mjsrecon::capabilities::CapabilitySet;
use mjsrecon::cli::{Cli, OutputFormat};
use mjsrecon::config;
use mjsrecon::orchestrator::{Orchestrator, PipelineRequest};
use mjsrecon::proxy::ProxyDescriptor;
use mjsrecon::tools;

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            log::error!("{err:#}");
            std::process::exit(2);
        }
    }
}

fn init_logging(cli: &Cli) {
    let level = if cli.quiet {
        LevelFilter::Warn
    } else if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level.as_str()))
        .format_timestamp_secs()
        .init();
}

fn run(cli: Cli) -> Result<i32> {
    let stages = cli.validated_stages().map_err(anyhow::Error::msg)?;
    let targets = cli.targets().map_err(anyhow::Error::msg)?;

    let effective = config::resolve(
        &cli.config_dir,
        cli.environment.as_str(),
        cli.config_overrides(),
        &config::process_env(),
    )
    .context("configuration resolution failed")?;

    let missing = tools::missing_tools(&stages, &effective);
    if !missing.is_empty() {
        bail!(
            "missing required tools: {}. Install them or point `tools.*` at their location.",
            missing.join(", ")
        );
    }

    let proxy = ProxyDescriptor::derive(&effective, cli.proxy_override().as_ref())
        .context("proxy configuration failed")?;
    if proxy.enabled {
        log::info!(
            "proxy enabled: {}",
            proxy.url.as_deref().unwrap_or("<unset>")
        );
    }

    let orchestrator = Orchestrator::new(effective, proxy, CapabilitySet::standard());
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;

    let mut exit_code = 0;
    for target in targets {
        log::info!("starting workflow for target: {target}");
        let request = PipelineRequest {
            stages: stages.clone(),
            target,
            output_root: cli.output.clone(),
            input: if cli.independent {
                cli.input.clone()
            } else {
                None
            },
        };

        let report = runtime.block_on(orchestrator.run_pipeline(&request))?;
        match cli.format {
            OutputFormat::Table => print!("{}", report.render_table()),
            OutputFormat::Json => println!("{}", report.to_json()?),
        }
        exit_code = exit_code.max(report.exit_code());
    }

    Ok(exit_code)
}
