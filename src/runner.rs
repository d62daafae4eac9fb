//! Stage execution under the timeout/partial-capture/proxy contract.
//!
//! The runner owns the envelope every capability runs inside: it selects
//! the stage's input through the registry policy (or bypasses it entirely
//! in independent mode), precomputes the proxy environment so propagation
//! cannot depend on a capability remembering to ask, bounds the invocation
//! with the stage category's budget, and salvages whatever the capability
//! streamed into the [`Collector`] when the budget expires. Retry policy
//! does not live here.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::capabilities::Capability;
use crate::config::EffectiveConfig;
use crate::errors::RegistryError;
use crate::proxy::{ProxyClientOptions, ProxyDescriptor};
use crate::registry::{Completeness, DatasetRegistry, DatasetValue};
use crate::report::{RunReportEntry, StageStatus};
use crate::stage::StageDescriptor;

/// One record streamed out of a capability while it runs.
#[derive(Debug, Clone)]
pub enum Record {
    Url(String),
    File(PathBuf),
    Finding(serde_json::Value),
}

/// Sink for records produced incrementally by a capability.
///
/// Capabilities push records as they appear. On a normal return the
/// capability's own return value wins; the sink only matters when the
/// invocation is cancelled, at which point the runner drains it and
/// registers the salvaged records as a partial dataset.
#[derive(Debug, Default)]
pub struct Collector {
    records: Mutex<Vec<Record>>,
}

impl Collector {
    pub fn new() -> Collector {
        Collector::default()
    }

    pub fn push(&self, record: Record) {
        self.records.lock().expect("collector lock poisoned").push(record);
    }

    pub fn push_url(&self, url: impl Into<String>) {
        self.push(Record::Url(url.into()));
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("collector lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn drain(&self) -> Vec<Record> {
        std::mem::take(&mut *self.records.lock().expect("collector lock poisoned"))
    }
}

/// Where a stage's input came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// Selected from the registry by the candidate policy.
    Dataset(String),
    /// Supplied by the user in independent mode.
    ExplicitFile(PathBuf),
    /// Target-driven stage with no dataset input.
    None,
}

/// The input handed to a capability.
#[derive(Debug, Clone)]
pub struct StageInput {
    pub target: String,
    pub records: Option<DatasetValue>,
    pub source: InputSource,
}

/// Everything a capability may consult while it runs. Built fresh by the
/// runner for each invocation; immutable from the capability's side.
#[derive(Clone)]
pub struct InvocationContext<'a> {
    pub config: &'a EffectiveConfig,
    /// Proxy environment, merged into every spawned subprocess.
    pub proxy_env: BTreeMap<String, String>,
    /// Structured proxy options for capabilities driving their own client.
    pub client_options: Option<ProxyClientOptions>,
    pub collector: Arc<Collector>,
    /// Per-target, per-stage directory for materialized artifacts.
    pub output_dir: &'a Path,
}

pub struct StageRunner<'a> {
    config: &'a EffectiveConfig,
    proxy: &'a ProxyDescriptor,
}

impl<'a> StageRunner<'a> {
    pub fn new(config: &'a EffectiveConfig, proxy: &'a ProxyDescriptor) -> StageRunner<'a> {
        StageRunner { config, proxy }
    }

    /// Execute one stage end to end and report what happened.
    ///
    /// Only a duplicate output registration escapes as an error; that is
    /// a descriptor-table defect. Every runtime condition (missing
    /// prerequisite, timeout, capability failure) lands in the entry.
    pub async fn run(
        &self,
        descriptor: &StageDescriptor,
        capability: &dyn Capability,
        registry: &mut DatasetRegistry,
        target: &str,
        output_dir: &Path,
        explicit_input: Option<&Path>,
    ) -> Result<RunReportEntry, RegistryError> {
        let started = Instant::now();
        let stage = descriptor.id;

        let (records, source) = match self.select_input(descriptor, registry, explicit_input) {
            Ok(selected) => selected,
            Err(entry_fn) => return Ok(entry_fn(started)),
        };

        let selected_input = match &source {
            InputSource::Dataset(name) => Some(name.clone()),
            InputSource::ExplicitFile(path) => Some(path.display().to_string()),
            InputSource::None => None,
        };

        let collector = Arc::new(Collector::new());
        let ctx = InvocationContext {
            config: self.config,
            proxy_env: self.proxy.as_environment(),
            client_options: self.proxy.as_client_options(),
            collector: Arc::clone(&collector),
            output_dir,
        };
        let input = StageInput {
            target: target.to_string(),
            records,
            source,
        };

        let budget = self.config.stage_timeout(descriptor.category);
        log::debug!("running {stage} with a {}s budget", budget.as_secs());

        let outcome = tokio::time::timeout(budget, capability.invoke(input, &ctx)).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let entry = match outcome {
            Ok(Ok(value)) => {
                let count = value.len();
                registry.register(descriptor.output, value, stage, Completeness::Complete)?;
                RunReportEntry {
                    stage,
                    status: StageStatus::Success,
                    duration_ms,
                    selected_input,
                    output: Some(descriptor.output.to_string()),
                    records: count,
                    detail: None,
                }
            }
            Ok(Err(err)) => {
                log::error!("{stage} failed: {err}");
                RunReportEntry {
                    stage,
                    status: StageStatus::Failed,
                    duration_ms,
                    selected_input,
                    output: None,
                    records: 0,
                    detail: Some(err.to_string()),
                }
            }
            Err(_elapsed) => {
                // The invocation future is gone; child processes die with
                // it. Whatever reached the collector is still good data.
                let salvaged = collector.drain();
                if salvaged.is_empty() {
                    RunReportEntry {
                        stage,
                        status: StageStatus::Failed,
                        duration_ms,
                        selected_input,
                        output: None,
                        records: 0,
                        detail: Some(format!(
                            "timed out after {}s with no usable output",
                            budget.as_secs()
                        )),
                    }
                } else {
                    let value = dataset_from_records(salvaged);
                    let count = value.len();
                    log::warn!(
                        "{stage} timed out after {}s; keeping {count} salvaged records",
                        budget.as_secs()
                    );
                    registry.register(descriptor.output, value, stage, Completeness::Partial)?;
                    RunReportEntry {
                        stage,
                        status: StageStatus::Partial,
                        duration_ms,
                        selected_input,
                        output: Some(descriptor.output.to_string()),
                        records: count,
                        detail: Some(format!("timed out after {}s", budget.as_secs())),
                    }
                }
            }
        };

        Ok(entry)
    }

    /// Pick the stage input. Explicit input bypasses the selection policy
    /// entirely; a missing mandatory input skips the stage.
    #[allow(clippy::type_complexity)]
    fn select_input(
        &self,
        descriptor: &StageDescriptor,
        registry: &mut DatasetRegistry,
        explicit_input: Option<&Path>,
    ) -> Result<
        (Option<DatasetValue>, InputSource),
        Box<dyn FnOnce(Instant) -> RunReportEntry>,
    > {
        let stage = descriptor.id;

        if let Some(path) = explicit_input {
            return match read_url_file(path) {
                Ok(urls) => {
                    log::info!("{stage}: loaded {} records from {}", urls.len(), path.display());
                    Ok((
                        Some(DatasetValue::Urls(urls)),
                        InputSource::ExplicitFile(path.to_path_buf()),
                    ))
                }
                Err(err) => {
                    let detail = format!("could not read input file {}: {err}", path.display());
                    Err(Box::new(move |started: Instant| RunReportEntry {
                        stage,
                        status: StageStatus::Failed,
                        duration_ms: started.elapsed().as_millis() as u64,
                        selected_input: None,
                        output: None,
                        records: 0,
                        detail: Some(detail),
                    }))
                }
            };
        }

        if descriptor.candidates.is_empty() {
            return Ok((None, InputSource::None));
        }

        match registry.resolve(descriptor.candidates) {
            Some(dataset) => {
                if dataset.completeness == Completeness::Partial {
                    log::warn!(
                        "{stage}: consuming `{}`, which is partial ({} records salvaged from `{}`)",
                        dataset.name,
                        dataset.value.len(),
                        dataset.producer
                    );
                }
                Ok((
                    Some(dataset.value.clone()),
                    InputSource::Dataset(dataset.name.clone()),
                ))
            }
            None if descriptor.input_required => {
                let detail = format!(
                    "missing prerequisite: none of [{}] registered",
                    descriptor.candidates.join(", ")
                );
                Err(Box::new(move |started: Instant| RunReportEntry {
                    stage,
                    status: StageStatus::Skipped,
                    duration_ms: started.elapsed().as_millis() as u64,
                    selected_input: None,
                    output: None,
                    records: 0,
                    detail: Some(detail),
                }))
            }
            None => Ok((None, InputSource::None)),
        }
    }
}

/// Build a dataset from salvaged records. Stages stream homogeneous
/// records, so the first record decides the collection shape.
fn dataset_from_records(records: Vec<Record>) -> DatasetValue {
    match records.first() {
        Some(Record::File(_)) => DatasetValue::Files(
            records
                .into_iter()
                .filter_map(|r| match r {
                    Record::File(path) => Some(path),
                    _ => None,
                })
                .collect(),
        ),
        Some(Record::Finding(_)) => DatasetValue::Findings(
            records
                .into_iter()
                .filter_map(|r| match r {
                    Record::Finding(value) => Some(value),
                    _ => None,
                })
                .collect(),
        ),
        _ => DatasetValue::Urls(
            records
                .into_iter()
                .filter_map(|r| match r {
                    Record::Url(url) => Some(url),
                    _ => None,
                })
                .collect(),
        ),
    }
}

fn read_url_file(path: &Path) -> std::io::Result<std::collections::BTreeSet<String>> {
    let contents = std::fs::read_to_string(path)?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}
