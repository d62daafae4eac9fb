//! End-to-end pipeline scenarios with injected capabilities.
//!
//! These exercise the orchestration contract without touching any real
//! external tool: dataset selection across subsetted pipelines, partial
//! salvage on timeout, and run continuation after bad outcomes.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pretty_assertions::assert_eq;

use mjsrecon::capabilities::{Capability, CapabilitySet};
use mjsrecon::config::{self, ConfigValue, EffectiveConfig};
use mjsrecon::errors::CapabilityError;
use mjsrecon::orchestrator::{Orchestrator, PipelineRequest};
use mjsrecon::proxy::ProxyDescriptor;
use mjsrecon::registry::DatasetValue;
use mjsrecon::runner::{InvocationContext, Record, StageInput};
use mjsrecon::report::StageStatus;
use mjsrecon::stage::StageId;

fn test_config(yaml: &str) -> EffectiveConfig {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("defaults.yaml"), yaml).unwrap();
    config::resolve(
        dir.path(),
        "development",
        ConfigValue::Null,
        &config::EnvSnapshot::new(),
    )
    .unwrap()
}

fn urls(items: &[&str]) -> DatasetValue {
    DatasetValue::from_urls(items.iter().map(|s| s.to_string()))
}

/// Returns a fixed URL set regardless of input.
struct Emits {
    stage: StageId,
    urls: Vec<&'static str>,
}

#[async_trait]
impl Capability for Emits {
    fn stage(&self) -> StageId {
        self.stage
    }

    async fn invoke(
        &self,
        _input: StageInput,
        _ctx: &InvocationContext<'_>,
    ) -> Result<DatasetValue, CapabilityError> {
        Ok(urls(&self.urls))
    }
}

/// Keeps only the input URLs present in its allow list, recording the
/// input it saw.
struct Filters {
    stage: StageId,
    keep: Vec<&'static str>,
    seen: Arc<Mutex<Option<StageInput>>>,
}

impl Filters {
    fn new(stage: StageId, keep: &[&'static str]) -> Filters {
        Filters {
            stage,
            keep: keep.to_vec(),
            seen: Arc::new(Mutex::new(None)),
        }
    }
}

#[async_trait]
impl Capability for Filters {
    fn stage(&self) -> StageId {
        self.stage
    }

    async fn invoke(
        &self,
        input: StageInput,
        _ctx: &InvocationContext<'_>,
    ) -> Result<DatasetValue, CapabilityError> {
        let kept: Vec<String> = match &input.records {
            Some(DatasetValue::Urls(incoming)) => self
                .keep
                .iter()
                .filter(|k| incoming.contains(**k))
                .map(|k| k.to_string())
                .collect(),
            _ => Vec::new(),
        };
        *self.seen.lock().unwrap() = Some(input);
        Ok(DatasetValue::from_urls(kept))
    }
}

/// Streams a few file records and then hangs until cancelled.
struct StalledDownload {
    produce: Vec<&'static str>,
}

#[async_trait]
impl Capability for StalledDownload {
    fn stage(&self) -> StageId {
        StageId::Download
    }

    async fn invoke(
        &self,
        _input: StageInput,
        ctx: &InvocationContext<'_>,
    ) -> Result<DatasetValue, CapabilityError> {
        for name in &self.produce {
            ctx.collector.push(Record::File(PathBuf::from(name)));
        }
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        unreachable!("cancelled by the stage budget")
    }
}

/// Counts whatever file records it is handed.
struct CountsFiles {
    seen: Arc<Mutex<Option<usize>>>,
}

#[async_trait]
impl Capability for CountsFiles {
    fn stage(&self) -> StageId {
        StageId::Analysis
    }

    async fn invoke(
        &self,
        input: StageInput,
        _ctx: &InvocationContext<'_>,
    ) -> Result<DatasetValue, CapabilityError> {
        let count = match &input.records {
            Some(DatasetValue::Files(files)) => files.len(),
            _ => 0,
        };
        *self.seen.lock().unwrap() = Some(count);
        Ok(DatasetValue::Findings(Vec::new()))
    }
}

fn orchestrator(config: EffectiveConfig, capabilities: Vec<Box<dyn Capability>>) -> Orchestrator {
    let mut set = CapabilitySet::empty();
    for capability in capabilities {
        set.insert(capability);
    }
    Orchestrator::new(config, ProxyDescriptor::disabled(), set)
}

fn request(stages: &[StageId], root: &Path) -> PipelineRequest {
    PipelineRequest {
        stages: stages.to_vec(),
        target: "example.com".to_string(),
        output_root: root.to_path_buf(),
        input: None,
    }
}

fn materialized(root: &Path, dir: &str, file: &str) -> Vec<String> {
    let path = root.join("example.com").join(dir).join(file);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("missing {}: {e}", path.display()))
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn full_chain_narrows_the_dataset_at_each_stage() {
    let out = tempfile::tempdir().unwrap();
    let validation = Filters::new(StageId::Validation, &["http://t/u1.js", "http://t/u2.js"]);
    let processing = Filters::new(StageId::Processing, &["http://t/u1.js"]);
    let orchestrator = orchestrator(
        test_config("{}"),
        vec![
            Box::new(Emits {
                stage: StageId::Discovery,
                urls: vec!["http://t/u1.js", "http://t/u2.js", "http://t/u3.js"],
            }),
            Box::new(validation),
            Box::new(processing),
        ],
    );

    let report = orchestrator
        .run_pipeline(&request(
            &[StageId::Discovery, StageId::Validation, StageId::Processing],
            out.path(),
        ))
        .await
        .unwrap();

    let records: Vec<usize> = report.entries.iter().map(|e| e.records).collect();
    assert_eq!(records, vec![3, 2, 1]);
    assert!(report
        .entries
        .iter()
        .all(|e| e.status == StageStatus::Success));

    // Every dataset was materialized, complete, with the expected sizes.
    assert_eq!(
        materialized(out.path(), "results", "all_urls.txt").len(),
        3
    );
    assert_eq!(
        materialized(out.path(), "results", "live_js_urls.txt").len(),
        2
    );
    assert_eq!(
        materialized(out.path(), "results", "deduplicated_js_urls.txt").len(),
        1
    );
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test]
async fn subsetted_pipeline_falls_back_to_the_rawest_dataset() {
    // Neither validation nor processing runs; download's candidate list
    // walks past the two missing refined sets down to the raw one.
    let out = tempfile::tempdir().unwrap();
    let download = Filters::new(StageId::Download, &["http://t/u1.js"]);
    let seen = Arc::clone(&download.seen);
    let orchestrator = orchestrator(
        test_config("{}"),
        vec![
            Box::new(Emits {
                stage: StageId::Discovery,
                urls: vec!["http://t/u1.js", "http://t/u2.js"],
            }),
            Box::new(download),
        ],
    );

    let report = orchestrator
        .run_pipeline(&request(&[StageId::Discovery, StageId::Download], out.path()))
        .await
        .unwrap();

    assert_eq!(
        report.entries[1].selected_input.as_deref(),
        Some("all_urls")
    );
    let input = seen.lock().unwrap().take().unwrap();
    assert_eq!(input.records.unwrap().len(), 2);
}

#[tokio::test]
async fn download_timeout_keeps_partial_output_and_the_run_continues() {
    // A 1-second fetch budget; the download streams 2 of its 5 files and
    // hangs. The salvaged pair must flow on to analysis.
    let out = tempfile::tempdir().unwrap();
    let analysis = CountsFiles {
        seen: Arc::new(Mutex::new(None)),
    };
    let analysis_seen = Arc::clone(&analysis.seen);
    let orchestrator = orchestrator(
        test_config("timeouts:\n  download: 1\n"),
        vec![
            Box::new(Emits {
                stage: StageId::Discovery,
                urls: vec!["http://t/u1.js"],
            }),
            Box::new(StalledDownload {
                produce: vec!["dl/a.js", "dl/b.js"],
            }),
            Box::new(analysis),
        ],
    );

    let report = orchestrator
        .run_pipeline(&request(
            &[StageId::Discovery, StageId::Download, StageId::Analysis],
            out.path(),
        ))
        .await
        .unwrap();

    let download_entry = &report.entries[1];
    assert_eq!(download_entry.status, StageStatus::Partial);
    assert_eq!(download_entry.records, 2);
    assert_eq!(
        download_entry.output.as_deref(),
        Some("downloaded_files")
    );

    // Analysis still ran, over exactly the salvaged records.
    assert_eq!(report.entries[2].status, StageStatus::Success);
    assert_eq!(analysis_seen.lock().unwrap().unwrap(), 2);

    // Partial datasets do not fail the run.
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test]
async fn independent_mode_feeds_the_stage_from_the_input_file() {
    let out = tempfile::tempdir().unwrap();
    let input_file = out.path().join("urls.txt");
    std::fs::write(&input_file, "http://t/u1.js\nhttp://t/u9.js\n").unwrap();

    let validation = Filters::new(StageId::Validation, &["http://t/u1.js"]);
    let seen = Arc::clone(&validation.seen);
    let orchestrator = orchestrator(test_config("{}"), vec![Box::new(validation)]);

    let mut req = request(&[StageId::Validation], out.path());
    req.input = Some(input_file);
    let report = orchestrator.run_pipeline(&req).await.unwrap();

    assert_eq!(report.entries[0].status, StageStatus::Success);
    assert_eq!(report.entries[0].records, 1);
    let input = seen.lock().unwrap().take().unwrap();
    assert_eq!(input.records.unwrap().len(), 2);
}
