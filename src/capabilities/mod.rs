//! Wrapped external capabilities.
//!
//! The orchestration core treats every stage's content as opaque: a
//! capability receives an input dataset and an invocation context and
//! either returns an output dataset or fails. The adapters in this module
//! are deliberately thin wrappers around external tools; the interesting
//! machinery (timeouts, partial capture, proxy propagation) lives in the
//! runner, not here.

mod analysis;
mod discovery;
mod download;
mod fuzzing;
pub mod process;
mod processing;
mod repo_scan;
pub mod urls;
mod validation;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::errors::CapabilityError;
use crate::registry::DatasetValue;
use crate::runner::{InvocationContext, StageInput};
use crate::stage::StageId;

pub use analysis::AnalysisCapability;
pub use discovery::DiscoveryCapability;
pub use download::DownloadCapability;
pub use fuzzing::FuzzingCapability;
pub use processing::ProcessingCapability;
pub use repo_scan::RepoScanCapability;
pub use validation::ValidationCapability;

/// URL records of a stage input, empty for any other input shape.
pub(crate) fn input_urls(input: &StageInput) -> Vec<String> {
    match &input.records {
        Some(DatasetValue::Urls(urls)) => urls.iter().cloned().collect(),
        _ => Vec::new(),
    }
}

/// The invoke contract every stage wraps.
#[async_trait]
pub trait Capability: Send + Sync {
    fn stage(&self) -> StageId;

    async fn invoke(
        &self,
        input: StageInput,
        ctx: &InvocationContext<'_>,
    ) -> Result<DatasetValue, CapabilityError>;
}

/// Capability wiring for one run. Production uses [`CapabilitySet::standard`];
/// tests inject their own implementations.
#[derive(Default)]
pub struct CapabilitySet {
    capabilities: HashMap<StageId, Box<dyn Capability>>,
}

impl CapabilitySet {
    pub fn empty() -> CapabilitySet {
        CapabilitySet::default()
    }

    /// The real tool adapters for all seven stages.
    pub fn standard() -> CapabilitySet {
        let mut set = CapabilitySet::empty();
        set.insert(Box::new(DiscoveryCapability));
        set.insert(Box::new(ValidationCapability));
        set.insert(Box::new(ProcessingCapability));
        set.insert(Box::new(DownloadCapability));
        set.insert(Box::new(AnalysisCapability));
        set.insert(Box::new(FuzzingCapability));
        set.insert(Box::new(RepoScanCapability));
        set
    }

    pub fn insert(&mut self, capability: Box<dyn Capability>) {
        self.capabilities.insert(capability.stage(), capability);
    }

    pub fn get(&self, id: StageId) -> Option<&dyn Capability> {
        self.capabilities.get(&id).map(Box::as_ref)
    }
}
