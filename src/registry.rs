//! Run-scoped dataset registry.
//!
//! Datasets are append-only within a run: a stage reads inputs and
//! registers new named outputs, it never mutates a dataset it did not
//! produce. `resolve` implements the single dataset-selection policy for
//! the whole pipeline: the first candidate name, in the caller's priority
//! order, that is currently registered wins. Candidates are listed most
//! processed first, so a stage automatically consumes the best dataset an
//! earlier (possibly subsetted) pipeline produced.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::errors::RegistryError;
use crate::stage::StageId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Completeness {
    Complete,
    /// The producing stage was cut short but yielded usable output.
    Partial,
}

/// The records a dataset holds. Stages produce homogeneous collections.
#[derive(Debug, Clone, PartialEq)]
pub enum DatasetValue {
    Urls(BTreeSet<String>),
    Files(Vec<PathBuf>),
    Findings(Vec<serde_json::Value>),
}

impl DatasetValue {
    pub fn len(&self) -> usize {
        match self {
            DatasetValue::Urls(urls) => urls.len(),
            DatasetValue::Files(files) => files.len(),
            DatasetValue::Findings(findings) => findings.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn from_urls<I: IntoIterator<Item = String>>(urls: I) -> DatasetValue {
        DatasetValue::Urls(urls.into_iter().collect())
    }
}

#[derive(Debug, Clone)]
pub struct Dataset {
    pub name: String,
    pub value: DatasetValue,
    pub producer: StageId,
    pub created_at: DateTime<Utc>,
    pub completeness: Completeness,
}

/// In-memory, run-scoped mapping from dataset name to its current value.
#[derive(Debug, Default)]
pub struct DatasetRegistry {
    datasets: BTreeMap<String, Dataset>,
    resolve_calls: u64,
}

impl DatasetRegistry {
    pub fn new() -> DatasetRegistry {
        DatasetRegistry::default()
    }

    /// Register a new dataset. Names are unique per run; a duplicate means
    /// two stage descriptors declared the same output and is a defect.
    pub fn register(
        &mut self,
        name: &str,
        value: DatasetValue,
        producer: StageId,
        completeness: Completeness,
    ) -> Result<(), RegistryError> {
        if let Some(existing) = self.datasets.get(name) {
            return Err(RegistryError::DuplicateDataset {
                name: name.to_string(),
                producer: existing.producer.to_string(),
            });
        }
        self.datasets.insert(
            name.to_string(),
            Dataset {
                name: name.to_string(),
                value,
                producer,
                created_at: Utc::now(),
                completeness,
            },
        );
        Ok(())
    }

    /// Select the most processed dataset available: the first candidate in
    /// the caller-supplied priority order that is registered. `None` is
    /// not an error; the caller decides whether a missing input is fatal.
    pub fn resolve(&mut self, candidates: &[&str]) -> Option<&Dataset> {
        self.resolve_calls += 1;
        candidates
            .iter()
            .find(|name| self.datasets.contains_key(**name))
            .and_then(|name| self.datasets.get(*name))
    }

    pub fn get(&self, name: &str) -> Option<&Dataset> {
        self.datasets.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.datasets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// How many times the selection policy has run. Independent mode is
    /// required to bypass it entirely, which tests observe here.
    pub fn resolve_calls(&self) -> u64 {
        self.resolve_calls
    }
}
