//! Shared error types for pipeline orchestration.
//!
//! The taxonomy mirrors how failures propagate: `ConfigError` and
//! `RegistryError` abort a run, everything in `CapabilityError` is captured
//! into the per-stage report entry and the run continues.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building the effective configuration.
///
/// All of these are fatal: they occur before any stage executes.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration source could not be read.
    #[error("failed to read configuration file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configuration source could not be parsed.
    #[error("malformed configuration in {}: {message}", path.display())]
    Malformed { path: PathBuf, message: String },

    /// Two layers disagree on the shape of a key.
    #[error("type conflict at `{path}`: cannot merge {overlay} over {base}")]
    TypeConflict {
        path: String,
        base: &'static str,
        overlay: &'static str,
    },

    /// A consumer demanded a value that interpolation left unresolved.
    #[error("setting `{path}` references `${{{var}}}` which is not set in the environment")]
    UnresolvedPlaceholder { path: String, var: String },

    /// A required setting is absent from every layer.
    #[error("missing required setting `{path}`")]
    MissingSetting { path: String },

    /// A setting exists but has the wrong shape.
    #[error("setting `{path}` has unexpected type (expected {expected})")]
    WrongType {
        path: String,
        expected: &'static str,
    },
}

/// Dataset registry invariant violations.
///
/// A duplicate registration means two stage descriptors declared the same
/// output name. That is a defect in the descriptor table, not a runtime
/// condition to recover from, so it aborts the run.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("dataset `{name}` is already registered (produced by `{producer}`)")]
    DuplicateDataset { name: String, producer: String },
}

/// Failures of a single wrapped capability.
///
/// Captured into the stage's report entry; never fatal to the run on their
/// own.
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// The external tool is not installed or not on PATH.
    #[error("required tool `{tool}` not found on PATH")]
    ToolNotFound { tool: String },

    /// The external tool exited non-zero without usable output.
    #[error("`{tool}` exited with status {code:?}: {stderr}")]
    ToolFailed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    /// I/O failure while driving the capability.
    #[error("capability i/o failure: {0}")]
    Io(#[from] std::io::Error),

    /// The stage's input could not be read.
    #[error("unreadable input {}: {message}", path.display())]
    BadInput { path: PathBuf, message: String },

    /// Anything else the capability wants to surface.
    #[error("{0}")]
    Other(String),
}

impl CapabilityError {
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// Fatal pipeline-level errors. Per-stage conditions never surface here;
/// they land in the run report instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("independent mode requires exactly one stage, got {count}")]
    IndependentStageCount { count: usize },

    #[error("stage `{stage}` does not support independent mode")]
    IndependentUnsupported { stage: String },

    #[error("no capability wired for stage `{stage}`")]
    MissingCapability { stage: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display_names_the_placeholder() {
        let err = ConfigError::UnresolvedPlaceholder {
            path: "proxy.url".to_string(),
            var: "PROXY_URL".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("proxy.url"));
        assert!(rendered.contains("${PROXY_URL}"));
    }

    #[test]
    fn duplicate_dataset_names_both_parties() {
        let err = RegistryError::DuplicateDataset {
            name: "live_urls".to_string(),
            producer: "validation".to_string(),
        };
        assert!(err.to_string().contains("live_urls"));
        assert!(err.to_string().contains("validation"));
    }
}
