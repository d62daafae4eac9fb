//! Static stage metadata.
//!
//! Each pipeline stage is described once, at design time: which datasets it
//! prefers as input (most processed first), what it produces, whether it
//! can run independently from a user-supplied file, and which timeout
//! budget applies. Run-time availability of datasets decides which
//! candidate is actually selected; the candidate lists themselves never
//! change.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Canonical dataset names, shared between descriptors and capabilities.
pub mod datasets {
    pub const ALL_URLS: &str = "all_urls";
    pub const LIVE_URLS: &str = "live_urls";
    pub const DEDUPLICATED_URLS: &str = "deduplicated_urls";
    pub const DOWNLOADED_FILES: &str = "downloaded_files";
    pub const ANALYSIS_FINDINGS: &str = "analysis_findings";
    pub const FUZZED_URLS: &str = "fuzzed_urls";
    pub const REPO_FINDINGS: &str = "repo_findings";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageId {
    Discovery,
    Validation,
    Processing,
    Download,
    Analysis,
    Fuzzing,
    RepoScan,
}

impl StageId {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageId::Discovery => "discovery",
            StageId::Validation => "validation",
            StageId::Processing => "processing",
            StageId::Download => "download",
            StageId::Analysis => "analysis",
            StageId::Fuzzing => "fuzzing",
            StageId::RepoScan => "repo-scan",
        }
    }

    /// The conventional execution order, used only for advisory warnings.
    pub fn conventional_order() -> &'static [StageId] {
        &[
            StageId::Discovery,
            StageId::Validation,
            StageId::Processing,
            StageId::Download,
            StageId::Analysis,
            StageId::Fuzzing,
            StageId::RepoScan,
        ]
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "discovery" => Ok(StageId::Discovery),
            "validation" => Ok(StageId::Validation),
            "processing" => Ok(StageId::Processing),
            "download" => Ok(StageId::Download),
            "analysis" => Ok(StageId::Analysis),
            "fuzzing" => Ok(StageId::Fuzzing),
            "repo-scan" => Ok(StageId::RepoScan),
            other => Err(format!(
                "unknown stage `{other}` (valid: discovery, validation, processing, \
                 download, analysis, fuzzing, repo-scan)"
            )),
        }
    }
}

/// Timeout budget classification. Each category maps to one key under the
/// `timeouts` configuration section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageCategory {
    /// Long-running URL gathering and transformation tools.
    Gather,
    /// Liveness probing.
    Validate,
    /// Content fetching.
    Fetch,
    /// Local file inspection.
    Inspect,
    /// Repository cloning and scanning.
    Scan,
}

impl StageCategory {
    pub fn timeout_key(&self) -> &'static str {
        match self {
            StageCategory::Gather => "command",
            StageCategory::Validate => "verify",
            StageCategory::Fetch => "download",
            StageCategory::Inspect => "analysis",
            StageCategory::Scan => "scan",
        }
    }
}

/// Static description of one stage.
#[derive(Debug, Clone, Copy)]
pub struct StageDescriptor {
    pub id: StageId,
    /// Candidate input datasets, most processed first. Empty for stages
    /// driven by the target itself.
    pub candidates: &'static [&'static str],
    /// Dataset name registered on success or partial success.
    pub output: &'static str,
    /// Whether a missing input skips the stage instead of running it empty.
    pub input_required: bool,
    /// Whether the stage accepts a user-supplied input file in
    /// independent mode.
    pub independent: bool,
    pub category: StageCategory,
}

use self::datasets::*;

static DESCRIPTORS: &[StageDescriptor] = &[
    StageDescriptor {
        id: StageId::Discovery,
        candidates: &[],
        output: ALL_URLS,
        input_required: false,
        independent: false,
        category: StageCategory::Gather,
    },
    StageDescriptor {
        id: StageId::Validation,
        candidates: &[ALL_URLS],
        output: LIVE_URLS,
        input_required: true,
        independent: true,
        category: StageCategory::Validate,
    },
    StageDescriptor {
        id: StageId::Processing,
        candidates: &[LIVE_URLS, ALL_URLS],
        output: DEDUPLICATED_URLS,
        input_required: true,
        independent: true,
        category: StageCategory::Gather,
    },
    StageDescriptor {
        id: StageId::Download,
        candidates: &[DEDUPLICATED_URLS, LIVE_URLS, ALL_URLS],
        output: DOWNLOADED_FILES,
        input_required: true,
        independent: true,
        category: StageCategory::Fetch,
    },
    StageDescriptor {
        id: StageId::Analysis,
        candidates: &[DOWNLOADED_FILES],
        output: ANALYSIS_FINDINGS,
        input_required: true,
        independent: true,
        category: StageCategory::Inspect,
    },
    StageDescriptor {
        id: StageId::Fuzzing,
        candidates: &[DEDUPLICATED_URLS, LIVE_URLS],
        output: FUZZED_URLS,
        input_required: true,
        independent: true,
        category: StageCategory::Gather,
    },
    StageDescriptor {
        id: StageId::RepoScan,
        candidates: &[],
        output: REPO_FINDINGS,
        input_required: false,
        independent: false,
        category: StageCategory::Scan,
    },
];

pub fn descriptor(id: StageId) -> &'static StageDescriptor {
    DESCRIPTORS
        .iter()
        .find(|d| d.id == id)
        .unwrap_or_else(|| unreachable!("descriptor table covers every StageId"))
}

pub fn all_descriptors() -> &'static [StageDescriptor] {
    DESCRIPTORS
}
