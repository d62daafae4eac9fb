//! Dataset materialization.
//!
//! The orchestration core's responsibility ends at handing a completed
//! dataset to this writer: URLs and file lists go out line-oriented,
//! findings as a JSON array, each under the producing stage's directory in
//! the per-target output tree. Failures here are logged by the caller and
//! never affect the run outcome.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::EffectiveConfig;
use crate::registry::{Completeness, Dataset, DatasetValue};

/// Write one dataset to its well-known file. Returns the path written.
pub fn write_dataset(
    dataset: &Dataset,
    dir: &Path,
    config: &EffectiveConfig,
) -> std::io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(config.file_for(&dataset.name));
    let mut file = fs::File::create(&path)?;

    match &dataset.value {
        DatasetValue::Urls(urls) => {
            for url in urls {
                writeln!(file, "{url}")?;
            }
        }
        DatasetValue::Files(files) => {
            for f in files {
                writeln!(file, "{}", f.display())?;
            }
        }
        DatasetValue::Findings(findings) => {
            serde_json::to_writer_pretty(&mut file, findings)?;
            writeln!(file)?;
        }
    }

    if dataset.completeness == Completeness::Partial {
        log::warn!(
            "{} written from a partial dataset ({} records)",
            path.display(),
            dataset.value.len()
        );
    }
    Ok(path)
}
