//! Machine-readable record of a run's diffs

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::comparator::ScreenshotComparator;
use crate::error::PerceptualResult;
use crate::identity::StepIdentity;

/// File name of the summary inside the run directory
pub const SUMMARY_FILE: &str = "diffs.json";

/// Written at suite end to `<base>/<run>/diffs.json`. All paths are relative
/// to the base path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started: DateTime<Local>,
    pub baseline_root: PathBuf,
    pub candidate_root: PathBuf,
    pub diff_root: PathBuf,
    pub diff_count: usize,
    pub diffs: Vec<DiffEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffEntry {
    #[serde(flatten)]
    pub step: StepIdentity,
    pub diff_path: PathBuf,
}

impl RunSummary {
    /// Snapshot the current run of `comparator`
    pub fn collect(comparator: &ScreenshotComparator) -> Self {
        let paths = comparator.paths();
        let diffs: Vec<DiffEntry> = comparator
            .all_diffs()
            .into_iter()
            .map(|(step, diff_path)| DiffEntry { step, diff_path })
            .collect();

        Self {
            run_id: paths.run_id().to_string(),
            started: paths.started(),
            baseline_root: paths.baseline_root(false),
            candidate_root: paths.candidate_root(false),
            diff_root: paths.diff_root(false),
            diff_count: diffs.len(),
            diffs,
        }
    }

    /// Write the summary as pretty JSON into `run_root`
    pub async fn write(&self, run_root: &Path) -> PerceptualResult<PathBuf> {
        tokio::fs::create_dir_all(run_root).await?;

        let path = run_root.join(SUMMARY_FILE);
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(&path, json).await?;

        info!("Run summary written to: {}", path.display());
        Ok(path)
    }

    pub async fn load(path: &Path) -> PerceptualResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }
}
