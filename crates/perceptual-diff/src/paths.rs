//! Run directory layout
//!
//! ```text
//! <base>/baseline/...          persistent, shared by every run
//! <base>/<run>/result/...      candidates captured in this run
//! <base>/<run>/diff/...        annotated diff images of this run
//! <base>/<run>/tmp/...         scratch output, never a persisted artifact
//! ```

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{PerceptualError, PerceptualResult};

/// Format of the run directory name
pub const RUN_ID_FORMAT: &str = "%Y%m%d%H%M%S";

const BASELINE_DIR: &str = "baseline";
const RESULT_DIR: &str = "result";
const DIFF_DIR: &str = "diff";
const SCRATCH_DIR: &str = "tmp";

/// Resolved directories for one run
#[derive(Debug, Clone)]
pub struct RunPaths {
    base: PathBuf,
    started: DateTime<Local>,
    run_id: String,
}

impl RunPaths {
    /// Paths for a run started at `started`, without touching the filesystem
    pub fn new(base: impl Into<PathBuf>, started: DateTime<Local>) -> Self {
        let run_id = started.format(RUN_ID_FORMAT).to_string();
        Self {
            base: base.into(),
            started,
            run_id,
        }
    }

    /// Create the base directory and claim a run directory for `started`.
    ///
    /// When another run already owns the timestamped directory (two runs
    /// started within the same second) a `-N` suffix is appended until an
    /// unused name is found.
    pub fn claim(base: impl Into<PathBuf>, started: DateTime<Local>) -> PerceptualResult<Self> {
        let mut paths = Self::new(base, started);

        std::fs::create_dir_all(&paths.base).map_err(|e| {
            PerceptualError::Configuration(format!(
                "base path {} is not writable: {}",
                paths.base.display(),
                e
            ))
        })?;

        let stem = paths.run_id.clone();
        let mut attempt = 0u32;
        loop {
            match std::fs::create_dir(paths.run_root()) {
                Ok(()) => break,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    attempt += 1;
                    paths.run_id = format!("{}-{}", stem, attempt);
                    debug!("Run directory taken, trying {}", paths.run_id);
                }
                Err(e) => {
                    return Err(PerceptualError::Configuration(format!(
                        "cannot create run directory {}: {}",
                        paths.run_root().display(),
                        e
                    )));
                }
            }
        }

        info!("Claimed run directory {}", paths.run_root().display());
        Ok(paths)
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn started(&self) -> DateTime<Local> {
        self.started
    }

    /// Name of the run directory under the base path
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn run_root(&self) -> PathBuf {
        self.base.join(&self.run_id)
    }

    /// Baseline root. Never timestamped.
    pub fn baseline_root(&self, absolute: bool) -> PathBuf {
        self.resolve(PathBuf::from(BASELINE_DIR), absolute)
    }

    /// Root for candidates captured during this run
    pub fn candidate_root(&self, absolute: bool) -> PathBuf {
        self.resolve(Path::new(&self.run_id).join(RESULT_DIR), absolute)
    }

    /// Root for diff images produced during this run
    pub fn diff_root(&self, absolute: bool) -> PathBuf {
        self.resolve(Path::new(&self.run_id).join(DIFF_DIR), absolute)
    }

    /// Scratch directory for in-flight backend output.
    ///
    /// Lives outside both the baseline and diff roots so an aborted run can
    /// never leave something that looks like a persisted diff.
    pub fn scratch_dir(&self) -> PathBuf {
        self.run_root().join(SCRATCH_DIR)
    }

    /// Remove the scratch directory and anything left in it
    pub async fn sweep_scratch(&self) -> PerceptualResult<()> {
        let dir = self.scratch_dir();
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!("Swept scratch directory {}", dir.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn resolve(&self, relative: PathBuf, absolute: bool) -> PathBuf {
        if absolute {
            self.base.join(relative)
        } else {
            relative
        }
    }
}

/// Create the parent directory of `file`. Idempotent.
pub async fn ensure_parent(file: &Path) -> PerceptualResult<()> {
    if let Some(dir) = file.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| PerceptualError::Directory {
                path: dir.to_path_buf(),
                source,
            })?;
    }
    Ok(())
}
