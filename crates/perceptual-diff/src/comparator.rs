//! Capture, store and compare step screenshots

use chrono::Local;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::backend::{BackendVerdict, CommandBackend, ImageDiffBackend};
use crate::capture::ScreenshotSource;
use crate::config::PerceptualConfig;
use crate::error::{PerceptualError, PerceptualResult};
use crate::identity::StepIdentity;
use crate::naming::PathNamer;
use crate::paths::{ensure_parent, RunPaths};
use crate::registry::DiffRegistry;

/// Final state of one step's screenshot
#[derive(Debug, Clone, PartialEq)]
pub enum DiffOutcome {
    /// No baseline existed; the candidate became the baseline
    Established,
    /// Baseline and candidate match within the fuzz tolerance
    Identical,
    /// A diff image was persisted at `diff_path` (base-relative)
    Different {
        magnitude: Option<f64>,
        diff_path: PathBuf,
    },
    /// The comparison could not be carried out
    Error { message: String },
}

/// Outcome of [`ScreenshotComparator::take_screenshot_and_compare`]
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub identity: StepIdentity,
    pub outcome: DiffOutcome,
}

impl Comparison {
    /// Human readable message for `Different` and `Error` outcomes
    pub fn message(&self) -> Option<String> {
        match &self.outcome {
            DiffOutcome::Different {
                magnitude: Some(m), ..
            } => Some(format!("There was a UI difference of {}", m)),
            DiffOutcome::Different { magnitude: None, .. } => {
                Some("There was a UI difference".to_string())
            }
            DiffOutcome::Error { message } => Some(message.clone()),
            DiffOutcome::Established | DiffOutcome::Identical => None,
        }
    }

    pub fn is_different(&self) -> bool {
        matches!(self.outcome, DiffOutcome::Different { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, DiffOutcome::Error { .. })
    }
}

/// Orchestrates capture, baseline bootstrap and comparison for each step
pub struct ScreenshotComparator {
    config: PerceptualConfig,
    paths: RunPaths,
    namer: PathNamer,
    backend: Box<dyn ImageDiffBackend>,
    registry: Arc<DiffRegistry>,
    scratch_seq: AtomicU64,
}

impl ScreenshotComparator {
    /// Validate `config` and claim a run directory under its base path
    pub fn new(config: PerceptualConfig, backend: Box<dyn ImageDiffBackend>) -> PerceptualResult<Self> {
        config.validate()?;

        let paths = RunPaths::claim(&config.path, Local::now())?;
        let namer = PathNamer::new(config.effective_viewport(), config.extension.clone());

        info!(
            "Screenshot comparison using {} (fuzz {}%, metric {}), run {}",
            backend.name(),
            config.compare.fuzz,
            config.compare.metric,
            paths.run_id()
        );

        Ok(Self {
            config,
            paths,
            namer,
            backend,
            registry: Arc::new(DiffRegistry::new()),
            scratch_seq: AtomicU64::new(0),
        })
    }

    /// Comparator backed by the external `compare` binary
    pub fn with_command_backend(config: PerceptualConfig) -> PerceptualResult<Self> {
        let backend = CommandBackend::new(&config.compare);
        Self::new(config, Box::new(backend))
    }

    /// Start a fresh run: new run directory, empty registry, no scratch
    pub async fn start_run(&mut self) -> PerceptualResult<()> {
        if let Err(e) = self.paths.sweep_scratch().await {
            warn!("Failed to sweep scratch of run {}: {}", self.paths.run_id(), e);
        }

        let base = self.config.path.clone();
        self.paths = tokio::task::spawn_blocking(move || RunPaths::claim(base, Local::now()))
            .await
            .map_err(|e| PerceptualError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))??;
        self.registry.clear();
        self.scratch_seq.store(0, Ordering::Relaxed);

        info!("Started run {}", self.paths.run_id());
        Ok(())
    }

    pub fn config(&self) -> &PerceptualConfig {
        &self.config
    }

    pub fn paths(&self) -> &RunPaths {
        &self.paths
    }

    pub fn namer(&self) -> &PathNamer {
        &self.namer
    }

    /// Shared handle to the diff registry of the current run
    pub fn registry(&self) -> Arc<DiffRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn baseline_path(&self, identity: &StepIdentity, absolute: bool) -> PathBuf {
        self.paths.baseline_root(absolute).join(self.namer.name(identity))
    }

    pub fn candidate_path(&self, identity: &StepIdentity, absolute: bool) -> PathBuf {
        self.paths.candidate_root(absolute).join(self.namer.name(identity))
    }

    /// Where the diff image of `identity` goes, whether or not one exists
    pub fn diff_path(&self, identity: &StepIdentity, absolute: bool) -> PathBuf {
        self.paths.diff_root(absolute).join(self.namer.name(identity))
    }

    /// Base-relative diff path recorded for `identity` in this run
    pub fn diff_for(&self, identity: &StepIdentity) -> Option<PathBuf> {
        self.registry.lookup(identity)
    }

    pub fn all_diffs(&self) -> BTreeMap<StepIdentity, PathBuf> {
        self.registry.all()
    }

    pub fn diff_count(&self) -> usize {
        self.registry.count()
    }

    /// Capture the current screen for `identity` and compare it with its baseline.
    ///
    /// Backend failures come back as [`DiffOutcome::Error`]; capture and
    /// filesystem failures are returned as errors.
    pub async fn take_screenshot_and_compare(
        &self,
        identity: &StepIdentity,
        source: &dyn ScreenshotSource,
    ) -> PerceptualResult<Comparison> {
        let delay = self.config.delay()?;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        // a record may only come from this comparison
        let name = self.namer.name(identity);
        self.forget_diff(identity, &name).await;

        let bytes = source
            .capture()
            .await
            .map_err(|e| PerceptualError::Capture(format!("{:#}", e)))?;

        let candidate = self.paths.candidate_root(true).join(&name);
        ensure_parent(&candidate).await?;
        tokio::fs::write(&candidate, &bytes).await?;
        debug!("Saved candidate {} ({} bytes)", candidate.display(), bytes.len());

        let baseline = self.paths.baseline_root(true).join(&name);
        let outcome = if tokio::fs::try_exists(&baseline).await? {
            self.compare(identity, &name, &baseline, &candidate).await?
        } else {
            self.establish_baseline(&candidate, &baseline).await?;
            info!("Baseline established for {}", identity);
            DiffOutcome::Established
        };

        Ok(Comparison {
            identity: identity.clone(),
            outcome,
        })
    }

    async fn compare(
        &self,
        identity: &StepIdentity,
        name: &Path,
        baseline: &Path,
        candidate: &Path,
    ) -> PerceptualResult<DiffOutcome> {
        let scratch = self.next_scratch_path().await?;
        let limit = self.config.compare.timeout();

        let verdict = match tokio::time::timeout(
            limit,
            self.backend.compare(baseline, candidate, &scratch),
        )
        .await
        {
            Ok(verdict) => verdict,
            Err(_) => BackendVerdict::Error {
                message: format!(
                    "{} timed out after {}s",
                    self.backend.name(),
                    limit.as_secs()
                ),
            },
        };

        match verdict {
            BackendVerdict::Identical => {
                discard(&scratch).await;
                info!("No visual difference for {}", identity);
                Ok(DiffOutcome::Identical)
            }
            BackendVerdict::Error { message } => {
                discard(&scratch).await;
                warn!("Comparison failed for {}: {}", identity, message);
                Ok(DiffOutcome::Error { message })
            }
            BackendVerdict::Different { magnitude } => {
                if !tokio::fs::try_exists(&scratch).await? {
                    let message = format!(
                        "{} reported a difference but produced no diff image",
                        self.backend.name()
                    );
                    warn!("Comparison failed for {}: {}", identity, message);
                    return Ok(DiffOutcome::Error { message });
                }

                let relative = self.paths.diff_root(false).join(name);
                let diff = self.paths.base().join(&relative);

                if let Err(e) = self.persist_diff(&scratch, &diff).await {
                    discard(&scratch).await;
                    return Err(e);
                }

                self.registry.record(identity.clone(), relative.clone());
                warn!(
                    "Visual difference for {} (magnitude {:?}), diff saved to {}",
                    identity,
                    magnitude,
                    diff.display()
                );

                Ok(DiffOutcome::Different {
                    magnitude,
                    diff_path: relative,
                })
            }
        }
    }

    /// Drop the record and diff image an earlier comparison of `identity`
    /// left in this run
    async fn forget_diff(&self, identity: &StepIdentity, name: &Path) {
        if self.registry.remove(identity).is_some() {
            debug!("Cleared earlier difference for {}", identity);
        }
        discard(&self.paths.diff_root(true).join(name)).await;
    }

    async fn persist_diff(&self, scratch: &Path, diff: &Path) -> PerceptualResult<()> {
        ensure_parent(diff).await?;
        tokio::fs::rename(scratch, diff).await?;
        Ok(())
    }

    /// Copy the candidate into place as the baseline.
    ///
    /// The copy is staged in scratch and renamed, so a baseline file is
    /// either absent or complete.
    async fn establish_baseline(&self, candidate: &Path, baseline: &Path) -> PerceptualResult<()> {
        ensure_parent(baseline).await?;
        let staging = self.next_scratch_path().await?;

        let result = async {
            tokio::fs::copy(candidate, &staging).await?;
            tokio::fs::File::open(&staging).await?.sync_all().await?;
            tokio::fs::rename(&staging, baseline).await?;
            Ok::<_, PerceptualError>(())
        }
        .await;

        if result.is_err() {
            discard(&staging).await;
        }
        result
    }

    /// Fresh scratch file path. Any stale file under that name is removed.
    async fn next_scratch_path(&self) -> PerceptualResult<PathBuf> {
        let seq = self.scratch_seq.fetch_add(1, Ordering::Relaxed);
        let path = self
            .paths
            .scratch_dir()
            .join(format!("{}.{}", seq, self.namer.extension()));

        ensure_parent(&path).await?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!("Removed stale scratch file {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(path)
    }
}

async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Discarded {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}
