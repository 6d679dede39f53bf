//! Hooks wiring the comparator into a step-based test runner

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::capture::ScreenshotSource;
use crate::comparator::{Comparison, DiffOutcome, ScreenshotComparator};
use crate::error::{PerceptualResult, StepFailure};
use crate::identity::StepIdentity;
use crate::summary::RunSummary;

/// Callbacks a host test runner invokes around suites, scenarios and steps
#[async_trait]
pub trait LifecycleHooks: Send {
    async fn on_suite_start(&mut self) -> PerceptualResult<()>;

    fn on_scenario_start(&mut self, feature: &str, scenario: &str);

    /// Called after a step ran, with the step's own result.
    ///
    /// A failed step stays failed. A passing step can still fail here on a
    /// visual difference or a comparison error, depending on configuration.
    async fn on_step<E: Send>(
        &mut self,
        text: &str,
        result: Result<(), E>,
        source: &dyn ScreenshotSource,
    ) -> Result<Comparison, StepFailure<E>>;

    /// Returns the written summary, if the run produced any files
    async fn on_suite_end(&mut self) -> PerceptualResult<Option<RunSummary>>;
}

/// Screenshots every step and compares it against its baseline
pub struct PerceptualStepTester {
    comparator: ScreenshotComparator,
    feature: String,
    scenario: String,
    step: u32,
    suite_started: bool,
}

impl PerceptualStepTester {
    pub fn new(comparator: ScreenshotComparator) -> Self {
        Self {
            comparator,
            feature: String::new(),
            scenario: String::new(),
            step: 0,
            suite_started: false,
        }
    }

    pub fn comparator(&self) -> &ScreenshotComparator {
        &self.comparator
    }

    /// Index the next step of the current scenario will get
    pub fn next_index(&self) -> u32 {
        self.step + 1
    }

    fn failure<E>(&self, comparison: &Comparison) -> Option<StepFailure<E>> {
        let config = self.comparator.config();
        if !config.fail_on_diff {
            return None;
        }

        let message = comparison.message()?;
        match comparison.outcome {
            DiffOutcome::Different { .. } => Some(StepFailure::VisualDiff { message }),
            DiffOutcome::Error { .. } if config.compare.fail_on_error => {
                Some(StepFailure::ComparisonError { message })
            }
            _ => None,
        }
    }
}

#[async_trait]
impl LifecycleHooks for PerceptualStepTester {
    async fn on_suite_start(&mut self) -> PerceptualResult<()> {
        // The comparator claims a run when built; later suites get a new one.
        if self.suite_started {
            self.comparator.start_run().await?;
        }
        self.suite_started = true;
        Ok(())
    }

    fn on_scenario_start(&mut self, feature: &str, scenario: &str) {
        self.feature = feature.to_string();
        self.scenario = scenario.to_string();
        self.step = 0;
        debug!("Scenario {} / {}", feature, scenario);
    }

    async fn on_step<E: Send>(
        &mut self,
        text: &str,
        result: Result<(), E>,
        source: &dyn ScreenshotSource,
    ) -> Result<Comparison, StepFailure<E>> {
        self.step += 1;
        let identity = StepIdentity::new(&self.feature, &self.scenario, self.step, text);

        let compared = self.comparator.take_screenshot_and_compare(&identity, source).await;

        if let Err(step_error) = result {
            if let Err(e) = &compared {
                warn!("Screenshot of failed step {} not compared: {}", identity, e);
            }
            return Err(StepFailure::Step(step_error));
        }

        let comparison = compared.map_err(StepFailure::Comparator)?;
        match self.failure(&comparison) {
            Some(failure) => Err(failure),
            None => Ok(comparison),
        }
    }

    async fn on_suite_end(&mut self) -> PerceptualResult<Option<RunSummary>> {
        let paths = self.comparator.paths();
        paths.sweep_scratch().await?;

        if !tokio::fs::try_exists(paths.candidate_root(true)).await? {
            debug!("Run {} captured nothing, no summary written", paths.run_id());
            return Ok(None);
        }

        let summary = RunSummary::collect(&self.comparator);
        summary.write(&paths.run_root()).await?;
        Ok(Some(summary))
    }
}
