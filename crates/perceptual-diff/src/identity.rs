//! Step identity and viewport types

use serde::{Deserialize, Serialize};
use std::fmt;

/// One executed step instance within a run.
///
/// Used directly as the key for path resolution and diff lookup. The same
/// identity in a later run resolves to the same baseline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StepIdentity {
    pub feature: String,
    pub scenario: String,
    /// 1-based position within the scenario
    pub index: u32,
    pub text: String,
}

impl StepIdentity {
    pub fn new(
        feature: impl Into<String>,
        scenario: impl Into<String>,
        index: u32,
        text: impl Into<String>,
    ) -> Self {
        Self {
            feature: feature.into(),
            scenario: scenario.into(),
            index,
            text: text.into(),
        }
    }
}

impl fmt::Display for StepIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {} / #{} {}",
            self.feature, self.scenario, self.index, self.text
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
