//! Error types for screenshot comparison

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PerceptualError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Screenshot capture failed: {0}")]
    Capture(String),

    #[error("Cannot create directory {}: {source}", path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type PerceptualResult<T> = Result<T, PerceptualError>;

/// Why a step ended up failed once screenshot comparison has run.
///
/// The step's own failure always wins: `Step` is returned whenever the step
/// itself failed, whatever the comparison produced.
#[derive(Error, Debug)]
pub enum StepFailure<E> {
    #[error("{0}")]
    Step(E),

    #[error("{message}")]
    VisualDiff { message: String },

    #[error("Screenshot comparison failed: {message}")]
    ComparisonError { message: String },

    #[error(transparent)]
    Comparator(PerceptualError),
}

impl<E> StepFailure<E> {
    /// True if the failure originates from the step rather than the comparison
    pub fn is_step_failure(&self) -> bool {
        matches!(self, StepFailure::Step(_))
    }
}
