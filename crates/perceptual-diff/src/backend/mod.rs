//! Pixel-difference backends
//!
//! A backend compares a baseline image with a candidate and, when they
//! differ, writes an annotated diff image to the scratch path it is handed.
//! What happens to that scratch file afterwards is up to the comparator.

pub mod command;
pub mod pixel;

use async_trait::async_trait;
use std::path::Path;

pub use command::CommandBackend;
pub use pixel::{Metric, PixelDiffBackend};

/// Raw text ImageMagick emits when the two images have different sizes
pub const DIMENSIONS_DIFFER_RAW: &str = "image widths or heights differ";

/// Message reported in place of the raw dimension mismatch text
pub const DIMENSIONS_DIFFER_MESSAGE: &str =
    "Image widths or heights differ. No image showing the difference can be generated.";

/// Classification of a single comparison, as reported by a backend
#[derive(Debug, Clone, PartialEq)]
pub enum BackendVerdict {
    /// No difference beyond the fuzz tolerance
    Identical,
    /// Pixel difference detected. `magnitude` is the metric value, when the
    /// backend reported one.
    Different { magnitude: Option<f64> },
    /// The comparison could not be carried out
    Error { message: String },
}

impl BackendVerdict {
    /// Build an error verdict, normalizing known backend messages
    pub fn error(raw: impl AsRef<str>) -> Self {
        BackendVerdict::Error {
            message: normalize_error(raw.as_ref()),
        }
    }
}

#[async_trait]
pub trait ImageDiffBackend: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Compare `baseline` against `candidate`, writing any annotated diff to `scratch`
    async fn compare(&self, baseline: &Path, candidate: &Path, scratch: &Path) -> BackendVerdict;
}

/// Replace backend output that is known to be unhelpful with a clearer message
pub fn normalize_error(raw: &str) -> String {
    let raw = raw.trim();
    if raw.contains(DIMENSIONS_DIFFER_RAW) {
        DIMENSIONS_DIFFER_MESSAGE.to_string()
    } else if raw.is_empty() {
        "image comparison failed without output".to_string()
    } else {
        raw.to_string()
    }
}
