//! Comparator configuration
//!
//! Loaded from YAML or TOML (chosen by file extension) or built in code.
//!
//! ```yaml
//! path: screenshots
//! sleep: 1
//! fail_on_diff: true
//! compare:
//!   fuzz: 20
//!   metric: AE
//!   highlight_color: blue
//! viewport:
//!   width: 1280
//!   height: 720
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{PerceptualError, PerceptualResult};
use crate::identity::Viewport;
use crate::naming::DEFAULT_EXTENSION;

/// Comparator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerceptualConfig {
    /// Base storage path. Relative paths are resolved with [`PerceptualConfig::resolve_path`].
    pub path: PathBuf,

    /// Seconds to wait before each capture so the UI can settle
    #[serde(default = "default_sleep")]
    pub sleep: f64,

    /// Fail the step when a difference is detected
    #[serde(default = "default_fail_on_diff")]
    pub fail_on_diff: bool,

    /// Options for the image comparison backend
    #[serde(default)]
    pub compare: CompareOptions,

    /// Viewport used for the capture, if the browser is sized explicitly
    #[serde(default)]
    pub viewport: Option<Viewport>,

    /// Viewport assumed when none is configured
    #[serde(default)]
    pub default_viewport: Option<Viewport>,

    /// Image file extension for stored screenshots
    #[serde(default = "default_extension")]
    pub extension: String,
}

fn default_sleep() -> f64 {
    1.0
}

fn default_fail_on_diff() -> bool {
    true
}

fn default_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}

/// Options passed to the image comparison backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareOptions {
    /// Percentage colour distance tolerated before a pixel counts as different (0-100)
    pub fuzz: f64,

    /// Difference metric name (AE, PAE, MAE, RMSE, ...)
    pub metric: String,

    /// Colour used to mark differing pixels in the diff image
    pub highlight_color: String,

    /// Executable used by the command backend
    pub binary: String,

    /// Upper bound on a single comparison
    pub timeout_secs: u64,

    /// Count backend errors as step failures when `fail_on_diff` is set
    pub fail_on_error: bool,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            fuzz: 20.0,
            metric: "AE".to_string(),
            highlight_color: "blue".to_string(),
            binary: "compare".to_string(),
            timeout_secs: 60,
            fail_on_error: true,
        }
    }
}

impl CompareOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl PerceptualConfig {
    /// Configuration with defaults for everything but the base path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sleep: default_sleep(),
            fail_on_diff: default_fail_on_diff(),
            compare: CompareOptions::default(),
            viewport: None,
            default_viewport: None,
            extension: default_extension(),
        }
    }

    /// Load configuration from a `.yml`/`.yaml` or `.toml` file
    pub fn load(path: &Path) -> PerceptualResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&content)?,
            Some("yml") | Some("yaml") => serde_yaml::from_str(&content)?,
            other => {
                return Err(PerceptualError::Configuration(format!(
                    "unsupported configuration format: {}",
                    other.unwrap_or("<none>")
                )))
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_sleep(mut self, seconds: f64) -> Self {
        self.sleep = seconds;
        self
    }

    pub fn with_fail_on_diff(mut self, fail: bool) -> Self {
        self.fail_on_diff = fail;
        self
    }

    pub fn with_compare(mut self, compare: CompareOptions) -> Self {
        self.compare = compare;
        self
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = Some(viewport);
        self
    }

    pub fn with_default_viewport(mut self, viewport: Viewport) -> Self {
        self.default_viewport = Some(viewport);
        self
    }

    /// Anchor a relative base path at `base_dir`
    pub fn resolve_path(mut self, base_dir: &Path) -> Self {
        if self.path.is_relative() {
            self.path = base_dir.join(&self.path);
        }
        self
    }

    /// Viewport used in file names: the configured one, else the default
    pub fn effective_viewport(&self) -> Option<Viewport> {
        self.viewport.or(self.default_viewport)
    }

    /// Settle delay before each capture
    pub fn delay(&self) -> PerceptualResult<Duration> {
        Duration::try_from_secs_f64(self.sleep).map_err(|_| {
            PerceptualError::Configuration(format!(
                "sleep must be a non-negative number of seconds, got {}",
                self.sleep
            ))
        })
    }

    /// Check ranges and required values
    pub fn validate(&self) -> PerceptualResult<()> {
        let invalid = |msg: String| Err(PerceptualError::Configuration(msg));

        if self.path.as_os_str().is_empty() {
            return invalid("path must not be empty".to_string());
        }
        self.delay()?;
        if !(0.0..=100.0).contains(&self.compare.fuzz) {
            return invalid(format!("fuzz must be between 0 and 100, got {}", self.compare.fuzz));
        }
        if self.compare.metric.trim().is_empty() {
            return invalid("metric must not be empty".to_string());
        }
        if self.compare.highlight_color.trim().is_empty() {
            return invalid("highlight_color must not be empty".to_string());
        }
        if self.compare.binary.trim().is_empty() {
            return invalid("compare binary must not be empty".to_string());
        }
        if self.compare.timeout_secs == 0 {
            return invalid("timeout_secs must be greater than zero".to_string());
        }
        if self.extension.is_empty() || self.extension.contains(['/', '\\', '.']) {
            return invalid(format!("invalid image extension: {:?}", self.extension));
        }
        for viewport in [self.viewport, self.default_viewport].into_iter().flatten() {
            if viewport.width == 0 || viewport.height == 0 {
                return invalid(format!("viewport must be non-empty, got {}", viewport));
            }
        }
        Ok(())
    }
}
