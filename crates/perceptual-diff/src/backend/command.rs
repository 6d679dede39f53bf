//! ImageMagick `compare` as a subprocess
//!
//! Exit status 0 means no difference, 1 means the images differ (the metric
//! value is printed on stderr), anything else is an error. Output text is
//! never used to decide between those outcomes.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::ffi::OsString;
use std::path::Path;
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::debug;

use super::{BackendVerdict, ImageDiffBackend};
use crate::config::CompareOptions;

static MAGNITUDE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?)").expect("valid magnitude regex")
});

/// Runs `compare -fuzz N% -metric M -highlight-color C baseline candidate scratch`
#[derive(Debug, Clone)]
pub struct CommandBackend {
    binary: String,
    fuzz: f64,
    metric: String,
    highlight_color: String,
}

impl CommandBackend {
    pub fn new(options: &CompareOptions) -> Self {
        Self {
            binary: options.binary.clone(),
            fuzz: options.fuzz,
            metric: options.metric.clone(),
            highlight_color: options.highlight_color.clone(),
        }
    }

    /// Arguments passed to the binary. No shell is involved, so paths are
    /// handed over verbatim.
    pub fn args(&self, baseline: &Path, candidate: &Path, scratch: &Path) -> Vec<OsString> {
        vec![
            "-fuzz".into(),
            format!("{}%", self.fuzz).into(),
            "-metric".into(),
            self.metric.clone().into(),
            "-highlight-color".into(),
            self.highlight_color.clone().into(),
            baseline.into(),
            candidate.into(),
            scratch.into(),
        ]
    }

    fn classify(&self, output: &Output) -> BackendVerdict {
        let primary = primary_line(output);

        match output.status.code() {
            Some(0) => BackendVerdict::Identical,
            Some(1) => BackendVerdict::Different {
                magnitude: parse_magnitude(&primary),
            },
            Some(code) if primary.is_empty() => {
                BackendVerdict::error(format!("{} exited with status {}", self.binary, code))
            }
            Some(_) => BackendVerdict::error(primary),
            None => BackendVerdict::error(format!("{} was terminated by a signal", self.binary)),
        }
    }
}

#[async_trait]
impl ImageDiffBackend for CommandBackend {
    fn name(&self) -> &str {
        &self.binary
    }

    async fn compare(&self, baseline: &Path, candidate: &Path, scratch: &Path) -> BackendVerdict {
        debug!(
            "Running {} on {} and {}",
            self.binary,
            baseline.display(),
            candidate.display()
        );

        let output = Command::new(&self.binary)
            .args(self.args(baseline, candidate, scratch))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;

        match output {
            Ok(output) => self.classify(&output),
            Err(e) => BackendVerdict::error(format!("failed to run {}: {}", self.binary, e)),
        }
    }
}

/// First non-empty line of stderr, falling back to stdout
fn primary_line(output: &Output) -> String {
    [&output.stderr, &output.stdout]
        .into_iter()
        .flat_map(|stream| {
            String::from_utf8_lossy(stream)
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .next()
        .unwrap_or_default()
}

/// Leading number of the metric output, e.g. `1234` or `1.2e+03 (0.018)`
pub fn parse_magnitude(text: &str) -> Option<f64> {
    MAGNITUDE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
