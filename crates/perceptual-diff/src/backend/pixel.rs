//! In-process comparison using the `image` crate
//!
//! Mirrors the command backend's contract: identical files short-circuit on
//! their SHA-256, differently sized images are an error, and a pixel counts
//! as different when its RGBA distance exceeds the fuzz percentage.

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use super::{BackendVerdict, ImageDiffBackend, DIMENSIONS_DIFFER_RAW};
use crate::config::CompareOptions;
use crate::error::{PerceptualError, PerceptualResult};

/// Difference metrics understood by [`PixelDiffBackend`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// Number of differing pixels
    AbsoluteError,
    /// Largest single-channel difference (0-255)
    PeakAbsoluteError,
    /// Mean channel difference over all pixels (0-255)
    MeanAbsoluteError,
    /// Root mean squared channel difference (0-255)
    RootMeanSquaredError,
}

impl FromStr for Metric {
    type Err = PerceptualError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AE" => Ok(Metric::AbsoluteError),
            "PAE" => Ok(Metric::PeakAbsoluteError),
            "MAE" => Ok(Metric::MeanAbsoluteError),
            "RMSE" => Ok(Metric::RootMeanSquaredError),
            other => Err(PerceptualError::Configuration(format!(
                "unsupported metric for the in-process backend: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PixelDiffBackend {
    fuzz: f64,
    metric: Metric,
    highlight: Rgba<u8>,
}

impl PixelDiffBackend {
    pub fn new(options: &CompareOptions) -> PerceptualResult<Self> {
        Ok(Self {
            fuzz: options.fuzz,
            metric: options.metric.parse()?,
            highlight: parse_color(&options.highlight_color)?,
        })
    }
}

#[async_trait]
impl ImageDiffBackend for PixelDiffBackend {
    fn name(&self) -> &str {
        "pixel"
    }

    async fn compare(&self, baseline: &Path, candidate: &Path, scratch: &Path) -> BackendVerdict {
        let this = self.clone();
        let baseline = baseline.to_path_buf();
        let candidate = candidate.to_path_buf();
        let scratch = scratch.to_path_buf();

        // Dropping this future (e.g. on timeout) does not stop the blocking
        // task, so the guard keeps it from writing scratch afterwards.
        let cancellation = Cancellation::default();
        let _guard = CancelOnDrop(cancellation.clone());

        match tokio::task::spawn_blocking(move || {
            this.compare_files(&baseline, &candidate, &scratch, &cancellation)
        })
        .await
        {
            Ok(Ok(verdict)) => verdict,
            Ok(Err(e)) => BackendVerdict::error(e.to_string()),
            Err(e) => BackendVerdict::error(format!("comparison task failed: {}", e)),
        }
    }
}

impl PixelDiffBackend {
    fn compare_files(
        &self,
        baseline: &Path,
        candidate: &Path,
        scratch: &Path,
        cancellation: &Cancellation,
    ) -> PerceptualResult<BackendVerdict> {
        if hash_file(baseline)? == hash_file(candidate)? {
            debug!("Screenshots match exactly (same hash)");
            return Ok(BackendVerdict::Identical);
        }

        let baseline_img = image::open(baseline)?.to_rgba8();
        let candidate_img = image::open(candidate)?.to_rgba8();

        if baseline_img.dimensions() != candidate_img.dimensions() {
            debug!(
                "Dimensions differ: baseline {:?} vs candidate {:?}",
                baseline_img.dimensions(),
                candidate_img.dimensions()
            );
            return Ok(BackendVerdict::error(DIMENSIONS_DIFFER_RAW));
        }

        if cancellation.is_cancelled() {
            return Ok(BackendVerdict::error("comparison cancelled"));
        }

        let diff = self.diff(&baseline_img, &candidate_img);
        if diff.differing == 0 {
            return Ok(BackendVerdict::Identical);
        }

        let written = cancellation.unless_cancelled(|| {
            diff.image.save_with_format(scratch, image::ImageFormat::Png)?;
            Ok(())
        })?;
        if !written {
            debug!("Comparison cancelled, diff image not written");
            return Ok(BackendVerdict::error("comparison cancelled"));
        }

        Ok(BackendVerdict::Different {
            magnitude: Some(diff.magnitude),
        })
    }

    fn diff(&self, baseline: &RgbaImage, candidate: &RgbaImage) -> PixelDiff {
        let (width, height) = candidate.dimensions();
        let mut image = RgbaImage::new(width, height);
        let mut differing = 0u64;
        let mut peak = 0u8;
        let mut abs_sum = 0f64;
        let mut sq_sum = 0f64;

        for (x, y, actual) in candidate.enumerate_pixels() {
            let expected = baseline.get_pixel(x, y);

            let mut distance_sq = 0f64;
            for c in 0..4 {
                let d = actual.0[c].abs_diff(expected.0[c]);
                peak = peak.max(d);
                abs_sum += f64::from(d);
                sq_sum += f64::from(d) * f64::from(d);
                distance_sq += (f64::from(d) / 255.0).powi(2);
            }

            // normalized to 0..=100 over the four channels
            let distance = (distance_sq / 4.0).sqrt() * 100.0;
            if distance > self.fuzz {
                differing += 1;
                image.put_pixel(x, y, self.highlight);
            } else {
                let [r, g, b, _] = actual.0;
                image.put_pixel(x, y, Rgba([r / 2 + 127, g / 2 + 127, b / 2 + 127, 255]));
            }
        }

        let samples = (u64::from(width) * u64::from(height) * 4).max(1) as f64;
        let magnitude = match self.metric {
            Metric::AbsoluteError => differing as f64,
            Metric::PeakAbsoluteError => f64::from(peak),
            Metric::MeanAbsoluteError => abs_sum / samples,
            Metric::RootMeanSquaredError => (sq_sum / samples).sqrt(),
        };

        PixelDiff {
            image,
            differing,
            magnitude,
        }
    }
}

struct PixelDiff {
    image: RgbaImage,
    differing: u64,
    magnitude: f64,
}

/// Cancellation flag shared with the blocking comparison task.
///
/// The scratch image is written while holding the flag's lock, so once
/// `cancel` returns no write is in flight and none will start.
#[derive(Debug, Clone, Default)]
struct Cancellation(Arc<Mutex<bool>>);

impl Cancellation {
    fn cancel(&self) {
        *self.0.lock() = true;
    }

    fn is_cancelled(&self) -> bool {
        *self.0.lock()
    }

    /// Run `write` unless cancelled. Returns whether it ran.
    fn unless_cancelled(&self, write: impl FnOnce() -> PerceptualResult<()>) -> PerceptualResult<bool> {
        let cancelled = self.0.lock();
        if *cancelled {
            return Ok(false);
        }
        write()?;
        Ok(true)
    }
}

struct CancelOnDrop(Cancellation);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

fn hash_file(path: &Path) -> PerceptualResult<String> {
    let data = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

/// Parse a colour name or `#rgb` / `#rrggbb` hex value
pub fn parse_color(value: &str) -> PerceptualResult<Rgba<u8>> {
    let value = value.trim().to_ascii_lowercase();
    let rgb = match value.as_str() {
        "red" => [255, 0, 0],
        "green" => [0, 128, 0],
        "lime" => [0, 255, 0],
        "blue" => [0, 0, 255],
        "yellow" => [255, 255, 0],
        "magenta" | "fuchsia" => [255, 0, 255],
        "cyan" | "aqua" => [0, 255, 255],
        "orange" => [255, 165, 0],
        "black" => [0, 0, 0],
        "white" => [255, 255, 255],
        hex if hex.starts_with('#') => parse_hex(&hex[1..]).ok_or_else(|| unknown_color(&value))?,
        _ => return Err(unknown_color(&value)),
    };
    Ok(Rgba([rgb[0], rgb[1], rgb[2], 255]))
}

fn parse_hex(digits: &str) -> Option<[u8; 3]> {
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match digits.len() {
        3 => {
            let mut out = [0u8; 3];
            for (i, c) in digits.chars().enumerate() {
                let v = channel(&c.to_string())?;
                out[i] = v * 17;
            }
            Some(out)
        }
        6 => Some([
            channel(digits.get(0..2)?)?,
            channel(digits.get(2..4)?)?,
            channel(digits.get(4..6)?)?,
        ]),
        _ => None,
    }
}

fn unknown_color(value: &str) -> PerceptualError {
    PerceptualError::Configuration(format!("unknown highlight color: {}", value))
}
