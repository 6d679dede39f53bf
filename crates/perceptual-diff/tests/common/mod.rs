//! Shared fixtures for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use image::{ImageOutputFormat, Rgba, RgbaImage};
use parking_lot::Mutex;
use std::io::Cursor;
use std::path::Path;
use tracing_subscriber::EnvFilter;

use perceptual_diff::{PerceptualConfig, ScreenshotSource};

pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

/// Config for tests: no settle delay
pub fn config(base: &Path) -> PerceptualConfig {
    PerceptualConfig::new(base).with_sleep(0.0)
}

/// PNG bytes of a `width` x `height` white image with `marked` pixels black
pub fn png(width: u32, height: u32, marked: &[(u32, u32)]) -> Vec<u8> {
    let mut img = RgbaImage::from_pixel(width, height, WHITE);
    for &(x, y) in marked {
        img.put_pixel(x, y, BLACK);
    }

    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut out, ImageOutputFormat::Png)
        .unwrap();
    out.into_inner()
}

/// Screen whose content the test swaps between captures
#[derive(Default)]
pub struct FakeScreen {
    content: Mutex<Vec<u8>>,
}

impl FakeScreen {
    pub fn showing(bytes: Vec<u8>) -> Self {
        Self {
            content: Mutex::new(bytes),
        }
    }

    pub fn show(&self, bytes: Vec<u8>) {
        *self.content.lock() = bytes;
    }
}

#[async_trait]
impl ScreenshotSource for FakeScreen {
    async fn capture(&self) -> anyhow::Result<Vec<u8>> {
        Ok(self.content.lock().clone())
    }
}

/// Source whose capture always fails
pub struct BrokenScreen;

#[async_trait]
impl ScreenshotSource for BrokenScreen {
    async fn capture(&self) -> anyhow::Result<Vec<u8>> {
        Err(anyhow::anyhow!("browser session is gone"))
    }
}

/// Number of regular files below `dir`, zero if it doesn't exist
pub fn file_count(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .map(|entry| {
            let path = entry.path();
            if path.is_dir() {
                file_count(&path)
            } else {
                1
            }
        })
        .sum()
}
