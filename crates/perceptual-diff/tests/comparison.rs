//! Baseline bootstrap and comparison through the in-process backend

mod common;

use std::path::{Path, PathBuf};

use perceptual_diff::backend::DIMENSIONS_DIFFER_MESSAGE;
use perceptual_diff::{
    DiffOutcome, PerceptualConfig, PixelDiffBackend, ScreenshotComparator, StepIdentity, Viewport,
};
use tempfile::TempDir;

use common::{config, file_count, init_tracing, png, FakeScreen};

fn comparator(config: PerceptualConfig) -> ScreenshotComparator {
    let backend = PixelDiffBackend::new(&config.compare).unwrap();
    ScreenshotComparator::new(config, Box::new(backend)).unwrap()
}

fn dashboard() -> StepIdentity {
    StepIdentity::new("Login", "Valid credentials", 1, "I see the dashboard")
}

#[tokio::test]
async fn first_capture_becomes_the_baseline() {
    init_tracing();
    let tmp = TempDir::new().unwrap();
    let comparator = comparator(config(tmp.path()));
    let shot = png(8, 8, &[]);
    let screen = FakeScreen::showing(shot.clone());

    let result = comparator
        .take_screenshot_and_compare(&dashboard(), &screen)
        .await
        .unwrap();

    assert_eq!(result.outcome, DiffOutcome::Established);
    let baseline = tmp
        .path()
        .join("baseline/Login/Valid-credentials/1-I-see-the-dashboard.png");
    assert_eq!(std::fs::read(&baseline).unwrap(), shot);
    assert_eq!(std::fs::read(comparator.candidate_path(&dashboard(), true)).unwrap(), shot);
    assert!(comparator.diff_for(&dashboard()).is_none());
}

#[tokio::test]
async fn identical_capture_leaves_no_diff_or_scratch() {
    init_tracing();
    let tmp = TempDir::new().unwrap();
    let comparator = comparator(config(tmp.path()));
    let screen = FakeScreen::showing(png(8, 8, &[(1, 1)]));

    comparator.take_screenshot_and_compare(&dashboard(), &screen).await.unwrap();
    let result = comparator
        .take_screenshot_and_compare(&dashboard(), &screen)
        .await
        .unwrap();

    assert_eq!(result.outcome, DiffOutcome::Identical);
    assert_eq!(file_count(&comparator.paths().diff_root(true)), 0);
    assert_eq!(file_count(&comparator.paths().scratch_dir()), 0);
    assert_eq!(comparator.diff_count(), 0);
}

#[tokio::test]
async fn changed_pixels_produce_a_recorded_diff() {
    init_tracing();
    let tmp = TempDir::new().unwrap();
    let comparator = comparator(config(tmp.path()));
    let screen = FakeScreen::showing(png(8, 8, &[]));

    comparator.take_screenshot_and_compare(&dashboard(), &screen).await.unwrap();
    screen.show(png(8, 8, &[(2, 3), (5, 5)]));
    let result = comparator
        .take_screenshot_and_compare(&dashboard(), &screen)
        .await
        .unwrap();

    let run = comparator.paths().run_id().to_string();
    let expected = PathBuf::from(&run).join("diff/Login/Valid-credentials/1-I-see-the-dashboard.png");
    assert_eq!(
        result.outcome,
        DiffOutcome::Different {
            magnitude: Some(2.0),
            diff_path: expected.clone(),
        }
    );
    assert_eq!(result.message().unwrap(), "There was a UI difference of 2");
    assert_eq!(comparator.diff_for(&dashboard()), Some(expected.clone()));

    let diff = image::open(tmp.path().join(&expected)).unwrap();
    assert_eq!((diff.width(), diff.height()), (8, 8));
    assert_eq!(file_count(&comparator.paths().scratch_dir()), 0);
}

#[tokio::test]
async fn resized_capture_reports_normalized_error() {
    init_tracing();
    let tmp = TempDir::new().unwrap();
    let comparator = comparator(config(tmp.path()));
    let screen = FakeScreen::showing(png(8, 8, &[]));

    comparator.take_screenshot_and_compare(&dashboard(), &screen).await.unwrap();
    screen.show(png(10, 8, &[]));
    let result = comparator
        .take_screenshot_and_compare(&dashboard(), &screen)
        .await
        .unwrap();

    assert_eq!(
        result.outcome,
        DiffOutcome::Error {
            message: DIMENSIONS_DIFFER_MESSAGE.to_string()
        }
    );
    assert!(!comparator.diff_path(&dashboard(), true).exists());
    assert!(comparator.diff_for(&dashboard()).is_none());
    assert_eq!(file_count(&comparator.paths().scratch_dir()), 0);
}

#[tokio::test]
async fn baseline_is_shared_across_runs() {
    init_tracing();
    let tmp = TempDir::new().unwrap();
    let screen = FakeScreen::showing(png(8, 8, &[]));

    let first = comparator(config(tmp.path()));
    first.take_screenshot_and_compare(&dashboard(), &screen).await.unwrap();

    let second = comparator(config(tmp.path()));
    assert_ne!(first.paths().run_id(), second.paths().run_id());

    screen.show(png(8, 8, &[(0, 0)]));
    let result = second
        .take_screenshot_and_compare(&dashboard(), &screen)
        .await
        .unwrap();

    assert!(result.is_different());
    assert!(second.diff_path(&dashboard(), true).exists());
    assert!(!first.diff_path(&dashboard(), true).exists());
    // the baseline is never overwritten by a comparison
    assert_eq!(
        std::fs::read(first.baseline_path(&dashboard(), true)).unwrap(),
        png(8, 8, &[])
    );
}

#[tokio::test]
async fn viewport_becomes_the_last_path_component() {
    init_tracing();
    let tmp = TempDir::new().unwrap();
    let comparator = comparator(config(tmp.path()).with_viewport(Viewport::new(1280, 720)));
    let screen = FakeScreen::showing(png(4, 4, &[]));

    comparator.take_screenshot_and_compare(&dashboard(), &screen).await.unwrap();

    assert_eq!(
        comparator.baseline_path(&dashboard(), false),
        Path::new("baseline/Login/Valid-credentials/1-I-see-the-dashboard/1280x720.png")
    );
    assert!(comparator.baseline_path(&dashboard(), true).exists());
}

#[tokio::test]
async fn fuzz_tolerates_small_colour_shifts() {
    init_tracing();
    let tmp = TempDir::new().unwrap();
    let comparator = comparator(config(tmp.path()));

    let mut shifted = image::RgbaImage::from_pixel(8, 8, common::WHITE);
    shifted.put_pixel(3, 3, image::Rgba([250, 250, 250, 255]));
    let mut bytes = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(shifted)
        .write_to(&mut bytes, image::ImageOutputFormat::Png)
        .unwrap();

    let screen = FakeScreen::showing(png(8, 8, &[]));
    comparator.take_screenshot_and_compare(&dashboard(), &screen).await.unwrap();
    screen.show(bytes.into_inner());
    let result = comparator
        .take_screenshot_and_compare(&dashboard(), &screen)
        .await
        .unwrap();

    assert_eq!(result.outcome, DiffOutcome::Identical);
}

#[tokio::test]
async fn repeated_step_that_matches_again_drops_its_earlier_diff() {
    init_tracing();
    let tmp = TempDir::new().unwrap();
    let comparator = comparator(config(tmp.path()));
    let step = StepIdentity::new("Cart", "Checkout", 1, "I pay");
    let screen = FakeScreen::showing(png(8, 8, &[]));

    comparator.take_screenshot_and_compare(&step, &screen).await.unwrap();

    screen.show(png(8, 8, &[(4, 4)]));
    let changed = comparator.take_screenshot_and_compare(&step, &screen).await.unwrap();
    assert!(changed.is_different());
    assert!(comparator.diff_for(&step).is_some());
    assert!(comparator.diff_path(&step, true).exists());

    screen.show(png(8, 8, &[]));
    let again = comparator.take_screenshot_and_compare(&step, &screen).await.unwrap();

    assert_eq!(again.outcome, DiffOutcome::Identical);
    assert!(comparator.diff_for(&step).is_none());
    assert!(!comparator.diff_path(&step, true).exists());
    assert_eq!(comparator.diff_count(), 0);
}

#[tokio::test]
async fn repeated_step_that_errors_drops_its_earlier_diff() {
    init_tracing();
    let tmp = TempDir::new().unwrap();
    let comparator = comparator(config(tmp.path()));
    let step = StepIdentity::new("Cart", "Checkout", 1, "I pay");
    let screen = FakeScreen::showing(png(8, 8, &[]));

    comparator.take_screenshot_and_compare(&step, &screen).await.unwrap();
    screen.show(png(8, 8, &[(0, 7)]));
    comparator.take_screenshot_and_compare(&step, &screen).await.unwrap();
    assert_eq!(comparator.diff_count(), 1);

    screen.show(png(9, 8, &[]));
    let resized = comparator.take_screenshot_and_compare(&step, &screen).await.unwrap();

    assert!(resized.is_error());
    assert!(comparator.diff_for(&step).is_none());
    assert_eq!(file_count(&comparator.paths().diff_root(true)), 0);
}
