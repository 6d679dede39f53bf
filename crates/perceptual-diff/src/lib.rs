//! Perceptual screenshot comparison for step-based UI tests
//!
//! After every step the current screen is captured and compared against a
//! baseline image stored from an earlier run:
//! - The first capture of a step becomes its baseline
//! - Later captures are compared with a pluggable image diff backend
//! - Differences are persisted as annotated diff images and recorded per step
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 PerceptualStepTester (hooks)                │
//! │    ├── on_scenario_start(feature, scenario)                 │
//! │    ├── on_step(text, result, source) -> Comparison          │
//! │    └── on_suite_end() -> RunSummary (diffs.json)            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ScreenshotComparator                                       │
//! │    ├── PathNamer       StepIdentity -> relative file path   │
//! │    ├── RunPaths        baseline / <run>/result / <run>/diff │
//! │    ├── ImageDiffBackend                                     │
//! │    │     ├── CommandBackend   (ImageMagick `compare`)       │
//! │    │     └── PixelDiffBackend (in-process, `image` crate)   │
//! │    └── DiffRegistry    StepIdentity -> diff path            │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod backend;
pub mod capture;
pub mod comparator;
pub mod config;
pub mod error;
pub mod identity;
pub mod naming;
pub mod paths;
pub mod registry;
pub mod summary;
pub mod tester;

pub use backend::{BackendVerdict, CommandBackend, ImageDiffBackend, PixelDiffBackend};
pub use capture::ScreenshotSource;
pub use comparator::{Comparison, DiffOutcome, ScreenshotComparator};
pub use config::{CompareOptions, PerceptualConfig};
pub use error::{PerceptualError, PerceptualResult, StepFailure};
pub use identity::{StepIdentity, Viewport};
pub use naming::PathNamer;
pub use paths::RunPaths;
pub use registry::DiffRegistry;
pub use summary::RunSummary;
pub use tester::{LifecycleHooks, PerceptualStepTester};
