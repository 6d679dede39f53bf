//! Screenshot capture seam

use async_trait::async_trait;

/// Produces the raw screenshot bytes for the current page.
///
/// Implemented by the browser/session driver of the host test runner.
#[async_trait]
pub trait ScreenshotSource: Send + Sync {
    async fn capture(&self) -> anyhow::Result<Vec<u8>>;
}

#[async_trait]
impl<F> ScreenshotSource for F
where
    F: Fn() -> anyhow::Result<Vec<u8>> + Send + Sync,
{
    async fn capture(&self) -> anyhow::Result<Vec<u8>> {
        self()
    }
}
