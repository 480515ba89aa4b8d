use crate::error::AppError;
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Boundary to the external extraction/download engine.
///
/// The engine is a black box: it either returns raw format metadata for a
/// URL, or materializes one chosen format as a file under `out_dir`.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Human-readable name of the engine
    fn name(&self) -> &'static str;

    /// Fetch raw metadata (formats, thumbnails, post fields) for the URL.
    async fn extract(&self, url: &str) -> Result<Value, AppError>;

    /// Download the given `format_id` into `out_dir`, named `<basename>.<ext>`.
    /// Returns the path of the produced file.
    async fn download(
        &self,
        url: &str,
        format_id: &str,
        out_dir: &Path,
        basename: &str,
    ) -> Result<PathBuf, AppError>;

    /// Test if this engine is available on the system
    async fn test_availability() -> bool
    where
        Self: Sized;
}
