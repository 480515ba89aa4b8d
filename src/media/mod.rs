mod engine;
mod normalize;
mod types;
mod variants;
mod ytdlp;

pub use engine::MediaEngine;
pub use normalize::normalize_post_url;
pub use types::{ExtractResult, MediaType, VideoVariant};
pub use ytdlp::YtDlpEngine;

use crate::cache::{self, KeyedLocks};
use crate::error::AppError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Coordinates the extraction engine, the variant resolver and the media
/// cache: resolve a post's quality options, then obtain a chosen quality as
/// a servable file exactly once.
pub struct MediaService {
    engine: Box<dyn MediaEngine>,
    cache_root: PathBuf,
    locks: KeyedLocks,
}

impl MediaService {
    pub fn new(
        engine: Box<dyn MediaEngine>,
        cache_root: impl Into<PathBuf>,
    ) -> Result<Self, AppError> {
        let cache_root = cache_root.into();
        std::fs::create_dir_all(&cache_root)?;
        info!(
            "Media service initialized - engine {}, cache at {}",
            engine.name(),
            cache_root.display()
        );
        Ok(Self {
            engine,
            cache_root,
            locks: KeyedLocks::new(),
        })
    }

    #[allow(dead_code)]
    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    pub async fn test_setup(&self) -> Result<(), AppError> {
        info!("Testing media engine setup...");
        if YtDlpEngine::test_availability().await {
            Ok(())
        } else {
            Err(AppError::Extraction(
                "yt-dlp is not available, please install it".to_string(),
            ))
        }
    }

    /// Normalizes the URL and resolves the post's quality options.
    pub async fn resolve(&self, raw_url: &str) -> Result<ExtractResult, AppError> {
        let url = normalize_post_url(raw_url);
        debug!("Resolving variants for {}", url);
        let info = self.engine.extract(&url).await?;
        variants::resolve_extraction(&info)
    }

    /// Returns the canonical cached file for (content, quality), downloading
    /// it first on a miss. Concurrent misses for one key wait on a single
    /// in-flight download instead of each fetching the bytes.
    pub async fn obtain(
        &self,
        raw_url: &str,
        content_id: &str,
        quality_label: &str,
        format_id: &str,
    ) -> Result<PathBuf, AppError> {
        let key = cache::build_cache_key(content_id, quality_label);

        if let Some(path) = cache::lookup(&self.cache_root, &key) {
            debug!("Cache hit for {}", key);
            return Ok(path);
        }

        let _guard = self.locks.acquire(&key).await;
        // A racing request may have populated the entry while we waited.
        if let Some(path) = cache::lookup(&self.cache_root, &key) {
            debug!("Cache populated while waiting for {}", key);
            return Ok(path);
        }

        let url = normalize_post_url(raw_url);
        // Staging lives under cache_root so promote's rename is atomic; a
        // failed download is dropped with the staging dir and never reaches
        // the canonical path.
        let staging = tempfile::Builder::new()
            .prefix("staging-")
            .tempdir_in(&self.cache_root)?;
        let produced = self
            .engine
            .download(&url, format_id, staging.path(), &key)
            .await?;
        let path = cache::promote(&self.cache_root, &key, &produced)?;

        info!("Cached {} {} at {}", content_id, quality_label, path.display());
        Ok(path)
    }
}
