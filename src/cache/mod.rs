use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;

/// Hex length of a cache key.
const KEY_LEN: usize = 32;

/// Derives the cache identity of a (content, quality) pair.
///
/// Deterministic and source-URL-independent: two different URLs resolving to
/// the same content id and quality share one cache entry.
pub fn build_cache_key(content_id: &str, quality_label: &str) -> String {
    let digest = Sha256::digest(format!("{content_id}:{quality_label}").as_bytes());
    let mut key = hex::encode(digest);
    key.truncate(KEY_LEN);
    key
}

pub fn cached_file_path(cache_root: &Path, key: &str) -> PathBuf {
    cache_root.join(format!("{key}.mp4"))
}

/// Existence check only; a present path is trusted to be a complete file
/// because `promote` is the sole writer of canonical paths.
pub fn lookup(cache_root: &Path, key: &str) -> Option<PathBuf> {
    let path = cached_file_path(cache_root, key);
    path.exists().then_some(path)
}

/// Installs a downloaded file as the canonical entry for `key`.
///
/// The rename is atomic as long as `source` sits on the same filesystem as
/// `cache_root` (staging directories are created inside `cache_root` for
/// exactly that reason), so a concurrent `lookup` sees either nothing or the
/// complete file.
pub fn promote(cache_root: &Path, key: &str, source: &Path) -> io::Result<PathBuf> {
    let dest = cached_file_path(cache_root, key);
    if source == dest.as_path() {
        return Ok(dest);
    }
    if dest.exists() {
        std::fs::remove_file(&dest)?;
    }
    std::fs::rename(source, &dest)?;
    Ok(dest)
}

/// At-most-one in-flight download per cache key.
///
/// Holders keep an `Arc` on their key's mutex; entries nobody holds anymore
/// are pruned on the next acquire.
#[derive(Default)]
pub struct KeyedLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self
                .inner
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            map.retain(|_, l| Arc::strong_count(l) > 1);
            map.entry(key.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}
