use lru::LruCache;
use sha2::{Digest, Sha256};
use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::task;

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Content-addressed cache for generated images
///
/// A bounded LRU layer in memory sits in front of an optional directory on
/// disk. Disk writes are best effort: failures are logged and ignored.
pub struct ImageCache {
    dir: Option<PathBuf>,
    memory: Mutex<LruCache<String, Vec<u8>>>,
}

impl ImageCache {
    /// Create a cache holding up to `capacity` images in memory (at least 1).
    pub fn new(dir: Option<PathBuf>, capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            dir,
            memory: Mutex::new(LruCache::new(cap)),
        }
    }

    /// Memory-only cache
    pub fn in_memory(capacity: usize) -> Self {
        Self::new(None, capacity)
    }

    /// Cache key: SHA-256 over every input that affects the generated image.
    pub fn key(model_id: &str, prompt: &str, steps: u32, guidance_scale: f32) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("{}\0{}\0{}\0{}", model_id, prompt, steps, guidance_scale));
        format!("{:x}", hasher.finalize())
    }

    fn memory(&self) -> MutexGuard<'_, LruCache<String, Vec<u8>>> {
        self.memory.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn disk_path(dir: &Path, key: &str) -> PathBuf {
        dir.join(format!("{}.img", key))
    }

    /// Look up an image, checking memory first, then disk.
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let hit = self.memory().get(key).cloned();
        if hit.is_some() {
            log::debug!("Image cache hit (memory): {}", key);
            return hit;
        }

        let path = Self::disk_path(self.dir.as_ref()?, key);
        let bytes = match task::spawn_blocking(move || std::fs::read(path)).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(_)) => return None,
            Err(e) => {
                log::warn!("Image cache read task failed for {}: {}", key, e);
                return None;
            }
        };

        log::debug!("Image cache hit (disk): {}", key);
        self.memory().put(key.to_string(), bytes.clone());
        Some(bytes)
    }

    /// Store an image in memory and, if configured, on disk.
    pub async fn put(&self, key: &str, bytes: &[u8]) {
        self.memory().put(key.to_string(), bytes.to_vec());

        let Some(dir) = self.dir.clone() else {
            return;
        };
        let owned_key = key.to_string();
        let data = bytes.to_vec();
        match task::spawn_blocking(move || write_entry(&dir, &owned_key, &data)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::warn!("Failed to write image cache entry {}: {}", key, e),
            Err(e) => log::warn!("Image cache write task failed for {}: {}", key, e),
        }
    }

    /// Number of images held in memory
    pub fn len(&self) -> usize {
        self.memory().len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory().is_empty()
    }

    /// Drop the memory layer. Files on disk are kept.
    pub fn clear_memory(&self) {
        self.memory().clear();
    }
}

/// Write `<key>.img` through a sibling temp file so readers never see a
/// partial entry.
fn write_entry(dir: &Path, key: &str, bytes: &[u8]) -> io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let tmp = dir.join(format!("{}.{}-{}.tmp", key, std::process::id(), seq));

    let result = std::fs::write(&tmp, bytes)
        .and_then(|_| std::fs::rename(&tmp, ImageCache::disk_path(dir, key)));
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    result
}

/// Identify an image format from its leading bytes.
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        "image/png"
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        "image/gif"
    } else if bytes.starts_with(b"<svg") || bytes.starts_with(b"<?xml") {
        "image/svg+xml"
    } else {
        "application/octet-stream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_key_is_stable_and_input_sensitive() {
        let a = ImageCache::key("sd", "a car", 50, 7.5);
        assert_eq!(a, ImageCache::key("sd", "a car", 50, 7.5));
        assert_eq!(a.len(), 64);
        assert_ne!(a, ImageCache::key("sd", "a car", 40, 7.5));
        assert_ne!(a, ImageCache::key("sd", "a car", 50, 8.0));
        assert_ne!(a, ImageCache::key("other", "a car", 50, 7.5));
    }

    #[tokio::test]
    async fn test_memory_put_and_get() {
        let cache = ImageCache::in_memory(4);
        cache.put("k", b"bytes").await;
        assert_eq!(cache.get("k").await.as_deref(), Some(&b"bytes"[..]));
        assert!(cache.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_memory_eviction() {
        let cache = ImageCache::in_memory(2);
        cache.put("a", b"1").await;
        cache.put("b", b"2").await;
        cache.put("c", b"3").await;
        assert!(cache.get("a").await.is_none());
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_zero_capacity_holds_one() {
        let cache = ImageCache::in_memory(0);
        cache.put("a", b"1").await;
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_disk_layer_survives_memory_clear() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ImageCache::new(Some(temp_dir.path().join("images")), 4);
        cache.put("k", b"png-bytes").await;
        cache.clear_memory();
        assert!(cache.is_empty());

        assert_eq!(cache.get("k").await.as_deref(), Some(&b"png-bytes"[..]));
        // promoted back into memory
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_disk_write_replaces_entry_without_temp_leftovers() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().to_path_buf();
        let cache = ImageCache::new(Some(dir.clone()), 4);

        cache.put("k", b"first").await;
        cache.put("k", b"second").await;

        let names: Vec<String> = std::fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["k.img".to_string()]);
        assert_eq!(std::fs::read(dir.join("k.img")).unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_disk_write_failure_is_swallowed() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        let cache = ImageCache::new(Some(blocker), 4);
        cache.put("k", b"bytes").await;
        assert_eq!(cache.get("k").await.as_deref(), Some(&b"bytes"[..]));
    }

    #[test]
    fn test_sniff_mime() {
        assert_eq!(sniff_mime(b"\x89PNG\r\n\x1a\n...."), "image/png");
        assert_eq!(sniff_mime(&[0xFF, 0xD8, 0xFF, 0xE0]), "image/jpeg");
        assert_eq!(sniff_mime(b"RIFF\0\0\0\0WEBPVP8 "), "image/webp");
        assert_eq!(sniff_mime(b"<svg xmlns"), "image/svg+xml");
        assert_eq!(sniff_mime(b"??"), "application/octet-stream");
    }
}
