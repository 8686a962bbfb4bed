use crate::config::ImageFormat;
use crate::OptimgError;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;

/// The parameters that fully determine a transcoded image's bytes.
/// No hidden inputs: no timestamps, no origin ETags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheKeyParams<'a> {
    pub url: &'a str,
    pub max_width: u32,
    pub quality: u8,
    pub format: ImageFormat,
}

/// Derive the cache key for a parameter set: SHA-256 over a length-prefixed
/// field encoding, as 64 lowercase hex characters.
///
/// Each field is hashed as an 8-byte big-endian length followed by its bytes,
/// in fixed order. No text delimiter exists for a URL to smuggle, so the
/// params-to-preimage mapping is injective.
pub fn derive_key(params: &CacheKeyParams<'_>) -> String {
    let width = params.max_width.to_be_bytes();
    let quality = [params.quality];
    let fields: [&[u8]; 4] = [
        params.url.as_bytes(),
        &width,
        &quality,
        params.format.extension().as_bytes(),
    ];

    let mut hasher = Sha256::new();
    for field in fields {
        hasher.update((field.len() as u64).to_be_bytes());
        hasher.update(field);
    }
    hex::encode(hasher.finalize())
}

/// Trait for cache backends
#[async_trait::async_trait]
pub trait Cache: Send + Sync {
    /// Get cached bytes for a key, or None on a miss.
    async fn lookup(&self, key: &str, format: ImageFormat) -> Result<Option<Vec<u8>>, OptimgError>;

    /// Store encoded bytes under a key.
    async fn insert(&self, key: &str, format: ImageFormat, bytes: &[u8]) -> Result<(), OptimgError>;
}

/// Disk-backed cache: a flat directory of `{key}.{ext}` files. Existence of
/// the file is the only metadata. No eviction, no TTL; growth is unbounded.
pub struct DiskCache {
    dir: PathBuf,
}

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

impl DiskCache {
    /// Open the cache, creating its directory if needed. The store accepts
    /// no operation before this one-time idempotent init has succeeded.
    pub fn open(dir: PathBuf) -> Result<Self, OptimgError> {
        std::fs::create_dir_all(&dir).map_err(|e| OptimgError::Store(e.to_string()))?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str, format: ImageFormat) -> PathBuf {
        self.dir.join(format!("{}.{}", key, format.extension()))
    }

    /// Unique per writer, so two in-flight inserts of the same key never
    /// interleave bytes in one file.
    fn tmp_path_for(&self, key: &str) -> PathBuf {
        let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
        self.dir
            .join(format!(".{}.{}-{}.tmp", key, std::process::id(), seq))
    }
}

#[async_trait::async_trait]
impl Cache for DiskCache {
    async fn lookup(&self, key: &str, format: ImageFormat) -> Result<Option<Vec<u8>>, OptimgError> {
        let p = self.path_for(key, format);
        match fs::read(&p).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(OptimgError::Store(e.to_string())),
        }
    }

    async fn insert(&self, key: &str, format: ImageFormat, bytes: &[u8]) -> Result<(), OptimgError> {
        let path = self.path_for(key, format);
        let tmp = self.tmp_path_for(key);

        // Write-then-rename keeps readers from ever seeing a partial entry;
        // concurrent same-key writers are last-writer-wins over identical
        // content.
        fs::write(&tmp, bytes)
            .await
            .map_err(|e| OptimgError::Store(e.to_string()))?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(OptimgError::Store(e.to_string()));
        }
        Ok(())
    }
}
