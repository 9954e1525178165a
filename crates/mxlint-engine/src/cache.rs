//! Content-addressed result cache.
//!
//! One JSON file per `(rule bytes, document bytes)` pair, named
//! `<rule_hash>-<input_hash>.json`. Loads never fail: any unreadable,
//! undecodable or mismatched entry is a miss and the pair is re-evaluated.

use std::path::{Path, PathBuf};

use mxlint_types::{LintError, Result, Testcase};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Bumped whenever the on-disk entry layout changes.
pub const CACHE_VERSION: &str = "v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheKey {
    pub rule_hash: String,
    pub input_hash: String,
}

impl CacheKey {
    pub fn from_bytes(rule: &[u8], input: &[u8]) -> Self {
        Self {
            rule_hash: sha256_hex(rule),
            input_hash: sha256_hex(input),
        }
    }

    /// Hash the current bytes of both files.
    pub fn from_files(rule_path: &Path, input_path: &Path) -> Result<Self> {
        let rule = read(rule_path)?;
        let input = read(input_path)?;
        Ok(Self::from_bytes(&rule, &input))
    }

    fn file_name(&self) -> String {
        format!("{}-{}.json", self.rule_hash, self.input_hash)
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn read(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| LintError::ReadFile {
        path: path.to_path_buf(),
        source,
    })
}

/// On-disk cache entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedTestcase {
    pub version: String,
    pub cache_key: CacheKey,
    pub testcase: Testcase,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub total_bytes: u64,
}

/// Per-user cache directory for mxlint results.
///
/// Falls back to `.mxlint-cache` in the current directory when no home
/// directory can be resolved.
pub fn default_cache_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.cache_dir().join("mxlint"))
        .unwrap_or_else(|| PathBuf::from(".mxlint-cache"))
}

/// Result cache rooted at one directory.
///
/// `load` and `save` are synchronous because they run inside blocking rule
/// tasks; `clear` and `stats` are maintenance entry points and run on the
/// async runtime.
#[derive(Debug, Clone)]
pub struct ResultCache {
    dir: PathBuf,
}

impl ResultCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// The cached testcase for `key`, or `None` on any kind of miss.
    pub fn load(&self, key: &CacheKey) -> Option<Testcase> {
        let path = self.entry_path(key);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(_) => {
                tracing::debug!(path = %path.display(), "Cache miss");
                return None;
            }
        };
        let cached: CachedTestcase = match serde_json::from_slice(&bytes) {
            Ok(cached) => cached,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Undecodable cache entry");
                return None;
            }
        };
        if cached.version != CACHE_VERSION {
            tracing::debug!(
                expected = CACHE_VERSION,
                found = %cached.version,
                "Cache version mismatch"
            );
            return None;
        }
        if cached.cache_key != *key {
            tracing::debug!(path = %path.display(), "Cache key mismatch");
            return None;
        }
        tracing::debug!(path = %path.display(), "Cache hit");
        Some(cached.testcase)
    }

    /// Persist a testcase, creating the cache directory on first use.
    pub fn save(&self, key: &CacheKey, testcase: &Testcase) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let entry = CachedTestcase {
            version: CACHE_VERSION.to_string(),
            cache_key: key.clone(),
            testcase: testcase.clone(),
        };
        let path = self.entry_path(key);
        std::fs::write(&path, serde_json::to_string_pretty(&entry)?)?;
        tracing::debug!(path = %path.display(), "Cached result");
        Ok(())
    }

    /// Remove the whole cache directory.
    pub async fn clear(&self) -> Result<()> {
        if !tokio::fs::try_exists(&self.dir).await? {
            tracing::info!(dir = %self.dir.display(), "Cache directory does not exist");
            return Ok(());
        }
        tokio::fs::remove_dir_all(&self.dir).await?;
        tracing::info!(dir = %self.dir.display(), "Cache cleared");
        Ok(())
    }

    /// Count `.json` entries and their total size.
    pub async fn stats(&self) -> Result<CacheStats> {
        let mut stats = CacheStats::default();
        if !tokio::fs::try_exists(&self.dir).await? {
            return Ok(stats);
        }
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let meta = entry.metadata().await?;
            if meta.is_file() {
                stats.entries += 1;
                stats.total_bytes += meta.len();
            }
        }
        Ok(stats)
    }
}
