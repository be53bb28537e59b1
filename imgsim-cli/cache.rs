//! On-disk feature cache: one JSON record per derived key.
//!
//! Records are never expired. Clear the cache directory (or call
//! [`DiskCache::clear`]) when source images change, unless the extractor's
//! modification-time check is enabled.

use std::fmt::Debug;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use imgsim_core::FeatureSet;
use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CACHE_RECORD_VERSION: u32 = 1;

const RECORD_EXTENSION: &str = "json";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to create cache directory {path}: {source}")]
    CreateDir { path: String, source: std::io::Error },
    #[error("failed to read cache record {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("failed to write cache record {path}: {source}")]
    Write { path: String, source: std::io::Error },
    #[error("failed to parse cache record {path}: {source}")]
    Parse { path: String, source: serde_json::Error },
    #[error("failed to serialize cache record {path}: {source}")]
    Serialize { path: String, source: serde_json::Error },
    #[error("unsupported cache record version {found} in {path}")]
    Version { path: String, found: u32 },
    #[error("invalid cache key {0:?}")]
    InvalidKey(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Versioned envelope around a cached feature set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub version: u32,
    /// Source modification time (seconds since the epoch) at extraction time
    pub source_modified: Option<u64>,
    pub features: FeatureSet,
}

/// Maps an image identifier to the key its record is stored under
pub trait CacheKeyStrategy: Debug {
    fn cache_key(&self, source: &Path) -> Option<String>;
}

/// File name without directory or extension.
///
/// Images sharing a stem in different directories share one record; the
/// second one reads the first one's features.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileStemKey;

impl CacheKeyStrategy for FileStemKey {
    fn cache_key(&self, source: &Path) -> Option<String> {
        source
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .filter(|stem| !stem.is_empty())
    }
}

/// File stem plus an FNV-1a hash of the absolute path, so equal stems in
/// different directories get separate records
#[derive(Debug, Clone, Copy, Default)]
pub struct PathHashKey;

impl PathHashKey {
    fn fnv1a(bytes: &[u8]) -> u64 {
        const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        const PRIME: u64 = 0x0000_0100_0000_01b3;
        bytes
            .iter()
            .fold(OFFSET, |hash, &b| (hash ^ b as u64).wrapping_mul(PRIME))
    }
}

impl CacheKeyStrategy for PathHashKey {
    fn cache_key(&self, source: &Path) -> Option<String> {
        let stem = FileStemKey.cache_key(source)?;
        let full = fs::canonicalize(source)
            .or_else(|_| std::path::absolute(source))
            .unwrap_or_else(|_| source.to_path_buf());
        let hash = Self::fnv1a(full.to_string_lossy().as_bytes());
        Some(format!("{stem}-{hash:016x}"))
    }
}

/// Selectable key strategies for configuration and the command line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum KeyStrategy {
    #[default]
    FileStem,
    PathHash,
}

impl KeyStrategy {
    pub fn build(self) -> Box<dyn CacheKeyStrategy> {
        match self {
            KeyStrategy::FileStem => Box::new(FileStemKey),
            KeyStrategy::PathHash => Box::new(PathHashKey),
        }
    }
}

/// Directory of feature records addressed by derived keys
#[derive(Debug)]
pub struct DiskCache {
    root: PathBuf,
    key_strategy: Box<dyn CacheKeyStrategy>,
}

impl DiskCache {
    /// Cache rooted at `root` using file-stem keys. Nothing is created until the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            key_strategy: Box::new(FileStemKey),
        }
    }

    pub fn with_key_strategy(mut self, strategy: Box<dyn CacheKeyStrategy>) -> Self {
        self.key_strategy = strategy;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn key_for(&self, source: &Path) -> Option<String> {
        self.key_strategy.cache_key(source)
    }

    pub fn record_path(&self, key: &str) -> CacheResult<PathBuf> {
        let valid = !key.is_empty()
            && key != "."
            && key != ".."
            && !key.contains(['/', '\\']);
        if !valid {
            return Err(CacheError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(format!("{key}.{RECORD_EXTENSION}")))
    }

    /// Read the record for `key`; a missing record is `Ok(None)`
    pub fn load(&self, key: &str) -> CacheResult<Option<CacheRecord>> {
        let path = self.record_path(key)?;
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(CacheError::Read {
                    path: path.display().to_string(),
                    source,
                })
            }
        };

        let record: CacheRecord =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| CacheError::Parse {
                path: path.display().to_string(),
                source,
            })?;

        if record.version != CACHE_RECORD_VERSION {
            return Err(CacheError::Version {
                path: path.display().to_string(),
                found: record.version,
            });
        }

        Ok(Some(record))
    }

    /// Like [`DiskCache::load`], but unreadable or corrupt records count as absent
    pub fn get(&self, key: &str) -> Option<CacheRecord> {
        match self.load(key) {
            Ok(record) => record,
            Err(err) => {
                warn!("Ignoring cache record: {}", err);
                None
            }
        }
    }

    pub fn put(&self, key: &str, features: &FeatureSet, source_modified: Option<u64>) -> CacheResult<()> {
        let path = self.record_path(key)?;
        fs::create_dir_all(&self.root).map_err(|source| CacheError::CreateDir {
            path: self.root.display().to_string(),
            source,
        })?;

        let record = CacheRecord {
            version: CACHE_RECORD_VERSION,
            source_modified,
            features: features.clone(),
        };

        let write_err = |source| CacheError::Write {
            path: path.display().to_string(),
            source,
        };
        let file = File::create(&path).map_err(write_err)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &record).map_err(|source| CacheError::Serialize {
            path: path.display().to_string(),
            source,
        })?;
        writer.flush().map_err(write_err)?;
        Ok(())
    }

    fn record_files(&self) -> CacheResult<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(CacheError::Read {
                    path: self.root.display().to_string(),
                    source,
                })
            }
        };

        let mut files = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|source| CacheError::Read {
                    path: self.root.display().to_string(),
                    source,
                })?
                .path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == RECORD_EXTENSION) {
                files.push(path);
            }
        }
        Ok(files)
    }

    /// Number of records on disk
    pub fn len(&self) -> CacheResult<usize> {
        Ok(self.record_files()?.len())
    }

    pub fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Remove every record; returns how many were removed
    pub fn clear(&self) -> CacheResult<usize> {
        let files = self.record_files()?;
        for path in &files {
            fs::remove_file(path).map_err(|source| CacheError::Write {
                path: path.display().to_string(),
                source,
            })?;
        }
        Ok(files.len())
    }
}
