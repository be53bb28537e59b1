use std::fs;
use std::path::{Path, PathBuf};

use imgsim_core::DetectorConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::{DiskCache, KeyStrategy};
use crate::detector::{DefaultDetector, DEFAULT_BLUR_SIGMA};
use crate::error::SearchResult;
use crate::extractor::FeatureExtractor;
use crate::matcher::{BruteForceMatcher, MatcherConfig};
use crate::ranker::{SimilarityRanker, DEFAULT_EXTENSIONS};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config file {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Feature cache behaviour
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub key_strategy: KeyStrategy,
    /// Recompute features when the source file changed since it was cached
    pub revalidate_mtime: bool,
}

/// Everything needed to run a search, loadable from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    pub top_k: usize,
    /// Feature cache directory; no caching when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    pub extensions: Vec<String>,
    pub blur_sigma: f32,
    /// `env_logger` filter used when neither the command line nor `RUST_LOG` sets one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    pub detector: DetectorConfig,
    pub matcher: MatcherConfig,
    pub cache: CacheConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            cache_dir: None,
            extensions: DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
            blur_sigma: DEFAULT_BLUR_SIGMA,
            log_level: None,
            detector: DetectorConfig::default(),
            matcher: MatcherConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.blur_sigma.is_finite() || self.blur_sigma < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "blur_sigma must be a non-negative number, got {}",
                self.blur_sigma
            )));
        }
        if self.extensions.is_empty() {
            return Err(ConfigError::Invalid("extensions must not be empty".to_string()));
        }
        if let Some(ext) = self.extensions.iter().find(|ext| ext.trim_start_matches('.').is_empty()) {
            return Err(ConfigError::Invalid(format!("empty extension {ext:?}")));
        }
        DefaultDetector::new(self.detector.clone())
            .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        Ok(())
    }

    pub fn from_toml(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load and validate a TOML file; missing fields take their defaults
    pub fn load_toml<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let path = path.as_ref();
        fs::write(path, self.to_toml()?).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    /// Assemble the default detector, extractor, cache and matcher
    pub fn build_ranker(&self) -> SearchResult<SimilarityRanker<DefaultDetector>> {
        self.validate()?;

        let detector = DefaultDetector::new(self.detector.clone())?.with_blur_sigma(self.blur_sigma);
        let mut extractor = FeatureExtractor::new(detector).with_mtime_check(self.cache.revalidate_mtime);
        if let Some(dir) = &self.cache_dir {
            extractor =
                extractor.with_cache(DiskCache::new(dir).with_key_strategy(self.cache.key_strategy.build()));
        }

        Ok(SimilarityRanker::new(extractor, BruteForceMatcher::from_config(&self.matcher))
            .with_extensions(&self.extensions))
    }
}
