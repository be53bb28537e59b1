//! Top-K image similarity search.
//!
//! A query image is compared against every image in a dataset directory by
//! counting mutually-nearest descriptor matches. Features can be cached on
//! disk so repeated searches skip detection.

use std::path::{Path, PathBuf};

mod cache;
mod config;
mod detector;
mod error;
mod extractor;
mod matcher;
mod ranker;
mod source;

#[cfg(test)]
mod test_utils;

pub use cache::{
    CacheError, CacheKeyStrategy, CacheRecord, CacheResult, DiskCache, FileStemKey, KeyStrategy,
    PathHashKey, CACHE_RECORD_VERSION,
};
pub use config::{CacheConfig, ConfigError, ConfigResult, SearchConfig};
pub use detector::{DefaultDetector, DEFAULT_BLUR_SIGMA};
pub use error::{DetectError, DetectResult, SearchError, SearchResult};
pub use extractor::FeatureExtractor;
pub use matcher::{BruteForceMatcher, DistanceMetric, Match, MatcherConfig};
pub use ranker::{RankedMatch, SimilarityRanker, DEFAULT_EXTENSIONS};
pub use source::ImageSource;

pub use imgsim_core::{self, DescriptorSet, DetectorConfig, FeatureDetector, FeatureSet, Keypoint};

/// Rank the images in `dataset_dir` against `query` with default settings,
/// caching features under `cache_dir` when given
pub fn find_similar(
    query: impl Into<ImageSource>,
    dataset_dir: &Path,
    top_k: usize,
    cache_dir: Option<&Path>,
) -> SearchResult<Vec<RankedMatch>> {
    let config = SearchConfig {
        top_k,
        cache_dir: cache_dir.map(PathBuf::from),
        ..SearchConfig::default()
    };
    config.build_ranker()?.find_similar(&query.into(), dataset_dir, top_k)
}
