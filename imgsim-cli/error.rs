use imgsim_fast::FastError;
use imgsim_hist::DescribeError;
use thiserror::Error;

use crate::config::ConfigError;

/// Failure of the default detection capability on malformed input
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DetectError {
    #[error("FAST error: {0}")]
    Fast(#[from] FastError),
    #[error("Descriptor error: {0}")]
    Describe(#[from] DescribeError),
}

pub type DetectResult<T> = Result<T, DetectError>;

/// Setup and usage mistakes that abort a search
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("failed to read dataset directory {path}: {source}")]
    DatasetDir { path: String, source: std::io::Error },
    #[error("invalid detector configuration: {0}")]
    Detector(#[from] DetectError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type SearchResult<T> = Result<T, SearchError>;
