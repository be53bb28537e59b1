use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FastError {
    #[error("Invalid image dimensions: {width}x{height} (must be > 0)")]
    InvalidImageSize { width: usize, height: usize },
    #[error("Image data length mismatch: expected {expected_len}, got {actual_len}")]
    InvalidImageData { expected_len: usize, actual_len: usize },
    #[error("Invalid threshold: {0} (must be 1-127)")]
    InvalidThreshold(u8),
    #[error("Invalid patch size: {0} (must be odd and at least 7)")]
    InvalidPatchSize(usize),
    #[error("Invalid NMS distance: {0} (must be finite and non-negative)")]
    InvalidNmsDistance(f32),
    #[error("Invalid keypoint cap: {0} (must be > 0)")]
    InvalidMaxKeypoints(usize),
}

pub type FastResult<T> = Result<T, FastError>;
