//! FAST keypoint detection for keypoint-based image similarity.
//!
//! The detector runs a FAST-9 segment test over every pixel whose
//! orientation patch fits inside the image, suppresses neighbours by
//! response, keeps the strongest `max_keypoints`, and assigns each keypoint
//! an intensity-centroid orientation.

mod detector;
mod error;
mod refinement;
mod types;
mod utils;

pub use detector::FastDetector;
pub use error::{FastError, FastResult};
pub use refinement::KeypointRefinement;
pub use utils::has_consecutive_pixels;
