use imgsim_core::{DetectorConfig, Image, Keypoint};
use crate::error::{FastError, FastResult};
use crate::refinement::KeypointRefinement;
use crate::types::CornerType;
use crate::utils::has_consecutive_pixels;

/// Bresenham circle of radius 3 used by the segment test
const OFF: [(i32, i32); 16] = [
    (-3, 0), (-3, 1), (-2, 2), (-1, 3),
    (0, 3), (1, 3), (2, 2), (3, 1),
    (3, 0), (3, -1), (2, -2), (1, -3),
    (0, -3), (-1, -3), (-2, -2), (-3, -1),
];

/// Contiguous arc length required by FAST-9
const ARC_LENGTH: usize = 9;

/// Smallest patch that still covers the segment-test circle
const MIN_PATCH_SIZE: usize = 7;

/// FAST corner detector for single-scale grayscale images of any size
#[derive(Debug, Clone)]
pub struct FastDetector {
    cfg: DetectorConfig,
}

impl FastDetector {
    /// Creates a new FAST detector with validation
    pub fn new(cfg: DetectorConfig) -> FastResult<Self> {
        // 0 would detect everything, >127 could cause issues with u8 arithmetic
        if cfg.threshold == 0 || cfg.threshold > 127 {
            return Err(FastError::InvalidThreshold(cfg.threshold));
        }

        if cfg.patch_size % 2 == 0 || cfg.patch_size < MIN_PATCH_SIZE {
            return Err(FastError::InvalidPatchSize(cfg.patch_size));
        }

        if !cfg.nms_distance.is_finite() || cfg.nms_distance < 0.0 {
            return Err(FastError::InvalidNmsDistance(cfg.nms_distance));
        }

        if cfg.max_keypoints == 0 {
            return Err(FastError::InvalidMaxKeypoints(cfg.max_keypoints));
        }

        Ok(Self { cfg })
    }

    fn validate_image(img: &Image, width: usize, height: usize) -> FastResult<()> {
        if width == 0 || height == 0 {
            return Err(FastError::InvalidImageSize { width, height });
        }
        let expected_len = width * height;
        if img.len() != expected_len {
            return Err(FastError::InvalidImageData {
                expected_len,
                actual_len: img.len(),
            });
        }
        Ok(())
    }

    /// Detect, suppress, cap and orient keypoints.
    ///
    /// Corners whose orientation patch would leave the image are never
    /// reported, so images smaller than the patch yield no keypoints.
    pub fn detect_keypoints(&self, img: &Image, width: usize, height: usize) -> FastResult<Vec<Keypoint>> {
        let corners = self.detect_corners(img, width, height)?;
        let mut keypoints = KeypointRefinement::non_maximum_suppression(&corners, self.cfg.nms_distance);

        keypoints.truncate(self.cfg.max_keypoints);

        for kp in keypoints.iter_mut() {
            kp.angle = KeypointRefinement::compute_orientation(
                img,
                width,
                kp.x as usize,
                kp.y as usize,
                self.cfg.patch_size,
            );
        }

        Ok(keypoints)
    }

    /// Raw segment-test corners in raster order, with response but no orientation
    pub fn detect_corners(&self, img: &Image, width: usize, height: usize) -> FastResult<Vec<Keypoint>> {
        Self::validate_image(img, width, height)?;

        let border = self.cfg.patch_size / 2;
        if width <= 2 * border || height <= 2 * border {
            return Ok(Vec::new());
        }

        let mut corners = Vec::new();
        for y in border..height - border {
            for x in border..width - border {
                if let Some(response) = self.segment_test(img, width, x, y) {
                    corners.push(Keypoint {
                        x: x as f32,
                        y: y as f32,
                        size: self.cfg.patch_size as f32,
                        angle: 0.0,
                        response,
                    });
                }
            }
        }

        Ok(corners)
    }

    /// Classify the circle around (x, y); returns the mean contrast of the
    /// winning class when a long enough arc exists
    fn segment_test(&self, img: &Image, width: usize, x: usize, y: usize) -> Option<f32> {
        let p = img[y * width + x];
        let t = self.cfg.threshold;

        let mut bright = [false; 16];
        let mut dark = [false; 16];
        let mut bri_sum = 0i32;
        let mut drk_sum = 0i32;
        let mut bri = 0i32;
        let mut drk = 0i32;

        for (i, &(dx, dy)) in OFF.iter().enumerate() {
            let xx = (x as i32 + dx) as usize;
            let yy = (y as i32 + dy) as usize;
            let q = img[yy * width + xx];

            match Self::classify(p, q, t) {
                CornerType::Bright => {
                    bright[i] = true;
                    bri += 1;
                    bri_sum += q as i32 - p as i32;
                }
                CornerType::Dark => {
                    dark[i] = true;
                    drk += 1;
                    drk_sum += p as i32 - q as i32;
                }
                CornerType::None => {}
            }
        }

        if has_consecutive_pixels(&bright, ARC_LENGTH) {
            Some(bri_sum as f32 / bri as f32)
        } else if has_consecutive_pixels(&dark, ARC_LENGTH) {
            Some(drk_sum as f32 / drk as f32)
        } else {
            None
        }
    }

    #[inline]
    fn classify(p: u8, q: u8, t: u8) -> CornerType {
        if q >= p.saturating_add(t) {
            CornerType::Bright
        } else if q.saturating_add(t) <= p {
            CornerType::Dark
        } else {
            CornerType::None
        }
    }

    /// Get detector configuration
    pub fn config(&self) -> &DetectorConfig {
        &self.cfg
    }
}
