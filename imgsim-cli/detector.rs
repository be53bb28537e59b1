use std::borrow::Cow;

use image::GrayImage;
use imgsim_core::{DetectorConfig, FeatureDetector, FeatureSet, Image};
use imgsim_fast::FastDetector;
use imgsim_hist::HistogramDescriptor;

use crate::error::{DetectError, DetectResult};

/// Gaussian blur applied before the segment test unless configured otherwise
pub const DEFAULT_BLUR_SIGMA: f32 = 1.0;

/// FAST keypoints described by gradient-orientation histograms, computed on
/// a lightly blurred copy of the input
#[derive(Debug, Clone)]
pub struct DefaultDetector {
    fast_detector: FastDetector,
    blur_sigma: f32,
}

impl DefaultDetector {
    /// Create a detector with the given configuration
    pub fn new(cfg: DetectorConfig) -> DetectResult<Self> {
        Ok(Self {
            fast_detector: FastDetector::new(cfg)?,
            blur_sigma: DEFAULT_BLUR_SIGMA,
        })
    }

    /// Standard deviation of the smoothing blur; 0 (or any non-positive or
    /// non-finite value) disables it
    pub fn with_blur_sigma(mut self, sigma: f32) -> Self {
        self.blur_sigma = sigma;
        self
    }

    pub fn blur_sigma(&self) -> f32 {
        self.blur_sigma
    }

    /// Blurred copy of `img`, or `img` itself when blurring is off or the
    /// buffer is malformed (the segment test reports that)
    fn smooth<'a>(&self, img: &'a Image, width: usize, height: usize) -> Cow<'a, Image> {
        let enabled = self.blur_sigma > 0.0 && self.blur_sigma.is_finite();
        if !enabled || width == 0 || height == 0 || img.len() != width * height {
            return Cow::Borrowed(img);
        }
        match GrayImage::from_raw(width as u32, height as u32, img.clone()) {
            Some(luma) => Cow::Owned(imageproc::filter::gaussian_blur_f32(&luma, self.blur_sigma).into_raw()),
            None => Cow::Borrowed(img),
        }
    }

    /// Get detector configuration
    pub fn config(&self) -> &DetectorConfig {
        self.fast_detector.config()
    }
}

impl FeatureDetector for DefaultDetector {
    type Error = DetectError;

    fn detect_and_describe(&self, img: &Image, width: usize, height: usize) -> DetectResult<FeatureSet> {
        let img = self.smooth(img, width, height);
        let keypoints = self.fast_detector.detect_keypoints(&img, width, height)?;
        let descriptors = HistogramDescriptor::new(width, height)?.generate_descriptors(&img, &keypoints)?;
        Ok(FeatureSet::new(keypoints, descriptors))
    }
}
