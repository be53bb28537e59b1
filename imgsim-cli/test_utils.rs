//! Shared fixtures for unit and integration tests

use std::cell::Cell;
use std::path::{Path, PathBuf};

use image::{GrayImage, Luma};
use imgsim_core::{DescriptorSet, FeatureDetector, FeatureSet, Image, Keypoint};
use imgsim_hist::DescribeError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::DetectError;

/// Grid spacing of [`PatchDetector`] sample points
const PATCH_STEP: usize = 8;

/// Cheap deterministic detector: one keypoint per grid cell whose 2x2 patch
/// is not flat, described by the raw patch intensities
#[derive(Debug, Clone, Copy, Default)]
pub struct PatchDetector;

impl FeatureDetector for PatchDetector {
    type Error = DetectError;

    fn detect_and_describe(&self, img: &Image, width: usize, height: usize) -> Result<FeatureSet, DetectError> {
        if img.len() != width * height {
            return Err(DescribeError::InvalidImageData {
                expected_len: width * height,
                actual_len: img.len(),
            }
            .into());
        }

        let mut keypoints = Vec::new();
        let mut descriptors = DescriptorSet::new(4);
        for y in (PATCH_STEP / 2..height.saturating_sub(1)).step_by(PATCH_STEP) {
            for x in (PATCH_STEP / 2..width.saturating_sub(1)).step_by(PATCH_STEP) {
                let patch = [
                    img[y * width + x],
                    img[y * width + x + 1],
                    img[(y + 1) * width + x],
                    img[(y + 1) * width + x + 1],
                ];
                let (lo, hi) = (patch.iter().min(), patch.iter().max());
                if lo == hi {
                    continue;
                }
                keypoints.push(Keypoint {
                    x: x as f32,
                    y: y as f32,
                    size: 2.0,
                    angle: 0.0,
                    response: patch.iter().map(|&v| v as f32).sum(),
                });
                descriptors.push(&patch.map(f32::from));
            }
        }

        Ok(FeatureSet::new(keypoints, descriptors))
    }
}

/// Wraps a detector and counts how often it runs
#[derive(Debug, Default)]
pub struct CountingDetector<D> {
    inner: D,
    calls: Cell<usize>,
}

impl<D> CountingDetector<D> {
    pub fn new(inner: D) -> Self {
        Self { inner, calls: Cell::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl<D: FeatureDetector> FeatureDetector for CountingDetector<D> {
    type Error = D::Error;

    fn detect_and_describe(&self, img: &Image, width: usize, height: usize) -> Result<FeatureSet, D::Error> {
        self.calls.set(self.calls.get() + 1);
        self.inner.detect_and_describe(img, width, height)
    }
}

/// Write a grayscale image whose pixel values come from `f(x, y)`; the
/// format follows the file extension
pub fn write_gray_image<F>(dir: &Path, name: &str, width: u32, height: u32, f: F) -> PathBuf
where
    F: Fn(u32, u32) -> u8,
{
    let path = dir.join(name);
    GrayImage::from_fn(width, height, |x, y| Luma([f(x, y)]))
        .save(&path)
        .unwrap();
    path
}

pub fn write_gray_png<F>(dir: &Path, name: &str, width: u32, height: u32, f: F) -> PathBuf
where
    F: Fn(u32, u32) -> u8,
{
    assert!(name.ends_with(".png"), "{name} is not a png name");
    write_gray_image(dir, name, width, height, f)
}

/// High-contrast scene of random overlapping rectangles, reproducible per seed
pub fn rectangle_scene(width: u32, height: u32, rects: usize, seed: u64) -> GrayImage {
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    let mut rng = StdRng::seed_from_u64(seed);
    let mut img = GrayImage::from_pixel(width, height, Luma([128]));
    for _ in 0..rects {
        let w = rng.gen_range(8..width / 4);
        let h = rng.gen_range(8..height / 4);
        let x = rng.gen_range(0..width - w) as i32;
        let y = rng.gen_range(0..height - h) as i32;
        let shade: u8 = if rng.gen_bool(0.5) { rng.gen_range(0..70) } else { rng.gen_range(186..=255) };
        draw_filled_rect_mut(&mut img, Rect::at(x, y).of_size(w, h), Luma([shade]));
    }
    img
}
