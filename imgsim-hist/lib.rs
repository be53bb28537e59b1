use imgsim_core::{DescriptorSet, Image, Keypoint};
use std::f32::consts::TAU;
use thiserror::Error;

/// 4x4 cells × 8 orientation bins
pub const DESCRIPTOR_SIZE: usize = CELLS * CELLS * BINS;

const GRID: usize = 16; // samples per side of the rotated window
const CELLS: usize = 4;
const BINS: usize = 8;
const CLAMP: f32 = 0.2;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DescribeError {
    #[error("Invalid image dimensions: {width}x{height} (must be > 0)")]
    InvalidImageSize { width: usize, height: usize },
    #[error("Image data length mismatch: expected {expected_len}, got {actual_len}")]
    InvalidImageData { expected_len: usize, actual_len: usize },
}

pub type DescribeResult<T> = Result<T, DescribeError>;

/// Gradient-orientation histogram descriptor over a window rotated to the
/// keypoint angle and scaled to the keypoint size
pub struct HistogramDescriptor {
    w: usize,
    h: usize,
}

impl HistogramDescriptor {
    pub fn new(width: usize, height: usize) -> DescribeResult<Self> {
        if width == 0 || height == 0 {
            return Err(DescribeError::InvalidImageSize { width, height });
        }
        Ok(Self { w: width, h: height })
    }

    pub fn generate_descriptors(&self, img: &Image, kps: &[Keypoint]) -> DescribeResult<DescriptorSet> {
        let expected_len = self.w * self.h;
        if img.len() != expected_len {
            return Err(DescribeError::InvalidImageData {
                expected_len,
                actual_len: img.len(),
            });
        }

        let mut set = DescriptorSet::with_capacity(DESCRIPTOR_SIZE, kps.len());
        for kp in kps {
            set.push(&self.describe(img, kp));
        }
        Ok(set)
    }

    fn describe(&self, img: &Image, kp: &Keypoint) -> [f32; DESCRIPTOR_SIZE] {
        let (s, c) = kp.angle.sin_cos();
        let (cx, cy) = (kp.x, kp.y);
        let spacing = (kp.size / GRID as f32).max(1.0);
        let centre = (GRID as f32 - 1.0) / 2.0;
        let sigma = GRID as f32 / 2.0;

        let mut hist = [0.0f32; DESCRIPTOR_SIZE];

        for gy in 0..GRID {
            for gx in 0..GRID {
                let (gu, gv) = (gx as f32 - centre, gy as f32 - centre);
                let (u, v) = (gu * spacing, gv * spacing);

                // Apply rotation and translation for subpixel coordinates
                let px = cx + c * u - s * v;
                let py = cy + s * u + c * v;

                // Derivatives along the rotated axes keep the histogram relative to the keypoint angle
                let du = self.bilinear_sample(img, px + c, py + s) - self.bilinear_sample(img, px - c, py - s);
                let dv = self.bilinear_sample(img, px - s, py + c) - self.bilinear_sample(img, px + s, py - c);

                let magnitude = (du * du + dv * dv).sqrt();
                if magnitude == 0.0 {
                    continue;
                }

                let orientation = dv.atan2(du).rem_euclid(TAU);
                let bin = ((orientation / TAU * BINS as f32) as usize).min(BINS - 1);
                let weight = (-(gu * gu + gv * gv) / (2.0 * sigma * sigma)).exp();

                let cell = (gy / (GRID / CELLS)) * CELLS + gx / (GRID / CELLS);
                hist[cell * BINS + bin] += magnitude * weight;
            }
        }

        Self::normalize(&mut hist);
        hist
    }

    /// Unit-normalise, clamp large components, renormalise and quantise to 0..=255
    fn normalize(hist: &mut [f32; DESCRIPTOR_SIZE]) {
        let norm = hist.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm == 0.0 {
            return;
        }
        for v in hist.iter_mut() {
            *v = (*v / norm).min(CLAMP);
        }

        let norm = hist.iter().map(|v| v * v).sum::<f32>().sqrt();
        for v in hist.iter_mut() {
            *v = (*v / norm * 512.0).round().min(255.0);
        }
    }

    /// Bilinear interpolation for subpixel sampling
    fn bilinear_sample(&self, img: &Image, x: f32, y: f32) -> f32 {
        let x0 = x.floor();
        let y0 = y.floor();
        let x1 = x0 + 1.0;
        let y1 = y0 + 1.0;

        // Clamp to image bounds for boundary samples
        if x0 < 0.0 || y0 < 0.0 || x1 >= self.w as f32 || y1 >= self.h as f32 {
            let cx = x.round().clamp(0.0, (self.w - 1) as f32) as usize;
            let cy = y.round().clamp(0.0, (self.h - 1) as f32) as usize;
            return img[cy * self.w + cx] as f32;
        }

        let dx = x - x0;
        let dy = y - y0;

        let x0_idx = x0 as usize;
        let y0_idx = y0 as usize;
        let x1_idx = x1 as usize;
        let y1_idx = y1 as usize;

        let p00 = img[y0_idx * self.w + x0_idx] as f32;
        let p10 = img[y0_idx * self.w + x1_idx] as f32;
        let p01 = img[y1_idx * self.w + x0_idx] as f32;
        let p11 = img[y1_idx * self.w + x1_idx] as f32;

        let top = p00 * (1.0 - dx) + p10 * dx;
        let bottom = p01 * (1.0 - dx) + p11 * dx;

        top * (1.0 - dy) + bottom * dy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn kp(x: f32, y: f32, angle: f32) -> Keypoint {
        Keypoint { x, y, size: 31.0, angle, response: 1.0 }
    }

    fn textured_image(width: usize, height: usize, seed: u64) -> Image {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..width * height).map(|_| rng.gen_range(0..=255)).collect()
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(
            HistogramDescriptor::new(0, 10),
            Err(DescribeError::InvalidImageSize { .. })
        ));

        let generator = HistogramDescriptor::new(10, 10).unwrap();
        let result = generator.generate_descriptors(&vec![0; 20], &[]);
        assert!(matches!(
            result,
            Err(DescribeError::InvalidImageData { expected_len: 100, actual_len: 20 })
        ));
    }

    #[test]
    fn test_one_row_per_keypoint() {
        let img = textured_image(64, 64, 7);
        let generator = HistogramDescriptor::new(64, 64).unwrap();

        let empty = generator.generate_descriptors(&img, &[]).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.dim(), DESCRIPTOR_SIZE);

        let kps = [kp(20.0, 20.0, 0.0), kp(40.0, 30.0, 1.0), kp(32.0, 32.0, -2.0)];
        let set = generator.generate_descriptors(&img, &kps).unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.dim(), DESCRIPTOR_SIZE);
    }

    #[test]
    fn test_flat_patch_is_zero() {
        let img = vec![90u8; 48 * 48];
        let generator = HistogramDescriptor::new(48, 48).unwrap();
        let set = generator.generate_descriptors(&img, &[kp(24.0, 24.0, 0.3)]).unwrap();

        assert!(set.row(0).unwrap().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_values_are_quantised() {
        let img = textured_image(64, 64, 11);
        let generator = HistogramDescriptor::new(64, 64).unwrap();
        let set = generator.generate_descriptors(&img, &[kp(32.0, 32.0, 0.0)]).unwrap();
        let row = set.row(0).unwrap();

        assert!(row.iter().any(|&v| v > 0.0));
        for &v in row {
            assert!((0.0..=255.0).contains(&v));
            assert_eq!(v, v.round());
        }
    }

    #[test]
    fn test_deterministic_and_discriminative() {
        let a = textured_image(64, 64, 3);
        let b = textured_image(64, 64, 4);
        let generator = HistogramDescriptor::new(64, 64).unwrap();
        let kps = [kp(32.0, 32.0, 0.5)];

        let first = generator.generate_descriptors(&a, &kps).unwrap();
        let again = generator.generate_descriptors(&a, &kps).unwrap();
        let other = generator.generate_descriptors(&b, &kps).unwrap();

        assert_eq!(first, again);
        assert_ne!(first, other);
    }

    #[test]
    fn test_keypoint_near_border() {
        let img = textured_image(32, 32, 5);
        let generator = HistogramDescriptor::new(32, 32).unwrap();
        let set = generator.generate_descriptors(&img, &[kp(0.0, 31.0, 2.5)]).unwrap();
        assert_eq!(set.len(), 1);
    }
}
