#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Row-major 8-bit grayscale image
pub type Image = Vec<u8>;

/// Key-point ≙ detected corner + orientation (radians) with its patch scale
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub size: f32,   // Diameter of the described neighbourhood
    pub angle: f32,
    pub response: f32,
}

/// Fixed-length descriptor vectors stored row-major, one row per keypoint
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DescriptorSet {
    dim: usize,
    data: Vec<f32>,
}

impl DescriptorSet {
    pub fn new(dim: usize) -> Self {
        Self { dim, data: Vec::new() }
    }

    pub fn with_capacity(dim: usize, rows: usize) -> Self {
        Self {
            dim,
            data: Vec::with_capacity(dim * rows),
        }
    }

    /// Build a set from rows that all have length `dim`
    pub fn from_rows<I, R>(dim: usize, rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: AsRef<[f32]>,
    {
        let mut set = Self::new(dim);
        for row in rows {
            set.push(row.as_ref());
        }
        set
    }

    pub fn push(&mut self, row: &[f32]) {
        assert_eq!(row.len(), self.dim, "descriptor length must match the set dimension");
        self.data.extend_from_slice(row);
    }

    /// Length of every descriptor vector
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of descriptors
    pub fn len(&self) -> usize {
        if self.dim == 0 { 0 } else { self.data.len() / self.dim }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn row(&self, idx: usize) -> Option<&[f32]> {
        if idx >= self.len() {
            return None;
        }
        let start = idx * self.dim;
        Some(&self.data[start..start + self.dim])
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        // dim == 0 implies no data, so the chunk size never matters there
        self.data.chunks_exact(self.dim.max(1))
    }
}

/// Keypoints and their parallel descriptor rows
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FeatureSet {
    pub keypoints: Vec<Keypoint>,
    pub descriptors: DescriptorSet,
}

impl FeatureSet {
    pub fn new(keypoints: Vec<Keypoint>, descriptors: DescriptorSet) -> Self {
        Self { keypoints, descriptors }
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct DetectorConfig {
    pub threshold: u8,
    pub patch_size: usize,
    pub nms_distance: f32,
    /// Upper bound on keypoints per image, at least 1; matching cost grows
    /// with the product of both images' counts
    pub max_keypoints: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold: 20,
            patch_size: 31,
            nms_distance: 3.0,
            max_keypoints: 500,
        }
    }
}

/// Keypoint detection + description on a grayscale image.
///
/// Implementations return an empty [`FeatureSet`] when nothing is found and
/// fail only on malformed input.
pub trait FeatureDetector {
    type Error: std::error::Error + 'static;

    fn detect_and_describe(
        &self,
        img: &Image,
        width: usize,
        height: usize,
    ) -> Result<FeatureSet, Self::Error>;
}

impl<D: FeatureDetector + ?Sized> FeatureDetector for &D {
    type Error = D::Error;

    fn detect_and_describe(
        &self,
        img: &Image,
        width: usize,
        height: usize,
    ) -> Result<FeatureSet, Self::Error> {
        (**self).detect_and_describe(img, width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_rows() {
        let set = DescriptorSet::from_rows(3, [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.dim(), 3);
        assert_eq!(set.row(1), Some(&[4.0, 5.0, 6.0][..]));
        assert_eq!(set.row(2), None);
        assert_eq!(set.rows().count(), 2);
    }

    #[test]
    fn test_empty_sets() {
        let zero_dim = DescriptorSet::new(0);
        assert!(zero_dim.is_empty());
        assert_eq!(zero_dim.rows().count(), 0);

        let features = FeatureSet::default();
        assert!(features.is_empty());
        assert_eq!(features.len(), 0);
    }

    #[test]
    #[should_panic]
    fn test_push_wrong_length() {
        let mut set = DescriptorSet::new(4);
        set.push(&[1.0, 2.0]);
    }
}
