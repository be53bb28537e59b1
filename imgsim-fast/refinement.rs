use imgsim_core::{Image, Keypoint};

/// Orientation and suppression passes applied after the segment test
pub struct KeypointRefinement;

impl KeypointRefinement {
    /// Compute orientation for a keypoint using the intensity centroid method.
    ///
    /// The caller guarantees the square patch around (x, y) lies inside the image.
    pub fn compute_orientation(img: &Image, width: usize, x: usize, y: usize, patch_size: usize) -> f32 {
        let half = (patch_size / 2) as i64;
        let (cx, cy) = (x as i64, y as i64);
        let mut m10 = 0i64;
        let mut m01 = 0i64;

        for dy in -half..=half {
            let row = ((cy + dy) as usize) * width;
            for dx in -half..=half {
                let val = img[row + (cx + dx) as usize] as i64;
                m10 += dx * val;
                m01 += dy * val;
            }
        }

        if m10 == 0 && m01 == 0 {
            0.0
        } else {
            (m01 as f32).atan2(m10 as f32)
        }
    }

    /// Greedy non-maximum suppression: strongest response first, drop anything
    /// closer than `min_distance` to an accepted keypoint
    pub fn non_maximum_suppression(keypoints: &[Keypoint], min_distance: f32) -> Vec<Keypoint> {
        if keypoints.is_empty() {
            return Vec::new();
        }

        // Stable sort keeps raster order among equal responses
        let mut sorted_keypoints = keypoints.to_vec();
        sorted_keypoints.sort_by(|a, b| b.response.total_cmp(&a.response));

        let mut suppressed: Vec<Keypoint> = Vec::new();
        let min_distance_sq = min_distance * min_distance;

        for candidate in sorted_keypoints {
            let is_local_max = suppressed.iter().all(|existing| {
                let dx = candidate.x - existing.x;
                let dy = candidate.y - existing.y;
                dx * dx + dy * dy >= min_distance_sq
            });

            if is_local_max {
                suppressed.push(candidate);
            }
        }

        suppressed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kp(x: f32, y: f32, response: f32) -> Keypoint {
        Keypoint { x, y, size: 7.0, angle: 0.0, response }
    }

    #[test]
    fn test_nms_keeps_strongest() {
        let kps = vec![kp(10.0, 10.0, 5.0), kp(11.0, 10.0, 9.0), kp(30.0, 30.0, 1.0)];
        let kept = KeypointRefinement::non_maximum_suppression(&kps, 3.0);

        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].x, 11.0);
        assert_eq!(kept[1].x, 30.0);
    }

    #[test]
    fn test_nms_zero_distance_keeps_everything() {
        let kps = vec![kp(10.0, 10.0, 5.0), kp(10.0, 10.0, 4.0)];
        assert_eq!(KeypointRefinement::non_maximum_suppression(&kps, 0.0).len(), 2);
        assert!(KeypointRefinement::non_maximum_suppression(&[], 3.0).is_empty());
    }

    #[test]
    fn test_orientation_points_towards_mass() {
        let (w, h) = (21usize, 21usize);
        let mut img = vec![0u8; w * h];
        // Bright half-plane to the right of the centre
        for y in 0..h {
            for x in 11..w {
                img[y * w + x] = 200;
            }
        }

        let angle = KeypointRefinement::compute_orientation(&img, w, 10, 10, 7);
        assert!(angle.abs() < 1e-3, "expected ~0 rad, got {}", angle);
    }

    #[test]
    fn test_orientation_flat_patch() {
        let img = vec![0u8; 15 * 15];
        assert_eq!(KeypointRefinement::compute_orientation(&img, 15, 7, 7, 7), 0.0);
    }
}
