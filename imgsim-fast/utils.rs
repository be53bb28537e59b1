//! Utility functions for corner detection algorithms

/// Check if there are at least `min_count` consecutive true values in the circular array
/// using a branch-free bitmask approach
pub fn has_consecutive_pixels(pixels: &[bool; 16], min_count: usize) -> bool {
    if min_count > 16 || min_count == 0 {
        return false;
    }

    let mut mask: u16 = 0;
    for (i, &pixel) in pixels.iter().enumerate() {
        if pixel {
            mask |= 1 << i;
        }
    }

    // A run of length n survives mask & rotl(mask, 1) & ... & rotl(mask, n - 1)
    let mut test_mask = mask;
    for i in 1..min_count {
        test_mask &= mask.rotate_left(i as u32);
        if test_mask == 0 {
            return false;
        }
    }

    test_mask != 0
}
