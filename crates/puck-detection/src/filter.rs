use ndarray::{Array2, ArrayView2};

/// Median filter for a binary (0/255) mask with a square `kernel` window.
///
/// Borders replicate the edge pixels. An even kernel is widened to the next
/// odd size, and a kernel of 0 or 1 returns the mask unchanged.
pub fn median_blur(mask: ArrayView2<u8>, kernel: usize) -> Array2<u8> {
    if kernel <= 1 {
        return mask.to_owned();
    }
    let kernel = kernel | 1;
    let r = kernel / 2;
    let (height, width) = mask.dim();
    if height == 0 || width == 0 {
        return mask.to_owned();
    }

    // Summed-area table over the replicated-border foreground count.
    let ph = height + 2 * r;
    let pw = width + 2 * r;
    let mut integral = Array2::<u32>::zeros((ph + 1, pw + 1));
    for py in 0..ph {
        let sy = py.saturating_sub(r).min(height - 1);
        let mut row_sum = 0u32;
        for px in 0..pw {
            let sx = px.saturating_sub(r).min(width - 1);
            row_sum += u32::from(mask[(sy, sx)] != 0);
            integral[(py + 1, px + 1)] = integral[(py, px + 1)] + row_sum;
        }
    }

    let majority = (kernel * kernel / 2) as u32;
    Array2::from_shape_fn((height, width), |(y, x)| {
        // Window in padded coordinates is [y, y + kernel) x [x, x + kernel).
        let count = integral[(y + kernel, x + kernel)] + integral[(y, x)]
            - integral[(y, x + kernel)]
            - integral[(y + kernel, x)];
        if count > majority {
            255
        } else {
            0
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_solid_regions() {
        let mask = Array2::from_elem((6, 6), 255u8);
        let out = median_blur(mask.view(), 5);
        assert!(out.iter().all(|&m| m == 255));
    }

    #[test]
    fn removes_salt_noise() {
        let mut mask = Array2::zeros((7, 7));
        mask[(3, 3)] = 255;
        mask[(0, 6)] = 255;
        let out = median_blur(mask.view(), 5);
        assert!(out.iter().all(|&m| m == 0));
    }

    #[test]
    fn fills_pepper_holes() {
        let mut mask = Array2::from_elem((7, 7), 255u8);
        mask[(3, 3)] = 0;
        let out = median_blur(mask.view(), 3);
        assert_eq!(out[(3, 3)], 255);
    }

    #[test]
    fn even_kernel_is_widened() {
        let mut mask = Array2::zeros((5, 5));
        mask[(2, 2)] = 255;
        mask[(2, 3)] = 255;
        // A 4 becomes 5: two pixels out of 25 never reach the median.
        let out = median_blur(mask.view(), 4);
        assert!(out.iter().all(|&m| m == 0));
    }

    #[test]
    fn trivial_kernel_is_identity() {
        let mut mask = Array2::zeros((3, 3));
        mask[(1, 1)] = 255;
        assert_eq!(median_blur(mask.view(), 1), mask);
    }
}
