//! Single-colour blob detection: HSV thresholding, median filtering,
//! contour tracing and moment centroids.

pub mod blob;
pub mod circle;
pub mod color;
pub mod contour;
pub mod filter;

pub use blob::{all_blobs, extract, Blob, BlobBounds, BlobSelection};
pub use color::{apply_mask, in_range_mask, rgb_to_hsv, segment, HsvRange};
pub use filter::median_blur;

/// RGB image, row-major `(height, width)`.
pub type RgbImage = ndarray::Array2<[u8; 3]>;
/// Binary mask holding 0 or 255.
pub type Mask = ndarray::Array2<u8>;
