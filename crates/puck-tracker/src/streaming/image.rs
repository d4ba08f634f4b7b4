use image::{ImageBuffer, RgbImage};
use ndarray::ArrayView2;

// Convert an RGB ndarray to JPEG bytes
pub fn array_to_jpeg(arr: ArrayView2<[u8; 3]>) -> Option<Vec<u8>> {
    let (height, width) = arr.dim();
    if width == 0 || height == 0 {
        return None;
    }
    let img: RgbImage = ImageBuffer::from_fn(width as u32, height as u32, |x, y| {
        image::Rgb(arr[[y as usize, x as usize]])
    });
    let mut buf = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, 60)
        .encode_image(&img)
        .ok()?;
    Some(buf)
}
