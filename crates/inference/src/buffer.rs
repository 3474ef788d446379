//! Conversions between `image` buffers and H×W×C pixel arrays.

use crate::detection::ChannelOrder;
use image::RgbImage;
use ndarray::{Array3, s};

/// Copy an RGB image into an H×W×3 array in `order`.
pub fn rgb_image_to_array(image: &RgbImage, order: ChannelOrder) -> anyhow::Result<Array3<u8>> {
    let (width, height) = image.dimensions();
    let array = Array3::from_shape_vec(
        (height as usize, width as usize, 3),
        image.as_raw().clone(),
    )?;

    Ok(match order {
        ChannelOrder::Rgb => array,
        ChannelOrder::Bgr => reverse_channels(&array),
    })
}

/// Build an RGB image from an H×W×3 array stored in `order`.
pub fn array_to_rgb_image(pixels: &Array3<u8>, order: ChannelOrder) -> anyhow::Result<RgbImage> {
    let (height, width, channels) = pixels.dim();
    if channels != 3 {
        anyhow::bail!("expected 3 channels, got {}", channels);
    }

    let raw: Vec<u8> = match order {
        ChannelOrder::Rgb => pixels.iter().copied().collect(),
        ChannelOrder::Bgr => reverse_channels(pixels).iter().copied().collect(),
    };

    RgbImage::from_raw(width as u32, height as u32, raw)
        .ok_or_else(|| anyhow::anyhow!("Failed to create image from raw data"))
}

/// Reverse the last axis (RGB <-> BGR) into a fresh standard-layout array.
pub fn reverse_channels(pixels: &Array3<u8>) -> Array3<u8> {
    let reversed = pixels.slice(s![.., .., ..;-1]);
    Array3::from_shape_fn(pixels.dim(), |(y, x, c)| reversed[[y, x, c]])
}

/// Row-major bytes in logical order, regardless of the array's strides.
pub fn to_contiguous_bytes(pixels: &Array3<u8>) -> Vec<u8> {
    pixels.iter().copied().collect()
}
