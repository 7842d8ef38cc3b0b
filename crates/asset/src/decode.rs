//! Image file decoding. Pure CPU work; nothing here touches the GPU.

use std::time::Instant;

use corelib::{AssetError, AssetResult};
use image::DynamicImage;

use crate::texture::ImageBuffer;

/// Decode an image file, keeping the channel count the file actually has.
///
/// Higher bit depths are narrowed to eight bits per channel.
pub fn decode_image(path: &str) -> AssetResult<ImageBuffer> {
    let start = Instant::now();

    let img = image::open(path).map_err(|e| {
        log::error!("Failed to load texture \"{}\": {}", path, e);
        AssetError::image(path, e)
    })?;
    let buffer = into_buffer(img);

    log::debug!(
        "Loaded texture \"{}\" with dimensions {}x{} and {} channels in {}ms",
        path,
        buffer.width,
        buffer.height,
        buffer.channels,
        start.elapsed().as_millis()
    );
    Ok(buffer)
}

fn into_buffer(img: DynamicImage) -> ImageBuffer {
    let (width, height) = (img.width(), img.height());
    let (channels, pixels) = match img {
        DynamicImage::ImageLuma8(buf) => (1, buf.into_raw()),
        DynamicImage::ImageLumaA8(buf) => (2, buf.into_raw()),
        DynamicImage::ImageRgb8(buf) => (3, buf.into_raw()),
        DynamicImage::ImageRgba8(buf) => (4, buf.into_raw()),
        other => match other.color().channel_count() {
            1 => (1, other.to_luma8().into_raw()),
            2 => (2, other.to_luma_alpha8().into_raw()),
            3 => (3, other.to_rgb8().into_raw()),
            _ => (4, other.to_rgba8().into_raw()),
        },
    };
    ImageBuffer::new(width, height, channels, pixels)
}
