//! CPU-side preparation of pixel data for wgpu: format mapping, RGBA
//! expansion and the downsampled mip chain.

use asset::{ImageBuffer, PixelFormat};
use corelib::{AssetError, AssetResult};
use image::{GrayImage, Pixel, RgbaImage, imageops};

/// One level of pixel data, rows tightly packed.
#[derive(Clone, Debug, PartialEq)]
pub struct MipLevel {
    pub width: u32,
    pub height: u32,
    pub bytes_per_pixel: u32,
    pub data: Vec<u8>,
}

impl MipLevel {
    #[inline]
    pub fn bytes_per_row(&self) -> u32 {
        self.width * self.bytes_per_pixel
    }
}

/// wgpu has no 24-bit format, so RGB data lands in an RGBA texture.
pub fn texture_format(format: PixelFormat) -> wgpu::TextureFormat {
    match format {
        PixelFormat::Red => wgpu::TextureFormat::R8Unorm,
        PixelFormat::Rgb | PixelFormat::Rgba => wgpu::TextureFormat::Rgba8Unorm,
    }
}

/// Widen any supported layout to RGBA8. Red data keeps sampling as red:
/// `(r, 0, 0, 255)`.
pub fn expand_to_rgba(label: &str, image: ImageBuffer, format: PixelFormat) -> AssetResult<RgbaImage> {
    let ImageBuffer {
        width,
        height,
        pixels,
        ..
    } = image;
    let rgba = match format {
        PixelFormat::Rgba => pixels,
        PixelFormat::Rgb => pixels
            .chunks_exact(3)
            .flat_map(|px| [px[0], px[1], px[2], 255])
            .collect(),
        PixelFormat::Red => pixels.iter().flat_map(|&r| [r, 0, 0, 255]).collect(),
    };
    RgbaImage::from_raw(width, height, rgba)
        .ok_or_else(|| AssetError::image(label, "pixel data does not match image size"))
}

/// Level 0 plus `level_count - 1` successively halved copies, ready for
/// upload in the layout [`texture_format`] picks.
pub fn build_levels(
    label: &str,
    image: ImageBuffer,
    format: PixelFormat,
    level_count: u32,
) -> AssetResult<Vec<MipLevel>> {
    match format {
        PixelFormat::Red => {
            let ImageBuffer {
                width,
                height,
                pixels,
                ..
            } = image;
            let base = GrayImage::from_raw(width, height, pixels)
                .ok_or_else(|| AssetError::image(label, "pixel data does not match image size"))?;
            Ok(mip_chain(base, level_count))
        }
        PixelFormat::Rgb | PixelFormat::Rgba => {
            let base = expand_to_rgba(label, image, format)?;
            Ok(mip_chain(base, level_count))
        }
    }
}

fn mip_chain<P>(base: image::ImageBuffer<P, Vec<u8>>, level_count: u32) -> Vec<MipLevel>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let bytes_per_pixel = u32::from(P::CHANNEL_COUNT);
    let (width, height) = base.dimensions();
    let mut levels = Vec::with_capacity(level_count.max(1) as usize);

    for level in 1..level_count {
        let w = (width >> level).max(1);
        let h = (height >> level).max(1);
        // Always resample from level 0 so errors do not accumulate.
        let mip = imageops::resize(&base, w, h, imageops::FilterType::Triangle);
        levels.push(MipLevel {
            width: w,
            height: h,
            bytes_per_pixel,
            data: mip.into_raw(),
        });
    }

    levels.insert(
        0,
        MipLevel {
            width,
            height,
            bytes_per_pixel,
            data: base.into_raw(),
        },
    );
    levels
}
