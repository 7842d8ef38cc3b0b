//! Decode-and-upload path for standard 2D textures.

use corelib::{AssetError, AssetResult};

use crate::{
    backend::TextureBackend,
    decode::decode_image,
    texture::{ImageBuffer, PixelFormat, SamplerDesc},
};

/// Validate a decoded buffer and settle its upload format.
///
/// Channel counts without a native format are repacked to RGB with a
/// warning; that is never an error.
pub fn prepare_pixels(label: &str, image: ImageBuffer) -> AssetResult<(ImageBuffer, PixelFormat)> {
    if image.width == 0 || image.height == 0 {
        return Err(AssetError::image(label, "image has no pixels"));
    }
    if image.channels == 0 || image.pixels.len() != image.expected_len() {
        return Err(AssetError::image(
            label,
            format!(
                "pixel data is {} bytes, expected {} for {}x{} with {} channels",
                image.pixels.len(),
                image.expected_len(),
                image.width,
                image.height,
                image.channels
            ),
        ));
    }

    match PixelFormat::from_channels(image.channels) {
        Some(format) => Ok((image, format)),
        None => {
            log::warn!(
                "Unknown channel count {} in \"{}\", defaulting to RGB",
                image.channels,
                label
            );
            Ok((image.repack_rgb(), PixelFormat::Rgb))
        }
    }
}

/// Upload a decoded image as a repeating, mipmapped 2D texture.
/// The buffer is consumed and freed once the backend returns.
pub fn upload_texture<B: TextureBackend + ?Sized>(
    backend: &B,
    label: &str,
    image: ImageBuffer,
) -> AssetResult<B::Texture> {
    let (image, format) = prepare_pixels(label, image)?;
    backend.create_texture_2d(label, image, format, SamplerDesc::TEXTURE_2D)
}

/// Decode `path` and upload it.
pub fn load_texture<B: TextureBackend + ?Sized>(backend: &B, path: &str) -> AssetResult<B::Texture> {
    let image = decode_image(path)?;
    let texture = upload_texture(backend, path, image)?;
    log::info!("Uploaded texture \"{}\"", path);
    Ok(texture)
}
