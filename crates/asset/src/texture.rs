//! Pixel buffers and the format/sampler vocabulary shared by every backend.

/// Decoded image waiting for upload. Eight bits per channel, rows tightly packed.
///
/// Ownership is handed to the uploader, which drops it once the pixels are on
/// the GPU; buffers are never cached.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageBuffer {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub pixels: Vec<u8>,
}

impl ImageBuffer {
    pub fn new(width: u32, height: u32, channels: u8, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            channels,
            pixels,
        }
    }

    /// Byte length implied by the dimensions and channel count.
    #[inline]
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.channels as usize
    }

    /// Check if the buffer is non-empty and its length matches its header.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0 && self.channels > 0 && self.pixels.len() == self.expected_len()
    }

    /// RGBA checkerboard (8px cells), used for default textures.
    pub fn checkerboard(size: u32) -> Self {
        let mut pixels = Vec::with_capacity((size * size * 4) as usize);

        for y in 0..size {
            for x in 0..size {
                if ((x / 8) + (y / 8)) % 2 == 0 {
                    // Magenta
                    pixels.extend_from_slice(&[255, 0, 255, 255]);
                } else {
                    pixels.extend_from_slice(&[0, 0, 0, 255]);
                }
            }
        }

        Self::new(size, size, 4, pixels)
    }

    /// Rewrite the pixels to exactly three bytes each.
    ///
    /// With fewer than three channels the first one is replicated into R, G
    /// and B (grey + alpha becomes grey); with more, the first three are kept.
    pub fn repack_rgb(self) -> Self {
        let channels = self.channels as usize;
        if channels == 3 || channels == 0 {
            return self;
        }
        let mut pixels = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for px in self.pixels.chunks_exact(channels) {
            if channels < 3 {
                pixels.extend_from_slice(&[px[0], px[0], px[0]]);
            } else {
                pixels.extend_from_slice(&px[..3]);
            }
        }
        Self::new(self.width, self.height, 3, pixels)
    }
}

/// Layout the pixels are uploaded with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Red,
    Rgb,
    Rgba,
}

impl PixelFormat {
    /// Map a channel count onto an upload format.
    ///
    /// Returns `None` for counts without a native format; callers treat those
    /// as [`PixelFormat::Rgb`] after repacking.
    pub fn from_channels(channels: u8) -> Option<Self> {
        match channels {
            1 => Some(Self::Red),
            3 => Some(Self::Rgb),
            4 => Some(Self::Rgba),
            _ => None,
        }
    }

    #[inline]
    pub fn channels(self) -> u8 {
        match self {
            Self::Red => 1,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WrapMode {
    Repeat,
    ClampToEdge,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Nearest,
    Linear,
}

/// Sampling state attached to an uploaded texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SamplerDesc {
    /// Applied to every axis.
    pub wrap: WrapMode,
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    /// Filter between mip levels; `None` means the texture has a single level.
    pub mipmap_filter: Option<FilterMode>,
}

impl SamplerDesc {
    /// Standard 2D textures: repeating, pixelated, with a blended mip chain.
    pub const TEXTURE_2D: Self = Self {
        wrap: WrapMode::Repeat,
        min_filter: FilterMode::Nearest,
        mag_filter: FilterMode::Nearest,
        mipmap_filter: Some(FilterMode::Linear),
    };

    /// Cube maps: clamped, smooth, no mipmaps.
    pub const CUBE_MAP: Self = Self {
        wrap: WrapMode::ClampToEdge,
        min_filter: FilterMode::Linear,
        mag_filter: FilterMode::Linear,
        mipmap_filter: None,
    };

    #[inline]
    pub fn has_mipmaps(&self) -> bool {
        self.mipmap_filter.is_some()
    }
}

/// Number of levels in a full mip chain down to 1x1.
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkerboard_alternates_every_eight_pixels() {
        let tex = ImageBuffer::checkerboard(16);
        assert!(tex.is_valid());
        assert_eq!(&tex.pixels[0..4], &[255, 0, 255, 255]);
        let eighth = 8 * 4;
        assert_eq!(&tex.pixels[eighth..eighth + 4], &[0, 0, 0, 255]);
    }

    #[test]
    fn grey_alpha_repacks_to_grey_rgb() {
        let img = ImageBuffer::new(2, 1, 2, vec![10, 200, 30, 100]);
        let rgb = img.repack_rgb();
        assert_eq!(rgb.channels, 3);
        assert_eq!(rgb.pixels, vec![10, 10, 10, 30, 30, 30]);
        assert!(rgb.is_valid());
    }

    #[test]
    fn wide_pixels_are_truncated_to_three_channels() {
        let img = ImageBuffer::new(1, 2, 5, vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        let rgb = img.repack_rgb();
        assert_eq!(rgb.pixels, vec![1, 2, 3, 6, 7, 8]);
    }

    #[test]
    fn only_canonical_channel_counts_have_formats() {
        assert_eq!(PixelFormat::from_channels(1), Some(PixelFormat::Red));
        assert_eq!(PixelFormat::from_channels(3), Some(PixelFormat::Rgb));
        assert_eq!(PixelFormat::from_channels(4), Some(PixelFormat::Rgba));
        assert_eq!(PixelFormat::from_channels(2), None);
        assert_eq!(PixelFormat::from_channels(0), None);
    }

    #[test]
    fn mip_chain_reaches_one_pixel() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(256, 64), 9);
        assert_eq!(mip_level_count(300, 2), 9);
        assert_eq!(mip_level_count(0, 0), 1);
    }
}
