//! The seam between asset loading and the graphics API.
//!
//! Loaders decode on the CPU and hand finished pixel buffers to a
//! [`TextureBackend`]. Backend objects are released when the returned value is
//! dropped, so sharing them through `Arc` gives "destroy when the last holder
//! lets go" for free.

use std::sync::{
    Arc,
    atomic::{AtomicU64, AtomicUsize, Ordering},
};

use corelib::{AssetError, AssetResult};

use crate::{
    cubemap::CubeFace,
    texture::{ImageBuffer, PixelFormat, SamplerDesc, mip_level_count},
};

/// Creates GPU textures from decoded pixels.
///
/// Every call must happen on the thread that owns the graphics context when
/// the backend requires it. Images passed in are valid and their channel
/// count equals `format.channels()`.
pub trait TextureBackend: Send + Sync {
    /// A finished, sampleable texture.
    type Texture: Send + Sync + 'static;
    /// A cube map whose faces are still being written.
    type CubeBuilder;

    /// Allocate a 2D texture, upload level 0 and, when the sampler asks for
    /// it, the rest of the mip chain.
    fn create_texture_2d(
        &self,
        label: &str,
        image: ImageBuffer,
        format: PixelFormat,
        sampler: SamplerDesc,
    ) -> AssetResult<Self::Texture>;

    /// Allocate an empty cube map with square faces of `face_size` pixels.
    fn begin_cube_map(&self, label: &str, face_size: u32) -> AssetResult<Self::CubeBuilder>;

    /// Upload one face. The image is already known to be `face_size` square.
    fn write_cube_face(
        &self,
        cube: &mut Self::CubeBuilder,
        face: CubeFace,
        image: ImageBuffer,
        format: PixelFormat,
    ) -> AssetResult<()>;

    /// Apply sampling state and turn the builder into a usable texture.
    fn finish_cube_map(&self, cube: Self::CubeBuilder, sampler: SamplerDesc) -> Self::Texture;

    /// Release a partially written cube map.
    fn discard_cube_map(&self, cube: Self::CubeBuilder);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureKind {
    D2,
    Cube,
}

#[derive(Debug, Default)]
struct Counters {
    live: AtomicUsize,
    created: AtomicUsize,
}

/// Decrements the live count when the owning object goes away.
#[derive(Debug)]
struct LiveToken(Arc<Counters>);

impl LiveToken {
    fn acquire(counters: &Arc<Counters>) -> Self {
        counters.live.fetch_add(1, Ordering::SeqCst);
        counters.created.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counters))
    }
}

impl Drop for LiveToken {
    fn drop(&mut self) {
        self.0.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Texture "allocated" by [`HeadlessBackend`]: a record of what was uploaded.
#[derive(Debug)]
pub struct HeadlessTexture {
    pub id: u64,
    pub label: String,
    pub kind: TextureKind,
    pub width: u32,
    pub height: u32,
    /// One entry for 2D textures, six (face order) for cube maps.
    pub formats: Vec<PixelFormat>,
    pub mip_levels: u32,
    pub sampler: SamplerDesc,
    _live: LiveToken,
}

#[derive(Debug)]
pub struct HeadlessCube {
    id: u64,
    label: String,
    face_size: u32,
    faces: [Option<PixelFormat>; 6],
    live: LiveToken,
}

/// Backend without a GPU. Validates uploads, keeps only metadata, and counts
/// live objects; used for asset checking and in tests.
#[derive(Debug)]
pub struct HeadlessBackend {
    counters: Arc<Counters>,
    next_id: AtomicU64,
    max_dimension: u32,
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessBackend {
    /// Largest texture side most desktop GPUs accept.
    pub const DEFAULT_MAX_DIMENSION: u32 = 16384;

    pub fn new() -> Self {
        Self::with_max_dimension(Self::DEFAULT_MAX_DIMENSION)
    }

    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self {
            counters: Arc::default(),
            next_id: AtomicU64::new(1),
            max_dimension,
        }
    }

    /// Objects currently alive (textures plus unfinished cube maps).
    pub fn live_textures(&self) -> usize {
        self.counters.live.load(Ordering::SeqCst)
    }

    /// Objects ever allocated.
    pub fn created_textures(&self) -> usize {
        self.counters.created.load(Ordering::SeqCst)
    }

    fn check_size(&self, label: &str, width: u32, height: u32) -> AssetResult<()> {
        if width == 0 || height == 0 || width > self.max_dimension || height > self.max_dimension {
            return Err(AssetError::Backend(format!(
                "cannot allocate {width}x{height} texture \"{label}\" (limit {})",
                self.max_dimension
            )));
        }
        Ok(())
    }
}

impl TextureBackend for HeadlessBackend {
    type Texture = HeadlessTexture;
    type CubeBuilder = HeadlessCube;

    fn create_texture_2d(
        &self,
        label: &str,
        image: ImageBuffer,
        format: PixelFormat,
        sampler: SamplerDesc,
    ) -> AssetResult<HeadlessTexture> {
        self.check_size(label, image.width, image.height)?;
        let mip_levels = if sampler.has_mipmaps() {
            mip_level_count(image.width, image.height)
        } else {
            1
        };
        Ok(HeadlessTexture {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            label: label.to_owned(),
            kind: TextureKind::D2,
            width: image.width,
            height: image.height,
            formats: vec![format],
            mip_levels,
            sampler,
            _live: LiveToken::acquire(&self.counters),
        })
    }

    fn begin_cube_map(&self, label: &str, face_size: u32) -> AssetResult<HeadlessCube> {
        self.check_size(label, face_size, face_size)?;
        Ok(HeadlessCube {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            label: label.to_owned(),
            face_size,
            faces: [None; 6],
            live: LiveToken::acquire(&self.counters),
        })
    }

    fn write_cube_face(
        &self,
        cube: &mut HeadlessCube,
        face: CubeFace,
        image: ImageBuffer,
        format: PixelFormat,
    ) -> AssetResult<()> {
        debug_assert_eq!((image.width, image.height), (cube.face_size, cube.face_size));
        cube.faces[face.index()] = Some(format);
        Ok(())
    }

    fn finish_cube_map(&self, cube: HeadlessCube, sampler: SamplerDesc) -> HeadlessTexture {
        let formats = cube.faces.iter().map(|f| f.unwrap_or(PixelFormat::Rgba)).collect();
        HeadlessTexture {
            id: cube.id,
            label: cube.label,
            kind: TextureKind::Cube,
            width: cube.face_size,
            height: cube.face_size,
            formats,
            mip_levels: 1,
            sampler,
            _live: cube.live,
        }
    }

    fn discard_cube_map(&self, cube: HeadlessCube) {
        log::debug!("Discarding partial cube map \"{}\"", cube.label);
    }
}
