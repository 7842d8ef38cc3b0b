//! Shared texture and cube map stores backed by a [`TextureBackend`].

use std::sync::Arc;

use corelib::{AssetError, AssetResult, ResourceKey};

use crate::{
    backend::TextureBackend,
    cache::AssetCache,
    cubemap::{CubeFace, assemble_cube_map, load_cube_map},
    texture::ImageBuffer,
    upload::{load_texture, upload_texture},
};

/// Edge length of the generated default texture and cube faces.
pub const DEFAULT_TEXTURE_SIZE: u32 = 64;

pub struct TextureManager<B: TextureBackend + 'static> {
    backend: Arc<B>,
    textures: AssetCache<ResourceKey, B::Texture>,
    cube_maps: AssetCache<ResourceKey, B::Texture>,
}

impl<B: TextureBackend + 'static> TextureManager<B> {
    /// Upload the checkerboard defaults and start with empty caches.
    ///
    /// Failing to create a default is fatal and reported as
    /// [`AssetError::Bootstrap`].
    pub fn new(backend: Arc<B>) -> AssetResult<Self> {
        let default_texture = upload_texture(
            backend.as_ref(),
            "default texture",
            ImageBuffer::checkerboard(DEFAULT_TEXTURE_SIZE),
        )
        .map_err(|e| bootstrap_error("default texture", e))?;

        let default_cube = assemble_cube_map(backend.as_ref(), "default cube map", |face: CubeFace| {
            Ok((
                format!("default cube map {face}"),
                ImageBuffer::checkerboard(DEFAULT_TEXTURE_SIZE),
            ))
        })
        .map_err(|e| bootstrap_error("default cube map", e))?;
        log::info!("Created default textures ({0}x{0})", DEFAULT_TEXTURE_SIZE);

        let texture_backend = Arc::clone(&backend);
        let cube_backend = Arc::clone(&backend);
        Ok(Self {
            backend,
            textures: AssetCache::new(
                "textures",
                Arc::new(default_texture),
                move |path: &ResourceKey| load_texture(texture_backend.as_ref(), path),
            ),
            cube_maps: AssetCache::new(
                "cube maps",
                Arc::new(default_cube),
                move |path: &ResourceKey| load_cube_map(cube_backend.as_ref(), path),
            ),
        })
    }

    /// Fetch a 2D texture, uploading it on first use. A failed upload is
    /// reported once; later calls get the default texture.
    pub fn get_texture(&self, path: &str) -> AssetResult<Arc<B::Texture>> {
        self.textures.get(&path.to_owned())
    }

    /// Fetch a cube map by the base path its six face files derive from.
    pub fn get_cube_map(&self, base_path: &str) -> AssetResult<Arc<B::Texture>> {
        self.cube_maps.get(&base_path.to_owned())
    }

    pub fn unload_texture(&self, path: &str) -> bool {
        self.textures.unload(&path.to_owned())
    }

    pub fn unload_cube_map(&self, base_path: &str) -> bool {
        self.cube_maps.unload(&base_path.to_owned())
    }

    pub fn clear(&self) {
        self.textures.clear();
        self.cube_maps.clear();
    }

    #[inline]
    pub fn default_texture(&self) -> &Arc<B::Texture> {
        self.textures.fallback()
    }

    #[inline]
    pub fn default_cube_map(&self) -> &Arc<B::Texture> {
        self.cube_maps.fallback()
    }

    #[inline]
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn cube_map_count(&self) -> usize {
        self.cube_maps.len()
    }
}

fn bootstrap_error(what: &str, source: AssetError) -> AssetError {
    log::error!("Failed to create {}: {}", what, source);
    AssetError::Bootstrap {
        path: what.to_owned(),
        source: Box::new(source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::{HeadlessBackend, TextureKind},
        test_support::TempDir,
    };

    fn manager() -> TextureManager<HeadlessBackend> {
        TextureManager::new(Arc::new(HeadlessBackend::new())).expect("defaults")
    }

    #[test]
    fn defaults_are_created_up_front() {
        let textures = manager();
        assert_eq!(textures.backend().live_textures(), 2);
        assert_eq!(textures.default_texture().kind, TextureKind::D2);
        assert_eq!(textures.default_cube_map().kind, TextureKind::Cube);
        assert_eq!(textures.texture_count(), 0);
    }

    #[test]
    fn missing_texture_falls_back_after_first_error() {
        let textures = manager();
        let err = textures.get_texture("textures/brick.png").unwrap_err();
        assert!(
            err.to_string()
                .starts_with("Failed to load texture: \"textures/brick.png\"")
        );

        let again = textures.get_texture("textures/brick.png").expect("fallback");
        assert!(Arc::ptr_eq(&again, textures.default_texture()));
        assert_eq!(textures.backend().created_textures(), 2);
    }

    #[test]
    fn textures_are_uploaded_once_and_released_with_last_handle() {
        let textures = manager();
        let dir = TempDir::new("manager-tex");
        let path = dir.write_png("brick.png", 16, 16, 4);

        let a = textures.get_texture(&path).expect("upload");
        let b = textures.get_texture(&path).expect("hit");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(textures.backend().created_textures(), 3);

        assert!(textures.unload_texture(&path));
        drop(b);
        assert_eq!(textures.backend().live_textures(), 3);
        drop(a);
        assert_eq!(textures.backend().live_textures(), 2);
    }

    #[test]
    fn broken_cube_map_falls_back_to_default_cube() {
        let textures = manager();
        let dir = TempDir::new("manager-cube");
        dir.write_png("sky_right.png", 4, 4, 3);

        let base = dir.path("sky.png");
        let err = textures.get_cube_map(&base).unwrap_err();
        assert!(matches!(err, AssetError::CubeMap { face: "left", .. }));

        let again = textures.get_cube_map(&base).expect("fallback");
        assert!(Arc::ptr_eq(&again, textures.default_cube_map()));
        assert_eq!(textures.backend().live_textures(), 2);
    }

    #[test]
    fn backend_limits_at_startup_are_fatal() {
        let backend = Arc::new(HeadlessBackend::with_max_dimension(16));
        let err = TextureManager::new(backend).err().expect("defaults exceed limit");
        assert!(matches!(err, AssetError::Bootstrap { .. }));
    }

    #[test]
    fn oversized_texture_is_reported_every_time_and_never_defaulted() {
        let textures = TextureManager::new(Arc::new(HeadlessBackend::with_max_dimension(64))).expect("defaults fit");
        let dir = TempDir::new("manager-oversized");
        let path = dir.write_png("huge.png", 128, 128, 4);

        for _ in 0..2 {
            let err = textures.get_texture(&path).unwrap_err();
            assert!(matches!(err, AssetError::Backend(_)));
        }
        assert_eq!(textures.texture_count(), 0);
        assert_eq!(textures.backend().live_textures(), 2);
    }

    #[test]
    fn cube_face_over_the_limit_is_not_defaulted() {
        let textures = TextureManager::new(Arc::new(HeadlessBackend::with_max_dimension(64))).expect("defaults fit");
        let dir = TempDir::new("manager-oversized-cube");
        for face in CubeFace::ALL {
            dir.write_png(&format!("sky_{}.png", face.name()), 128, 128, 3);
        }

        let base = dir.path("sky.png");
        let err = textures.get_cube_map(&base).unwrap_err();
        assert!(matches!(err, AssetError::CubeMap { face: "right", .. }));
        assert!(!err.is_recoverable());
        assert_eq!(textures.cube_map_count(), 0);
        assert!(textures.get_cube_map(&base).is_err());
    }

    #[test]
    fn clear_empties_both_caches() {
        let textures = manager();
        let dir = TempDir::new("manager-clear");
        let path = dir.write_png("a.png", 4, 4, 1);
        textures.get_texture(&path).expect("upload");
        let _ = textures.get_cube_map("nowhere/sky.png");

        assert_eq!((textures.texture_count(), textures.cube_map_count()), (1, 1));
        textures.clear();
        assert_eq!((textures.texture_count(), textures.cube_map_count()), (0, 0));
        assert_eq!(textures.backend().live_textures(), 2);
    }
}
