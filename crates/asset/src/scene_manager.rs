//! Shared scene store with an error scene standing in for failed loads.

use std::sync::Arc;

use corelib::{AssetError, AssetResult, ResourceKey};

use crate::{
    cache::AssetCache,
    scene::{ERROR_SCENE_PATH, Scene, load_scene},
};

pub type SharedScene = Arc<Scene>;

pub struct SceneManager {
    scenes: AssetCache<ResourceKey, Scene>,
}

impl SceneManager {
    /// Load the build-configured error scene and start with an empty cache.
    ///
    /// Fails with [`AssetError::Bootstrap`] when the error scene itself cannot
    /// be loaded; there is nothing to fall back to, so callers must not go on.
    pub fn new() -> AssetResult<Self> {
        Self::with_error_scene(ERROR_SCENE_PATH)
    }

    pub fn with_error_scene(error_scene_path: &str) -> AssetResult<Self> {
        Self::with_loader(error_scene_path, load_scene)
    }

    /// Build a manager around a custom scene loader. The loader is also used
    /// for the error scene.
    pub fn with_loader<F>(error_scene_path: &str, loader: F) -> AssetResult<Self>
    where
        F: Fn(&str) -> AssetResult<Scene> + Send + Sync + 'static,
    {
        let error_scene = loader(error_scene_path).map_err(|source| {
            log::error!("Failed to load error scene \"{}\": {}", error_scene_path, source);
            AssetError::Bootstrap {
                path: error_scene_path.to_owned(),
                source: Box::new(source),
            }
        })?;
        log::info!("Loaded error scene \"{}\"", error_scene_path);

        Ok(Self {
            scenes: AssetCache::new("scenes", Arc::new(error_scene), move |path: &ResourceKey| {
                loader(path.as_str())
            }),
        })
    }

    /// Fetch a scene, loading it on first use.
    ///
    /// The first failed load of `path` returns the error; from then on the
    /// error scene is returned for it.
    pub fn get_scene(&self, path: &str) -> AssetResult<SharedScene> {
        self.scenes.get(&path.to_owned())
    }

    pub fn unload_scene(&self, path: &str) -> bool {
        self.scenes.unload(&path.to_owned())
    }

    pub fn clear(&self) {
        self.scenes.clear();
    }

    #[inline]
    pub fn error_scene(&self) -> &SharedScene {
        self.scenes.fallback()
    }

    pub fn scene_count(&self) -> usize {
        self.scenes.len()
    }
}
