//! Asset loading and caching.
//! Scenes come from OBJ files; textures and cube maps are decoded with
//! `image` and handed to a [`backend::TextureBackend`] for upload.
//! Every cache keeps a fallback resource that replaces any asset that failed
//! to load, so a missing file costs one error and never a crash.

pub mod backend;
pub mod cache;
pub mod cubemap;
pub mod decode;
pub mod mesh;
pub mod obj;
pub mod scene;
pub mod scene_manager;
pub mod texture;
pub mod texture_manager;
pub mod upload;

#[cfg(test)]
mod test_support;

pub use backend::{HeadlessBackend, TextureBackend};
pub use cache::AssetCache;
pub use cubemap::CubeFace;
pub use scene::Scene;
pub use scene_manager::SceneManager;
pub use texture::{ImageBuffer, PixelFormat, SamplerDesc};
pub use texture_manager::TextureManager;
