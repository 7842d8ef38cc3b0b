//! Entry point for Kiln.
//! Loads the requested scenes, textures and cube maps through the shared
//! caches and reports which ones fell back to their defaults.

use std::sync::Arc;

use anyhow::{Context, Result};
use asset::{HeadlessBackend, SceneManager, TextureBackend, TextureManager, scene::ERROR_SCENE_PATH};
use renderer::WgpuBackend;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BackendChoice {
    Gpu(wgpu::Backends),
    Headless,
}

#[derive(Debug, PartialEq)]
struct AppConfig {
    backend: BackendChoice,
    error_scene: String,
    scenes: Vec<String>,
    textures: Vec<String>,
    cube_maps: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: BackendChoice::Gpu(wgpu::Backends::all()),
            error_scene: ERROR_SCENE_PATH.to_owned(),
            scenes: Vec::new(),
            textures: Vec::new(),
            cube_maps: Vec::new(),
        }
    }
}

impl AppConfig {
    fn from_args(args: impl IntoIterator<Item = String>) -> Self {
        let mut config = Self::default();
        for arg in args {
            if let Some(val) = arg.strip_prefix("--gpu-backend=") {
                config.backend = parse_backend(val);
            } else if let Some(val) = arg.strip_prefix("--error-scene=") {
                config.error_scene = val.to_owned();
            } else if let Some(val) = arg.strip_prefix("--scene=") {
                config.scenes.push(val.to_owned());
            } else if let Some(val) = arg.strip_prefix("--texture=") {
                config.textures.push(val.to_owned());
            } else if let Some(val) = arg.strip_prefix("--cubemap=") {
                config.cube_maps.push(val.to_owned());
            } else if arg.starts_with("--") {
                log::warn!("Ignoring unknown argument '{}'", arg);
            }
        }
        config
    }

    fn asset_count(&self) -> usize {
        self.scenes.len() + self.textures.len() + self.cube_maps.len()
    }
}

fn parse_backend(val: &str) -> BackendChoice {
    // Accept: auto|vulkan|dx12|metal|gl|headless
    match val.to_ascii_lowercase().as_str() {
        "auto" => BackendChoice::Gpu(wgpu::Backends::all()),
        "vulkan" | "vk" => BackendChoice::Gpu(wgpu::Backends::VULKAN),
        "dx12" | "d3d12" => BackendChoice::Gpu(wgpu::Backends::DX12),
        "metal" | "mtl" => BackendChoice::Gpu(wgpu::Backends::METAL),
        "gl" | "opengl" | "gles" => BackendChoice::Gpu(wgpu::Backends::GL),
        "headless" | "none" => BackendChoice::Headless,
        other => {
            log::warn!("Unknown backend '{}', falling back to auto.", other);
            BackendChoice::Gpu(wgpu::Backends::all())
        }
    }
}

/// Load everything `config` names. Returns how many loads failed.
fn run<B: TextureBackend + 'static>(backend: Arc<B>, config: &AppConfig) -> Result<usize> {
    let scenes = SceneManager::with_error_scene(&config.error_scene)
        .context("cannot start without an error scene")?;
    let textures = TextureManager::new(backend).context("cannot create default textures")?;
    let mut failed = 0;

    for path in &config.scenes {
        match scenes.get_scene(path) {
            Ok(scene) if Arc::ptr_eq(&scene, scenes.error_scene()) => {
                log::warn!("Scene \"{}\": using error scene", path)
            }
            Ok(scene) => log::info!(
                "Scene \"{}\": {} meshes, {} triangles",
                path,
                scene.meshes().len(),
                scene.triangle_count()
            ),
            Err(e) => {
                failed += 1;
                log::error!("{}", e);
            }
        }
    }

    for path in &config.textures {
        match textures.get_texture(path) {
            Ok(texture) if Arc::ptr_eq(&texture, textures.default_texture()) => {
                log::warn!("Texture \"{}\": using default texture", path)
            }
            Ok(_) => log::info!("Texture \"{}\": ok", path),
            Err(e) => {
                failed += 1;
                log::error!("{}", e);
            }
        }
    }

    for path in &config.cube_maps {
        match textures.get_cube_map(path) {
            Ok(cube) if Arc::ptr_eq(&cube, textures.default_cube_map()) => {
                log::warn!("Cube map \"{}\": using default cube map", path)
            }
            Ok(_) => log::info!("Cube map \"{}\": ok", path),
            Err(e) => {
                failed += 1;
                log::error!("{}", e);
            }
        }
    }

    Ok(failed)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_args(std::env::args().skip(1));
    log::info!(
        "Starting Kiln. Backend: {:?}, error_scene={}, assets={}",
        config.backend,
        config.error_scene,
        config.asset_count()
    );

    let failed = match config.backend {
        BackendChoice::Headless => run(Arc::new(HeadlessBackend::new()), &config)?,
        BackendChoice::Gpu(backends) => match WgpuBackend::new_blocking(backends) {
            Ok(gpu) => run(Arc::new(gpu), &config)?,
            Err(e) => {
                log::warn!("{}; falling back to headless backend.", e);
                run(Arc::new(HeadlessBackend::new()), &config)?
            }
        },
    };

    if failed > 0 {
        anyhow::bail!("{} of {} assets failed to load", failed, config.asset_count());
    }
    log::info!("All {} assets loaded. Bye!", config.asset_count());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_use_all_backends_and_build_time_error_scene() {
        let config = AppConfig::from_args(Vec::new());
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.error_scene, ERROR_SCENE_PATH);
    }

    #[test]
    fn asset_flags_are_repeatable() {
        let config = AppConfig::from_args(args(&[
            "--gpu-backend=Headless",
            "--scene=a.obj",
            "--scene=b.obj",
            "--texture=t.png",
            "--cubemap=sky/space.png",
            "--error-scene=err.obj",
        ]));
        assert_eq!(config.backend, BackendChoice::Headless);
        assert_eq!(config.scenes, ["a.obj", "b.obj"]);
        assert_eq!(config.textures, ["t.png"]);
        assert_eq!(config.cube_maps, ["sky/space.png"]);
        assert_eq!(config.error_scene, "err.obj");
        assert_eq!(config.asset_count(), 4);
    }

    #[test]
    fn unknown_backend_falls_back_to_auto() {
        assert_eq!(parse_backend("vk"), BackendChoice::Gpu(wgpu::Backends::VULKAN));
        assert_eq!(parse_backend("glide"), BackendChoice::Gpu(wgpu::Backends::all()));
    }

    #[test]
    fn missing_assets_are_counted_once_per_request() {
        let config = AppConfig {
            error_scene: concat!(env!("CARGO_MANIFEST_DIR"), "/../../assets/models/error.obj").to_owned(),
            scenes: args(&["models/hero.gltf", "models/hero.gltf"]),
            textures: args(&["missing.png"]),
            ..AppConfig::default()
        };
        let failed = run(Arc::new(HeadlessBackend::new()), &config).expect("bootstrap");
        assert_eq!(failed, 2);
    }

    #[test]
    fn missing_error_scene_stops_the_run() {
        let config = AppConfig {
            error_scene: "nowhere/error.obj".to_owned(),
            ..AppConfig::default()
        };
        assert!(run(Arc::new(HeadlessBackend::new()), &config).is_err());
    }
}
