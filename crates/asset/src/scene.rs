//! Scene resources and the file loader that produces them.

use std::{fs::File, io::BufReader, path::Path, time::Instant};

use corelib::{AssetError, AssetResult};

use crate::{mesh::MeshData, obj};

/// Scene substituted for every scene that fails to load.
/// Override at build time with `KILN_ERROR_SCENE=<path>`.
pub const ERROR_SCENE_PATH: &str = match option_env!("KILN_ERROR_SCENE") {
    Some(path) => path,
    None => "assets/models/error.obj",
};

/// A loaded model: the meshes of one scene file.
#[derive(Clone, Debug, PartialEq)]
pub struct Scene {
    name: String,
    meshes: Vec<MeshData>,
}

impl Scene {
    pub fn new(name: impl Into<String>, meshes: Vec<MeshData>) -> Self {
        Self {
            name: name.into(),
            meshes,
        }
    }

    /// Source path the scene was loaded from.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn meshes(&self) -> &[MeshData] {
        &self.meshes
    }

    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(|m| m.vertices.len()).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(MeshData::triangle_count).sum()
    }
}

/// Load a scene file. The format is chosen by extension; only Wavefront OBJ
/// is understood.
pub fn load_scene(path: &str) -> AssetResult<Scene> {
    let start = Instant::now();
    let file = File::open(path).map_err(|e| AssetError::scene(path, e))?;

    let extension = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    let meshes = match extension.as_deref() {
        Some("obj") => obj::read_obj_meshes(BufReader::new(file))
            .map_err(|e| AssetError::scene(path, format!("{e:#}")))?,
        Some(other) => {
            return Err(AssetError::scene(
                path,
                format!("unsupported scene format '.{other}'"),
            ));
        }
        None => return Err(AssetError::scene(path, "missing file extension")),
    };

    let scene = Scene::new(path, meshes);
    log::debug!(
        "Loaded scene \"{}\": {} meshes, {} vertices, {} triangles in {}ms",
        path,
        scene.meshes.len(),
        scene.vertex_count(),
        scene.triangle_count(),
        start.elapsed().as_millis()
    );
    Ok(scene)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TempDir;

    #[test]
    fn missing_file_reports_scene_error_with_path() {
        let err = load_scene("models/hero.gltf").unwrap_err();
        match &err {
            AssetError::Scene { path, .. } => assert_eq!(path, "models/hero.gltf"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(
            err.to_string()
                .starts_with("Failed to load scene: models/hero.gltf: ")
        );
    }

    #[test]
    fn unsupported_extension_is_a_scene_error() {
        let dir = TempDir::new("scene-ext");
        let path = dir.write("model.fbx", b"not really fbx");
        let err = load_scene(&path).unwrap_err();
        assert!(err.to_string().contains("unsupported scene format '.fbx'"));
    }

    #[test]
    fn obj_file_loads_into_named_meshes() {
        let dir = TempDir::new("scene-obj");
        let path = dir.write(
            "crate.OBJ",
            b"v 0 0 0\nv 1 0 0\nv 0 1 0\no lid\nf 1 2 3\n",
        );
        let scene = load_scene(&path).expect("load obj scene");
        assert_eq!(scene.name(), path);
        assert_eq!(scene.meshes().len(), 1);
        assert_eq!(scene.meshes()[0].name, "lid");
        assert_eq!(scene.triangle_count(), 1);
    }

    #[test]
    fn parse_failure_keeps_parser_context() {
        let dir = TempDir::new("scene-bad");
        let path = dir.write("broken.obj", b"v 0 zero 0\n");
        let err = load_scene(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse y coordinate on line 1"));
    }

    #[test]
    fn shipped_error_scene_is_loadable() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../assets/models/error.obj");
        let scene = load_scene(path).expect("bundled error scene");
        assert!(scene.meshes().iter().all(MeshData::is_valid));
        assert_eq!(scene.triangle_count(), 12);
    }
}
