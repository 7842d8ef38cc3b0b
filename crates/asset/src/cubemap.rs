//! Cube maps assembled from six sibling image files.

use std::fmt;

use corelib::{AssetError, AssetResult};

use crate::{
    backend::TextureBackend,
    decode::decode_image,
    texture::{ImageBuffer, SamplerDesc},
    upload::prepare_pixels,
};

/// Cube faces in layer order: +X, -X, +Y, -Y, +Z, -Z.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CubeFace {
    Right,
    Left,
    Top,
    Bottom,
    Front,
    Back,
}

impl CubeFace {
    pub const ALL: [CubeFace; 6] = [
        CubeFace::Right,
        CubeFace::Left,
        CubeFace::Top,
        CubeFace::Bottom,
        CubeFace::Front,
        CubeFace::Back,
    ];

    /// Layer index inside the cube texture.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Suffix used in face file names.
    pub fn name(self) -> &'static str {
        match self {
            CubeFace::Right => "right",
            CubeFace::Left => "left",
            CubeFace::Top => "top",
            CubeFace::Bottom => "bottom",
            CubeFace::Front => "front",
            CubeFace::Back => "back",
        }
    }

    /// `dir/name.ext` -> `dir/name_<face>.ext`. The suffix goes before the
    /// extension of the file name; without one it is appended.
    pub fn path_for(self, base_path: &str) -> String {
        let file_start = base_path
            .rfind(|c: char| c == '/' || c == '\\')
            .map_or(0, |sep| sep + 1);
        match base_path[file_start..].rfind('.') {
            Some(dot) => {
                let (stem, ext) = base_path.split_at(file_start + dot);
                format!("{}_{}{}", stem, self.name(), ext)
            }
            None => format!("{}_{}", base_path, self.name()),
        }
    }
}

impl fmt::Display for CubeFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The six face paths derived from `base_path`, in upload order.
pub fn face_paths(base_path: &str) -> [String; 6] {
    CubeFace::ALL.map(|face| face.path_for(base_path))
}

/// Build a cube map from a per-face image source.
///
/// Faces are requested in [`CubeFace::ALL`] order. The cube object is
/// allocated once the first face is in hand and sized from it; any later
/// failure discards it, so callers never see a partial cube.
pub fn assemble_cube_map<B, F>(backend: &B, label: &str, mut source: F) -> AssetResult<B::Texture>
where
    B: TextureBackend + ?Sized,
    F: FnMut(CubeFace) -> AssetResult<(String, ImageBuffer)>,
{
    let mut cube: Option<(B::CubeBuilder, u32)> = None;

    for face in CubeFace::ALL {
        if let Err(err) = write_face(backend, label, &mut cube, face, &mut source) {
            if let Some((partial, _)) = cube.take() {
                backend.discard_cube_map(partial);
            }
            log::error!("Cube map \"{}\" aborted at face {}: {}", label, face, err);
            return Err(AssetError::CubeMap {
                face: face.name(),
                source: Box::new(err),
            });
        }
    }

    match cube {
        Some((cube, _)) => Ok(backend.finish_cube_map(cube, SamplerDesc::CUBE_MAP)),
        None => Err(AssetError::Backend(format!("cube map \"{label}\" has no faces"))),
    }
}

fn write_face<B, F>(
    backend: &B,
    label: &str,
    cube: &mut Option<(B::CubeBuilder, u32)>,
    face: CubeFace,
    source: &mut F,
) -> AssetResult<()>
where
    B: TextureBackend + ?Sized,
    F: FnMut(CubeFace) -> AssetResult<(String, ImageBuffer)>,
{
    let (face_path, image) = source(face)?;
    let (image, format) = prepare_pixels(&face_path, image)?;

    // The first face fixes the size; every face must be square.
    let face_size = match cube {
        Some((_, size)) => *size,
        None => image.width,
    };
    if image.width != face_size || image.height != face_size {
        return Err(AssetError::image(
            &face_path,
            format!(
                "cube face is {}x{}, expected {}x{}",
                image.width, image.height, face_size, face_size
            ),
        ));
    }

    if cube.is_none() {
        *cube = Some((backend.begin_cube_map(label, face_size)?, face_size));
    }
    match cube {
        Some((builder, _)) => backend.write_cube_face(builder, face, image, format),
        None => Err(AssetError::Backend(format!("cube map \"{label}\" was not allocated"))),
    }
}

/// Decode `base_path`'s six face files and upload them as one cube map.
pub fn load_cube_map<B: TextureBackend + ?Sized>(backend: &B, base_path: &str) -> AssetResult<B::Texture> {
    let texture = assemble_cube_map(backend, base_path, |face| {
        let path = face.path_for(base_path);
        let image = decode_image(&path)?;
        Ok((path, image))
    })?;
    log::info!("Uploaded cube map \"{}\"", base_path);
    Ok(texture)
}
