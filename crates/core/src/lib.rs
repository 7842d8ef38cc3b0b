//! Core shared types and errors (renderer-agnostic).

use thiserror::Error;

/// Identity of a cached resource: the path exactly as the caller supplied it.
pub type ResourceKey = String;

/// Everything that can go wrong while producing an asset.
///
/// Errors are `Clone` so that every caller joined on one in-flight load can
/// observe the same failure.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum AssetError {
    /// Image file missing, unreadable or not a supported encoding.
    #[error("Failed to load texture: \"{path}\": {reason}")]
    Image { path: String, reason: String },

    /// Scene file missing, unreadable or malformed.
    #[error("Failed to load scene: {path}: {reason}")]
    Scene { path: String, reason: String },

    /// One face of a cube map failed; the whole cube map was discarded.
    #[error("Failed to load cubemap face '{face}': {source}")]
    CubeMap {
        face: &'static str,
        source: Box<AssetError>,
    },

    /// A fallback resource (error scene, default texture) could not be created
    /// at startup.
    #[error("Failed to load fallback \"{path}\": {source}")]
    Bootstrap {
        path: String,
        source: Box<AssetError>,
    },

    /// The graphics backend refused an allocation or upload.
    #[error("Graphics backend error: {0}")]
    Backend(String),

    /// The load this caller was waiting on never finished.
    #[error("Load of \"{key}\" was aborted")]
    Aborted { key: String },
}

impl AssetError {
    pub fn image(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::Image {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn scene(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::Scene {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether a cache may answer this failure with its fallback resource.
    ///
    /// Bad or missing files are; a broken backend, an aborted load or a
    /// failed bootstrap are not and must reach every caller.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Image { .. } | Self::Scene { .. } => true,
            Self::CubeMap { source, .. } => source.is_recoverable(),
            Self::Bootstrap { .. } | Self::Backend(_) | Self::Aborted { .. } => false,
        }
    }

    /// Path of the file that failed, when the error is tied to one.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Image { path, .. } | Self::Scene { path, .. } | Self::Bootstrap { path, .. } => {
                Some(path)
            }
            Self::CubeMap { source, .. } => source.path(),
            Self::Backend(_) | Self::Aborted { .. } => None,
        }
    }
}

pub type AssetResult<T> = Result<T, AssetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_error_message_names_path_and_reason() {
        let err = AssetError::scene("models/hero.gltf", "No such file or directory (os error 2)");
        assert_eq!(
            err.to_string(),
            "Failed to load scene: models/hero.gltf: No such file or directory (os error 2)"
        );
    }

    #[test]
    fn cube_map_error_reports_face_and_inner_path() {
        let inner = AssetError::image("sky/space_bottom.png", "missing");
        let err = AssetError::CubeMap {
            face: "bottom",
            source: Box::new(inner),
        };
        assert!(err.to_string().starts_with("Failed to load cubemap face 'bottom'"));
        assert_eq!(err.path(), Some("sky/space_bottom.png"));
    }

    #[test]
    fn only_file_errors_are_recoverable() {
        assert!(AssetError::image("a.png", "missing").is_recoverable());
        assert!(AssetError::scene("a.obj", "missing").is_recoverable());
        assert!(!AssetError::Backend("device lost".into()).is_recoverable());
        assert!(!AssetError::Aborted { key: "a.png".into() }.is_recoverable());

        let face_missing = AssetError::CubeMap {
            face: "top",
            source: Box::new(AssetError::image("sky_top.png", "missing")),
        };
        let face_too_big = AssetError::CubeMap {
            face: "right",
            source: Box::new(AssetError::Backend("too large".into())),
        };
        assert!(face_missing.is_recoverable());
        assert!(!face_too_big.is_recoverable());
    }
}
