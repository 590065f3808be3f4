use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Roots the renderers load shader sources and material images from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetPaths {
    pub shader_root: PathBuf,
    pub texture_root: PathBuf,
}

impl Default for AssetPaths {
    fn default() -> Self {
        Self {
            shader_root: PathBuf::from("shaders"),
            texture_root: PathBuf::from("textures"),
        }
    }
}

impl AssetPaths {
    pub fn new(shader_root: impl Into<PathBuf>, texture_root: impl Into<PathBuf>) -> Self {
        Self {
            shader_root: shader_root.into(),
            texture_root: texture_root.into(),
        }
    }

    /// Both roots resolved against `base`
    pub fn under(base: &Path) -> Self {
        let defaults = Self::default();
        Self::new(base.join(defaults.shader_root), base.join(defaults.texture_root))
    }

    /// Directory holding the stage files of program `name`
    pub fn shader_dir(&self, name: &str) -> PathBuf {
        self.shader_root.join(name)
    }
}
