pub mod gpu;
pub mod shaders;
pub mod texture;

// Re-export the pieces the renderers are assembled from
pub use gpu::{GlowContext, GraphicsApi, RecordingGl};
pub use shaders::{ShaderDiagnostic, ShaderProgram};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Renderer is already initialized; call cleanup() first")]
    AlreadyInitialized,

    #[error("Renderer is not initialized")]
    NotInitialized,

    #[error("Problem linking shaders for '{program}': {log}")]
    Link {
        program: String,
        log: String,
        diagnostics: Vec<ShaderDiagnostic>,
    },

    #[error(transparent)]
    Gpu(#[from] gpu::GpuError),

    #[error("Failed to load texture {}: {source}", .path.display())]
    TextureLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error(
        "Material texture {} is {width}x{height}, expected {expected}x{expected}",
        .path.display()
    )]
    MaterialSizeMismatch {
        path: PathBuf,
        width: u32,
        height: u32,
        expected: u32,
    },
}

impl RenderError {
    /// Link failures leave no usable program behind; the caller is expected
    /// to stop rather than keep issuing frames.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RenderError::Link { .. })
    }
}

pub type RenderResult<T> = Result<T, RenderError>;

/// Polygon fill selection for the terrain draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    #[default]
    Normal,
    WireFrame,
}

impl RenderMode {
    pub fn from_wireframe(wireframe: bool) -> Self {
        if wireframe {
            RenderMode::WireFrame
        } else {
            RenderMode::Normal
        }
    }

    pub fn polygon_mode(self) -> gpu::PolygonMode {
        match self {
            RenderMode::Normal => gpu::PolygonMode::Fill,
            RenderMode::WireFrame => gpu::PolygonMode::Line,
        }
    }
}

impl std::fmt::Display for RenderMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderMode::Normal => write!(f, "Normal"),
            RenderMode::WireFrame => write!(f, "WireFrame"),
        }
    }
}
