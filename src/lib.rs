// Terrain3D: tessellated terrain rendering over an explicit GL function table

pub mod config;
pub mod rendering;
pub mod utils;
pub mod world;

// Re-export commonly used types for convenience
pub use config::{AssetPaths, SettingKey, Settings};
pub use rendering::{GlowContext, GraphicsApi, RecordingGl, RenderError, RenderMode, RenderResult};
pub use world::{TerrainConfig, TerrainData, TerrainGenerator, TerrainRenderer, WaterRenderer};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
