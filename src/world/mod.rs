pub mod terrain;
pub mod water;

// Re-export the world renderers for easier access
pub use terrain::{TerrainConfig, TerrainData, TerrainGenerator, TerrainRenderer};
pub use water::WaterRenderer;
