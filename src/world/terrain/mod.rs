//! Terrain data, generation and the tessellated terrain renderer

pub mod data;
pub mod generator;
pub mod renderer;

pub use data::{HeightMap, LightMap, TerrainConfig, TerrainData, MATERIAL_LAYERS};
pub use generator::TerrainGenerator;
pub use renderer::TerrainRenderer;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TerrainError {
    #[error("Invalid terrain configuration: {0}")]
    InvalidConfig(String),

    #[error("{map} has {actual} samples, expected {expected}")]
    MapSizeMismatch {
        map: &'static str,
        actual: usize,
        expected: usize,
    },

    #[error("Chunk {chunk} selects material layer {layer}, only {layers} exist")]
    InvalidMaterialIndex { chunk: usize, layer: u8, layers: u8 },
}

pub type TerrainResult<T> = Result<T, TerrainError>;
