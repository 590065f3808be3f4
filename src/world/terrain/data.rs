//! Terrain data shared by the terrain and water renderers
//!
//! A [`TerrainData`] is built once, validated, and never mutated afterwards.
//! Renderers hold it through an `Rc` and only read from it.

use super::{TerrainError, TerrainResult};
use crate::config::{SettingKey, Settings};
use image::{ImageBuffer, Luma};
use serde::{Deserialize, Serialize};

/// Number of material layers a chunk index may select
pub const MATERIAL_LAYERS: u8 = 4;

/// Shape and scale of a terrain
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TerrainConfig {
    /// Height-map side in samples, a power of two
    pub size: u32,
    /// Chunk side in samples; one patch instance per chunk
    pub chunk_size: u32,
    /// Tessellation span, in samples, the shaders refine down to
    pub span_size: u32,
    /// World distance between neighbouring samples
    pub spacing: f32,
    pub height_scale: f32,
    /// How many times a material texture tiles across one chunk
    pub texture_map_resolution: u32,
    pub seed: u64,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            size: 128,
            chunk_size: 32,
            span_size: 8,
            spacing: 1.0,
            height_scale: 30.0,
            texture_map_resolution: 2,
            seed: 0,
        }
    }
}

impl TerrainConfig {
    /// Read the generator and terrain keys from `settings`
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            size: settings.int(SettingKey::GeneratorSize).max(0) as u32,
            chunk_size: settings.int(SettingKey::TerrainBlockSize).max(0) as u32,
            span_size: settings.int(SettingKey::TerrainSpanSize).max(0) as u32,
            spacing: settings.float(SettingKey::TerrainSpacing) as f32,
            height_scale: settings.float(SettingKey::TerrainHeightScale) as f32,
            texture_map_resolution: settings
                .int(SettingKey::GeneratorTextureMapResolution)
                .max(0) as u32,
            seed: settings.int(SettingKey::GeneratorSeed) as u64,
        }
    }

    pub fn validate(&self) -> TerrainResult<()> {
        let invalid = |msg: String| Err(TerrainError::InvalidConfig(msg));

        if self.size == 0 || !self.size.is_power_of_two() {
            return invalid(format!("size {} is not a power of two", self.size));
        }
        if self.chunk_size == 0 || self.size % self.chunk_size != 0 {
            return invalid(format!(
                "chunk size {} does not divide size {}",
                self.chunk_size, self.size
            ));
        }
        if self.span_size == 0 {
            return invalid("span size must be positive".to_string());
        }
        if self.texture_map_resolution == 0 {
            return invalid("texture map resolution must be positive".to_string());
        }
        if !(self.spacing > 0.0) {
            return invalid(format!("spacing {} must be positive", self.spacing));
        }
        if !(self.height_scale > 0.0) {
            return invalid(format!("height scale {} must be positive", self.height_scale));
        }
        Ok(())
    }

    pub fn chunks_per_side(&self) -> u32 {
        self.size / self.chunk_size.max(1)
    }

    /// Number of chunks, which is also the instance count of the terrain draw
    pub fn chunk_count(&self) -> usize {
        let per_side = self.chunks_per_side() as usize;
        per_side * per_side
    }

    /// World-space side length of the terrain
    pub fn extent(&self) -> f32 {
        self.size as f32 * self.spacing
    }
}

/// Square grid of elevations in `[0, 1]`, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct HeightMap {
    side: u32,
    samples: Vec<f32>,
}

impl HeightMap {
    pub fn new(side: u32, samples: Vec<f32>) -> TerrainResult<Self> {
        check_len("height map", samples.len(), side)?;
        Ok(Self { side, samples })
    }

    pub fn flat(side: u32, height: f32) -> Self {
        Self {
            side,
            samples: vec![height; (side * side) as usize],
        }
    }

    pub fn side(&self) -> u32 {
        self.side
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.samples[(y * self.side + x) as usize]
    }

    /// 16-bit grayscale rendition for inspection
    pub fn to_image(&self) -> ImageBuffer<Luma<u16>, Vec<u16>> {
        let pixels = self
            .samples
            .iter()
            .map(|h| (h.clamp(0.0, 1.0) * u16::MAX as f32).round() as u16)
            .collect();
        ImageBuffer::from_raw(self.side, self.side, pixels)
            .unwrap_or_else(|| ImageBuffer::new(self.side, self.side))
    }
}

/// Square grid of light intensities, full `u16` range
#[derive(Debug, Clone, PartialEq)]
pub struct LightMap {
    side: u32,
    samples: Vec<u16>,
}

impl LightMap {
    pub fn new(side: u32, samples: Vec<u16>) -> TerrainResult<Self> {
        check_len("light map", samples.len(), side)?;
        Ok(Self { side, samples })
    }

    pub fn uniform(side: u32, intensity: u16) -> Self {
        Self {
            side,
            samples: vec![intensity; (side * side) as usize],
        }
    }

    pub fn side(&self) -> u32 {
        self.side
    }

    pub fn samples(&self) -> &[u16] {
        &self.samples
    }

    pub fn to_image(&self) -> ImageBuffer<Luma<u16>, Vec<u16>> {
        ImageBuffer::from_raw(self.side, self.side, self.samples.clone())
            .unwrap_or_else(|| ImageBuffer::new(self.side, self.side))
    }
}

fn check_len(map: &'static str, actual: usize, side: u32) -> TerrainResult<()> {
    let expected = side as usize * side as usize;
    if actual != expected {
        return Err(TerrainError::MapSizeMismatch { map, actual, expected });
    }
    Ok(())
}

/// Everything the renderers read about one terrain
#[derive(Debug, Clone, PartialEq)]
pub struct TerrainData {
    config: TerrainConfig,
    height_map: HeightMap,
    light_map: LightMap,
    texture_indices: Vec<u8>,
}

impl TerrainData {
    pub fn new(
        config: TerrainConfig,
        height_map: HeightMap,
        light_map: LightMap,
        texture_indices: Vec<u8>,
    ) -> TerrainResult<Self> {
        config.validate()?;

        let expected = config.size as usize * config.size as usize;
        if height_map.side() != config.size {
            return Err(TerrainError::MapSizeMismatch {
                map: "height map",
                actual: height_map.samples().len(),
                expected,
            });
        }
        if light_map.side() != config.size {
            return Err(TerrainError::MapSizeMismatch {
                map: "light map",
                actual: light_map.samples().len(),
                expected,
            });
        }
        if texture_indices.len() != config.chunk_count() {
            return Err(TerrainError::MapSizeMismatch {
                map: "texture indices",
                actual: texture_indices.len(),
                expected: config.chunk_count(),
            });
        }
        if let Some((chunk, &layer)) = texture_indices
            .iter()
            .enumerate()
            .find(|(_, &layer)| layer >= MATERIAL_LAYERS)
        {
            return Err(TerrainError::InvalidMaterialIndex {
                chunk,
                layer,
                layers: MATERIAL_LAYERS,
            });
        }

        Ok(Self {
            config,
            height_map,
            light_map,
            texture_indices,
        })
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    pub fn height_map(&self) -> &HeightMap {
        &self.height_map
    }

    pub fn light_map(&self) -> &LightMap {
        &self.light_map
    }

    /// One material layer per chunk, row-major by chunk
    pub fn texture_indices(&self) -> &[u8] {
        &self.texture_indices
    }

    pub fn size(&self) -> u32 {
        self.config.size
    }
}
