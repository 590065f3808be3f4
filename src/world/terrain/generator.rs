//! Seeded procedural terrain
//!
//! Heights are fractal value noise normalized to `[0, 1]`. The light map is
//! Lambert shading of the height field against a fixed sun direction, and each
//! chunk picks a material layer from its mean height.

use super::data::{HeightMap, LightMap, TerrainConfig, TerrainData};
use super::TerrainResult;
use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

/// Material layers, matching the order of the material array texture
pub mod layer {
    pub const DIRT: u8 = 0;
    pub const SAND: u8 = 1;
    pub const GRASS: u8 = 2;
    pub const MOUNTAIN: u8 = 3;
}

/// Lattice cells per side for the first octave
const BASE_CELLS: u32 = 4;
/// Light never drops below this share of full intensity
const AMBIENT: f32 = 0.2;

pub struct TerrainGenerator {
    config: TerrainConfig,
    octaves: u32,
    persistence: f32,
    sun_direction: Vec3,
}

impl TerrainGenerator {
    pub fn new(config: TerrainConfig) -> Self {
        Self {
            config,
            octaves: 5,
            persistence: 0.5,
            sun_direction: Vec3::new(-1.0, 2.0, -1.0).normalize(),
        }
    }

    pub fn with_octaves(mut self, octaves: u32) -> Self {
        self.octaves = octaves.max(1);
        self
    }

    pub fn with_persistence(mut self, persistence: f32) -> Self {
        self.persistence = persistence;
        self
    }

    /// Direction towards the light, y up
    pub fn with_sun_direction(mut self, direction: Vec3) -> Self {
        self.sun_direction = direction.normalize_or(Vec3::Y);
        self
    }

    pub fn generate(&self) -> TerrainResult<TerrainData> {
        self.config.validate()?;
        info!(
            "Generating {}x{} terrain (seed {}, {} octaves)",
            self.config.size, self.config.size, self.config.seed, self.octaves
        );

        let height_map = self.height_map()?;
        let light_map = self.light_map(&height_map)?;
        let indices = self.texture_indices(&height_map);
        debug!("Chunk materials: {:?}", indices);

        TerrainData::new(self.config, height_map, light_map, indices)
    }

    pub fn height_map(&self) -> TerrainResult<HeightMap> {
        let side = self.config.size;
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut heights = vec![0.0f32; (side * side) as usize];

        let mut amplitude = 1.0;
        let mut cells = BASE_CELLS;
        for _ in 0..self.octaves {
            let lattice = Lattice::random(&mut rng, cells);
            for y in 0..side {
                for x in 0..side {
                    let u = x as f32 / side as f32 * cells as f32;
                    let v = y as f32 / side as f32 * cells as f32;
                    heights[(y * side + x) as usize] += amplitude * lattice.sample(u, v);
                }
            }
            amplitude *= self.persistence;
            cells *= 2;
        }

        normalize(&mut heights);
        HeightMap::new(side, heights)
    }

    pub fn light_map(&self, heights: &HeightMap) -> TerrainResult<LightMap> {
        let side = heights.side();
        let vertical = self.config.height_scale / self.config.spacing;
        let at = |x: i64, y: i64| {
            let max = side as i64 - 1;
            heights.get(x.clamp(0, max) as u32, y.clamp(0, max) as u32) * vertical
        };

        let mut samples = Vec::with_capacity((side * side) as usize);
        for y in 0..side as i64 {
            for x in 0..side as i64 {
                let dx = (at(x + 1, y) - at(x - 1, y)) * 0.5;
                let dz = (at(x, y + 1) - at(x, y - 1)) * 0.5;
                let normal = Vec3::new(-dx, 1.0, -dz).normalize();
                let diffuse = normal.dot(self.sun_direction).max(0.0);
                let intensity = AMBIENT + (1.0 - AMBIENT) * diffuse;
                samples.push((intensity.clamp(0.0, 1.0) * u16::MAX as f32).round() as u16);
            }
        }

        LightMap::new(side, samples)
    }

    /// One material layer per chunk from the chunk's mean height
    pub fn texture_indices(&self, heights: &HeightMap) -> Vec<u8> {
        let chunk = self.config.chunk_size;
        let per_side = self.config.chunks_per_side();
        let mut indices = Vec::with_capacity(self.config.chunk_count());

        for cy in 0..per_side {
            for cx in 0..per_side {
                let mut sum = 0.0;
                for y in cy * chunk..(cy + 1) * chunk {
                    for x in cx * chunk..(cx + 1) * chunk {
                        sum += heights.get(x, y);
                    }
                }
                indices.push(material_for_height(sum / (chunk * chunk) as f32));
            }
        }
        indices
    }
}

/// Material layer for a normalized height
pub fn material_for_height(height: f32) -> u8 {
    if height < 0.32 {
        layer::SAND
    } else if height < 0.6 {
        layer::GRASS
    } else if height < 0.75 {
        layer::DIRT
    } else {
        layer::MOUNTAIN
    }
}

/// Random values on a `(cells + 1)²` grid
struct Lattice {
    cells: u32,
    values: Vec<f32>,
}

impl Lattice {
    fn random(rng: &mut StdRng, cells: u32) -> Self {
        let count = ((cells + 1) * (cells + 1)) as usize;
        Self {
            cells,
            values: (0..count).map(|_| rng.random::<f32>()).collect(),
        }
    }

    fn value(&self, x: u32, y: u32) -> f32 {
        self.values[(y * (self.cells + 1) + x) as usize]
    }

    /// Smoothstep-interpolated value at lattice coordinates `(u, v)`
    fn sample(&self, u: f32, v: f32) -> f32 {
        let x0 = (u.floor() as u32).min(self.cells - 1);
        let y0 = (v.floor() as u32).min(self.cells - 1);
        let fx = smoothstep(u - x0 as f32);
        let fy = smoothstep(v - y0 as f32);

        let top = lerp(self.value(x0, y0), self.value(x0 + 1, y0), fx);
        let bottom = lerp(self.value(x0, y0 + 1), self.value(x0 + 1, y0 + 1), fx);
        lerp(top, bottom, fy)
    }
}

fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Stretch `values` to span `[0, 1]`; a constant field becomes all zeros
fn normalize(values: &mut [f32]) {
    let (min, max) = values
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = max - min;
    for v in values.iter_mut() {
        *v = if range > f32::EPSILON { (*v - min) / range } else { 0.0 };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::terrain::MATERIAL_LAYERS;

    fn small_config(seed: u64) -> TerrainConfig {
        TerrainConfig {
            size: 64,
            chunk_size: 16,
            seed,
            ..Default::default()
        }
    }

    #[test]
    fn test_generation_is_deterministic_per_seed() {
        let a = TerrainGenerator::new(small_config(7)).generate().unwrap();
        let b = TerrainGenerator::new(small_config(7)).generate().unwrap();
        let c = TerrainGenerator::new(small_config(8)).generate().unwrap();

        assert_eq!(a, b);
        assert_ne!(a.height_map(), c.height_map());
    }

    #[test]
    fn test_heights_span_unit_range() {
        let heights = TerrainGenerator::new(small_config(3)).height_map().unwrap();
        let samples = heights.samples();
        let min = samples.iter().cloned().fold(f32::INFINITY, f32::min);
        let max = samples.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        assert_eq!(min, 0.0);
        assert!((max - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_flat_ground_is_lit_uniformly() {
        let generator = TerrainGenerator::new(small_config(0)).with_sun_direction(Vec3::Y);
        let light = generator.light_map(&HeightMap::flat(64, 0.4)).unwrap();
        assert!(light.samples().iter().all(|&l| l == u16::MAX));
    }

    #[test]
    fn test_slopes_facing_away_are_darker() {
        // Height rises with x, so the surface faces -x
        let side = 16;
        let samples = (0..side * side).map(|i| (i % side) as f32 / side as f32).collect();
        let ramp = HeightMap::new(side, samples).unwrap();

        let config = TerrainConfig { size: 16, chunk_size: 16, ..Default::default() };
        let towards = TerrainGenerator::new(config).with_sun_direction(Vec3::new(-1.0, 1.0, 0.0));
        let away = TerrainGenerator::new(config).with_sun_direction(Vec3::new(1.0, 1.0, 0.0));

        let lit = towards.light_map(&ramp).unwrap().samples()[8 * 16 + 8];
        let shaded = away.light_map(&ramp).unwrap().samples()[8 * 16 + 8];
        assert!(lit > shaded);
    }

    #[test]
    fn test_chunk_materials_follow_mean_height() {
        let generator = TerrainGenerator::new(small_config(0));
        assert_eq!(generator.texture_indices(&HeightMap::flat(64, 0.1)), vec![layer::SAND; 16]);
        assert_eq!(generator.texture_indices(&HeightMap::flat(64, 0.9)), vec![layer::MOUNTAIN; 16]);

        let terrain = generator.generate().unwrap();
        assert_eq!(terrain.texture_indices().len(), 16);
        assert!(terrain.texture_indices().iter().all(|&i| i < MATERIAL_LAYERS));
    }

    #[test]
    fn test_material_thresholds() {
        assert_eq!(material_for_height(0.0), layer::SAND);
        assert_eq!(material_for_height(0.5), layer::GRASS);
        assert_eq!(material_for_height(0.7), layer::DIRT);
        assert_eq!(material_for_height(0.75), layer::MOUNTAIN);
    }
}
