//! Terrain uniform location table

use super::ShaderProgram;
use crate::rendering::gpu::GraphicsApi;
use tracing::warn;

/// Every uniform the terrain pipeline sets, in declaration order
pub const TERRAIN_UNIFORM_NAMES: [&str; 12] = [
    "mvMatrix",
    "projMatrix",
    "terrainSize",
    "chunkSize",
    "lod",
    "ivd",
    "cameraPos",
    "heightScale",
    "spanSize",
    "spacing",
    "textureMapResolution",
    "heightMapSize",
];

/// Locations resolved against one linked program.
///
/// Locations are only valid for the program they were resolved from; a new
/// table is needed after every link.
#[derive(Debug, Clone)]
pub struct TerrainUniforms<L> {
    pub mv_matrix: Option<L>,
    pub proj_matrix: Option<L>,
    pub terrain_size: Option<L>,
    pub chunk_size: Option<L>,
    pub lod: Option<L>,
    pub ivd: Option<L>,
    pub camera_pos: Option<L>,
    pub height_scale: Option<L>,
    pub span_size: Option<L>,
    pub spacing: Option<L>,
    pub texture_map_resolution: Option<L>,
    pub height_map_size: Option<L>,
}

impl<L: Clone> TerrainUniforms<L> {
    pub fn resolve<G>(program: &ShaderProgram<G>) -> Self
    where
        G: GraphicsApi<UniformLocation = L>,
    {
        let find = |name: &str| {
            let location = program.uniform_location(name);
            if location.is_none() {
                warn!("Uniform '{}' not found in program '{}'", name, program.name());
            }
            location
        };

        Self {
            mv_matrix: find("mvMatrix"),
            proj_matrix: find("projMatrix"),
            terrain_size: find("terrainSize"),
            chunk_size: find("chunkSize"),
            lod: find("lod"),
            ivd: find("ivd"),
            camera_pos: find("cameraPos"),
            height_scale: find("heightScale"),
            span_size: find("spanSize"),
            spacing: find("spacing"),
            texture_map_resolution: find("textureMapResolution"),
            height_map_size: find("heightMapSize"),
        }
    }

    /// Names whose location could not be found
    pub fn unresolved(&self) -> Vec<&'static str> {
        let slots = [
            &self.mv_matrix,
            &self.proj_matrix,
            &self.terrain_size,
            &self.chunk_size,
            &self.lod,
            &self.ivd,
            &self.camera_pos,
            &self.height_scale,
            &self.span_size,
            &self.spacing,
            &self.texture_map_resolution,
            &self.height_map_size,
        ];
        TERRAIN_UNIFORM_NAMES
            .iter()
            .zip(slots)
            .filter(|(_, slot)| slot.is_none())
            .map(|(name, _)| *name)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::gpu::{RecordingGl, ShaderStage};
    use std::fs;
    use std::rc::Rc;

    #[test]
    fn test_partial_program_reports_unresolved_names() {
        let dir = std::env::temp_dir().join(format!("terrain3d-uniforms-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("sample.vs.glsl"),
            "#version 410 core\nuniform mat4 mvMatrix;\nuniform mat4 projMatrix;\nvoid main() {}\n",
        )
        .unwrap();
        fs::write(
            dir.join("sample.fs.glsl"),
            "#version 410 core\nuniform float lod;\nvoid main() {}\n",
        )
        .unwrap();

        let gl = Rc::new(RecordingGl::new());
        let stages = [ShaderStage::Vertex, ShaderStage::Fragment];
        let program = ShaderProgram::build(gl, &dir, "sample", &stages).unwrap();
        let uniforms = TerrainUniforms::resolve(&program);

        assert!(uniforms.mv_matrix.is_some());
        assert!(uniforms.lod.is_some());
        assert_eq!(uniforms.unresolved().len(), 9);
        assert!(!uniforms.unresolved().contains(&"projMatrix"));
        program.destroy();
    }
}
