//! Water plane drawn over the terrain
//!
//! A single quad spanning the terrain extent at a fixed level, blended over
//! whatever the terrain pass left in the framebuffer.

use crate::config::AssetPaths;
use crate::rendering::gpu::{Capability, GraphicsApi, Primitive, ShaderStage, UniformValue};
use crate::rendering::{RenderError, RenderResult, ShaderProgram};
use crate::world::terrain::TerrainData;
use glam::{Mat4, Vec3};
use std::path::PathBuf;
use std::rc::Rc;
use tracing::{debug, info, warn};

pub const WATER_PROGRAM: &str = "water";
const WATER_STAGES: [ShaderStage; 2] = [ShaderStage::Vertex, ShaderStage::Fragment];

#[derive(Debug, Clone)]
struct WaterUniforms<L> {
    mv_matrix: Option<L>,
    proj_matrix: Option<L>,
    camera_pos: Option<L>,
    water_level: Option<L>,
    height_scale: Option<L>,
    terrain_extent: Option<L>,
}

impl<L: Clone> WaterUniforms<L> {
    fn resolve<G: GraphicsApi<UniformLocation = L>>(program: &ShaderProgram<G>) -> Self {
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
            camera_pos: find("cameraPos"),
            water_level: find("waterLevel"),
            height_scale: find("heightScale"),
            terrain_extent: find("terrainExtent"),
        }
    }
}

struct WaterResources<G: GraphicsApi> {
    terrain: Rc<TerrainData>,
    water_level: f32,
    program: Option<ShaderProgram<G>>,
    uniforms: WaterUniforms<G::UniformLocation>,
    vao: G::VertexArray,
}

pub struct WaterRenderer<G: GraphicsApi> {
    gl: Rc<G>,
    shader_dir: PathBuf,
    state: Option<WaterResources<G>>,
}

impl<G: GraphicsApi> WaterRenderer<G> {
    pub fn new(gl: Rc<G>, paths: &AssetPaths) -> Self {
        Self {
            gl,
            shader_dir: paths.shader_dir(WATER_PROGRAM),
            state: None,
        }
    }

    pub fn init(&mut self, terrain: Rc<TerrainData>, water_level: f32) -> RenderResult<()> {
        if self.state.is_some() {
            warn!("Water renderer is already initialized");
            return Err(RenderError::AlreadyInitialized);
        }
        info!("Initializing water renderer at level {}", water_level);

        let (program, uniforms) = self.build_program(&terrain, water_level)?;
        let vao = match self.gl.create_vertex_array() {
            Ok(vao) => vao,
            Err(e) => {
                program.destroy();
                return Err(e.into());
            }
        };

        self.state = Some(WaterResources {
            terrain,
            water_level,
            program: Some(program),
            uniforms,
            vao,
        });
        Ok(())
    }

    fn build_program(
        &self,
        terrain: &TerrainData,
        water_level: f32,
    ) -> RenderResult<(ShaderProgram<G>, WaterUniforms<G::UniformLocation>)> {
        let program = ShaderProgram::build(
            self.gl.clone(),
            &self.shader_dir,
            WATER_PROGRAM,
            &WATER_STAGES,
        )?;
        let uniforms = WaterUniforms::resolve(&program);

        program.bind();
        program.set_uniform(uniforms.water_level.as_ref(), UniformValue::Float(water_level));
        program.set_uniform(
            uniforms.height_scale.as_ref(),
            UniformValue::Float(terrain.config().height_scale),
        );
        program.set_uniform(
            uniforms.terrain_extent.as_ref(),
            UniformValue::Float(terrain.config().extent()),
        );
        program.release();

        Ok((program, uniforms))
    }

    pub fn render(&self, camera_pos: Vec3, model_view: &Mat4, projection: &Mat4) {
        let Some(state) = &self.state else {
            warn!("Water render requested before init");
            return;
        };
        let Some(program) = &state.program else {
            warn!("Water program is unavailable, skipping frame");
            return;
        };

        let gl = self.gl.as_ref();
        program.bind();
        gl.bind_vertex_array(Some(state.vao));

        program.set_uniform(
            state.uniforms.mv_matrix.as_ref(),
            UniformValue::Mat4(model_view.to_cols_array()),
        );
        program.set_uniform(
            state.uniforms.proj_matrix.as_ref(),
            UniformValue::Mat4(projection.to_cols_array()),
        );
        program.set_uniform(
            state.uniforms.camera_pos.as_ref(),
            UniformValue::Vec3(camera_pos.to_array()),
        );

        gl.enable(Capability::Blend);
        gl.draw_arrays_instanced(Primitive::TriangleStrip, 0, 4, 1);
        gl.disable(Capability::Blend);

        gl.bind_vertex_array(None);
        program.release();
    }

    /// Rebuild the program from source; the quad geometry is untouched
    pub fn reload_shaders(&mut self) -> RenderResult<()> {
        let Some(state) = self.state.as_mut() else {
            return Err(RenderError::NotInitialized);
        };
        if let Some(old) = state.program.take() {
            old.destroy();
        }

        let terrain = state.terrain.clone();
        let water_level = state.water_level;
        let (program, uniforms) = self.build_program(&terrain, water_level)?;

        if let Some(state) = self.state.as_mut() {
            state.program = Some(program);
            state.uniforms = uniforms;
        }
        debug!("Water shaders reloaded");
        Ok(())
    }

    pub fn cleanup(&mut self) {
        let Some(state) = self.state.take() else {
            debug!("Water renderer cleanup skipped, nothing to release");
            return;
        };
        if let Some(program) = state.program {
            program.destroy();
        }
        self.gl.delete_vertex_array(state.vao);
        info!("Water renderer cleaned up");
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    pub fn water_level(&self) -> Option<f32> {
        self.state.as_ref().map(|s| s.water_level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::gpu::RecordingGl;
    use crate::world::terrain::{TerrainConfig, TerrainGenerator};
    use std::fs;

    fn water_paths(test: &str) -> AssetPaths {
        let base = std::env::temp_dir()
            .join(format!("terrain3d-water-{}-{}", test, std::process::id()));
        let dir = base.join("shaders").join(WATER_PROGRAM);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("water.vs.glsl"),
            "#version 410 core\nuniform mat4 mvMatrix;\nuniform mat4 projMatrix;\n\
             uniform float waterLevel;\nuniform float heightScale;\n\
             uniform float terrainExtent;\nvoid main() {}\n",
        )
        .unwrap();
        fs::write(
            dir.join("water.fs.glsl"),
            "#version 410 core\nuniform vec3 cameraPos;\nout vec4 color;\nvoid main() {}\n",
        )
        .unwrap();
        AssetPaths::under(&base)
    }

    fn terrain() -> Rc<TerrainData> {
        let config = TerrainConfig { size: 32, chunk_size: 16, ..Default::default() };
        Rc::new(TerrainGenerator::new(config).generate().unwrap())
    }

    #[test]
    fn test_frame_blends_one_quad() {
        let gl = Rc::new(RecordingGl::new());
        let mut water = WaterRenderer::new(gl.clone(), &water_paths("frame"));
        water.init(terrain(), 9.0).unwrap();

        water.render(Vec3::new(1.0, 20.0, 1.0), &Mat4::IDENTITY, &Mat4::IDENTITY);

        let draws = gl.draw_calls();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].primitive, Primitive::TriangleStrip);
        assert_eq!(draws[0].count, 4);
        assert!(draws[0].blend);
        assert!(!gl.is_enabled(Capability::Blend));
        assert!(gl.errors().is_empty(), "{:?}", gl.errors());
    }

    #[test]
    fn test_reload_keeps_constants() {
        let gl = Rc::new(RecordingGl::new());
        let mut water = WaterRenderer::new(gl.clone(), &water_paths("reload"));
        water.init(terrain(), 9.0).unwrap();
        water.reload_shaders().unwrap();

        let program = water
            .state
            .as_ref()
            .and_then(|s| s.program.as_ref())
            .map(|p| p.handle())
            .unwrap();
        assert_eq!(gl.program_uniform(program, "waterLevel"), Some(UniformValue::Float(9.0)));
        assert_eq!(gl.program_uniform(program, "terrainExtent"), Some(UniformValue::Float(32.0)));
    }

    #[test]
    fn test_cleanup_releases_everything() {
        let gl = Rc::new(RecordingGl::new());
        let mut water = WaterRenderer::new(gl.clone(), &water_paths("cleanup"));
        water.init(terrain(), 9.0).unwrap();
        water.cleanup();
        water.cleanup();

        assert!(!water.is_initialized());
        assert_eq!(gl.live_objects(), 0);
        assert!(matches!(water.reload_shaders(), Err(RenderError::NotInitialized)));
    }
}
