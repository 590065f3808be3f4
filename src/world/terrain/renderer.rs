//! Tessellated terrain renderer
//!
//! The terrain is drawn as one 4-vertex patch per chunk, instanced across the
//! whole grid. No vertex data exists on the GPU: the tessellation stages place
//! vertices from the instance id and sample heights, light and per-chunk
//! material indices from textures. The water plane is owned and drawn right
//! after the terrain.

use super::TerrainData;
use crate::config::AssetPaths;
use crate::rendering::gpu::{
    GraphicsApi, PixelData, PolygonMode, Primitive, TextureTarget, UniformValue,
};
use crate::rendering::shaders::{TerrainUniforms, TESSELLATION_STAGES};
use crate::rendering::texture::{self, BufferTexture, MaterialImages};
use crate::rendering::{RenderError, RenderMode, RenderResult, ShaderProgram};
use crate::world::water::WaterRenderer;
use glam::{Mat4, Vec3};
use std::rc::Rc;
use tracing::{debug, info, warn};

pub const TERRAIN_PROGRAM: &str = "terrain";

/// Control points per patch
pub const PATCH_VERTICES: i32 = 4;

/// Water sits at this fraction of the height scale
pub const WATER_LEVEL_RATIO: f32 = 0.30;

/// Texture units the terrain samplers are bound to
pub mod unit {
    pub const HEIGHT_MAP: u32 = 0;
    pub const LIGHT_MAP: u32 = 1;
    pub const INDICES: u32 = 2;
    pub const MATERIALS: u32 = 3;
}

/// GPU objects owned while the renderer is ready
struct TerrainResources<G: GraphicsApi> {
    terrain: Rc<TerrainData>,
    /// `None` only after a reload whose link failed
    program: Option<ShaderProgram<G>>,
    uniforms: TerrainUniforms<G::UniformLocation>,
    vao: G::VertexArray,
    height_map: G::Texture,
    light_map: G::Texture,
    indices: BufferTexture<G::Texture, G::Buffer>,
    materials: G::Texture,
}

/// Objects created by an `init` in progress, released if it fails
struct Created<G: GraphicsApi> {
    program: Option<ShaderProgram<G>>,
    vao: Option<G::VertexArray>,
    textures: Vec<G::Texture>,
    buffer: Option<G::Buffer>,
}

impl<G: GraphicsApi> Created<G> {
    fn new() -> Self {
        Self {
            program: None,
            vao: None,
            textures: Vec::new(),
            buffer: None,
        }
    }

    fn release(self, gl: &G) {
        gl.bind_vertex_array(None);
        gl.use_program(None);
        if let Some(buffer) = self.buffer {
            gl.delete_buffer(buffer);
        }
        if let Some(program) = self.program {
            program.destroy();
        }
        for texture in self.textures {
            gl.delete_texture(texture);
        }
        if let Some(vao) = self.vao {
            gl.delete_vertex_array(vao);
        }
    }
}

pub struct TerrainRenderer<G: GraphicsApi> {
    gl: Rc<G>,
    paths: AssetPaths,
    mode: RenderMode,
    lod_factor: f32,
    ivd_factor: f32,
    water: WaterRenderer<G>,
    state: Option<TerrainResources<G>>,
}

impl<G: GraphicsApi> TerrainRenderer<G> {
    pub fn new(gl: Rc<G>, paths: AssetPaths) -> Self {
        let water = WaterRenderer::new(gl.clone(), &paths);
        Self {
            gl,
            paths,
            mode: RenderMode::Normal,
            lod_factor: 1.0,
            ivd_factor: 1.0,
            water,
            state: None,
        }
    }

    /// Create every GPU object the terrain needs.
    ///
    /// On failure nothing created here survives and the renderer stays
    /// uninitialized. A [`RenderError::Link`] is fatal.
    pub fn init(&mut self, terrain: Rc<TerrainData>) -> RenderResult<()> {
        if self.state.is_some() {
            warn!("Terrain renderer is already initialized");
            return Err(RenderError::AlreadyInitialized);
        }

        let config = terrain.config();
        info!(
            "Initializing terrain renderer: {}x{} samples, {} chunks of {}",
            config.size,
            config.size,
            config.chunk_count(),
            config.chunk_size
        );
        debug!("Graphics function table bound");

        let mut created = Created::new();
        match self.create_resources(&terrain, &mut created) {
            Ok(resources) => {
                self.state = Some(resources);
                info!("Terrain renderer initialized");
                Ok(())
            }
            Err(e) => {
                warn!("Terrain renderer init failed, releasing partial state: {}", e);
                created.release(self.gl.as_ref());
                Err(e)
            }
        }
    }

    fn create_resources(
        &mut self,
        terrain: &Rc<TerrainData>,
        created: &mut Created<G>,
    ) -> RenderResult<TerrainResources<G>> {
        let gl = self.gl.clone();
        let config = *terrain.config();

        let (program, uniforms) = self.build_program(terrain)?;
        program.bind();
        let program = created.program.insert(program).handle();

        let vao = gl.create_vertex_array()?;
        created.vao = Some(vao);
        gl.bind_vertex_array(Some(vao));

        let heights = terrain.height_map();
        let height_map = texture::upload_scalar_map(
            gl.as_ref(),
            "height map",
            heights.side(),
            PixelData::RedF32(heights.samples()),
        )?;
        created.textures.push(height_map);

        let light = terrain.light_map();
        let light_map = texture::upload_scalar_map(
            gl.as_ref(),
            "light map",
            light.side(),
            PixelData::RedU16(light.samples()),
        )?;
        created.textures.push(light_map);

        gl.patch_vertices(PATCH_VERTICES);

        let indices = texture::upload_index_texture(gl.as_ref(), terrain.texture_indices())?;
        created.buffer = Some(indices.buffer);
        created.textures.push(indices.texture);

        let images = MaterialImages::load(&self.paths.texture_root)?;
        let materials = texture::upload_material_array(gl.as_ref(), &images)?;
        created.textures.push(materials);

        gl.bind_vertex_array(None);
        gl.use_program(None);
        debug!("Terrain program {:?} and vertex array {:?} ready", program, vao);

        self.water
            .init(terrain.clone(), config.height_scale * WATER_LEVEL_RATIO)?;

        Ok(TerrainResources {
            terrain: terrain.clone(),
            program: created.program.take(),
            uniforms,
            vao,
            height_map,
            light_map,
            indices,
            materials,
        })
    }

    /// Build the terrain program, resolve its uniforms and upload the
    /// per-terrain constants. The program is left unbound.
    fn build_program(
        &self,
        terrain: &TerrainData,
    ) -> RenderResult<(ShaderProgram<G>, TerrainUniforms<G::UniformLocation>)> {
        let program = ShaderProgram::build(
            self.gl.clone(),
            &self.paths.shader_dir(TERRAIN_PROGRAM),
            TERRAIN_PROGRAM,
            &TESSELLATION_STAGES,
        )?;
        let uniforms = TerrainUniforms::resolve(&program);

        let config = terrain.config();
        let map_side = terrain.height_map().side() as i32;
        program.bind();
        program.set_uniform(uniforms.terrain_size.as_ref(), UniformValue::Int(map_side));
        program.set_uniform(
            uniforms.height_scale.as_ref(),
            UniformValue::Float(config.height_scale),
        );
        program.set_uniform(
            uniforms.span_size.as_ref(),
            UniformValue::Int(config.span_size as i32),
        );
        program.set_uniform(
            uniforms.chunk_size.as_ref(),
            UniformValue::Int(config.chunk_size as i32),
        );
        program.set_uniform(uniforms.spacing.as_ref(), UniformValue::Float(config.spacing));
        program.set_uniform(
            uniforms.texture_map_resolution.as_ref(),
            UniformValue::Int(config.texture_map_resolution as i32),
        );
        program.set_uniform(uniforms.height_map_size.as_ref(), UniformValue::Int(map_side));
        program.release();

        Ok((program, uniforms))
    }

    /// Draw one frame of terrain followed by water
    pub fn render(&self, camera_pos: Vec3, model_view: &Mat4, projection: &Mat4) {
        let Some(state) = &self.state else {
            warn!("Terrain render requested before init");
            return;
        };
        let Some(program) = &state.program else {
            warn!("Terrain program is unavailable, skipping frame");
            return;
        };
        let gl = self.gl.as_ref();
        let uniforms = &state.uniforms;

        program.bind();
        gl.bind_vertex_array(Some(state.vao));

        program.set_uniform(
            uniforms.mv_matrix.as_ref(),
            UniformValue::Mat4(model_view.to_cols_array()),
        );
        program.set_uniform(
            uniforms.proj_matrix.as_ref(),
            UniformValue::Mat4(projection.to_cols_array()),
        );
        program.set_uniform(
            uniforms.camera_pos.as_ref(),
            UniformValue::Vec3(camera_pos.to_array()),
        );

        gl.polygon_mode(self.mode.polygon_mode());

        gl.active_texture(unit::HEIGHT_MAP);
        gl.bind_texture(TextureTarget::Texture2D, Some(state.height_map));
        gl.active_texture(unit::LIGHT_MAP);
        gl.bind_texture(TextureTarget::Texture2D, Some(state.light_map));
        gl.active_texture(unit::INDICES);
        gl.bind_texture(TextureTarget::TextureBuffer, Some(state.indices.texture));
        gl.active_texture(unit::MATERIALS);
        gl.bind_texture(TextureTarget::Texture2DArray, Some(state.materials));

        program.set_uniform(uniforms.lod.as_ref(), UniformValue::Float(self.lod_factor));
        program.set_uniform(uniforms.ivd.as_ref(), UniformValue::Float(self.ivd_factor));

        let instances = state.terrain.config().chunk_count() as i32;
        gl.draw_arrays_instanced(Primitive::Patches, 0, PATCH_VERTICES, instances);

        gl.polygon_mode(PolygonMode::Fill);
        gl.bind_vertex_array(None);
        program.release();

        self.water.render(camera_pos, model_view, projection);
    }

    /// Rebuild the terrain and water programs from source.
    ///
    /// Textures and the vertex array are kept. If the terrain program fails
    /// to link the renderer stays initialized but skips frames until a
    /// later reload succeeds.
    pub fn reload_shaders(&mut self) -> RenderResult<()> {
        let Some(state) = self.state.as_mut() else {
            return Err(RenderError::NotInitialized);
        };
        info!("Reloading terrain shaders");

        if let Some(old) = state.program.take() {
            old.destroy();
        }
        let terrain = state.terrain.clone();
        let (program, uniforms) = self.build_program(&terrain)?;

        if let Some(state) = self.state.as_mut() {
            state.program = Some(program);
            state.uniforms = uniforms;
        }

        self.water.reload_shaders()
    }

    /// Release every GPU object; the renderer may be initialized again
    pub fn cleanup(&mut self) {
        let Some(state) = self.state.take() else {
            debug!("Terrain renderer cleanup skipped, nothing to release");
            return;
        };
        let gl = self.gl.as_ref();

        gl.delete_buffer(state.indices.buffer);
        self.water.cleanup();
        if let Some(program) = state.program {
            program.destroy();
        }
        gl.delete_texture(state.height_map);
        gl.delete_texture(state.light_map);
        gl.delete_texture(state.indices.texture);
        gl.delete_texture(state.materials);
        gl.delete_vertex_array(state.vao);

        info!("Terrain renderer cleaned up");
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: RenderMode) {
        debug!("Render mode set to {}", mode);
        self.mode = mode;
    }

    pub fn toggle_wireframe(&mut self) {
        self.set_mode(match self.mode {
            RenderMode::Normal => RenderMode::WireFrame,
            RenderMode::WireFrame => RenderMode::Normal,
        });
    }

    pub fn lod_factor(&self) -> f32 {
        self.lod_factor
    }

    pub fn set_lod_factor(&mut self, factor: f32) {
        self.lod_factor = factor;
    }

    pub fn ivd_factor(&self) -> f32 {
        self.ivd_factor
    }

    pub fn set_ivd_factor(&mut self, factor: f32) {
        self.ivd_factor = factor;
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    /// Terrain being drawn, if initialized
    pub fn terrain(&self) -> Option<&Rc<TerrainData>> {
        self.state.as_ref().map(|s| &s.terrain)
    }

    pub fn water(&self) -> &WaterRenderer<G> {
        &self.water
    }
}
