//! Headless graphics backend
//!
//! `RecordingGl` implements [`GraphicsApi`] without a driver. It keeps the
//! object model of a GL context (names, bindings, storage, uploaded texels,
//! uniform values) in memory and logs every call, so renderer behavior can be
//! checked frame by frame without a window. Misuse a real driver would flag
//! (binding unknown names, drawing without a program or VAO) is collected in
//! [`RecordingGl::errors`].
//!
//! Two rules are stricter than GL: a program only links when it has vertex
//! and fragment stages and its tessellation stages come in pairs, and a
//! stage only compiles when its source declares `main`.

use super::{
    BufferTarget, Capability, GpuResult, GraphicsApi, PixelData, PolygonMode, Primitive,
    ShaderStage, TextureFormat, TextureParameter, TextureTarget, UniformValue,
};
use std::cell::RefCell;
use std::collections::HashMap;

pub type Name = u32;

/// One call issued against the context
#[derive(Debug, Clone, PartialEq)]
pub enum GlCommand {
    CreateShader { stage: ShaderStage, shader: Name },
    CompileShader { shader: Name, ok: bool },
    DeleteShader(Name),
    CreateProgram(Name),
    AttachShader { program: Name, shader: Name },
    DetachShader { program: Name, shader: Name },
    LinkProgram { program: Name, ok: bool },
    UseProgram(Option<Name>),
    DeleteProgram(Name),
    SetUniform { location: Name, value: UniformValue },
    CreateVertexArray(Name),
    BindVertexArray(Option<Name>),
    DeleteVertexArray(Name),
    CreateTexture(Name),
    ActiveTexture(u32),
    BindTexture { target: TextureTarget, texture: Option<Name> },
    TexStorage {
        target: TextureTarget,
        levels: i32,
        format: TextureFormat,
        width: i32,
        height: i32,
        depth: i32,
    },
    TexSubImage { target: TextureTarget, layer: i32, width: i32, height: i32, bytes: usize },
    TexParameter { target: TextureTarget, parameter: TextureParameter },
    GenerateMipmap(TextureTarget),
    TexBuffer { format: TextureFormat, buffer: Option<Name> },
    DeleteTexture(Name),
    CreateBuffer(Name),
    BindBuffer { target: BufferTarget, buffer: Option<Name> },
    BufferData { target: BufferTarget, bytes: usize },
    DeleteBuffer(Name),
    PatchVertices(i32),
    PolygonMode(PolygonMode),
    Enable(Capability),
    Disable(Capability),
    DrawArraysInstanced(DrawCall),
}

/// Snapshot of the pipeline state at a draw
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub primitive: Primitive,
    pub first: i32,
    pub count: i32,
    pub instances: i32,
    pub program: Option<Name>,
    pub vertex_array: Option<Name>,
    pub polygon_mode: PolygonMode,
    pub patch_vertices: Option<i32>,
    pub blend: bool,
    /// `(unit, target, texture)`, sorted by unit
    pub textures: Vec<(u32, TextureTarget, Name)>,
}

/// Storage description of a texture object
#[derive(Debug, Clone, PartialEq)]
pub struct TextureInfo {
    pub target: Option<TextureTarget>,
    pub format: Option<TextureFormat>,
    pub width: i32,
    pub height: i32,
    pub depth: i32,
    pub levels: i32,
    pub parameters: Vec<TextureParameter>,
    pub mipmaps_generated: bool,
    pub buffer: Option<Name>,
}

#[derive(Debug)]
struct ShaderObject {
    stage: ShaderStage,
    source: String,
    compiled: bool,
    delete_pending: bool,
}

#[derive(Debug, Default)]
struct ProgramObject {
    attached: Vec<Name>,
    linked: bool,
    uniforms: HashMap<String, Name>,
    values: HashMap<Name, UniformValue>,
}

#[derive(Debug)]
struct TextureObject {
    info: TextureInfo,
    layers: Vec<Vec<u8>>,
}

#[derive(Debug, Default)]
struct State {
    shaders: HashMap<Name, ShaderObject>,
    programs: HashMap<Name, ProgramObject>,
    vertex_arrays: HashMap<Name, ()>,
    textures: HashMap<Name, TextureObject>,
    buffers: HashMap<Name, Vec<u8>>,

    current_program: Option<Name>,
    current_vertex_array: Option<Name>,
    active_unit: u32,
    bound_textures: HashMap<(u32, TextureTarget), Name>,
    bound_buffers: HashMap<BufferTarget, Name>,
    polygon_mode: Option<PolygonMode>,
    patch_vertices: Option<i32>,
    enabled: Vec<Capability>,

    commands: Vec<GlCommand>,
    errors: Vec<String>,
}

/// Lowest name not currently in use; GL drivers hand freed names back out
fn next_name<V>(objects: &HashMap<Name, V>) -> Name {
    let mut name = 1;
    while objects.contains_key(&name) {
        name += 1;
    }
    name
}

fn declared_uniforms(source: &str) -> Vec<String> {
    source
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let decl = match line.strip_prefix("layout") {
                Some(rest) => rest.split_once(')').map(|(_, after)| after.trim_start())?,
                None => line,
            };
            let rest = decl.strip_prefix("uniform ")?;
            let name = rest.trim_end_matches(';').split_whitespace().last()?;
            let name = name.split('[').next().unwrap_or(name);
            Some(name.trim_end_matches(';').to_string())
        })
        .collect()
}

impl State {
    fn bound_texture(&self, target: TextureTarget) -> Option<Name> {
        self.bound_textures.get(&(self.active_unit, target)).copied()
    }

    fn bound_texture_mut(&mut self, target: TextureTarget, op: &str) -> Option<&mut TextureObject> {
        match self.bound_texture(target) {
            Some(name) => self.textures.get_mut(&name),
            None => {
                self.errors.push(format!(
                    "{}: no texture bound to {:?} on unit {}",
                    op, target, self.active_unit
                ));
                None
            }
        }
    }

    fn release_shader_if_pending(&mut self, shader: Name) {
        let attached_anywhere = self.programs.values().any(|p| p.attached.contains(&shader));
        if !attached_anywhere && self.shaders.get(&shader).is_some_and(|s| s.delete_pending) {
            self.shaders.remove(&shader);
        }
    }

    fn link(&mut self, program: Name) -> Result<(), String> {
        let Some(object) = self.programs.get(&program) else {
            return Err(format!("program {} does not exist", program));
        };

        let mut stages = Vec::new();
        let mut sources = Vec::new();
        for shader in &object.attached {
            match self.shaders.get(shader) {
                Some(s) if s.compiled => {
                    stages.push(s.stage);
                    sources.push(s.source.clone());
                }
                Some(s) => {
                    return Err(format!("attached {} shader {} is not compiled", s.stage, shader))
                }
                None => return Err(format!("attached shader {} does not exist", shader)),
            }
        }

        let has = |stage| stages.contains(&stage);
        if !has(ShaderStage::Vertex) {
            return Err("error: program lacks a vertex shader".to_string());
        }
        if !has(ShaderStage::Fragment) {
            return Err("error: program lacks a fragment shader".to_string());
        }
        if has(ShaderStage::TessellationControl) != has(ShaderStage::TessellationEvaluation) {
            return Err(
                "error: tessellation control and evaluation stages must be linked together"
                    .to_string(),
            );
        }

        let mut uniforms = HashMap::new();
        for name in sources.iter().flat_map(|source| declared_uniforms(source)) {
            let next = uniforms.len() as Name;
            uniforms.entry(name).or_insert(next);
        }

        if let Some(object) = self.programs.get_mut(&program) {
            object.uniforms = uniforms;
            object.values.clear();
        }
        Ok(())
    }
}

/// Headless [`GraphicsApi`] implementation that records everything
#[derive(Debug, Default)]
pub struct RecordingGl {
    state: RefCell<State>,
}

impl RecordingGl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<GlCommand> {
        self.state.borrow().commands.clone()
    }

    pub fn clear_commands(&self) {
        self.state.borrow_mut().commands.clear();
    }

    pub fn draw_calls(&self) -> Vec<DrawCall> {
        self.state
            .borrow()
            .commands
            .iter()
            .filter_map(|c| match c {
                GlCommand::DrawArraysInstanced(draw) => Some(draw.clone()),
                _ => None,
            })
            .collect()
    }

    /// Invalid operations observed so far
    pub fn errors(&self) -> Vec<String> {
        self.state.borrow().errors.clone()
    }

    pub fn live_textures(&self) -> usize {
        self.state.borrow().textures.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.state.borrow().buffers.len()
    }

    pub fn live_vertex_arrays(&self) -> usize {
        self.state.borrow().vertex_arrays.len()
    }

    pub fn live_programs(&self) -> usize {
        self.state.borrow().programs.len()
    }

    pub fn live_shaders(&self) -> usize {
        self.state.borrow().shaders.len()
    }

    /// Total number of live objects of every kind
    pub fn live_objects(&self) -> usize {
        self.live_textures()
            + self.live_buffers()
            + self.live_vertex_arrays()
            + self.live_programs()
            + self.live_shaders()
    }

    pub fn texture_names(&self) -> Vec<Name> {
        let mut names: Vec<Name> = self.state.borrow().textures.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn texture_info(&self, texture: Name) -> Option<TextureInfo> {
        self.state.borrow().textures.get(&texture).map(|t| t.info.clone())
    }

    /// Level-0 texels of `layer` as uploaded
    pub fn texture_layer(&self, texture: Name, layer: usize) -> Option<Vec<u8>> {
        self.state
            .borrow()
            .textures
            .get(&texture)
            .and_then(|t| t.layers.get(layer).cloned())
    }

    pub fn buffer_contents(&self, buffer: Name) -> Option<Vec<u8>> {
        self.state.borrow().buffers.get(&buffer).cloned()
    }

    pub fn is_vertex_array(&self, vao: Name) -> bool {
        self.state.borrow().vertex_arrays.contains_key(&vao)
    }

    pub fn is_program_linked(&self, program: Name) -> bool {
        self.state.borrow().programs.get(&program).is_some_and(|p| p.linked)
    }

    pub fn attached_stages(&self, program: Name) -> Vec<ShaderStage> {
        let state = self.state.borrow();
        state
            .programs
            .get(&program)
            .map(|p| {
                p.attached
                    .iter()
                    .filter_map(|s| state.shaders.get(s).map(|s| s.stage))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Current value of the uniform `name` in `program`
    pub fn program_uniform(&self, program: Name, name: &str) -> Option<UniformValue> {
        let state = self.state.borrow();
        let object = state.programs.get(&program)?;
        let location = object.uniforms.get(name)?;
        object.values.get(location).copied()
    }

    pub fn current_program(&self) -> Option<Name> {
        self.state.borrow().current_program
    }

    pub fn current_vertex_array(&self) -> Option<Name> {
        self.state.borrow().current_vertex_array
    }

    /// Fill state last set, `None` if never touched
    pub fn polygon_mode(&self) -> Option<PolygonMode> {
        self.state.borrow().polygon_mode
    }

    pub fn patch_vertices(&self) -> Option<i32> {
        self.state.borrow().patch_vertices
    }

    pub fn is_enabled(&self, capability: Capability) -> bool {
        self.state.borrow().enabled.contains(&capability)
    }

    fn record(&self, command: GlCommand) {
        self.state.borrow_mut().commands.push(command);
    }
}

impl GraphicsApi for RecordingGl {
    type Texture = Name;
    type Buffer = Name;
    type VertexArray = Name;
    type Program = Name;
    type Shader = Name;
    type UniformLocation = Name;

    fn create_shader(&self, stage: ShaderStage) -> GpuResult<Name> {
        let mut state = self.state.borrow_mut();
        let shader = next_name(&state.shaders);
        state.shaders.insert(
            shader,
            ShaderObject { stage, source: String::new(), compiled: false, delete_pending: false },
        );
        state.commands.push(GlCommand::CreateShader { stage, shader });
        Ok(shader)
    }

    fn compile_shader(&self, shader: Name, source: &str) -> Result<(), String> {
        let mut state = self.state.borrow_mut();
        let Some(object) = state.shaders.get_mut(&shader) else {
            let message = format!("compile_shader: shader {} does not exist", shader);
            state.errors.push(message.clone());
            return Err(message);
        };
        object.source = source.to_string();
        object.compiled = source.contains("void main");
        let ok = object.compiled;
        state.commands.push(GlCommand::CompileShader { shader, ok });
        if ok {
            Ok(())
        } else {
            Err("0:1(1): error: no function with name 'main'".to_string())
        }
    }

    fn delete_shader(&self, shader: Name) {
        {
            let mut state = self.state.borrow_mut();
            match state.shaders.get_mut(&shader) {
                Some(object) => object.delete_pending = true,
                None => {
                    let message = format!("delete_shader: shader {} does not exist", shader);
                    state.errors.push(message);
                }
            }
            state.release_shader_if_pending(shader);
        }
        self.record(GlCommand::DeleteShader(shader));
    }

    fn create_program(&self) -> GpuResult<Name> {
        let mut state = self.state.borrow_mut();
        let program = next_name(&state.programs);
        state.programs.insert(program, ProgramObject::default());
        state.commands.push(GlCommand::CreateProgram(program));
        Ok(program)
    }

    fn attach_shader(&self, program: Name, shader: Name) {
        {
            let mut state = self.state.borrow_mut();
            if !state.shaders.contains_key(&shader) {
                state.errors.push(format!("attach_shader: shader {} does not exist", shader));
            } else if let Some(object) = state.programs.get_mut(&program) {
                if !object.attached.contains(&shader) {
                    object.attached.push(shader);
                }
            } else {
                state.errors.push(format!("attach_shader: program {} does not exist", program));
            }
        }
        self.record(GlCommand::AttachShader { program, shader });
    }

    fn detach_shader(&self, program: Name, shader: Name) {
        {
            let mut state = self.state.borrow_mut();
            let detached = match state.programs.get_mut(&program) {
                Some(object) if object.attached.contains(&shader) => {
                    object.attached.retain(|s| *s != shader);
                    true
                }
                _ => false,
            };
            if !detached {
                state.errors.push(format!(
                    "detach_shader: shader {} is not attached to {}",
                    shader, program
                ));
            }
            state.release_shader_if_pending(shader);
        }
        self.record(GlCommand::DetachShader { program, shader });
    }

    fn link_program(&self, program: Name) -> Result<(), String> {
        let result = {
            let mut state = self.state.borrow_mut();
            let result = state.link(program);
            if let Some(object) = state.programs.get_mut(&program) {
                object.linked = result.is_ok();
                if result.is_err() {
                    object.uniforms.clear();
                    object.values.clear();
                }
            }
            result
        };
        self.record(GlCommand::LinkProgram { program, ok: result.is_ok() });
        result
    }

    fn use_program(&self, program: Option<Name>) {
        {
            let mut state = self.state.borrow_mut();
            if let Some(p) = program {
                if !state.programs.get(&p).is_some_and(|o| o.linked) {
                    state.errors.push(format!("use_program: program {} is not linked", p));
                }
            }
            state.current_program = program;
        }
        self.record(GlCommand::UseProgram(program));
    }

    fn delete_program(&self, program: Name) {
        {
            let mut state = self.state.borrow_mut();
            match state.programs.remove(&program) {
                Some(object) => {
                    for shader in object.attached {
                        state.release_shader_if_pending(shader);
                    }
                    if state.current_program == Some(program) {
                        state.current_program = None;
                    }
                }
                None => {
                    let message = format!("delete_program: program {} does not exist", program);
                    state.errors.push(message);
                }
            }
        }
        self.record(GlCommand::DeleteProgram(program));
    }

    fn uniform_location(&self, program: Name, name: &str) -> Option<Name> {
        let state = self.state.borrow();
        let object = state.programs.get(&program)?;
        if !object.linked {
            return None;
        }
        object.uniforms.get(name).copied()
    }

    fn set_uniform(&self, location: Option<&Name>, value: UniformValue) {
        let Some(&location) = location else {
            return;
        };
        {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;
            let error = match state.current_program {
                None => Some("set_uniform: no program in use".to_string()),
                Some(p) => match state.programs.get_mut(&p) {
                    Some(object) if object.uniforms.values().any(|l| *l == location) => {
                        object.values.insert(location, value);
                        None
                    }
                    _ => Some(format!("set_uniform: location {} is not active in {}", location, p)),
                },
            };
            if let Some(message) = error {
                state.errors.push(message);
            }
        }
        self.record(GlCommand::SetUniform { location, value });
    }

    fn create_vertex_array(&self) -> GpuResult<Name> {
        let mut state = self.state.borrow_mut();
        let vao = next_name(&state.vertex_arrays);
        state.vertex_arrays.insert(vao, ());
        state.commands.push(GlCommand::CreateVertexArray(vao));
        Ok(vao)
    }

    fn bind_vertex_array(&self, vao: Option<Name>) {
        {
            let mut state = self.state.borrow_mut();
            if let Some(v) = vao {
                if !state.vertex_arrays.contains_key(&v) {
                    state.errors.push(format!("bind_vertex_array: {} does not exist", v));
                }
            }
            state.current_vertex_array = vao;
        }
        self.record(GlCommand::BindVertexArray(vao));
    }

    fn delete_vertex_array(&self, vao: Name) {
        {
            let mut state = self.state.borrow_mut();
            if state.vertex_arrays.remove(&vao).is_none() {
                state.errors.push(format!("delete_vertex_array: {} does not exist", vao));
            }
            if state.current_vertex_array == Some(vao) {
                state.current_vertex_array = None;
            }
        }
        self.record(GlCommand::DeleteVertexArray(vao));
    }

    fn create_texture(&self) -> GpuResult<Name> {
        let mut state = self.state.borrow_mut();
        let texture = next_name(&state.textures);
        state.textures.insert(
            texture,
            TextureObject {
                info: TextureInfo {
                    target: None,
                    format: None,
                    width: 0,
                    height: 0,
                    depth: 0,
                    levels: 0,
                    parameters: Vec::new(),
                    mipmaps_generated: false,
                    buffer: None,
                },
                layers: Vec::new(),
            },
        );
        state.commands.push(GlCommand::CreateTexture(texture));
        Ok(texture)
    }

    fn active_texture(&self, unit: u32) {
        self.state.borrow_mut().active_unit = unit;
        self.record(GlCommand::ActiveTexture(unit));
    }

    fn bind_texture(&self, target: TextureTarget, texture: Option<Name>) {
        {
            let mut state = self.state.borrow_mut();
            let unit = state.active_unit;
            match texture {
                Some(name) => {
                    let mismatch = match state.textures.get_mut(&name) {
                        Some(object) => match object.info.target {
                            None => {
                                object.info.target = Some(target);
                                None
                            }
                            Some(existing) if existing != target => Some(format!(
                                "bind_texture: texture {} is {:?}, bound as {:?}",
                                name, existing, target
                            )),
                            Some(_) => None,
                        },
                        None => Some(format!("bind_texture: texture {} does not exist", name)),
                    };
                    if let Some(message) = mismatch {
                        state.errors.push(message);
                    }
                    state.bound_textures.insert((unit, target), name);
                }
                None => {
                    state.bound_textures.remove(&(unit, target));
                }
            }
        }
        self.record(GlCommand::BindTexture { target, texture });
    }

    fn tex_storage_2d(
        &self,
        target: TextureTarget,
        levels: i32,
        format: TextureFormat,
        width: i32,
        height: i32,
    ) {
        self.tex_storage_3d(target, levels, format, width, height, 1);
    }

    fn tex_storage_3d(
        &self,
        target: TextureTarget,
        levels: i32,
        format: TextureFormat,
        width: i32,
        height: i32,
        depth: i32,
    ) {
        {
            let mut state = self.state.borrow_mut();
            if let Some(object) = state.bound_texture_mut(target, "tex_storage") {
                let texel = match format {
                    TextureFormat::R32F | TextureFormat::Rgba8 => 4,
                    TextureFormat::R8UI => 1,
                };
                let layer_len = (width.max(0) * height.max(0)) as usize * texel;
                object.info.format = Some(format);
                object.info.width = width;
                object.info.height = height;
                object.info.depth = depth;
                object.info.levels = levels;
                object.layers = vec![vec![0; layer_len]; depth.max(0) as usize];
            }
        }
        self.record(GlCommand::TexStorage { target, levels, format, width, height, depth });
    }

    fn tex_sub_image_2d(
        &self,
        target: TextureTarget,
        width: i32,
        height: i32,
        pixels: PixelData<'_>,
    ) {
        self.tex_sub_image_3d(target, 0, width, height, pixels);
    }

    fn tex_sub_image_3d(
        &self,
        target: TextureTarget,
        layer: i32,
        width: i32,
        height: i32,
        pixels: PixelData<'_>,
    ) {
        let bytes = pixels.bytes();
        {
            let mut state = self.state.borrow_mut();
            let mut error = None;
            if let Some(object) = state.bound_texture_mut(target, "tex_sub_image") {
                if width > object.info.width || height > object.info.height {
                    error = Some(format!(
                        "tex_sub_image: {}x{} exceeds storage {}x{}",
                        width, height, object.info.width, object.info.height
                    ));
                } else if let Some(texels) = object.layers.get_mut(layer as usize) {
                    // Stored as client bytes; widening formats keep their source encoding
                    *texels = bytes.to_vec();
                } else {
                    error = Some(format!("tex_sub_image: layer {} out of range", layer));
                }
            }
            if let Some(message) = error {
                state.errors.push(message);
            }
        }
        self.record(GlCommand::TexSubImage { target, layer, width, height, bytes: bytes.len() });
    }

    fn tex_parameter(&self, target: TextureTarget, parameter: TextureParameter) {
        {
            let mut state = self.state.borrow_mut();
            if let Some(object) = state.bound_texture_mut(target, "tex_parameter") {
                object.info.parameters.push(parameter);
            }
        }
        self.record(GlCommand::TexParameter { target, parameter });
    }

    fn generate_mipmap(&self, target: TextureTarget) {
        {
            let mut state = self.state.borrow_mut();
            if let Some(object) = state.bound_texture_mut(target, "generate_mipmap") {
                object.info.mipmaps_generated = true;
            }
        }
        self.record(GlCommand::GenerateMipmap(target));
    }

    fn tex_buffer(&self, format: TextureFormat, buffer: Option<Name>) {
        {
            let mut state = self.state.borrow_mut();
            if let Some(b) = buffer {
                if !state.buffers.contains_key(&b) {
                    state.errors.push(format!("tex_buffer: buffer {} does not exist", b));
                }
            }
            let bound = state.bound_texture_mut(TextureTarget::TextureBuffer, "tex_buffer");
            if let Some(object) = bound {
                object.info.format = Some(format);
                object.info.buffer = buffer;
            }
        }
        self.record(GlCommand::TexBuffer { format, buffer });
    }

    fn delete_texture(&self, texture: Name) {
        {
            let mut state = self.state.borrow_mut();
            if state.textures.remove(&texture).is_none() {
                state.errors.push(format!("delete_texture: texture {} does not exist", texture));
            }
            state.bound_textures.retain(|_, bound| *bound != texture);
        }
        self.record(GlCommand::DeleteTexture(texture));
    }

    fn create_buffer(&self) -> GpuResult<Name> {
        let mut state = self.state.borrow_mut();
        let buffer = next_name(&state.buffers);
        state.buffers.insert(buffer, Vec::new());
        state.commands.push(GlCommand::CreateBuffer(buffer));
        Ok(buffer)
    }

    fn bind_buffer(&self, target: BufferTarget, buffer: Option<Name>) {
        {
            let mut state = self.state.borrow_mut();
            match buffer {
                Some(b) => {
                    if !state.buffers.contains_key(&b) {
                        state.errors.push(format!("bind_buffer: buffer {} does not exist", b));
                    }
                    state.bound_buffers.insert(target, b);
                }
                None => {
                    state.bound_buffers.remove(&target);
                }
            }
        }
        self.record(GlCommand::BindBuffer { target, buffer });
    }

    fn buffer_data(&self, target: BufferTarget, data: &[u8]) {
        {
            let mut state = self.state.borrow_mut();
            match state.bound_buffers.get(&target).copied() {
                Some(b) => {
                    if let Some(contents) = state.buffers.get_mut(&b) {
                        *contents = data.to_vec();
                    }
                }
                None => state.errors.push(format!("buffer_data: no buffer bound to {:?}", target)),
            }
        }
        self.record(GlCommand::BufferData { target, bytes: data.len() });
    }

    fn delete_buffer(&self, buffer: Name) {
        {
            let mut state = self.state.borrow_mut();
            if state.buffers.remove(&buffer).is_none() {
                state.errors.push(format!("delete_buffer: buffer {} does not exist", buffer));
            }
            state.bound_buffers.retain(|_, bound| *bound != buffer);
        }
        self.record(GlCommand::DeleteBuffer(buffer));
    }

    fn patch_vertices(&self, count: i32) {
        self.state.borrow_mut().patch_vertices = Some(count);
        self.record(GlCommand::PatchVertices(count));
    }

    fn polygon_mode(&self, mode: PolygonMode) {
        self.state.borrow_mut().polygon_mode = Some(mode);
        self.record(GlCommand::PolygonMode(mode));
    }

    fn enable(&self, capability: Capability) {
        {
            let mut state = self.state.borrow_mut();
            if !state.enabled.contains(&capability) {
                state.enabled.push(capability);
            }
        }
        self.record(GlCommand::Enable(capability));
    }

    fn disable(&self, capability: Capability) {
        self.state.borrow_mut().enabled.retain(|c| *c != capability);
        self.record(GlCommand::Disable(capability));
    }

    fn draw_arrays_instanced(&self, primitive: Primitive, first: i32, count: i32, instances: i32) {
        let draw = {
            let mut state = self.state.borrow_mut();
            if state.current_program.is_none() {
                state.errors.push("draw: no program in use".to_string());
            }
            if state.current_vertex_array.is_none() {
                state.errors.push("draw: no vertex array bound".to_string());
            }
            if primitive == Primitive::Patches && state.patch_vertices.is_none() {
                state.errors.push("draw: patch size never set".to_string());
            }
            let mut textures: Vec<(u32, TextureTarget, Name)> = state
                .bound_textures
                .iter()
                .map(|(&(unit, target), &name)| (unit, target, name))
                .collect();
            textures.sort_by_key(|&(unit, _, name)| (unit, name));
            DrawCall {
                primitive,
                first,
                count,
                instances,
                program: state.current_program,
                vertex_array: state.current_vertex_array,
                polygon_mode: state.polygon_mode.unwrap_or(PolygonMode::Fill),
                patch_vertices: state.patch_vertices,
                blend: state.enabled.contains(&Capability::Blend),
                textures,
            }
        };
        self.record(GlCommand::DrawArraysInstanced(draw));
    }
}
