use super::{
    BufferTarget, Capability, GpuError, GpuResult, GraphicsApi, PixelData, PolygonMode, Primitive,
    ShaderStage, TextureFormat, TextureParameter, TextureTarget, UniformValue,
};
use glow::{HasContext, PixelUnpackData};
use std::ffi::c_void;
use tracing::info;

/// `glTexBuffer`, which `glow` does not wrap
type TexBufferFn = unsafe extern "system" fn(target: u32, internal_format: u32, buffer: u32);

/// [`GraphicsApi`] over a `glow` context.
///
/// The wrapped context must stay current on the thread that owns this value
/// for as long as it lives; that is the contract
/// [`GlowContext::from_loader_function`] asks the caller to uphold, and what
/// makes the safe trait methods sound.
pub struct GlowContext {
    gl: glow::Context,
    tex_buffer: TexBufferFn,
}

impl GlowContext {
    /// Load the function table of the current context.
    ///
    /// # Safety
    ///
    /// `loader` must resolve symbols of a context that is current on the
    /// calling thread. That context must outlive the returned value and
    /// remain current whenever it is used.
    pub unsafe fn from_loader_function<F>(mut loader: F) -> GpuResult<Self>
    where
        F: FnMut(&str) -> *const c_void,
    {
        let gl = glow::Context::from_loader_function(&mut loader);
        let tex_buffer = resolve_tex_buffer(&mut loader)?;
        Ok(Self { gl, tex_buffer })
    }

    pub fn raw(&self) -> &glow::Context {
        &self.gl
    }

    /// Log vendor, renderer and version strings of the bound driver
    pub fn log_driver_info(&self) {
        unsafe {
            info!("=== OpenGL Driver Information ===");
            info!("Vendor: {}", self.gl.get_parameter_string(glow::VENDOR));
            info!("Renderer: {}", self.gl.get_parameter_string(glow::RENDERER));
            info!("Version: {}", self.gl.get_parameter_string(glow::VERSION));
            info!("GLSL: {}", self.gl.get_parameter_string(glow::SHADING_LANGUAGE_VERSION));
            info!("=================================");
        }
    }
}

fn resolve_tex_buffer<F>(loader: &mut F) -> GpuResult<TexBufferFn>
where
    F: FnMut(&str) -> *const c_void,
{
    let symbol = "glTexBuffer";
    let address = loader(symbol);
    if address.is_null() {
        return Err(GpuError::MissingEntryPoint(symbol));
    }
    // SAFETY: a non-null address for this symbol has the glTexBuffer signature
    Ok(unsafe { std::mem::transmute::<*const c_void, TexBufferFn>(address) })
}

/// Attach `buffer` (or detach with `None`) to the bound buffer texture
unsafe fn attach_texture_buffer(
    tex_buffer: TexBufferFn,
    format: TextureFormat,
    buffer: Option<glow::Buffer>,
) {
    let name = buffer.map_or(0, |b| b.0.get());
    tex_buffer(glow::TEXTURE_BUFFER, format.gl_enum(), name);
}

fn create_failed(object: &'static str) -> impl FnOnce(String) -> GpuError {
    move |reason| GpuError::CreateFailed { object, reason }
}

impl GraphicsApi for GlowContext {
    type Texture = glow::Texture;
    type Buffer = glow::Buffer;
    type VertexArray = glow::VertexArray;
    type Program = glow::Program;
    type Shader = glow::Shader;
    type UniformLocation = glow::UniformLocation;

    fn create_shader(&self, stage: ShaderStage) -> GpuResult<Self::Shader> {
        unsafe { self.gl.create_shader(stage.gl_enum()).map_err(create_failed("shader")) }
    }

    fn compile_shader(&self, shader: Self::Shader, source: &str) -> Result<(), String> {
        unsafe {
            self.gl.shader_source(shader, source);
            self.gl.compile_shader(shader);
            if self.gl.get_shader_compile_status(shader) {
                Ok(())
            } else {
                Err(self.gl.get_shader_info_log(shader))
            }
        }
    }

    fn delete_shader(&self, shader: Self::Shader) {
        unsafe { self.gl.delete_shader(shader) }
    }

    fn create_program(&self) -> GpuResult<Self::Program> {
        unsafe { self.gl.create_program().map_err(create_failed("program")) }
    }

    fn attach_shader(&self, program: Self::Program, shader: Self::Shader) {
        unsafe { self.gl.attach_shader(program, shader) }
    }

    fn detach_shader(&self, program: Self::Program, shader: Self::Shader) {
        unsafe { self.gl.detach_shader(program, shader) }
    }

    fn link_program(&self, program: Self::Program) -> Result<(), String> {
        unsafe {
            self.gl.link_program(program);
            if self.gl.get_program_link_status(program) {
                Ok(())
            } else {
                Err(self.gl.get_program_info_log(program))
            }
        }
    }

    fn use_program(&self, program: Option<Self::Program>) {
        unsafe { self.gl.use_program(program) }
    }

    fn delete_program(&self, program: Self::Program) {
        unsafe { self.gl.delete_program(program) }
    }

    fn uniform_location(
        &self,
        program: Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation> {
        unsafe { self.gl.get_uniform_location(program, name) }
    }

    fn set_uniform(&self, location: Option<&Self::UniformLocation>, value: UniformValue) {
        unsafe {
            match value {
                UniformValue::Int(v) => self.gl.uniform_1_i32(location, v),
                UniformValue::Float(v) => self.gl.uniform_1_f32(location, v),
                UniformValue::Vec3([x, y, z]) => self.gl.uniform_3_f32(location, x, y, z),
                UniformValue::Mat4(m) => self.gl.uniform_matrix_4_f32_slice(location, false, &m),
            }
        }
    }

    fn create_vertex_array(&self) -> GpuResult<Self::VertexArray> {
        unsafe { self.gl.create_vertex_array().map_err(create_failed("vertex array")) }
    }

    fn bind_vertex_array(&self, vao: Option<Self::VertexArray>) {
        unsafe { self.gl.bind_vertex_array(vao) }
    }

    fn delete_vertex_array(&self, vao: Self::VertexArray) {
        unsafe { self.gl.delete_vertex_array(vao) }
    }

    fn create_texture(&self) -> GpuResult<Self::Texture> {
        unsafe { self.gl.create_texture().map_err(create_failed("texture")) }
    }

    fn active_texture(&self, unit: u32) {
        unsafe { self.gl.active_texture(glow::TEXTURE0 + unit) }
    }

    fn bind_texture(&self, target: TextureTarget, texture: Option<Self::Texture>) {
        unsafe { self.gl.bind_texture(target.gl_enum(), texture) }
    }

    fn tex_storage_2d(
        &self,
        target: TextureTarget,
        levels: i32,
        format: TextureFormat,
        width: i32,
        height: i32,
    ) {
        unsafe {
            self.gl
                .tex_storage_2d(target.gl_enum(), levels, format.gl_enum(), width, height)
        }
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
        unsafe {
            self.gl
                .tex_storage_3d(target.gl_enum(), levels, format.gl_enum(), width, height, depth)
        }
    }

    fn tex_sub_image_2d(
        &self,
        target: TextureTarget,
        width: i32,
        height: i32,
        pixels: PixelData<'_>,
    ) {
        let (format, ty) = pixels.gl_format();
        unsafe {
            self.gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            self.gl.tex_sub_image_2d(
                target.gl_enum(),
                0,
                0,
                0,
                width,
                height,
                format,
                ty,
                PixelUnpackData::Slice(Some(pixels.bytes())),
            );
        }
    }

    fn tex_sub_image_3d(
        &self,
        target: TextureTarget,
        layer: i32,
        width: i32,
        height: i32,
        pixels: PixelData<'_>,
    ) {
        let (format, ty) = pixels.gl_format();
        unsafe {
            self.gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            self.gl.tex_sub_image_3d(
                target.gl_enum(),
                0,
                0,
                0,
                layer,
                width,
                height,
                1,
                format,
                ty,
                PixelUnpackData::Slice(Some(pixels.bytes())),
            );
        }
    }

    fn tex_parameter(&self, target: TextureTarget, parameter: TextureParameter) {
        let (pname, value) = parameter.gl_pair();
        unsafe { self.gl.tex_parameter_i32(target.gl_enum(), pname, value) }
    }

    fn generate_mipmap(&self, target: TextureTarget) {
        unsafe { self.gl.generate_mipmap(target.gl_enum()) }
    }

    fn tex_buffer(&self, format: TextureFormat, buffer: Option<Self::Buffer>) {
        unsafe { attach_texture_buffer(self.tex_buffer, format, buffer) }
    }

    fn delete_texture(&self, texture: Self::Texture) {
        unsafe { self.gl.delete_texture(texture) }
    }

    fn create_buffer(&self) -> GpuResult<Self::Buffer> {
        unsafe { self.gl.create_buffer().map_err(create_failed("buffer")) }
    }

    fn bind_buffer(&self, target: BufferTarget, buffer: Option<Self::Buffer>) {
        unsafe { self.gl.bind_buffer(target.gl_enum(), buffer) }
    }

    fn buffer_data(&self, target: BufferTarget, data: &[u8]) {
        unsafe { self.gl.buffer_data_u8_slice(target.gl_enum(), data, glow::STATIC_DRAW) }
    }

    fn delete_buffer(&self, buffer: Self::Buffer) {
        unsafe { self.gl.delete_buffer(buffer) }
    }

    fn patch_vertices(&self, count: i32) {
        unsafe { self.gl.patch_parameter_i32(glow::PATCH_VERTICES, count) }
    }

    fn polygon_mode(&self, mode: PolygonMode) {
        let mode = match mode {
            PolygonMode::Fill => glow::FILL,
            PolygonMode::Line => glow::LINE,
        };
        unsafe { self.gl.polygon_mode(glow::FRONT_AND_BACK, mode) }
    }

    fn enable(&self, capability: Capability) {
        unsafe { self.gl.enable(capability.gl_enum()) }
    }

    fn disable(&self, capability: Capability) {
        unsafe { self.gl.disable(capability.gl_enum()) }
    }

    fn draw_arrays_instanced(&self, primitive: Primitive, first: i32, count: i32, instances: i32) {
        unsafe {
            self.gl
                .draw_arrays_instanced(primitive.gl_enum(), first, count, instances)
        }
    }
}
