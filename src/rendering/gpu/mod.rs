//! Graphics function table
//!
//! Every GL call the renderers make goes through [`GraphicsApi`]. An
//! implementation is bound to exactly one context and is handed to the
//! renderers explicitly, so the same code drives a real driver through
//! [`GlowContext`] or the headless [`RecordingGl`].

pub mod glow_backend;
pub mod recording;

pub use glow_backend::GlowContext;
pub use recording::{DrawCall, GlCommand, RecordingGl};

use std::fmt::Debug;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum GpuError {
    #[error("Failed to create {object}: {reason}")]
    CreateFailed { object: &'static str, reason: String },

    #[error("Driver does not expose {0}")]
    MissingEntryPoint(&'static str),
}

pub type GpuResult<T> = Result<T, GpuError>;

/// Programmable pipeline stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    TessellationControl,
    TessellationEvaluation,
    Fragment,
}

impl ShaderStage {
    /// File name suffix used by the `<name>.<suffix>.glsl` convention
    pub fn suffix(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vs",
            ShaderStage::TessellationControl => "tcs",
            ShaderStage::TessellationEvaluation => "tes",
            ShaderStage::Fragment => "fs",
        }
    }

    pub fn gl_enum(self) -> u32 {
        match self {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::TessellationControl => glow::TESS_CONTROL_SHADER,
            ShaderStage::TessellationEvaluation => glow::TESS_EVALUATION_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        }
    }
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::TessellationControl => write!(f, "tessellation-control"),
            ShaderStage::TessellationEvaluation => write!(f, "tessellation-evaluation"),
            ShaderStage::Fragment => write!(f, "fragment"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    Texture2D,
    Texture2DArray,
    TextureBuffer,
}

impl TextureTarget {
    pub fn gl_enum(self) -> u32 {
        match self {
            TextureTarget::Texture2D => glow::TEXTURE_2D,
            TextureTarget::Texture2DArray => glow::TEXTURE_2D_ARRAY,
            TextureTarget::TextureBuffer => glow::TEXTURE_BUFFER,
        }
    }
}

/// Sized internal formats used by the terrain textures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    R32F,
    R8UI,
    Rgba8,
}

impl TextureFormat {
    pub fn gl_enum(self) -> u32 {
        match self {
            TextureFormat::R32F => glow::R32F,
            TextureFormat::R8UI => glow::R8UI,
            TextureFormat::Rgba8 => glow::RGBA8,
        }
    }
}

/// Client-side pixel data for a sub-image upload
#[derive(Debug, Clone, Copy)]
pub enum PixelData<'a> {
    /// `RED`, `FLOAT`
    RedF32(&'a [f32]),
    /// `RED`, `UNSIGNED_SHORT`
    RedU16(&'a [u16]),
    /// `RGBA`, `UNSIGNED_BYTE`
    Rgba8(&'a [u8]),
}

impl<'a> PixelData<'a> {
    pub fn bytes(&self) -> &'a [u8] {
        match *self {
            PixelData::RedF32(data) => bytemuck::cast_slice(data),
            PixelData::RedU16(data) => bytemuck::cast_slice(data),
            PixelData::Rgba8(data) => data,
        }
    }

    /// `(format, type)` pair for the upload
    pub fn gl_format(&self) -> (u32, u32) {
        match self {
            PixelData::RedF32(_) => (glow::RED, glow::FLOAT),
            PixelData::RedU16(_) => (glow::RED, glow::UNSIGNED_SHORT),
            PixelData::Rgba8(_) => (glow::RGBA, glow::UNSIGNED_BYTE),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapMode {
    ClampToEdge,
    Repeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    Linear,
    LinearMipmapLinear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureParameter {
    WrapS(WrapMode),
    WrapT(WrapMode),
    MinFilter(FilterMode),
    MagFilter(FilterMode),
}

impl TextureParameter {
    /// `(pname, value)` pair for `glTexParameteri`
    pub fn gl_pair(self) -> (u32, i32) {
        let wrap = |mode| match mode {
            WrapMode::ClampToEdge => glow::CLAMP_TO_EDGE as i32,
            WrapMode::Repeat => glow::REPEAT as i32,
        };
        let filter = |mode| match mode {
            FilterMode::Nearest => glow::NEAREST as i32,
            FilterMode::Linear => glow::LINEAR as i32,
            FilterMode::LinearMipmapLinear => glow::LINEAR_MIPMAP_LINEAR as i32,
        };
        match self {
            TextureParameter::WrapS(mode) => (glow::TEXTURE_WRAP_S, wrap(mode)),
            TextureParameter::WrapT(mode) => (glow::TEXTURE_WRAP_T, wrap(mode)),
            TextureParameter::MinFilter(mode) => (glow::TEXTURE_MIN_FILTER, filter(mode)),
            TextureParameter::MagFilter(mode) => (glow::TEXTURE_MAG_FILTER, filter(mode)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    Array,
    TextureBuffer,
}

impl BufferTarget {
    pub fn gl_enum(self) -> u32 {
        match self {
            BufferTarget::Array => glow::ARRAY_BUFFER,
            BufferTarget::TextureBuffer => glow::TEXTURE_BUFFER,
        }
    }
}

/// Rasterization fill state, always applied to front and back faces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolygonMode {
    Fill,
    Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Patches,
    TriangleStrip,
}

impl Primitive {
    pub fn gl_enum(self) -> u32 {
        match self {
            Primitive::Patches => glow::PATCHES,
            Primitive::TriangleStrip => glow::TRIANGLE_STRIP,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Blend,
    DepthTest,
}

impl Capability {
    pub fn gl_enum(self) -> u32 {
        match self {
            Capability::Blend => glow::BLEND,
            Capability::DepthTest => glow::DEPTH_TEST,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec3([f32; 3]),
    /// Column-major, not transposed
    Mat4([f32; 16]),
}

/// Function table for one graphics context.
///
/// Methods take `&self`: the context is single-threaded and every call is
/// issued from the thread that owns it.
pub trait GraphicsApi {
    type Texture: Copy + Eq + Debug;
    type Buffer: Copy + Eq + Debug;
    type VertexArray: Copy + Eq + Debug;
    type Program: Copy + Eq + Debug;
    type Shader: Copy + Eq + Debug;
    type UniformLocation: Clone + Debug;

    fn create_shader(&self, stage: ShaderStage) -> GpuResult<Self::Shader>;
    /// Compile `source` into `shader`; on failure returns the info log
    fn compile_shader(&self, shader: Self::Shader, source: &str) -> Result<(), String>;
    fn delete_shader(&self, shader: Self::Shader);

    fn create_program(&self) -> GpuResult<Self::Program>;
    fn attach_shader(&self, program: Self::Program, shader: Self::Shader);
    fn detach_shader(&self, program: Self::Program, shader: Self::Shader);
    /// Link `program`; on failure returns the info log
    fn link_program(&self, program: Self::Program) -> Result<(), String>;
    fn use_program(&self, program: Option<Self::Program>);
    fn delete_program(&self, program: Self::Program);
    fn uniform_location(&self, program: Self::Program, name: &str) -> Option<Self::UniformLocation>;
    /// Upload to the currently bound program
    fn set_uniform(&self, location: Option<&Self::UniformLocation>, value: UniformValue);

    fn create_vertex_array(&self) -> GpuResult<Self::VertexArray>;
    fn bind_vertex_array(&self, vao: Option<Self::VertexArray>);
    fn delete_vertex_array(&self, vao: Self::VertexArray);

    fn create_texture(&self) -> GpuResult<Self::Texture>;
    fn active_texture(&self, unit: u32);
    fn bind_texture(&self, target: TextureTarget, texture: Option<Self::Texture>);
    fn tex_storage_2d(
        &self,
        target: TextureTarget,
        levels: i32,
        format: TextureFormat,
        width: i32,
        height: i32,
    );
    fn tex_storage_3d(
        &self,
        target: TextureTarget,
        levels: i32,
        format: TextureFormat,
        width: i32,
        height: i32,
        depth: i32,
    );
    /// Upload mip level 0 of the bound 2D texture
    fn tex_sub_image_2d(
        &self,
        target: TextureTarget,
        width: i32,
        height: i32,
        pixels: PixelData<'_>,
    );
    /// Upload one layer of mip level 0 of the bound array texture
    fn tex_sub_image_3d(
        &self,
        target: TextureTarget,
        layer: i32,
        width: i32,
        height: i32,
        pixels: PixelData<'_>,
    );
    fn tex_parameter(&self, target: TextureTarget, parameter: TextureParameter);
    fn generate_mipmap(&self, target: TextureTarget);
    /// Attach `buffer` as the storage of the bound buffer texture
    fn tex_buffer(&self, format: TextureFormat, buffer: Option<Self::Buffer>);
    fn delete_texture(&self, texture: Self::Texture);

    fn create_buffer(&self) -> GpuResult<Self::Buffer>;
    fn bind_buffer(&self, target: BufferTarget, buffer: Option<Self::Buffer>);
    /// `STATIC_DRAW` upload to the bound buffer
    fn buffer_data(&self, target: BufferTarget, data: &[u8]);
    fn delete_buffer(&self, buffer: Self::Buffer);

    fn patch_vertices(&self, count: i32);
    fn polygon_mode(&self, mode: PolygonMode);
    fn enable(&self, capability: Capability);
    fn disable(&self, capability: Capability);
    fn draw_arrays_instanced(&self, primitive: Primitive, first: i32, count: i32, instances: i32);
}
