//! Texture construction for the terrain pipeline
//!
//! Scalar maps become single-level `R32F` textures, chunk indices become an
//! `R8UI` buffer texture, and the material images are stacked into one
//! mip-mapped `RGBA8` array texture.

use crate::rendering::gpu::{
    BufferTarget, FilterMode, GraphicsApi, PixelData, TextureFormat, TextureParameter,
    TextureTarget, WrapMode,
};
use crate::rendering::{RenderError, RenderResult};
use image::GenericImageView;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Material layers in array order
pub const MATERIAL_NAMES: [&str; 4] = ["dirt", "sand", "grass", "mountain"];

/// Upper bound on material mip levels
pub const MAX_MATERIAL_MIP_LEVELS: i32 = 8;

/// Upload a square scalar map (height or light) as an `R32F` texture.
///
/// Integer pixel data is normalized by the driver on upload.
pub fn upload_scalar_map<G: GraphicsApi>(
    gl: &G,
    label: &str,
    side: u32,
    pixels: PixelData<'_>,
) -> RenderResult<G::Texture> {
    let texture = gl.create_texture()?;
    let side = side as i32;
    let target = TextureTarget::Texture2D;

    gl.bind_texture(target, Some(texture));
    gl.tex_storage_2d(target, 1, TextureFormat::R32F, side, side);
    gl.tex_sub_image_2d(target, side, side, pixels);
    gl.tex_parameter(target, TextureParameter::WrapS(WrapMode::ClampToEdge));
    gl.tex_parameter(target, TextureParameter::WrapT(WrapMode::ClampToEdge));
    gl.tex_parameter(target, TextureParameter::MinFilter(FilterMode::Linear));
    gl.tex_parameter(target, TextureParameter::MagFilter(FilterMode::Linear));
    gl.bind_texture(target, None);

    debug!("Uploaded {} ({}x{}, R32F)", label, side, side);
    Ok(texture)
}

/// Buffer texture together with the buffer backing it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferTexture<T, B> {
    pub texture: T,
    pub buffer: B,
}

/// Upload one byte per chunk into a buffer and expose it as an `R8UI`
/// buffer texture.
pub fn upload_index_texture<G: GraphicsApi>(
    gl: &G,
    indices: &[u8],
) -> RenderResult<BufferTexture<G::Texture, G::Buffer>> {
    let buffer = gl.create_buffer()?;
    gl.bind_buffer(BufferTarget::TextureBuffer, Some(buffer));
    gl.buffer_data(BufferTarget::TextureBuffer, indices);
    gl.bind_buffer(BufferTarget::TextureBuffer, None);

    let texture = match gl.create_texture() {
        Ok(texture) => texture,
        Err(e) => {
            gl.delete_buffer(buffer);
            return Err(e.into());
        }
    };
    gl.bind_texture(TextureTarget::TextureBuffer, Some(texture));
    gl.tex_buffer(TextureFormat::R8UI, Some(buffer));
    gl.bind_texture(TextureTarget::TextureBuffer, None);

    debug!("Uploaded {} chunk texture indices", indices.len());
    Ok(BufferTexture { texture, buffer })
}

/// Decoded material layers, all the same square size
#[derive(Debug, Clone)]
pub struct MaterialImages {
    pub side: u32,
    /// RGBA8 texels, one entry per name in [`MATERIAL_NAMES`]
    pub layers: Vec<Vec<u8>>,
}

impl MaterialImages {
    /// Decode `<dir>/<name>.png` for every material.
    ///
    /// The first image fixes the layer size; every image must be square and
    /// match it.
    pub fn load(dir: &Path) -> RenderResult<Self> {
        let mut side = None;
        let mut layers = Vec::with_capacity(MATERIAL_NAMES.len());

        for name in MATERIAL_NAMES {
            let path = material_path(dir, name);
            let img = image::open(&path).map_err(|source| RenderError::TextureLoad {
                path: path.clone(),
                source,
            })?;
            let (width, height) = img.dimensions();
            let expected = *side.get_or_insert(width);
            if width != height || width != expected || width == 0 {
                return Err(RenderError::MaterialSizeMismatch {
                    path,
                    width,
                    height,
                    expected,
                });
            }
            debug!("Loaded material {} ({}x{})", path.display(), width, height);
            layers.push(img.to_rgba8().into_raw());
        }

        Ok(Self {
            side: side.unwrap_or(0),
            layers,
        })
    }

    pub fn mip_levels(&self) -> i32 {
        mip_levels(self.side)
    }
}

pub fn material_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.png", name))
}

/// Whether every material image is present under `dir`
pub fn materials_present(dir: &Path) -> bool {
    MATERIAL_NAMES.iter().all(|name| material_path(dir, name).is_file())
}

/// Full chain length for `side`, capped at [`MAX_MATERIAL_MIP_LEVELS`]
pub fn mip_levels(side: u32) -> i32 {
    let full_chain = (u32::BITS - side.leading_zeros()) as i32;
    full_chain.clamp(1, MAX_MATERIAL_MIP_LEVELS)
}

/// Stack the material layers into a mip-mapped `RGBA8` array texture
pub fn upload_material_array<G: GraphicsApi>(
    gl: &G,
    materials: &MaterialImages,
) -> RenderResult<G::Texture> {
    let texture = gl.create_texture()?;
    let side = materials.side as i32;
    let levels = materials.mip_levels();
    let target = TextureTarget::Texture2DArray;

    gl.bind_texture(target, Some(texture));
    let layers = materials.layers.len() as i32;
    gl.tex_storage_3d(target, levels, TextureFormat::Rgba8, side, side, layers);
    for (layer, texels) in materials.layers.iter().enumerate() {
        gl.tex_sub_image_3d(target, layer as i32, side, side, PixelData::Rgba8(texels));
    }
    gl.generate_mipmap(target);
    gl.tex_parameter(target, TextureParameter::MinFilter(FilterMode::LinearMipmapLinear));
    gl.tex_parameter(target, TextureParameter::MagFilter(FilterMode::Linear));
    gl.bind_texture(target, None);

    info!(
        "Material array ready: {} layers of {}x{}, {} mip levels",
        materials.layers.len(),
        side,
        side,
        levels
    );
    Ok(texture)
}
