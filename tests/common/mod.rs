#![allow(dead_code)]

use image::{Rgba, RgbaImage};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use terrain3d::config::AssetPaths;
use terrain3d::rendering::texture::{material_path, MATERIAL_NAMES};
use terrain3d::world::{TerrainConfig, TerrainData, TerrainGenerator};

pub const MATERIAL_SIDE: u32 = 16;

/// Fresh scratch directory for one test
pub fn scratch_dir(test: &str) -> PathBuf {
    let dir = std::env::temp_dir()
        .join(format!("terrain3d-it-{}-{}", test, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn repo_shaders() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("shaders")
}

pub fn write_materials(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    for (i, name) in MATERIAL_NAMES.iter().enumerate() {
        let color = Rgba([40 * i as u8, 90, 30, 255]);
        let img = RgbaImage::from_pixel(MATERIAL_SIDE, MATERIAL_SIDE, color);
        img.save(material_path(dir, name)).unwrap();
    }
}

/// Repo shaders plus generated materials in a scratch directory
pub fn asset_paths(test: &str) -> AssetPaths {
    let textures = scratch_dir(test).join("textures");
    write_materials(&textures);
    AssetPaths::new(repo_shaders(), textures)
}

/// Writable copy of the repo shaders
pub fn shader_copy(test: &str) -> PathBuf {
    copy_shaders(test, None)
}

/// Copy of the repo shaders with `skip` left out
pub fn shader_copy_without(test: &str, skip: &str) -> PathBuf {
    copy_shaders(test, Some(skip))
}

fn copy_shaders(test: &str, skip: Option<&str>) -> PathBuf {
    let root = scratch_dir(&format!("{}-shaders", test));
    for program in ["terrain", "water"] {
        let from = repo_shaders().join(program);
        let to = root.join(program);
        fs::create_dir_all(&to).unwrap();
        for entry in fs::read_dir(&from).unwrap() {
            let entry = entry.unwrap();
            if skip.map_or(true, |skip| entry.file_name() != skip) {
                fs::copy(entry.path(), to.join(entry.file_name())).unwrap();
            }
        }
    }
    root
}

pub fn terrain(size: u32, chunk_size: u32) -> Rc<TerrainData> {
    let config = TerrainConfig {
        size,
        chunk_size,
        seed: 42,
        ..Default::default()
    };
    Rc::new(TerrainGenerator::new(config).generate().unwrap())
}
