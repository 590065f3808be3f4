use anyhow::{Context, Result};
use glam::{Mat4, Vec3};
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use terrain3d::config::{AssetPaths, SettingKey, Settings};
use terrain3d::rendering::texture::materials_present;
use terrain3d::rendering::{RecordingGl, RenderMode};
use terrain3d::utils::logging::{init_logging, log_system_info};
use terrain3d::world::{TerrainConfig, TerrainData, TerrainGenerator, TerrainRenderer};
use terrain3d::VERSION;
use tracing::{error, info, warn};

fn main() -> Result<()> {
    init_logging();
    log_system_info();
    info!("terrain3d {}", VERSION);

    let out_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("out"));

    let settings_path = Settings::default_path();
    let settings = Settings::load(&settings_path)
        .with_context(|| format!("loading settings from {}", settings_path.display()))?;

    let config = TerrainConfig::from_settings(&settings);
    let terrain = TerrainGenerator::new(config)
        .generate()
        .context("generating terrain")?;
    let terrain = Rc::new(terrain);

    fs::create_dir_all(&out_dir).with_context(|| format!("creating {}", out_dir.display()))?;
    terrain
        .height_map()
        .to_image()
        .save(out_dir.join("heightmap.png"))
        .context("writing height map")?;
    terrain
        .light_map()
        .to_image()
        .save(out_dir.join("lightmap.png"))
        .context("writing light map")?;
    info!("Wrote height and light maps to {}", out_dir.display());

    let paths = AssetPaths::default();
    if !materials_present(&paths.texture_root) {
        warn!(
            "Material textures not found under {}, skipping headless frame",
            paths.texture_root.display()
        );
        return Ok(());
    }

    run_headless_frame(terrain, paths, &settings)
}

/// Drive one init/render/reload/cleanup cycle against the recording backend
fn run_headless_frame(
    terrain: Rc<TerrainData>,
    paths: AssetPaths,
    settings: &Settings,
) -> Result<()> {
    let gl = Rc::new(RecordingGl::new());
    let mut renderer = TerrainRenderer::new(gl.clone(), paths);
    renderer.set_mode(RenderMode::from_wireframe(settings.bool(SettingKey::CameraWireframe)));
    renderer.set_lod_factor(settings.float(SettingKey::CameraLod) as f32);

    if let Err(e) = renderer.init(terrain.clone()) {
        if e.is_fatal() {
            error!("Fatal renderer error: {}", e);
        }
        return Err(e).context("initializing terrain renderer");
    }

    let config = terrain.config();
    let center = Vec3::new(config.extent() * 0.5, 0.0, config.extent() * 0.5);
    let mut camera = Vec3::new(
        settings.float(SettingKey::CameraPositionX) as f32,
        settings.float(SettingKey::CameraPositionY) as f32,
        settings.float(SettingKey::CameraPositionZ) as f32,
    );
    if camera == Vec3::ZERO {
        camera = center + Vec3::new(0.0, config.height_scale * 2.0, -config.extent() * 0.75);
    }

    let width = settings.int(SettingKey::ScreenResolutionWidth).max(1) as f32;
    let height = settings.int(SettingKey::ScreenResolutionHeight).max(1) as f32;
    let fov = settings.float(SettingKey::CameraFov) as f32;
    let projection = Mat4::perspective_rh_gl(fov.to_radians(), width / height, 0.1, 10_000.0);
    let model_view = Mat4::look_at_rh(camera, center, Vec3::Y);

    renderer.render(camera, &model_view, &projection);
    for draw in gl.draw_calls() {
        info!(
            "Draw {:?}: {} vertices x {} instances, {:?}, {} textures bound",
            draw.primitive,
            draw.count,
            draw.instances,
            draw.polygon_mode,
            draw.textures.len()
        );
    }

    renderer.reload_shaders().context("reloading shaders")?;
    renderer.cleanup();

    info!("{} GL objects alive after cleanup", gl.live_objects());
    for message in gl.errors() {
        warn!("GL misuse: {}", message);
    }
    Ok(())
}
