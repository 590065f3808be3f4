mod common;

use glam::{Mat4, Vec3};
use std::fs;
use std::rc::Rc;
use terrain3d::config::AssetPaths;
use terrain3d::rendering::gpu::{
    GlCommand, PolygonMode, Primitive, ShaderStage, TextureTarget, UniformValue,
};
use terrain3d::rendering::shaders::TERRAIN_UNIFORM_NAMES;
use terrain3d::rendering::{RecordingGl, RenderError, RenderMode};
use terrain3d::world::terrain::renderer::{PATCH_VERTICES, WATER_LEVEL_RATIO};
use terrain3d::world::TerrainRenderer;

const SCALAR_UNIFORMS: [&str; 7] = [
    "terrainSize",
    "heightScale",
    "spanSize",
    "chunkSize",
    "spacing",
    "textureMapResolution",
    "heightMapSize",
];

fn ready_renderer(test: &str) -> (Rc<RecordingGl>, TerrainRenderer<RecordingGl>) {
    let gl = Rc::new(RecordingGl::new());
    let mut renderer = TerrainRenderer::new(gl.clone(), common::asset_paths(test));
    renderer.init(common::terrain(128, 32)).unwrap();
    (gl, renderer)
}

fn frame(renderer: &TerrainRenderer<RecordingGl>) {
    let eye = Vec3::new(64.0, 60.0, -32.0);
    let model_view = Mat4::look_at_rh(eye, Vec3::new(64.0, 0.0, 64.0), Vec3::Y);
    let projection = Mat4::perspective_rh_gl(50f32.to_radians(), 4.0 / 3.0, 0.1, 1000.0);
    renderer.render(eye, &model_view, &projection);
}

#[test]
fn test_frame_draws_one_patch_per_chunk() {
    let (gl, renderer) = ready_renderer("frame");
    gl.clear_commands();
    frame(&renderer);

    let draws = gl.draw_calls();
    assert_eq!(draws.len(), 2);

    let terrain = &draws[0];
    assert_eq!(terrain.primitive, Primitive::Patches);
    assert_eq!(terrain.count, PATCH_VERTICES);
    assert_eq!(terrain.instances, 16);
    assert_eq!(terrain.patch_vertices, Some(4));
    assert_eq!(terrain.polygon_mode, PolygonMode::Fill);
    assert!(!terrain.blend);

    let units: Vec<(u32, TextureTarget)> = terrain
        .textures
        .iter()
        .map(|&(unit, target, _)| (unit, target))
        .collect();
    assert_eq!(
        units,
        vec![
            (0, TextureTarget::Texture2D),
            (1, TextureTarget::Texture2D),
            (2, TextureTarget::TextureBuffer),
            (3, TextureTarget::Texture2DArray),
        ]
    );

    let water = &draws[1];
    assert_eq!(water.primitive, Primitive::TriangleStrip);
    assert_eq!(water.count, 4);
    assert!(water.blend);
    assert_ne!(water.program, terrain.program);

    assert!(gl.errors().is_empty(), "{:?}", gl.errors());
}

#[test]
fn test_instances_follow_chunk_grid() {
    let gl = Rc::new(RecordingGl::new());
    let mut renderer = TerrainRenderer::new(gl.clone(), common::asset_paths("grid"));
    renderer.init(common::terrain(64, 8)).unwrap();
    frame(&renderer);

    assert_eq!(gl.draw_calls()[0].instances, 64);
}

#[test]
fn test_every_uniform_is_set_after_a_frame() {
    let (gl, renderer) = ready_renderer("uniforms");
    frame(&renderer);

    let program = gl.draw_calls()[0].program.unwrap();
    for name in TERRAIN_UNIFORM_NAMES {
        assert!(gl.program_uniform(program, name).is_some(), "uniform {} was never set", name);
    }
    assert_eq!(gl.program_uniform(program, "terrainSize"), Some(UniformValue::Int(128)));
    assert_eq!(gl.program_uniform(program, "heightMapSize"), Some(UniformValue::Int(128)));
    assert_eq!(gl.program_uniform(program, "lod"), Some(UniformValue::Float(1.0)));
    assert_eq!(
        gl.program_uniform(program, "cameraPos"),
        Some(UniformValue::Vec3([64.0, 60.0, -32.0]))
    );
}

#[test]
fn test_reload_keeps_textures_vertex_array_and_constants() {
    let (gl, mut renderer) = ready_renderer("reload");
    frame(&renderer);

    let before = gl.draw_calls()[0].clone();
    let program = before.program.unwrap();
    let scalars: Vec<Option<UniformValue>> =
        SCALAR_UNIFORMS.iter().map(|name| gl.program_uniform(program, name)).collect();
    let textures = gl.texture_names();
    let contents: Vec<Option<Vec<u8>>> = textures.iter().map(|&t| gl.texture_layer(t, 0)).collect();

    renderer.reload_shaders().unwrap();

    assert_eq!(gl.texture_names(), textures);
    let reloaded: Vec<Option<Vec<u8>>> = textures.iter().map(|&t| gl.texture_layer(t, 0)).collect();
    assert_eq!(reloaded, contents);

    gl.clear_commands();
    frame(&renderer);
    let after = gl.draw_calls()[0].clone();
    assert_eq!(after.vertex_array, before.vertex_array);
    assert_eq!(after.textures, before.textures);
    assert!(gl.is_vertex_array(after.vertex_array.unwrap()));

    let program = after.program.unwrap();
    for (name, value) in SCALAR_UNIFORMS.iter().zip(&scalars) {
        assert_eq!(&gl.program_uniform(program, name), value, "uniform {} changed", name);
    }
    for name in TERRAIN_UNIFORM_NAMES {
        assert!(
            gl.program_uniform(program, name).is_some(),
            "uniform {} unresolved after reload",
            name
        );
    }
    assert!(gl.errors().is_empty(), "{:?}", gl.errors());
}

#[test]
fn test_cleanup_releases_everything_and_reinit_reuses_names() {
    let gl = Rc::new(RecordingGl::new());
    let mut renderer = TerrainRenderer::new(gl.clone(), common::asset_paths("cleanup"));
    let terrain = common::terrain(128, 32);

    renderer.init(terrain.clone()).unwrap();
    let live = gl.live_objects();
    let textures = gl.texture_names();
    assert_eq!(textures.len(), 4);
    assert_eq!(gl.live_buffers(), 1);
    assert_eq!(gl.live_vertex_arrays(), 2);
    assert_eq!(gl.live_programs(), 2);

    renderer.cleanup();
    assert!(!renderer.is_initialized());
    assert!(!renderer.water().is_initialized());
    assert_eq!(gl.live_objects(), 0);

    renderer.cleanup();
    assert_eq!(gl.live_objects(), 0);

    renderer.init(terrain).unwrap();
    assert_eq!(gl.live_objects(), live);
    assert_eq!(gl.texture_names(), textures);

    renderer.cleanup();
    assert_eq!(gl.live_objects(), 0);
    assert!(gl.errors().is_empty(), "{:?}", gl.errors());
}

#[test]
fn test_wireframe_only_affects_the_terrain_draw() {
    let (gl, mut renderer) = ready_renderer("wireframe");
    renderer.set_mode(RenderMode::WireFrame);
    frame(&renderer);

    let draws = gl.draw_calls();
    assert_eq!(draws[0].polygon_mode, PolygonMode::Line);
    assert_eq!(draws[1].polygon_mode, PolygonMode::Fill);
    assert_eq!(gl.polygon_mode(), Some(PolygonMode::Fill));

    renderer.toggle_wireframe();
    gl.clear_commands();
    frame(&renderer);
    assert_eq!(gl.draw_calls()[0].polygon_mode, PolygonMode::Fill);
}

#[test]
fn test_missing_stage_is_fatal_and_leaks_nothing() {
    let gl = Rc::new(RecordingGl::new());
    let shaders = common::shader_copy_without("missing-stage", "terrain.tes.glsl");
    let textures = common::scratch_dir("missing-stage-textures");
    common::write_materials(&textures);
    let mut renderer = TerrainRenderer::new(gl.clone(), AssetPaths::new(shaders, textures));

    let err = match renderer.init(common::terrain(128, 32)) {
        Ok(()) => panic!("init should fail without an evaluation stage"),
        Err(err) => err,
    };
    assert!(err.is_fatal());
    match &err {
        RenderError::Link { program, diagnostics, .. } => {
            assert_eq!(program, "terrain");
            assert_eq!(diagnostics.len(), 1);
            assert_eq!(diagnostics[0].stage, ShaderStage::TessellationEvaluation);
            assert!(diagnostics[0].path.ends_with("terrain.tes.glsl"));
        }
        other => panic!("unexpected error: {}", other),
    }

    assert_eq!(attach_count(&gl), 3);
    assert_eq!(gl.live_objects(), 0);
    assert!(!renderer.is_initialized());
    assert!(gl.draw_calls().is_empty());
}

#[test]
fn test_second_init_is_rejected() {
    let (gl, mut renderer) = ready_renderer("double-init");
    let live = gl.live_objects();

    assert!(matches!(
        renderer.init(common::terrain(128, 32)),
        Err(RenderError::AlreadyInitialized)
    ));
    assert_eq!(gl.live_objects(), live);
    assert!(renderer.is_initialized());
}

#[test]
fn test_missing_material_rolls_back() {
    let gl = Rc::new(RecordingGl::new());
    let textures = common::scratch_dir("no-materials");
    let paths = AssetPaths::new(common::repo_shaders(), textures);
    let mut renderer = TerrainRenderer::new(gl.clone(), paths);

    let err = renderer.init(common::terrain(128, 32)).unwrap_err();
    assert!(matches!(err, RenderError::TextureLoad { .. }));
    assert!(!err.is_fatal());
    assert_eq!(gl.live_objects(), 0);
    assert_eq!(gl.current_program(), None);
    assert_eq!(gl.current_vertex_array(), None);
    assert!(!renderer.is_initialized());
}

#[test]
fn test_water_sits_at_fraction_of_height_scale() {
    let (gl, renderer) = ready_renderer("water-level");
    frame(&renderer);

    let terrain = renderer.terrain().unwrap();
    let expected = terrain.config().height_scale * WATER_LEVEL_RATIO;
    assert_eq!(renderer.water().water_level(), Some(expected));

    let water_program = gl.draw_calls()[1].program.unwrap();
    assert_eq!(
        gl.program_uniform(water_program, "waterLevel"),
        Some(UniformValue::Float(expected))
    );
}

fn attach_count(gl: &RecordingGl) -> usize {
    gl.commands()
        .iter()
        .filter(|c| matches!(c, GlCommand::AttachShader { .. }))
        .count()
}

#[test]
fn test_failed_reload_skips_frames_until_a_later_reload_recovers() {
    let gl = Rc::new(RecordingGl::new());
    let shaders = common::shader_copy("reload-recovers");
    let textures = common::scratch_dir("reload-recovers-textures");
    common::write_materials(&textures);
    let mut renderer = TerrainRenderer::new(gl.clone(), AssetPaths::new(shaders.clone(), textures));
    renderer.init(common::terrain(128, 32)).unwrap();
    frame(&renderer);
    let vertex_array = gl.draw_calls()[0].vertex_array.unwrap();
    let texture_names = gl.texture_names();

    let evaluation = shaders.join("terrain").join("terrain.tes.glsl");
    fs::write(&evaluation, "#version 420 core\nthis is not glsl\n").unwrap();
    let err = renderer.reload_shaders().unwrap_err();
    assert!(err.is_fatal());
    assert!(renderer.is_initialized());
    assert_eq!(gl.texture_names(), texture_names);
    assert!(gl.is_vertex_array(vertex_array));

    gl.clear_commands();
    frame(&renderer);
    assert!(gl.draw_calls().is_empty());

    fs::copy(common::repo_shaders().join("terrain").join("terrain.tes.glsl"), &evaluation).unwrap();
    renderer.reload_shaders().unwrap();
    gl.clear_commands();
    frame(&renderer);
    let draws = gl.draw_calls();
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[0].instances, 16);
    assert_eq!(draws[0].vertex_array, Some(vertex_array));

    renderer.cleanup();
    assert_eq!(gl.live_objects(), 0);
}

#[test]
fn test_water_link_failure_rolls_back_the_terrain() {
    let gl = Rc::new(RecordingGl::new());
    let shaders = common::shader_copy_without("water-fails", "water.fs.glsl");
    let textures = common::scratch_dir("water-fails-textures");
    common::write_materials(&textures);
    let mut renderer = TerrainRenderer::new(gl.clone(), AssetPaths::new(shaders, textures));

    match renderer.init(common::terrain(128, 32)) {
        Err(RenderError::Link { program, .. }) => assert_eq!(program, "water"),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(()) => panic!("init should fail without a water fragment stage"),
    }
    assert_eq!(gl.live_objects(), 0);
    assert_eq!(gl.current_program(), None);
    assert_eq!(gl.current_vertex_array(), None);
    assert!(!renderer.is_initialized());
    assert!(!renderer.water().is_initialized());
    assert!(gl.errors().is_empty(), "{:?}", gl.errors());
}

#[test]
fn test_malformed_stage_reports_a_compile_diagnostic() {
    let gl = Rc::new(RecordingGl::new());
    let shaders = common::shader_copy("malformed-stage");
    let control = shaders.join("terrain").join("terrain.tcs.glsl");
    fs::write(control, "layout(vertices = 4) out;\n").unwrap();
    let textures = common::scratch_dir("malformed-stage-textures");
    common::write_materials(&textures);
    let mut renderer = TerrainRenderer::new(gl.clone(), AssetPaths::new(shaders, textures));

    let err = renderer.init(common::terrain(128, 32)).unwrap_err();
    assert!(err.is_fatal());
    match &err {
        RenderError::Link { diagnostics, .. } => {
            assert_eq!(diagnostics.len(), 1);
            assert_eq!(diagnostics[0].stage, ShaderStage::TessellationControl);
            assert!(diagnostics[0].path.ends_with("terrain.tcs.glsl"));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(attach_count(&gl), 3);
    assert_eq!(gl.live_objects(), 0);
}
