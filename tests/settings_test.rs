mod common;

use std::fs;
use terrain3d::config::{SettingKey, SettingValue, Settings, SettingsError};
use terrain3d::world::TerrainConfig;
use terrain3d::RenderMode;

#[test]
fn test_missing_file_yields_defaults() {
    let path = common::scratch_dir("settings-missing").join("terrain3d.toml");
    let settings = Settings::load(&path).unwrap();

    assert_eq!(settings.path(), Some(path.as_path()));
    for key in SettingKey::ALL {
        assert_eq!(settings.value(key), key.default_value(), "{}", key);
    }
    assert_eq!(TerrainConfig::from_settings(&settings), TerrainConfig::default());
}

#[test]
fn test_saved_values_load_back() {
    let path = common::scratch_dir("settings-save").join("nested").join("terrain3d.toml");
    let mut settings = Settings::load(&path).unwrap();
    settings.set_value(SettingKey::GeneratorSize, 256i64);
    settings.set_value(SettingKey::TerrainHeightScale, 45.5);
    settings.set_value(SettingKey::CameraWireframe, true);
    settings.save().unwrap();

    let written = fs::read_to_string(&path).unwrap();
    assert!(written.contains("Version"));
    assert!(written.contains(terrain3d::VERSION));

    let loaded = Settings::load(&path).unwrap();
    assert_eq!(loaded.int(SettingKey::GeneratorSize), 256);
    assert_eq!(loaded.float(SettingKey::TerrainHeightScale), 45.5);
    assert!(loaded.bool(SettingKey::CameraWireframe));
    assert_eq!(
        RenderMode::from_wireframe(loaded.bool(SettingKey::CameraWireframe)),
        RenderMode::WireFrame
    );

    let config = TerrainConfig::from_settings(&loaded);
    assert_eq!(config.size, 256);
    assert_eq!(config.height_scale, 45.5);
}

#[test]
fn test_hand_written_file_is_interpreted() {
    let path = common::scratch_dir("settings-hand").join("terrain3d.toml");
    fs::write(
        &path,
        "Version = \"0.1.0\"\nCameraWireframe = \"true\"\nCameraFov = 70\n\
         TerrainBlockSize = 16\nSomethingElse = 3\n",
    )
    .unwrap();

    let settings = Settings::load(&path).unwrap();
    assert_eq!(settings.value(SettingKey::CameraWireframe), SettingValue::Bool(true));
    assert_eq!(settings.value(SettingKey::CameraFov), SettingValue::Float(70.0));
    assert_eq!(settings.int(SettingKey::TerrainBlockSize), 16);
}

#[test]
fn test_malformed_file_is_reported() {
    let path = common::scratch_dir("settings-bad").join("terrain3d.toml");
    fs::write(&path, "GeneratorSize = = 3\n").unwrap();

    assert!(matches!(Settings::load(&path), Err(SettingsError::Parse { .. })));
}

#[test]
fn test_queued_restart_values() {
    let path = common::scratch_dir("settings-queue").join("terrain3d.toml");
    let mut settings = Settings::load(&path).unwrap();

    settings.enqueue_value(SettingKey::CameraFov, 60.0);
    assert!(!settings.contains_queued_value_requiring_restart());
    settings.enqueue_value(SettingKey::GeneratorSize, 512i64);
    assert!(settings.contains_queued_value_requiring_restart());

    settings.apply_queued_values();
    assert!(!settings.contains_queued_value_requiring_restart());
    assert_eq!(settings.int(SettingKey::GeneratorSize), 512);
    assert_eq!(settings.float(SettingKey::CameraFov), 60.0);
}
