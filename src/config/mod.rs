pub mod paths;
pub mod settings;

// Re-export commonly used types
pub use paths::AssetPaths;
pub use settings::{
    SettingKey, SettingValue, Settings, SettingsError, SettingsListener, SettingsResult,
};
