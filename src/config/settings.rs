use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, info, warn};

const SETTINGS_FILE: &str = "terrain3d.toml";
const VERSION_KEY: &str = "Version";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to access settings file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Settings have no file to save to")]
    NoPath,
}

pub type SettingsResult<T> = Result<T, SettingsError>;

// =============================================================================
// Keys
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SettingKey {
    // Graphics
    ScreenResolutionWidth,
    ScreenResolutionHeight,
    ScreenIsFullscreen,
    CameraPositionX,
    CameraPositionY,
    CameraPositionZ,
    CameraFov,
    CameraLod,
    CameraWireframe,

    // World
    GeneratorSize,
    GeneratorTextureMapResolution,
    GeneratorSeed,
    TerrainSpacing,
    TerrainHeightScale,
    TerrainBlockSize,
    TerrainSpanSize,
}

impl SettingKey {
    pub const ALL: [SettingKey; 16] = [
        SettingKey::ScreenResolutionWidth,
        SettingKey::ScreenResolutionHeight,
        SettingKey::ScreenIsFullscreen,
        SettingKey::CameraPositionX,
        SettingKey::CameraPositionY,
        SettingKey::CameraPositionZ,
        SettingKey::CameraFov,
        SettingKey::CameraLod,
        SettingKey::CameraWireframe,
        SettingKey::GeneratorSize,
        SettingKey::GeneratorTextureMapResolution,
        SettingKey::GeneratorSeed,
        SettingKey::TerrainSpacing,
        SettingKey::TerrainHeightScale,
        SettingKey::TerrainBlockSize,
        SettingKey::TerrainSpanSize,
    ];

    /// Name used in the settings file
    pub fn name(self) -> &'static str {
        match self {
            SettingKey::ScreenResolutionWidth => "ScreenResolutionWidth",
            SettingKey::ScreenResolutionHeight => "ScreenResolutionHeight",
            SettingKey::ScreenIsFullscreen => "ScreenIsFullscreen",
            SettingKey::CameraPositionX => "CameraPositionX",
            SettingKey::CameraPositionY => "CameraPositionY",
            SettingKey::CameraPositionZ => "CameraPositionZ",
            SettingKey::CameraFov => "CameraFov",
            SettingKey::CameraLod => "CameraLod",
            SettingKey::CameraWireframe => "CameraWireframe",
            SettingKey::GeneratorSize => "GeneratorSize",
            SettingKey::GeneratorTextureMapResolution => "GeneratorTextureMapResolution",
            SettingKey::GeneratorSeed => "GeneratorSeed",
            SettingKey::TerrainSpacing => "TerrainSpacing",
            SettingKey::TerrainHeightScale => "TerrainHeightScale",
            SettingKey::TerrainBlockSize => "TerrainBlockSize",
            SettingKey::TerrainSpanSize => "TerrainSpanSize",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.name() == name)
    }

    pub fn default_value(self) -> SettingValue {
        use SettingValue::{Bool, Float, Int};
        match self {
            SettingKey::ScreenResolutionWidth => Int(800),
            SettingKey::ScreenResolutionHeight => Int(600),
            SettingKey::ScreenIsFullscreen => Bool(false),
            SettingKey::CameraPositionX => Float(0.0),
            SettingKey::CameraPositionY => Float(0.0),
            SettingKey::CameraPositionZ => Float(0.0),
            SettingKey::CameraFov => Float(50.0),
            SettingKey::CameraLod => Float(1.0),
            SettingKey::CameraWireframe => Bool(false),
            SettingKey::GeneratorSize => Int(128),
            SettingKey::GeneratorTextureMapResolution => Int(2),
            SettingKey::GeneratorSeed => Int(0),
            SettingKey::TerrainSpacing => Float(1.0),
            SettingKey::TerrainHeightScale => Float(30.0),
            SettingKey::TerrainBlockSize => Int(32),
            SettingKey::TerrainSpanSize => Int(8),
        }
    }

    /// Whether a change only takes effect after the world is rebuilt
    pub fn requires_restart(self) -> bool {
        matches!(
            self,
            SettingKey::GeneratorSize
                | SettingKey::GeneratorTextureMapResolution
                | SettingKey::GeneratorSeed
                | SettingKey::TerrainBlockSize
        )
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Values
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl SettingValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(b) => Some(*b),
            SettingValue::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            SettingValue::Int(i) => Some(*i),
            SettingValue::Float(f) => Some(*f as i64),
            SettingValue::Bool(b) => Some(*b as i64),
            SettingValue::Text(t) => t.trim().parse().ok(),
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            SettingValue::Float(f) => Some(*f),
            SettingValue::Int(i) => Some(*i as f64),
            SettingValue::Text(t) => t.trim().parse().ok(),
            SettingValue::Bool(_) => None,
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Bool(b) => write!(f, "{}", b),
            SettingValue::Int(i) => write!(f, "{}", i),
            SettingValue::Float(v) => write!(f, "{}", v),
            SettingValue::Text(t) => write!(f, "{}", t),
        }
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        SettingValue::Int(value)
    }
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        SettingValue::Float(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::Text(value.to_string())
    }
}

// =============================================================================
// Settings store
// =============================================================================

/// Notified after queued values have been applied
pub trait SettingsListener {
    fn settings_changed(&self, changed: &[SettingKey]);
}

/// Persistent key/value settings with defaults and a deferred change queue
#[derive(Default)]
pub struct Settings {
    path: Option<PathBuf>,
    values: BTreeMap<String, SettingValue>,
    queue: Vec<(SettingKey, SettingValue)>,
    listeners: Vec<Rc<dyn SettingsListener>>,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("path", &self.path)
            .field("values", &self.values)
            .field("queue", &self.queue)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Settings {
    /// `terrain3d.toml` in the platform config directory, or the working
    /// directory when no home directory can be determined
    pub fn default_path() -> PathBuf {
        ProjectDirs::from("com", "terrain3d", "terrain3d")
            .map(|proj| proj.config_dir().join(SETTINGS_FILE))
            .unwrap_or_else(|| {
                std::env::current_dir()
                    .unwrap_or_else(|_| PathBuf::from("."))
                    .join(SETTINGS_FILE)
            })
    }

    /// Read settings from `path`. A missing file yields the defaults; the
    /// path is remembered for [`Settings::save`].
    pub fn load(path: impl AsRef<Path>) -> SettingsResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut settings = Self {
            path: Some(path.clone()),
            ..Self::default()
        };

        if !path.exists() {
            info!("No settings at {}, using defaults", path.display());
            return Ok(settings);
        }

        let data = fs::read_to_string(&path).map_err(|source| SettingsError::Io {
            path: path.clone(),
            source,
        })?;
        let mut values: BTreeMap<String, SettingValue> =
            toml::from_str(&data).map_err(|source| SettingsError::Parse {
                path: path.clone(),
                source,
            })?;

        if let Some(version) = values.remove(VERSION_KEY) {
            debug!("Settings file written by version {}", version);
        }
        for name in values.keys() {
            if SettingKey::from_name(name).is_none() {
                warn!("Ignoring unknown setting '{}'", name);
            }
        }
        values.retain(|name, _| SettingKey::from_name(name).is_some());

        info!("Loaded {} settings from {}", values.len(), path.display());
        settings.values = values;
        Ok(settings)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Stored value, or the key's default.
    ///
    /// `"true"`/`"false"` text reads back as a bool and whole numbers stored
    /// for float keys are widened.
    pub fn value(&self, key: SettingKey) -> SettingValue {
        let default = key.default_value();
        let float_key = matches!(default, SettingValue::Float(_));
        match self.values.get(key.name()) {
            None => default,
            Some(SettingValue::Text(text)) if text == "true" || text == "false" => {
                SettingValue::Bool(text == "true")
            }
            Some(SettingValue::Int(i)) if float_key => SettingValue::Float(*i as f64),
            Some(value) => value.clone(),
        }
    }

    pub fn bool(&self, key: SettingKey) -> bool {
        self.value(key)
            .as_bool()
            .or_else(|| key.default_value().as_bool())
            .unwrap_or_default()
    }

    pub fn int(&self, key: SettingKey) -> i64 {
        self.value(key)
            .as_int()
            .or_else(|| key.default_value().as_int())
            .unwrap_or_default()
    }

    pub fn float(&self, key: SettingKey) -> f64 {
        self.value(key)
            .as_float()
            .or_else(|| key.default_value().as_float())
            .unwrap_or_default()
    }

    pub fn set_value(&mut self, key: SettingKey, value: impl Into<SettingValue>) {
        let value = value.into();
        debug!("Setting {} = {}", key, value);
        self.values.insert(key.name().to_string(), value);
    }

    /// Queue a change for [`Settings::apply_queued_values`]; a value equal
    /// to the current one is dropped.
    pub fn enqueue_value(&mut self, key: SettingKey, value: impl Into<SettingValue>) {
        let value = value.into();
        if self.value(key) != value {
            self.queue.push((key, value));
        }
    }

    pub fn queued_values(&self) -> &[(SettingKey, SettingValue)] {
        &self.queue
    }

    /// Apply queued changes in order, then notify every listener once
    pub fn apply_queued_values(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        let queue = std::mem::take(&mut self.queue);
        let mut changed = Vec::with_capacity(queue.len());
        for (key, value) in queue {
            self.set_value(key, value);
            if !changed.contains(&key) {
                changed.push(key);
            }
        }
        for listener in &self.listeners {
            listener.settings_changed(&changed);
        }
    }

    pub fn contains_queued_value_requiring_restart(&self) -> bool {
        self.queue.iter().any(|(key, _)| key.requires_restart())
    }

    pub fn add_listener(&mut self, listener: Rc<dyn SettingsListener>) {
        if !self.listeners.iter().any(|l| Rc::ptr_eq(l, &listener)) {
            self.listeners.push(listener);
        }
    }

    pub fn remove_listener(&mut self, listener: &Rc<dyn SettingsListener>) {
        self.listeners.retain(|l| !Rc::ptr_eq(l, listener));
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Write every stored value plus the program version
    pub fn save(&self) -> SettingsResult<()> {
        let path = self.path.as_ref().ok_or(SettingsError::NoPath)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| SettingsError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut values = self.values.clone();
        values.insert(VERSION_KEY.to_string(), SettingValue::from(crate::VERSION));
        let toml = toml::to_string_pretty(&values)?;
        fs::write(path, toml).map_err(|source| SettingsError::Io {
            path: path.clone(),
            source,
        })?;

        info!("Saved settings to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        seen: RefCell<Vec<Vec<SettingKey>>>,
    }

    impl SettingsListener for Recorder {
        fn settings_changed(&self, changed: &[SettingKey]) {
            self.seen.borrow_mut().push(changed.to_vec());
        }
    }

    #[test]
    fn test_every_key_has_a_distinct_name() {
        for key in SettingKey::ALL {
            assert_eq!(SettingKey::from_name(key.name()), Some(key));
        }
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.int(SettingKey::ScreenResolutionWidth), 800);
        assert_eq!(settings.float(SettingKey::TerrainHeightScale), 30.0);
        assert!(!settings.bool(SettingKey::CameraWireframe));
        assert!(SettingKey::TerrainBlockSize.requires_restart());
        assert!(!SettingKey::TerrainSpanSize.requires_restart());
    }

    #[test]
    fn test_text_booleans_and_widened_ints() {
        let mut settings = Settings::default();
        settings.set_value(SettingKey::CameraWireframe, "true");
        settings.set_value(SettingKey::CameraFov, 70i64);

        assert_eq!(settings.value(SettingKey::CameraWireframe), SettingValue::Bool(true));
        assert_eq!(settings.value(SettingKey::CameraFov), SettingValue::Float(70.0));
    }

    #[test]
    fn test_enqueue_skips_unchanged_values() {
        let mut settings = Settings::default();
        settings.enqueue_value(SettingKey::GeneratorSize, 128i64);
        assert!(settings.queued_values().is_empty());

        settings.enqueue_value(SettingKey::TerrainSpanSize, 4i64);
        assert!(!settings.contains_queued_value_requiring_restart());
        settings.enqueue_value(SettingKey::GeneratorSeed, 9i64);
        assert!(settings.contains_queued_value_requiring_restart());
    }

    #[test]
    fn test_apply_notifies_listeners_once() {
        let mut settings = Settings::default();
        let recorder = Rc::new(Recorder::default());
        let listener: Rc<dyn SettingsListener> = recorder.clone();
        settings.add_listener(listener.clone());
        settings.add_listener(listener.clone());
        assert_eq!(settings.listener_count(), 1);

        settings.enqueue_value(SettingKey::CameraLod, 2.0);
        settings.enqueue_value(SettingKey::CameraWireframe, true);
        settings.apply_queued_values();

        assert_eq!(settings.float(SettingKey::CameraLod), 2.0);
        assert!(settings.queued_values().is_empty());
        assert_eq!(
            *recorder.seen.borrow(),
            vec![vec![SettingKey::CameraLod, SettingKey::CameraWireframe]]
        );

        settings.remove_listener(&listener);
        settings.enqueue_value(SettingKey::CameraLod, 3.0);
        settings.apply_queued_values();
        assert_eq!(recorder.seen.borrow().len(), 1);
    }

    #[test]
    fn test_save_without_path_fails() {
        assert!(matches!(Settings::default().save(), Err(SettingsError::NoPath)));
    }
}
