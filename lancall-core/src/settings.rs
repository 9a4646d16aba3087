//! Persisted user preferences
//!
//! Stored as pretty JSON in `settings.json` under the platform config
//! directory. Loading is tolerant: a missing, unreadable, or invalid
//! file yields defaults, and unknown fields round-trip through serde
//! defaults so older files keep working.

use std::fs;
use std::path::PathBuf;

/// Directory under the platform config dir
pub const APP_DIR_NAME: &str = "lancall";

/// Settings file name
pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// User preferences for the application
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Settings {
    /// Display name used in rooms
    #[serde(default)]
    pub username: String,

    /// Input device name, empty for system default
    #[serde(default)]
    pub input_device: String,

    /// Output device name, empty for system default
    #[serde(default)]
    pub output_device: String,

    /// Playback gain; 1.0 is passthrough
    #[serde(default = "default_volume")]
    pub volume: f32,

    /// Whether incoming audio starts muted
    #[serde(default)]
    pub muted: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            username: String::new(),
            input_device: String::new(),
            output_device: String::new(),
            volume: default_volume(),
            muted: false,
        }
    }
}

fn default_volume() -> f32 {
    1.0
}

impl Settings {
    /// The platform-specific settings file path
    ///
    /// Returns None if the config directory cannot be determined.
    pub fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(SETTINGS_FILE_NAME))
    }

    /// Load settings from the default location, defaults on any failure
    pub fn load() -> Self {
        Self::settings_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Load settings from a specific path, defaults on any failure
    pub fn load_from(path: &std::path::Path) -> Self {
        if path.exists()
            && let Ok(contents) = fs::read_to_string(path)
            && let Ok(settings) = serde_json::from_str::<Settings>(&contents)
        {
            return settings;
        }
        Self::default()
    }

    /// Save settings to the default location
    pub fn save(&self) -> Result<(), String> {
        let path = Self::settings_path()
            .ok_or_else(|| "Could not determine config directory".to_string())?;
        self.save_to(&path)
    }

    /// Save settings to a specific path, creating parent directories
    pub fn save_to(&self, path: &std::path::Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;
        fs::write(path, json).map_err(|e| format!("Failed to write settings: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert!(settings.username.is_empty());
        assert!(settings.input_device.is_empty());
        assert!(settings.output_device.is_empty());
        assert_eq!(settings.volume, 1.0);
        assert!(!settings.muted);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join(SETTINGS_FILE_NAME);

        let settings = Settings {
            username: "alice".to_string(),
            input_device: "USB Mic".to_string(),
            output_device: String::new(),
            volume: 0.8,
            muted: true,
        };
        settings.save_to(&path).expect("save");

        let loaded = Settings::load_from(&path);
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let loaded = Settings::load_from(&dir.path().join("nope.json"));
        assert_eq!(loaded, Settings::default());
    }

    #[test]
    fn test_invalid_json_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(SETTINGS_FILE_NAME);
        fs::write(&path, "{ not json").expect("write");
        assert_eq!(Settings::load_from(&path), Settings::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(SETTINGS_FILE_NAME);
        fs::write(&path, r#"{"username": "bob"}"#).expect("write");

        let loaded = Settings::load_from(&path);
        assert_eq!(loaded.username, "bob");
        assert_eq!(loaded.volume, 1.0);
        assert!(!loaded.muted);
    }
}
