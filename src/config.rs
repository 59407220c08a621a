use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::converter::ConverterBackend;
use crate::utils::SUPPORTED_EXTENSIONS;

pub const DEFAULT_QUALITY: u8 = 75;
pub const DEFAULT_SUBFOLDER: &str = "Converted Images";
pub const DEFAULT_OUTPUT_PREFIX: &str = "converted_";
pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// Where converted files are written, as persisted in the settings file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SaveLocationType {
    /// Next to the source image
    Original,
    /// In a named folder inside the source image's folder
    #[default]
    Subfolder,
    /// In a single user-chosen folder
    Custom,
}

/// Typed view of the save-location pair stored in [`Settings`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveLocation {
    Original,
    Subfolder(String),
    Custom(PathBuf),
}

impl Default for SaveLocation {
    fn default() -> Self {
        SaveLocation::Subfolder(DEFAULT_SUBFOLDER.to_string())
    }
}

/// User preferences persisted between runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredSettings")]
pub struct Settings {
    /// cwebp quality factor (0-100)
    pub quality: u8,
    pub save_location_type: SaveLocationType,
    /// Subfolder name or custom folder path, depending on the type
    pub save_location_path: String,
    /// Prepended to every output file name
    pub output_prefix: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            save_location_type: SaveLocationType::Subfolder,
            save_location_path: DEFAULT_SUBFOLDER.to_string(),
            output_prefix: DEFAULT_OUTPUT_PREFIX.to_string(),
        }
    }
}

impl Settings {
    /// Load settings from `path`.
    ///
    /// A missing file yields the defaults. A file that cannot be read or is not
    /// a JSON object is reported with a warning and also yields the defaults.
    /// Inside a valid object each key is checked on its own, so one bad value
    /// only resets that key.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            log::debug!("No settings file at {}, using defaults", path.display());
            return Self::default();
        }

        let parsed = std::fs::read_to_string(path)
            .map_err(anyhow::Error::from)
            .and_then(|raw| serde_json::from_str::<Settings>(&raw).map_err(anyhow::Error::from));

        match parsed {
            Ok(settings) => {
                log::debug!("Loaded settings from {}", path.display());
                settings
            }
            Err(e) => {
                log::warn!("Failed to load settings from {}: {:#}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Write settings as pretty JSON, creating the parent directory if needed
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            }
        }

        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to save settings: {}", path.display()))?;
        log::debug!("Saved settings to {}", path.display());
        Ok(())
    }

    /// `settings.json` next to the running executable
    pub fn default_path() -> Result<PathBuf> {
        let exe = std::env::current_exe().context("Failed to locate the running executable")?;
        let dir = exe
            .parent()
            .context("Executable has no parent directory")?;
        Ok(dir.join(SETTINGS_FILE_NAME))
    }

    pub fn save_location(&self) -> SaveLocation {
        let path = self.save_location_path.trim();
        match self.save_location_type {
            SaveLocationType::Original => SaveLocation::Original,
            SaveLocationType::Subfolder if path.is_empty() => SaveLocation::default(),
            SaveLocationType::Subfolder => SaveLocation::Subfolder(path.to_string()),
            SaveLocationType::Custom if path.is_empty() => {
                log::warn!("Custom save location has no folder, using the default subfolder");
                SaveLocation::default()
            }
            SaveLocationType::Custom => SaveLocation::Custom(PathBuf::from(path)),
        }
    }

    pub fn set_save_location(&mut self, location: SaveLocation) {
        match location {
            SaveLocation::Original => {
                self.save_location_type = SaveLocationType::Original;
                self.save_location_path = String::new();
            }
            SaveLocation::Subfolder(name) => {
                self.save_location_type = SaveLocationType::Subfolder;
                self.save_location_path = name;
            }
            SaveLocation::Custom(path) => {
                self.save_location_type = SaveLocationType::Custom;
                self.save_location_path = path.to_string_lossy().into_owned();
            }
        }
    }
}

/// On-disk shape of [`Settings`]; every key is optional and checked separately
#[derive(Debug, Default, Deserialize)]
struct StoredSettings {
    quality: Option<serde_json::Value>,
    save_location_type: Option<serde_json::Value>,
    save_location_path: Option<serde_json::Value>,
    output_prefix: Option<serde_json::Value>,
}

impl From<StoredSettings> for Settings {
    fn from(stored: StoredSettings) -> Self {
        let defaults = Settings::default();

        let quality = match stored.quality {
            None => defaults.quality,
            Some(value) => parse_quality(&value).unwrap_or_else(|| {
                log::warn!("Ignoring invalid quality {value}, using {}", defaults.quality);
                defaults.quality
            }),
        };

        let location_type = match stored.save_location_type {
            None => Some(defaults.save_location_type),
            Some(value) => {
                let parsed = serde_json::from_value::<SaveLocationType>(value.clone()).ok();
                if parsed.is_none() {
                    log::warn!("Unknown save location type {value}, using the default subfolder");
                }
                parsed
            }
        };

        let (save_location_type, save_location_path) = match location_type {
            Some(location_type) => (
                location_type,
                string_or(stored.save_location_path, "save_location_path", &defaults.save_location_path),
            ),
            // The stored path belongs to a location we don't understand
            None => (defaults.save_location_type, defaults.save_location_path.clone()),
        };

        Settings {
            quality,
            save_location_type,
            save_location_path,
            output_prefix: string_or(stored.output_prefix, "output_prefix", &defaults.output_prefix),
        }
    }
}

/// Read a quality number, clamping it to 0-100
fn parse_quality(value: &serde_json::Value) -> Option<u8> {
    let number = value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f.round() as i64))?;
    let clamped = number.clamp(0, 100);
    if clamped != number {
        log::warn!("Quality {number} out of range, clamping to {clamped}");
    }
    Some(clamped as u8)
}

fn string_or(value: Option<serde_json::Value>, key: &str, default: &str) -> String {
    match value {
        None => default.to_string(),
        Some(serde_json::Value::String(s)) => s,
        Some(other) => {
            log::warn!("Ignoring invalid {key} {other}, using {default:?}");
            default.to_string()
        }
    }
}

/// Conversion options that can be passed to the core library
#[derive(Debug, Clone)]
pub struct ConversionOptions {
    pub quality: u8,
    pub save_location: SaveLocation,
    pub output_prefix: String,
    pub backend: ConverterBackend,
    pub converter_path: Option<PathBuf>,
    pub skip_existing: bool,
    pub dry_run: bool,
    pub recursive: bool,
    pub verify_headers: bool,
    pub extensions: Vec<String>,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl ConversionOptions {
    /// Build options from persisted settings with everything else at defaults
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            quality: settings.quality.min(100),
            save_location: settings.save_location(),
            output_prefix: settings.output_prefix.clone(),
            backend: ConverterBackend::External,
            converter_path: None,
            skip_existing: false,
            dry_run: false,
            recursive: false,
            verify_headers: false,
            extensions: SUPPORTED_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
        }
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.min(100);
        self
    }

    pub fn with_save_location(mut self, location: SaveLocation) -> Self {
        self.save_location = location;
        self
    }

    pub fn with_output_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.output_prefix = prefix.into();
        self
    }

    pub fn with_backend(mut self, backend: ConverterBackend) -> Self {
        self.backend = backend;
        self
    }

    /// Use this cwebp executable instead of searching for one
    pub fn with_converter_path(mut self, path: PathBuf) -> Self {
        self.converter_path = Some(path);
        self
    }

    pub fn with_skip_existing(mut self, skip_existing: bool) -> Self {
        self.skip_existing = skip_existing;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_verify_headers(mut self, verify_headers: bool) -> Self {
        self.verify_headers = verify_headers;
        self
    }
}
