use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, RwLock};
use std::time::Duration;

use crate::library::DEFAULT_STORAGE_QUOTA;
use crate::reader::{
    DEFAULT_BASE_PAGE_WIDTH, DEFAULT_BASE_SCALE, DEFAULT_CACHE_SIZE, DEFAULT_PROGRESS_DEBOUNCE,
    DEFAULT_WORKERS, ReaderConfig, ViewMode,
};

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "readsphere";

const SETTINGS_HEADER: &str = "\
# readsphere configuration
#
# default_view_mode: flip | scroll
# base_page_width: page width in pixels at 100% zoom
# progress_debounce_ms: quiet period before the reading position is saved
# storage_quota_bytes: 0 disables the library size limit
";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub dark_mode: bool,

    #[serde(default)]
    pub default_view_mode: ViewMode,

    #[serde(default = "default_base_page_width")]
    pub base_page_width: f32,

    #[serde(default = "default_base_render_scale")]
    pub base_render_scale: f32,

    #[serde(default = "default_progress_debounce_ms")]
    pub progress_debounce_ms: u64,

    #[serde(default = "default_render_workers")]
    pub render_workers: usize,

    #[serde(default = "default_page_cache_size")]
    pub page_cache_size: usize,

    #[serde(default = "default_storage_quota_bytes")]
    pub storage_quota_bytes: usize,

    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_base_page_width() -> f32 {
    DEFAULT_BASE_PAGE_WIDTH
}

fn default_base_render_scale() -> f32 {
    DEFAULT_BASE_SCALE
}

fn default_progress_debounce_ms() -> u64 {
    DEFAULT_PROGRESS_DEBOUNCE.as_millis() as u64
}

fn default_render_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_page_cache_size() -> usize {
    DEFAULT_CACHE_SIZE
}

fn default_storage_quota_bytes() -> usize {
    DEFAULT_STORAGE_QUOTA
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            dark_mode: false,
            default_view_mode: ViewMode::default(),
            base_page_width: default_base_page_width(),
            base_render_scale: default_base_render_scale(),
            progress_debounce_ms: default_progress_debounce_ms(),
            render_workers: default_render_workers(),
            page_cache_size: default_page_cache_size(),
            storage_quota_bytes: default_storage_quota_bytes(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

impl Settings {
    pub fn reader_config(&self) -> ReaderConfig {
        ReaderConfig {
            base_page_width: sanitize(self.base_page_width, DEFAULT_BASE_PAGE_WIDTH),
            base_render_scale: sanitize(self.base_render_scale, DEFAULT_BASE_SCALE),
            progress_debounce: Duration::from_millis(self.progress_debounce_ms),
            render_workers: self.render_workers.max(1),
            page_cache_size: self.page_cache_size.max(1),
            initial_mode: self.default_view_mode,
            dark_mode: self.dark_mode,
            ..ReaderConfig::default()
        }
    }

    pub fn storage_quota(&self) -> Option<usize> {
        (self.storage_quota_bytes > 0).then_some(self.storage_quota_bytes)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }
}

fn sanitize(value: f32, fallback: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        fallback
    }
}

static SETTINGS: LazyLock<RwLock<Settings>> = LazyLock::new(|| RwLock::new(Settings::default()));
/// File the settings were loaded from; changes are written back there
static SETTINGS_PATH: LazyLock<RwLock<Option<PathBuf>>> = LazyLock::new(|| RwLock::new(None));

fn preferred_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

fn remember_path(path: &Path) {
    if let Ok(mut current) = SETTINGS_PATH.write() {
        *current = Some(path.to_path_buf());
    }
}

fn settings_path() -> Option<PathBuf> {
    SETTINGS_PATH
        .read()
        .ok()
        .and_then(|path| path.clone())
        .or_else(preferred_config_path)
}

pub fn load_settings() {
    let Some(path) = preferred_config_path() else {
        warn!("Could not determine config directory, using default settings");
        return;
    };
    remember_path(&path);

    if path.exists() {
        load_settings_from_path(&path);
    } else {
        info!("Settings file not found, creating with defaults at {path:?}");
        if let Ok(settings) = SETTINGS.read() {
            save_settings_to_file(&settings, &path);
        }
    }
}

pub fn load_settings_from_path(path: &Path) {
    remember_path(path);
    match fs::read_to_string(path) {
        Ok(content) => match serde_yaml::from_str::<Settings>(&content) {
            Ok(mut settings) => {
                debug!("Loaded settings from {path:?}");

                if settings.version < CURRENT_VERSION {
                    migrate_settings(&mut settings);
                    save_settings_to_file(&settings, path);
                }

                if let Ok(mut global) = SETTINGS.write() {
                    *global = settings;
                }
            }
            Err(e) => {
                error!("Failed to parse settings file {path:?}: {e}");
            }
        },
        Err(e) => {
            error!("Failed to read settings file {path:?}: {e}");
        }
    }
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );
    settings.version = CURRENT_VERSION;
}

pub fn save_settings() {
    let Some(path) = settings_path() else {
        warn!("Could not determine config directory, cannot save settings");
        return;
    };

    if let Ok(settings) = SETTINGS.read() {
        save_settings_to_file(&settings, &path);
    }
}

fn save_settings_to_file(settings: &Settings, path: &Path) {
    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            error!("Failed to create config directory {parent:?}: {e}");
            return;
        }
    }

    let body = match serde_yaml::to_string(settings) {
        Ok(body) => body,
        Err(e) => {
            error!("Failed to encode settings: {e}");
            return;
        }
    };

    match fs::write(path, format!("{SETTINGS_HEADER}{body}")) {
        Ok(()) => debug!("Saved settings to {path:?}"),
        Err(e) => error!("Failed to save settings to {path:?}: {e}"),
    }
}

// Public API for accessing/modifying settings

pub fn current() -> Settings {
    SETTINGS.read().map(|s| s.clone()).unwrap_or_default()
}

#[cfg(test)]
pub(crate) fn restore_defaults() {
    if let Ok(mut global) = SETTINGS.write() {
        *global = Settings::default();
    }
    if let Ok(mut path) = SETTINGS_PATH.write() {
        *path = None;
    }
}

pub fn set_dark_mode(dark: bool) {
    if let Ok(mut settings) = SETTINGS.write() {
        if settings.dark_mode == dark {
            return;
        }
        settings.dark_mode = dark;
    }
    save_settings();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn missing_fields_take_defaults() {
        let settings: Settings = serde_yaml::from_str("dark_mode: true\n").unwrap();
        assert!(settings.dark_mode);
        assert_eq!(settings.default_view_mode, ViewMode::Flip);
        assert_eq!(settings.progress_debounce_ms, 1000);
        assert_eq!(settings.base_page_width, 800.0);
    }

    #[test]
    fn reader_config_sanitizes_values() {
        let settings = Settings {
            base_page_width: -1.0,
            render_workers: 0,
            progress_debounce_ms: 250,
            default_view_mode: ViewMode::Scroll,
            ..Settings::default()
        };
        let config = settings.reader_config();
        assert_eq!(config.base_page_width, DEFAULT_BASE_PAGE_WIDTH);
        assert_eq!(config.render_workers, 1);
        assert_eq!(config.progress_debounce, Duration::from_millis(250));
        assert_eq!(config.initial_mode, ViewMode::Scroll);
    }

    #[test]
    fn zero_quota_disables_limit() {
        let settings = Settings {
            storage_quota_bytes: 0,
            ..Settings::default()
        };
        assert_eq!(settings.storage_quota(), None);
    }

    #[test]
    #[serial]
    fn load_from_path_replaces_global_settings() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.yaml");
        fs::write(&path, "version: 1\ndefault_view_mode: scroll\nrender_workers: 3\n").unwrap();

        load_settings_from_path(&path);
        let loaded = current();
        assert_eq!(loaded.default_view_mode, ViewMode::Scroll);
        assert_eq!(loaded.render_workers, 3);

        restore_defaults();
    }

    #[test]
    #[serial]
    fn dark_mode_is_written_back_to_loaded_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.yaml");
        fs::write(&path, "version: 1\nrender_workers: 2\n").unwrap();
        load_settings_from_path(&path);

        set_dark_mode(true);
        let parsed: Settings = serde_yaml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!(parsed.dark_mode);
        assert_eq!(parsed.render_workers, 2);
        assert!(current().dark_mode);

        restore_defaults();
    }

    #[test]
    fn saved_file_parses_back() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("config.yaml");
        let settings = Settings {
            dark_mode: true,
            ..Settings::default()
        };

        save_settings_to_file(&settings, &path);
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# readsphere configuration"));
        let parsed: Settings = serde_yaml::from_str(&content).unwrap();
        assert!(parsed.dark_mode);
    }
}
