// Icon cache configuration
//
// Loaded from JSON; every field has a default so a partial file is fine.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::bitmap::Color;
use crate::constants::{
    CONFIG_FILENAME, DB_FILENAME, DEFAULT_ACTIVITY_BG_COLOR, DEFAULT_ICON_DPI, DEFAULT_ICON_PIXEL_SIZE,
    DEFAULT_PACKAGE_BG_COLOR, DEFAULT_WORKER_THREAD_NAME, ICONCACHE_FOLDER,
};
use crate::error::{IconCacheError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IconCacheConfig {
    /// Store location. `None` means `~/.iconcache/app_icons.db`.
    pub db_path: Option<PathBuf>,
    /// Edge length of full-resolution icons. Part of the schema version.
    pub icon_pixel_size: u32,
    /// Density requested from the icon provider.
    pub icon_dpi: u32,
    /// Background for low-res activity icons (all-apps, folders).
    pub activity_low_res_background: Color,
    /// Background for low-res package icons (widget tray).
    pub package_low_res_background: Color,
    pub worker_thread_name: String,
}

impl Default for IconCacheConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            icon_pixel_size: DEFAULT_ICON_PIXEL_SIZE,
            icon_dpi: DEFAULT_ICON_DPI,
            activity_low_res_background: Color(DEFAULT_ACTIVITY_BG_COLOR),
            package_low_res_background: Color(DEFAULT_PACKAGE_BG_COLOR),
            worker_thread_name: DEFAULT_WORKER_THREAD_NAME.to_string(),
        }
    }
}

impl IconCacheConfig {
    /// Read a JSON config file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: IconCacheConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.icon_pixel_size == 0 {
            return Err(IconCacheError::Config("iconPixelSize must be greater than 0".to_string()));
        }
        // The pixel size shares the schema version integer with the release number
        if self.icon_pixel_size > u32::from(u16::MAX) {
            return Err(IconCacheError::Config(format!(
                "iconPixelSize {} does not fit the schema version",
                self.icon_pixel_size
            )));
        }
        if self.icon_dpi == 0 {
            return Err(IconCacheError::Config("iconDpi must be greater than 0".to_string()));
        }
        Ok(())
    }

    /// Configured store path, or the per-user default.
    pub fn resolved_db_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.db_path {
            return Ok(path.clone());
        }
        default_db_path()
    }
}

/// Get the default store path: ~/.iconcache/app_icons.db
pub fn default_db_path() -> Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| IconCacheError::Config("Could not determine home directory".to_string()))?;
    Ok(home.home_dir().join(ICONCACHE_FOLDER).join(DB_FILENAME))
}

/// Get the default config path: ~/.iconcache/config.json
pub fn default_config_path() -> Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| IconCacheError::Config("Could not determine home directory".to_string()))?;
    Ok(home.home_dir().join(ICONCACHE_FOLDER).join(CONFIG_FILENAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = IconCacheConfig::default();
        assert_eq!(config.icon_pixel_size, 192);
        assert_eq!(config.icon_dpi, 480);
        assert!(!config.activity_low_res_background.is_transparent());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{ "iconPixelSize": 96, "dbPath": "/tmp/icons.db" }"#).unwrap();

        let config = IconCacheConfig::load(&path).unwrap();
        assert_eq!(config.icon_pixel_size, 96);
        assert_eq!(config.icon_dpi, 480);
        assert_eq!(config.resolved_db_path().unwrap(), PathBuf::from("/tmp/icons.db"));
    }

    #[test]
    fn test_load_rejects_zero_size() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{ "iconPixelSize": 0 }"#).unwrap();

        let err = IconCacheConfig::load(&path).unwrap_err();
        assert!(matches!(err, IconCacheError::Config(_)));
    }

    #[test]
    fn test_load_bad_json() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(IconCacheConfig::load(&path), Err(IconCacheError::Json(_))));
    }
}
