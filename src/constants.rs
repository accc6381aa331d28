// Icon Cache Constants
// Changing RELEASE_VERSION or the configured icon size invalidates every stored icon.

// Store
const DB_VERSION: u32 = 10;
pub const RELEASE_VERSION: u32 = DB_VERSION + 1;
pub const ICONCACHE_FOLDER: &str = ".iconcache";
pub const DB_FILENAME: &str = "app_icons.db";
pub const CONFIG_FILENAME: &str = "config.json";
pub const BUSY_TIMEOUT_MS: u32 = 5000;

// Table layout
pub const TABLE_NAME: &str = "icons";
pub const COLUMN_ROWID: &str = "rowid";
pub const COLUMN_COMPONENT: &str = "componentName";
pub const COLUMN_USER: &str = "profileId";
pub const COLUMN_LAST_UPDATED: &str = "lastUpdated";
pub const COLUMN_VERSION: &str = "version";
pub const COLUMN_ICON: &str = "icon";
pub const COLUMN_ICON_LOW_RES: &str = "icon_low_res";
pub const COLUMN_LABEL: &str = "label";
pub const COLUMN_SYSTEM_STATE: &str = "system_state";

// Memory tier
pub const INITIAL_ICON_CACHE_CAPACITY: usize = 50;

// Package-level entries use "<package>/<package>." as their component
pub const EMPTY_CLASS_NAME: &str = ".";

// Low-res tier
pub const LOW_RES_SCALE_FACTOR: u32 = 5;

// Defaults for IconCacheConfig
pub const DEFAULT_ICON_PIXEL_SIZE: u32 = 192;
pub const DEFAULT_ICON_DPI: u32 = 480;
pub const DEFAULT_ACTIVITY_BG_COLOR: u32 = 0xFFF5_F5F5; // light panel
pub const DEFAULT_PACKAGE_BG_COLOR: u32 = 0xFF26_3238; // dark widget tray
pub const DEFAULT_WORKER_THREAD_NAME: &str = "icon-worker";

// Fingerprints
pub const SYSTEM_STATE_SCHEME: &str = "sysstate_v1";
