// External collaborators consumed by the cache
//
// The host application implements these over its real package manager,
// profile service and UI thread. Everything here must be callable from both
// the interactive thread and the icon worker.

use std::collections::HashSet;

use image::RgbaImage;

use crate::constants::SYSTEM_STATE_SCHEME;
use crate::error::Result;
use crate::model::{ActivityInfo, ComponentName, PackageInfo, ProfileHandle};

/// Source of raw icons and of the system-state fingerprint.
pub trait IconProvider: Send + Sync {
    /// Raw icon for a launchable activity at the given density.
    fn icon(&self, activity: &ActivityInfo, density: u32) -> Result<RgbaImage>;

    /// Raw application-level icon, used for package fallback entries.
    fn application_icon(&self, package: &PackageInfo, density: u32) -> Result<RgbaImage>;

    /// The platform's generic app icon.
    fn default_icon(&self, density: u32) -> RgbaImage;

    /// Opaque string that changes whenever OS state (locale, theme, icon
    /// pack) would render this package's icon differently.
    fn system_state_fingerprint(&self, package: &str) -> String;

    /// Re-read whatever OS state feeds [`IconProvider::system_state_fingerprint`].
    fn refresh_system_state(&self) {}
}

/// Live package and activity inventory.
pub trait InventoryLister: Send + Sync {
    fn installed_packages(&self) -> Result<Vec<PackageInfo>>;

    fn package_info(&self, package: &str, profile: ProfileHandle) -> Result<PackageInfo>;

    /// Launchable activities for one profile, optionally restricted to a package.
    fn activity_list(&self, package: Option<&str>, profile: ProfileHandle) -> Vec<ActivityInfo>;

    fn resolve_activity(&self, component: &ComponentName, profile: ProfileHandle) -> Option<ActivityInfo>;
}

/// User profiles and their stable serial numbers.
pub trait ProfileDirectory: Send + Sync {
    fn profiles(&self) -> Vec<ProfileHandle>;

    fn main_profile(&self) -> ProfileHandle;

    fn serial_for_profile(&self, profile: ProfileHandle) -> i64;

    fn profile_for_serial(&self, serial: i64) -> Option<ProfileHandle>;

    /// Label as it should be announced for this profile (e.g. "Work Mail").
    fn badged_label(&self, label: &str, profile: ProfileHandle) -> String;

    fn badge_icon(&self, icon: RgbaImage, _profile: ProfileHandle) -> RgbaImage {
        icon
    }
}

/// Told once per reconciliation batch which packages changed.
pub trait ChangeNotifier: Send + Sync {
    fn on_package_icons_updated(&self, packages: &HashSet<String>, profile: ProfileHandle);
}

/// Runs callbacks on the caller's context (typically the UI thread).
pub trait CallbackExecutor: Send + Sync {
    fn execute(&self, task: Box<dyn FnOnce() + Send>);
}

/// Runs callbacks immediately on whichever thread finished the work.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl CallbackExecutor for InlineExecutor {
    fn execute(&self, task: Box<dyn FnOnce() + Send>) {
        task();
    }
}

/// Notifier for hosts that do not care about change batches.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl ChangeNotifier for NoopNotifier {
    fn on_package_icons_updated(&self, _packages: &HashSet<String>, _profile: ProfileHandle) {}
}

/// Build a fingerprint string from the pieces of OS state that affect icon
/// rendering. Providers can use this to implement
/// [`IconProvider::system_state_fingerprint`].
/// Format: "sysstate_v1:<blake3 hex>"
pub fn system_state_fingerprint(parts: &[&str]) -> String {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    format!("{}:{}", SYSTEM_STATE_SCHEME, hasher.finalize().to_hex())
}
