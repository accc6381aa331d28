// Test doubles for the collaborator traits

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use image::{Rgba, RgbaImage};

use crate::cache::{Collaborators, IconCache};
use crate::config::IconCacheConfig;
use crate::db::IconDb;
use crate::error::{IconCacheError, Result};
use crate::jobs::WorkerQueue;
use crate::model::{ActivityInfo, ComponentName, PackageInfo, ProfileHandle};
use crate::provider::{ChangeNotifier, IconProvider, InventoryLister, ProfileDirectory};

pub const MAIN: ProfileHandle = ProfileHandle(0);
pub const WORK: ProfileHandle = ProfileHandle(10);
pub const TEST_ICON_SIZE: u32 = 20;

pub const ACTIVITY_COLOR: [u8; 4] = [10, 120, 200, 255];
pub const APP_COLOR: [u8; 4] = [200, 50, 50, 255];
pub const DEFAULT_COLOR: [u8; 4] = [128, 128, 128, 255];

pub fn solid(size: u32, rgba: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(size, size, Rgba(rgba))
}

pub fn test_config() -> IconCacheConfig {
    IconCacheConfig {
        icon_pixel_size: TEST_ICON_SIZE,
        ..Default::default()
    }
}

// ----- Provider -----

pub struct FakeProvider {
    failing: Mutex<HashSet<String>>,
    fingerprint: Mutex<String>,
    pub icon_calls: AtomicUsize,
    pub app_icon_calls: AtomicUsize,
    pub refreshes: AtomicUsize,
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self {
            failing: Mutex::new(HashSet::new()),
            fingerprint: Mutex::new("light".to_string()),
            icon_calls: AtomicUsize::new(0),
            app_icon_calls: AtomicUsize::new(0),
            refreshes: AtomicUsize::new(0),
        }
    }
}

impl FakeProvider {
    pub fn fail_for(&self, package: &str) {
        self.failing.lock().unwrap().insert(package.to_string());
    }

    pub fn set_fingerprint(&self, value: &str) {
        *self.fingerprint.lock().unwrap() = value.to_string();
    }

    pub fn icon_calls(&self) -> usize {
        self.icon_calls.load(Ordering::SeqCst)
    }

    fn check(&self, package: &str) -> Result<()> {
        if self.failing.lock().unwrap().contains(package) {
            return Err(IconCacheError::Provider(format!("no icon for {}", package)));
        }
        Ok(())
    }
}

impl IconProvider for FakeProvider {
    fn icon(&self, activity: &ActivityInfo, _density: u32) -> Result<RgbaImage> {
        self.icon_calls.fetch_add(1, Ordering::SeqCst);
        self.check(activity.package())?;
        Ok(solid(32, ACTIVITY_COLOR))
    }

    fn application_icon(&self, package: &PackageInfo, _density: u32) -> Result<RgbaImage> {
        self.app_icon_calls.fetch_add(1, Ordering::SeqCst);
        self.check(&package.package_name)?;
        Ok(solid(32, APP_COLOR))
    }

    fn default_icon(&self, _density: u32) -> RgbaImage {
        solid(32, DEFAULT_COLOR)
    }

    fn system_state_fingerprint(&self, package: &str) -> String {
        format!("{}:{}", self.fingerprint.lock().unwrap(), package)
    }

    fn refresh_system_state(&self) {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
    }
}

// ----- Inventory -----

#[derive(Default)]
pub struct FakeInventory {
    packages: Mutex<HashMap<String, PackageInfo>>,
    activities: Mutex<Vec<ActivityInfo>>,
}

impl FakeInventory {
    /// Install (or upgrade) `package` for `profile` with the given
    /// `(class, label)` activities. Replaces that profile's activities.
    pub fn install(&self, package: &str, version: i64, activities: &[(&str, &str)], profile: ProfileHandle) {
        self.packages.lock().unwrap().insert(
            package.to_string(),
            PackageInfo {
                package_name: package.to_string(),
                version_code: version,
                last_update_time: 1_700_000_000_000 + version,
                label: format!("{} app", package),
                flags: Default::default(),
            },
        );

        let mut list = self.activities.lock().unwrap();
        list.retain(|a| !(a.package() == package && a.profile == profile));
        for (class, label) in activities {
            list.push(ActivityInfo {
                component: ComponentName::new(package, *class),
                profile,
                label: label.to_string(),
            });
        }
    }

    pub fn uninstall(&self, package: &str) {
        self.packages.lock().unwrap().remove(package);
        self.activities.lock().unwrap().retain(|a| a.package() != package);
    }
}

impl InventoryLister for FakeInventory {
    fn installed_packages(&self) -> Result<Vec<PackageInfo>> {
        Ok(self.packages.lock().unwrap().values().cloned().collect())
    }

    fn package_info(&self, package: &str, _profile: ProfileHandle) -> Result<PackageInfo> {
        self.packages
            .lock()
            .unwrap()
            .get(package)
            .cloned()
            .ok_or_else(|| IconCacheError::PackageNotFound(package.to_string()))
    }

    fn activity_list(&self, package: Option<&str>, profile: ProfileHandle) -> Vec<ActivityInfo> {
        self.activities
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.profile == profile && package.map_or(true, |p| a.package() == p))
            .cloned()
            .collect()
    }

    fn resolve_activity(&self, component: &ComponentName, profile: ProfileHandle) -> Option<ActivityInfo> {
        self.activities
            .lock()
            .unwrap()
            .iter()
            .find(|a| &a.component == component && a.profile == profile)
            .cloned()
    }
}

// ----- Profiles -----

pub struct FakeProfiles {
    profiles: Vec<ProfileHandle>,
}

impl FakeProfiles {
    pub fn new(profiles: &[ProfileHandle]) -> Self {
        Self {
            profiles: profiles.to_vec(),
        }
    }
}

impl ProfileDirectory for FakeProfiles {
    fn profiles(&self) -> Vec<ProfileHandle> {
        self.profiles.clone()
    }

    fn main_profile(&self) -> ProfileHandle {
        MAIN
    }

    /// Serials are offset from handles so the two never get mixed up.
    fn serial_for_profile(&self, profile: ProfileHandle) -> i64 {
        i64::from(profile.0) + 100
    }

    fn profile_for_serial(&self, serial: i64) -> Option<ProfileHandle> {
        self.profiles
            .iter()
            .copied()
            .find(|p| i64::from(p.0) + 100 == serial)
    }

    fn badged_label(&self, label: &str, profile: ProfileHandle) -> String {
        if profile == MAIN {
            label.to_string()
        } else {
            format!("Work {}", label)
        }
    }
}

// ----- Notifier -----

#[derive(Default)]
pub struct RecordingNotifier {
    pub calls: Mutex<Vec<(HashSet<String>, ProfileHandle)>>,
}

impl RecordingNotifier {
    pub fn calls(&self) -> Vec<(HashSet<String>, ProfileHandle)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ChangeNotifier for RecordingNotifier {
    fn on_package_icons_updated(&self, packages: &HashSet<String>, profile: ProfileHandle) {
        self.calls.lock().unwrap().push((packages.clone(), profile));
    }
}

// ----- Harness -----

pub struct Harness {
    pub cache: IconCache,
    pub provider: Arc<FakeProvider>,
    pub inventory: Arc<FakeInventory>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_profiles(&[MAIN])
    }

    pub fn with_profiles(profiles: &[ProfileHandle]) -> Self {
        let db = IconDb::open_in_memory(TEST_ICON_SIZE).unwrap();
        Self::with_db(db, profiles)
    }

    pub fn with_db(db: IconDb, profiles: &[ProfileHandle]) -> Self {
        let provider = Arc::new(FakeProvider::default());
        let inventory = Arc::new(FakeInventory::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let deps = Collaborators::new(
            provider.clone(),
            inventory.clone(),
            Arc::new(FakeProfiles::new(profiles)),
        )
        .with_notifier(notifier.clone());

        let cache = IconCache::with_store(test_config(), deps, db, WorkerQueue::new());
        Self {
            cache,
            provider,
            inventory,
            notifier,
        }
    }

    pub fn serial(&self, profile: ProfileHandle) -> i64 {
        i64::from(profile.0) + 100
    }

    /// Sweep with no ignore set and drain the queued steps.
    pub fn sweep(&self) -> usize {
        self.cache.update_db_icons(&HashSet::new());
        self.cache.worker().run_until_idle()
    }
}
