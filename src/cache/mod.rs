// Icon cache -- memory tier in front of the SQLite store
//
// One coarse lock (`Inner::state`) covers the memory tier and the default
// icon registry. The store guards its own connection; when both are needed
// the state lock is always taken first.

pub mod defaults;
pub mod memory;
mod resolver;


use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use image::RgbaImage;

use crate::bitmap::{normalize_icon, Color, IconBitmap, LowResGenerator};
use crate::config::IconCacheConfig;
use crate::db::{IconDb, IconRecord, Selection};
use crate::error::Result;
use crate::jobs::worker::WorkerHandle;
use crate::jobs::{TaskTag, WorkerQueue};
use crate::model::{ActivityInfo, ComponentKey, ComponentName, ProfileHandle};
use crate::provider::{
    CallbackExecutor, ChangeNotifier, IconProvider, InlineExecutor, InventoryLister, NoopNotifier,
    ProfileDirectory,
};

pub use defaults::DefaultIconRegistry;
pub use memory::{CacheEntry, MemoryCache};
use resolver::PendingIcon;

/// The host-side services the cache talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub provider: Arc<dyn IconProvider>,
    pub inventory: Arc<dyn InventoryLister>,
    pub profiles: Arc<dyn ProfileDirectory>,
    pub notifier: Arc<dyn ChangeNotifier>,
    pub callbacks: Arc<dyn CallbackExecutor>,
}

impl Collaborators {
    /// Collaborators with no change notifications and callbacks run on the
    /// worker thread.
    pub fn new(
        provider: Arc<dyn IconProvider>,
        inventory: Arc<dyn InventoryLister>,
        profiles: Arc<dyn ProfileDirectory>,
    ) -> Self {
        Self {
            provider,
            inventory,
            profiles,
            notifier: Arc::new(NoopNotifier),
            callbacks: Arc::new(InlineExecutor),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn ChangeNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_callbacks(mut self, callbacks: Arc<dyn CallbackExecutor>) -> Self {
        self.callbacks = callbacks;
        self
    }
}

/// What an item should display.
#[derive(Debug, Clone)]
pub struct ItemIcon {
    pub icon: IconBitmap,
    pub title: String,
    pub content_description: String,
    pub using_low_res: bool,
    /// The icon is the profile's default icon.
    pub using_fallback: bool,
}

pub(crate) struct CacheState {
    pub(crate) memory: MemoryCache,
    pub(crate) defaults: DefaultIconRegistry,
}

pub(crate) struct Inner {
    pub(crate) config: IconCacheConfig,
    pub(crate) db: IconDb,
    pub(crate) state: Mutex<CacheState>,
    pub(crate) deps: Collaborators,
    pub(crate) worker: WorkerQueue,
    /// Shared by every step of every reconciliation sweep.
    pub(crate) update_tag: TaskTag,
    /// Bumped by each sweep. Steps of an older sweep never re-post.
    pub(crate) sweep_generation: Mutex<u64>,
    pub(crate) low_res: LowResGenerator,
}

impl Inner {
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn lock_sweep(&self) -> MutexGuard<'_, u64> {
        self.sweep_generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn serial(&self, profile: ProfileHandle) -> i64 {
        self.deps.profiles.serial_for_profile(profile)
    }
}

/// Cheap to clone; every clone is the same cache.
#[derive(Clone)]
pub struct IconCache {
    pub(crate) inner: Arc<Inner>,
}

impl IconCache {
    /// Open (or create) the store at the configured location with a fresh
    /// worker queue. The queue is not started; see [`IconCache::start_worker`].
    pub fn open(config: IconCacheConfig, deps: Collaborators) -> Result<Self> {
        config.validate()?;
        let path = config.resolved_db_path()?;
        let db = IconDb::open(&path, config.icon_pixel_size)?;
        Ok(Self::with_store(config, deps, db, WorkerQueue::new()))
    }

    /// Build around an already opened store and an existing queue.
    pub fn with_store(
        config: IconCacheConfig,
        deps: Collaborators,
        db: IconDb,
        worker: WorkerQueue,
    ) -> Self {
        let update_tag = worker.new_tag();
        Self {
            inner: Arc::new(Inner {
                config,
                db,
                state: Mutex::new(CacheState {
                    memory: MemoryCache::new(),
                    defaults: DefaultIconRegistry::default(),
                }),
                deps,
                worker,
                update_tag,
                sweep_generation: Mutex::new(0),
                low_res: LowResGenerator::default(),
            }),
        }
    }

    pub fn config(&self) -> &IconCacheConfig {
        &self.inner.config
    }

    pub fn db(&self) -> &IconDb {
        &self.inner.db
    }

    /// The queue background work is posted to. Hosts either `start` it or
    /// drain it themselves.
    pub fn worker(&self) -> &WorkerQueue {
        &self.inner.worker
    }

    /// Spawn the worker thread under the configured name.
    pub fn start_worker(&self) -> Result<WorkerHandle> {
        self.inner.worker.start(&self.inner.config.worker_thread_name)
    }

    pub fn update_tag(&self) -> TaskTag {
        self.inner.update_tag
    }

    // ----- Lookups -----

    /// Title and icon for a launcher app. `activity` supplies the live label
    /// and lets a miss go to the provider.
    pub fn get_title_and_icon(
        &self,
        component: &ComponentName,
        activity: Option<&ActivityInfo>,
        profile: ProfileHandle,
        use_low_res: bool,
    ) -> ItemIcon {
        let profile = activity.map_or(profile, |a| a.profile);
        let mut state = self.inner.lock_state();
        let entry =
            self.inner
                .cache_locked(&mut state, component, activity, profile, false, use_low_res);
        self.inner.item_icon_locked(&mut state, &entry, profile)
    }

    /// Title and icon for a shortcut. Falls back to the package icon when the
    /// target no longer resolves.
    pub fn get_shortcut_title_and_icon(
        &self,
        component: Option<&ComponentName>,
        profile: ProfileHandle,
        use_low_res: bool,
    ) -> ItemIcon {
        let Some(component) = component else {
            let mut state = self.inner.lock_state();
            return ItemIcon {
                icon: self.inner.default_icon_locked(&mut state, profile),
                title: String::new(),
                content_description: String::new(),
                using_low_res: false,
                using_fallback: true,
            };
        };
        let activity = self.inner.deps.inventory.resolve_activity(component, profile);
        let mut state = self.inner.lock_state();
        let entry = self.inner.cache_locked(
            &mut state,
            component,
            activity.as_ref(),
            profile,
            true,
            use_low_res,
        );
        self.inner.item_icon_locked(&mut state, &entry, profile)
    }

    /// Package-level entry, as shown in the widget tray.
    pub fn get_title_and_icon_for_package(
        &self,
        package: &str,
        profile: ProfileHandle,
        use_low_res: bool,
    ) -> ItemIcon {
        let mut state = self.inner.lock_state();
        let entry = self
            .inner
            .entry_for_package_locked(&mut state, package, profile, use_low_res);
        self.inner.item_icon_locked(&mut state, &entry, profile)
    }

    /// Like [`IconCache::get_title_and_icon`] without activity info, but only
    /// answers when a real (non-default) icon is known.
    pub fn update_title_and_icon(
        &self,
        component: &ComponentName,
        profile: ProfileHandle,
        use_low_res: bool,
    ) -> Option<ItemIcon> {
        let mut state = self.inner.lock_state();
        let entry = self
            .inner
            .cache_locked(&mut state, component, None, profile, false, use_low_res);
        let icon = entry.icon.as_ref()?;
        if state.defaults.is_default(icon, profile) {
            return None;
        }
        Some(self.inner.item_icon_locked(&mut state, &entry, profile))
    }

    /// High-res icon for a component. Never fails: unknown components and
    /// `None` get the default icon.
    pub fn get_icon(&self, component: Option<&ComponentName>, profile: ProfileHandle) -> IconBitmap {
        let Some(component) = component else {
            return self.default_icon(profile);
        };
        let activity = self.inner.deps.inventory.resolve_activity(component, profile);
        let mut state = self.inner.lock_state();
        let entry =
            self.inner
                .cache_locked(&mut state, component, activity.as_ref(), profile, true, false);
        match &entry.icon {
            Some(icon) => icon.clone(),
            None => self.inner.default_icon_locked(&mut state, profile),
        }
    }

    pub fn default_icon(&self, profile: ProfileHandle) -> IconBitmap {
        let mut state = self.inner.lock_state();
        self.inner.default_icon_locked(&mut state, profile)
    }

    pub fn is_default_icon(&self, icon: &IconBitmap, profile: ProfileHandle) -> bool {
        self.inner.lock_state().defaults.is_default(icon, profile)
    }

    /// Memory tier only; never touches the store.
    pub fn cache_entry(&self, component: &ComponentName, profile: ProfileHandle) -> Option<Arc<CacheEntry>> {
        let key = ComponentKey::new(component.clone(), profile);
        self.inner.lock_state().memory.get(&key)
    }

    // ----- Mutations -----

    /// Forget one component in memory. The store is untouched.
    pub fn remove(&self, component: &ComponentName, profile: ProfileHandle) {
        let key = ComponentKey::new(component.clone(), profile);
        self.inner.lock_state().memory.remove(&key);
    }

    /// Forget every component of a package, in memory and on disk.
    pub fn remove_icons_for_package(&self, package: &str, profile: ProfileHandle) {
        let serial = self.inner.serial(profile);
        let mut state = self.inner.lock_state();
        state.memory.remove_package(package, profile);
        let selection = Selection::Package {
            package,
            profile_serial: serial,
        };
        match self.inner.db.delete(&selection) {
            Ok(n) => log::debug!("Removed {} stored icons for {} ({})", n, package, profile),
            Err(e) => log::warn!("Failed to remove stored icons for {}: {}", package, e),
        }
    }

    /// Rebuild every activity of a package after it was installed or updated.
    pub fn update_icons_for_package(&self, package: &str, profile: ProfileHandle) {
        self.remove_icons_for_package(package, profile);

        let info = match self.inner.deps.inventory.package_info(package, profile) {
            Ok(info) => info,
            Err(e) => {
                log::warn!("Package not found while updating icons for {}: {}", package, e);
                return;
            }
        };
        let serial = self.inner.serial(profile);
        let activities = self.inner.deps.inventory.activity_list(Some(package), profile);

        let mut state = self.inner.lock_state();
        for activity in &activities {
            self.inner
                .add_icon_to_db_and_mem_cache(&mut state, activity, &info, serial);
        }
        log::debug!("Updated {} icons for {} ({})", activities.len(), package, profile);
    }

    /// Empty the memory tier. The store is untouched.
    pub fn flush(&self) {
        self.inner.lock_state().memory.clear();
    }

    /// Drop every stored row and empty the memory tier.
    pub fn clear_icon_database(&self) -> Result<()> {
        let mut state = self.inner.lock_state();
        state.memory.clear();
        self.inner.db.drop_and_recreate()?;
        log::info!("Icon database cleared");
        Ok(())
    }

    /// Placeholder for a package that is still installing. Kept in memory
    /// only; the next real resolution replaces it.
    pub fn cache_package_install_info(
        &self,
        package: &str,
        profile: ProfileHandle,
        icon: Option<RgbaImage>,
        title: Option<&str>,
    ) {
        let mut state = self.inner.lock_state();
        state.memory.remove_package(package, profile);

        let mut entry = CacheEntry::default();
        if let Some(title) = title.filter(|t| !t.is_empty()) {
            entry.title = title.to_string();
            entry.content_description = self.inner.deps.profiles.badged_label(title, profile);
        }
        if let Some(icon) = icon {
            entry.icon = Some(IconBitmap::from_rgba(normalize_icon(
                icon,
                self.inner.config.icon_pixel_size,
            )));
        }
        state
            .memory
            .put(ComponentKey::for_package(package, profile), Arc::new(entry));
    }

    /// Replace a component's icon (and optionally its title) with one the
    /// host supplies, and persist it.
    pub fn add_custom_info(
        &self,
        component: &ComponentName,
        profile: ProfileHandle,
        icon: RgbaImage,
        title: Option<&str>,
    ) {
        let inventory = &self.inner.deps.inventory;
        let Some(activity) = inventory.resolve_activity(component, profile) else {
            log::warn!("Cannot add custom icon, {} does not resolve for {}", component, profile);
            return;
        };
        let package_info = inventory.package_info(&component.package, profile);
        let serial = self.inner.serial(profile);

        let icon = IconBitmap::from_rgba(normalize_icon(icon, self.inner.config.icon_pixel_size));
        let title = title
            .filter(|t| !t.is_empty())
            .unwrap_or(&activity.label)
            .to_string();
        let low_res = self
            .inner
            .low_res
            .generate(&icon, self.inner.config.activity_low_res_background);

        let mut state = self.inner.lock_state();
        let entry = CacheEntry {
            icon: Some(icon.clone()),
            content_description: self.inner.deps.profiles.badged_label(&title, profile),
            title: title.clone(),
            is_low_res: false,
        };
        state.memory.put(activity.key(), Arc::new(entry));

        match package_info {
            Ok(info) => self.inner.write_icon(
                component,
                serial,
                info.last_update_time,
                info.version_code,
                &PendingIcon {
                    icon,
                    low_res,
                    label: title,
                },
            ),
            Err(e) => log::warn!("Custom icon for {} kept in memory only: {}", component, e),
        }
    }

    /// Seed the store with an icon for a component that is not installed yet
    /// (e.g. restored from a backup). Returns `false` when the component
    /// already resolves and nothing was written.
    pub fn preload_icon(
        &self,
        component: &ComponentName,
        icon: RgbaImage,
        label: &str,
        profile_serial: i64,
        pixel_size: u32,
    ) -> Result<bool> {
        let profiles = &self.inner.deps.profiles;
        if let Some(profile) = profiles.profile_for_serial(profile_serial) {
            if self
                .inner
                .deps
                .inventory
                .resolve_activity(component, profile)
                .is_some()
            {
                return Ok(false);
            }
        }

        let icon = IconBitmap::from_rgba(normalize_icon(icon, pixel_size));
        let low_res = self
            .inner
            .low_res
            .generate(&icon, Color::TRANSPARENT);
        let record = IconRecord {
            component: component.flatten(),
            profile_serial,
            last_updated: 0,
            version: 0,
            icon: icon.to_png()?,
            icon_low_res: low_res.to_png()?,
            label: label.to_string(),
            system_state: self
                .inner
                .deps
                .provider
                .system_state_fingerprint(&component.package),
        };
        self.inner.db.insert_or_replace(&record)?;
        Ok(true)
    }

    /// Queue a reconciliation sweep on the worker.
    pub fn request_db_icon_update(&self, ignore_for_main_profile: HashSet<String>) {
        let cache = self.clone();
        self.inner.worker.post(Box::new(move || {
            cache.update_db_icons(&ignore_for_main_profile);
        }));
    }
}
