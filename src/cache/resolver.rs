// Get-or-create resolution
//
// Everything here runs with the state lock held; callers pass the guard's
// `&mut CacheState` in. Order: memory, store, provider, package, default.

use std::sync::Arc;

use image::RgbaImage;

use super::{CacheEntry, CacheState, Inner, ItemIcon};
use crate::bitmap::{normalize_icon, IconBitmap};
use crate::db::{IconColumn, IconRecord, Selection};
use crate::error::Result;
use crate::model::{ActivityInfo, ComponentKey, ComponentName, PackageInfo, ProfileHandle};

/// Both tiers of a freshly built icon, ready to be written through.
pub(crate) struct PendingIcon {
    pub(crate) icon: IconBitmap,
    pub(crate) low_res: IconBitmap,
    pub(crate) label: String,
}

impl Inner {
    pub(crate) fn cache_locked(
        &self,
        state: &mut CacheState,
        component: &ComponentName,
        activity: Option<&ActivityInfo>,
        profile: ProfileHandle,
        use_package_icon: bool,
        use_low_res: bool,
    ) -> Arc<CacheEntry> {
        let key = ComponentKey::new(component.clone(), profile);
        if let Some(entry) = state.memory.get(&key) {
            if !entry.is_low_res || use_low_res {
                return entry;
            }
        }

        let mut entry = CacheEntry::default();
        if !self.entry_from_db(&key, &mut entry, use_low_res) {
            if let Some(activity) = activity {
                entry.icon = self.load_activity_icon(activity);
                if let Some(icon) = &entry.icon {
                    self.persist_resolved(component, activity, profile, icon);
                }
            } else if use_package_icon {
                let package =
                    self.entry_for_package_locked(state, &component.package, profile, false);
                entry.icon = package.icon.clone();
                entry.title = package.title.clone();
                entry.content_description = package.content_description.clone();
            }
            if entry.icon.is_none() {
                entry.icon = Some(self.default_icon_locked(state, profile));
            }
        }

        if entry.title.is_empty() {
            if let Some(activity) = activity {
                entry.title = activity.label.clone();
                entry.content_description =
                    self.deps.profiles.badged_label(&activity.label, profile);
            }
        }

        let entry = Arc::new(entry);
        state.memory.put(key, Arc::clone(&entry));
        entry
    }

    /// Write a provider-resolved icon through so later sweeps compare it
    /// against the installed version. Without package info it stays in
    /// memory only.
    fn persist_resolved(
        &self,
        component: &ComponentName,
        activity: &ActivityInfo,
        profile: ProfileHandle,
        icon: &IconBitmap,
    ) {
        let info = match self.deps.inventory.package_info(&component.package, profile) {
            Ok(info) => info,
            Err(e) => {
                log::debug!("Resolved icon for {} not stored: {}", component, e);
                return;
            }
        };
        let low_res = self
            .low_res
            .generate(icon, self.config.activity_low_res_background);
        self.write_icon(
            component,
            self.serial(profile),
            info.last_update_time,
            info.version_code,
            &PendingIcon {
                icon: icon.clone(),
                low_res,
                label: activity.label.clone(),
            },
        );
    }

    /// Package-level entry. Only cached when the package could be loaded.
    pub(crate) fn entry_for_package_locked(
        &self,
        state: &mut CacheState,
        package: &str,
        profile: ProfileHandle,
        use_low_res: bool,
    ) -> Arc<CacheEntry> {
        let key = ComponentKey::for_package(package, profile);
        if let Some(entry) = state.memory.get(&key) {
            if !entry.is_low_res || use_low_res {
                return entry;
            }
        }

        let mut entry = CacheEntry::default();
        let mut loaded = true;
        if !self.entry_from_db(&key, &mut entry, use_low_res) {
            match self.load_package_entry(&key, use_low_res) {
                Ok(fresh) => entry = fresh,
                Err(e) => {
                    log::debug!("Application info not found for {}: {}", package, e);
                    loaded = false;
                }
            }
        }

        let entry = Arc::new(entry);
        if loaded {
            state.memory.put(key, Arc::clone(&entry));
        }
        entry
    }

    fn load_package_entry(&self, key: &ComponentKey, use_low_res: bool) -> Result<CacheEntry> {
        let package = key.component.package.as_str();
        let info = self.deps.inventory.package_info(package, key.profile)?;
        let raw = self
            .deps
            .provider
            .application_icon(&info, self.config.icon_dpi)?;

        let icon = self.make_icon(raw, key.profile);
        let low_res = self
            .low_res
            .generate(&icon, self.config.package_low_res_background);

        let entry = CacheEntry {
            icon: Some(if use_low_res { low_res.clone() } else { icon.clone() }),
            title: info.label.clone(),
            content_description: self.deps.profiles.badged_label(&info.label, key.profile),
            is_low_res: use_low_res,
        };

        self.write_icon(
            &key.component,
            self.serial(key.profile),
            info.last_update_time,
            info.version_code,
            &PendingIcon {
                icon,
                low_res,
                label: info.label,
            },
        );
        Ok(entry)
    }

    /// Fill `entry` from the store. Returns whether a row was found; a row
    /// with undecodable image bytes still counts, with no icon.
    fn entry_from_db(&self, key: &ComponentKey, entry: &mut CacheEntry, low_res: bool) -> bool {
        let flat = key.component.flatten();
        let selection = Selection::Component {
            component: &flat,
            profile_serial: self.serial(key.profile),
        };
        let columns = [IconColumn::icon_for(low_res), IconColumn::Label];
        let Some(row) = self.db.query_one(&columns, &selection) else {
            return false;
        };

        entry.icon = row.icon_bytes(low_res).and_then(IconBitmap::from_png);
        entry.is_low_res = low_res;
        let label = row.label.unwrap_or_default();
        entry.content_description = self.deps.profiles.badged_label(&label, key.profile);
        entry.title = label;
        true
    }

    fn load_activity_icon(&self, activity: &ActivityInfo) -> Option<IconBitmap> {
        match self.deps.provider.icon(activity, self.config.icon_dpi) {
            Ok(raw) => Some(self.make_icon(raw, activity.profile)),
            Err(e) => {
                log::warn!("Icon provider failed for {}: {}", activity.component, e);
                None
            }
        }
    }

    /// Normalise to the configured size, then badge for the profile.
    fn make_icon(&self, raw: RgbaImage, profile: ProfileHandle) -> IconBitmap {
        let normalized = normalize_icon(raw, self.config.icon_pixel_size);
        IconBitmap::from_rgba(self.deps.profiles.badge_icon(normalized, profile))
    }

    pub(crate) fn default_icon_locked(&self, state: &mut CacheState, profile: ProfileHandle) -> IconBitmap {
        state.defaults.get_or_insert_with(profile, || {
            let raw = self.deps.provider.default_icon(self.config.icon_dpi);
            self.make_icon(raw, profile)
        })
    }

    pub(crate) fn item_icon_locked(
        &self,
        state: &mut CacheState,
        entry: &CacheEntry,
        profile: ProfileHandle,
    ) -> ItemIcon {
        let (icon, using_fallback) = match &entry.icon {
            Some(icon) => (icon.clone(), state.defaults.is_default(icon, profile)),
            None => (self.default_icon_locked(state, profile), true),
        };
        ItemIcon {
            icon,
            title: entry.title.trim().to_string(),
            content_description: entry.content_description.clone(),
            using_low_res: entry.is_low_res,
            using_fallback,
        }
    }

    /// Rebuild the memory entry for a live activity and return both tiers for
    /// the store. An existing high-res entry is reused unless
    /// `replace_existing`. `None` when no icon could be produced.
    pub(crate) fn update_cache_and_get_icon(
        &self,
        state: &mut CacheState,
        activity: &ActivityInfo,
        replace_existing: bool,
    ) -> Option<PendingIcon> {
        let key = activity.key();
        let existing = if replace_existing {
            None
        } else {
            state
                .memory
                .get(&key)
                .filter(|e| !e.is_low_res)
                .and_then(|e| e.icon.clone())
                .filter(|icon| !state.defaults.is_default(icon, activity.profile))
        };
        let icon = match existing {
            Some(icon) => icon,
            None => self.load_activity_icon(activity)?,
        };

        let entry = CacheEntry {
            icon: Some(icon.clone()),
            title: activity.label.clone(),
            content_description: self
                .deps
                .profiles
                .badged_label(&activity.label, activity.profile),
            is_low_res: false,
        };
        state.memory.put(key, Arc::new(entry));

        let low_res = self
            .low_res
            .generate(&icon, self.config.activity_low_res_background);
        Some(PendingIcon {
            icon,
            low_res,
            label: activity.label.clone(),
        })
    }

    /// Returns whether an icon was produced (and a write attempted).
    pub(crate) fn add_icon_to_db_and_mem_cache(
        &self,
        state: &mut CacheState,
        activity: &ActivityInfo,
        info: &PackageInfo,
        profile_serial: i64,
    ) -> bool {
        self.refresh_activity(state, activity, info, profile_serial, false)
    }

    pub(crate) fn refresh_activity(
        &self,
        state: &mut CacheState,
        activity: &ActivityInfo,
        info: &PackageInfo,
        profile_serial: i64,
        replace_existing: bool,
    ) -> bool {
        let Some(pending) = self.update_cache_and_get_icon(state, activity, replace_existing) else {
            return false;
        };
        self.write_icon(
            &activity.component,
            profile_serial,
            info.last_update_time,
            info.version_code,
            &pending,
        );
        true
    }

    /// Insert-or-replace both tiers. Failures are logged; the memory tier
    /// already holds the result.
    pub(crate) fn write_icon(
        &self,
        component: &ComponentName,
        profile_serial: i64,
        last_updated: i64,
        version: i64,
        pending: &PendingIcon,
    ) {
        let encoded = pending
            .icon
            .to_png()
            .and_then(|icon| Ok((icon, pending.low_res.to_png()?)));
        let (icon, icon_low_res) = match encoded {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("Failed to encode icon for {}: {}", component, e);
                return;
            }
        };

        let record = IconRecord {
            component: component.flatten(),
            profile_serial,
            last_updated,
            version,
            icon,
            icon_low_res,
            label: pending.label.clone(),
            system_state: self.deps.provider.system_state_fingerprint(&component.package),
        };
        if let Err(e) = self.db.insert_or_replace(&record) {
            log::warn!("Failed to store icon for {}: {}", component, e);
        }
    }
}
