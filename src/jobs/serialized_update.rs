// Serialized icon update task
//
// Handles one activity per worker tick and re-posts itself, so interactive
// work queued behind it is never starved by a large sweep. Updates drain
// before adds.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::cache::IconCache;
use crate::model::{ActivityInfo, PackageInfo};

pub(crate) struct SerializedIconUpdateTask {
    cache: IconCache,
    generation: u64,
    profile_serial: i64,
    packages: Arc<HashMap<String, PackageInfo>>,
    apps_to_update: Vec<ActivityInfo>,
    apps_to_add: Vec<ActivityInfo>,
    updated_packages: HashSet<String>,
}

impl SerializedIconUpdateTask {
    pub(crate) fn new(
        cache: IconCache,
        profile_serial: i64,
        packages: Arc<HashMap<String, PackageInfo>>,
        apps_to_update: Vec<ActivityInfo>,
        apps_to_add: Vec<ActivityInfo>,
    ) -> Self {
        let generation = *cache.inner.lock_sweep();
        Self {
            cache,
            generation,
            profile_serial,
            packages,
            apps_to_update,
            apps_to_add,
            updated_packages: HashSet::new(),
        }
    }

    fn is_current(&self) -> bool {
        *self.cache.inner.lock_sweep() == self.generation
    }

    fn has_work(&self) -> bool {
        !self.apps_to_update.is_empty() || !self.apps_to_add.is_empty()
    }

    /// Process exactly one item. Returns whether work remains.
    pub(crate) fn run_step(&mut self) -> bool {
        let inner = &self.cache.inner;

        if let Some(app) = self.apps_to_update.pop() {
            let package = app.package().to_string();
            if let Some(info) = self.packages.get(&package) {
                let mut state = inner.lock_state();
                if inner.refresh_activity(&mut state, &app, info, self.profile_serial, true) {
                    self.updated_packages.insert(package);
                }
            }
            log::debug!("Icon update step: refreshed {}", app.component);

            if self.apps_to_update.is_empty() && !self.updated_packages.is_empty() {
                self.notify_updated();
            }
        } else if let Some(app) = self.apps_to_add.pop() {
            if let Some(info) = self.packages.get(app.package()) {
                let mut state = inner.lock_state();
                inner.add_icon_to_db_and_mem_cache(&mut state, &app, info, self.profile_serial);
            }
            log::debug!("Icon update step: added {}", app.component);
        }

        self.has_work()
    }

    fn notify_updated(&self) {
        let inner = &self.cache.inner;
        match inner.deps.profiles.profile_for_serial(self.profile_serial) {
            Some(profile) => inner
                .deps
                .notifier
                .on_package_icons_updated(&self.updated_packages, profile),
            None => log::warn!(
                "Profile serial {} vanished, dropping icon change notification",
                self.profile_serial
            ),
        }
    }

    /// Post the next step to the worker under the cache's update tag. A
    /// task from a superseded sweep is dropped instead.
    pub(crate) fn schedule_next(self) {
        let inner = Arc::clone(&self.cache.inner);
        let current = inner.lock_sweep();
        if *current != self.generation {
            log::debug!("Icon update: sweep {} superseded, dropping remaining steps", self.generation);
            return;
        }
        inner.worker.post_tagged(
            inner.update_tag,
            Box::new(move || {
                let mut task = self;
                if !task.is_current() {
                    log::debug!("Icon update: skipping step of superseded sweep {}", task.generation);
                    return;
                }
                if task.run_step() {
                    task.schedule_next();
                }
            }),
        );
    }
}
