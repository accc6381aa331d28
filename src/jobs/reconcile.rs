// Reconciliation sweep
//
// Compares every stored row of a profile against the live inventory. Stale
// rows are deleted in one batch, adds and updates go to a
// SerializedIconUpdateTask on the worker queue.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::serialized_update::SerializedIconUpdateTask;
use crate::cache::IconCache;
use crate::db::{IconColumn, IconRow, Selection};
use crate::model::{ActivityInfo, ComponentKey, ComponentName, PackageInfo, ProfileHandle};

/// Per-profile result of a sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Rows deleted from the store.
    pub removed: usize,
    /// Activities queued for a forced rebuild.
    pub updates: usize,
    /// Activities with no stored row, queued for insertion.
    pub adds: usize,
}

const SCAN_COLUMNS: [IconColumn; 5] = [
    IconColumn::RowId,
    IconColumn::Component,
    IconColumn::LastUpdated,
    IconColumn::Version,
    IconColumn::SystemState,
];

/// Working sets built while scanning one profile's rows.
struct Classification<'a> {
    packages: &'a HashMap<String, PackageInfo>,
    ignore: &'a HashSet<String>,
    components: HashMap<ComponentName, ActivityInfo>,
    rows_to_remove: Vec<i64>,
    memory_to_remove: Vec<ComponentName>,
    to_update: Vec<ActivityInfo>,
}

impl Classification<'_> {
    fn classify(&mut self, row: IconRow, fingerprint: impl Fn(&str) -> String) {
        let Some(row_id) = row.row_id else {
            return;
        };
        let component = match row.component.as_deref().map(ComponentName::unflatten) {
            Some(Ok(component)) => component,
            Some(Err(e)) => {
                log::debug!("Dropping unreadable icon row {}: {}", row_id, e);
                self.rows_to_remove.push(row_id);
                return;
            }
            None => {
                self.rows_to_remove.push(row_id);
                return;
            }
        };

        let Some(info) = self.packages.get(&component.package) else {
            if !self.ignore.contains(&component.package) {
                self.memory_to_remove.push(component);
                self.rows_to_remove.push(row_id);
            }
            return;
        };
        if info.flags.data_only {
            return;
        }

        let activity = self.components.remove(&component);
        let current = row.version == Some(info.version_code)
            && row.last_updated == Some(info.last_update_time)
            && row.system_state.as_deref() == Some(fingerprint(&component.package).as_str());
        if current {
            return;
        }
        match activity {
            Some(activity) => self.to_update.push(activity),
            None => {
                self.memory_to_remove.push(component);
                self.rows_to_remove.push(row_id);
            }
        }
    }
}

impl IconCache {
    /// Reconcile every profile against the live inventory. The ignore set
    /// (packages being restored or installed) applies to the main profile
    /// only. Cancels any update steps still queued from a previous sweep; a
    /// step that is already running finishes but does not re-post.
    pub fn update_db_icons(
        &self,
        ignore_for_main_profile: &HashSet<String>,
    ) -> Vec<(ProfileHandle, ReconcileOutcome)> {
        let inner = &self.inner;
        let cancelled = {
            let mut generation = inner.lock_sweep();
            *generation += 1;
            inner.worker.remove_tagged(inner.update_tag)
        };
        if cancelled > 0 {
            log::debug!("Cancelled {} pending icon update steps", cancelled);
        }
        inner.deps.provider.refresh_system_state();

        let main = inner.deps.profiles.main_profile();
        let no_ignore = HashSet::new();
        let mut outcomes = Vec::new();

        for profile in inner.deps.profiles.profiles() {
            let activities = inner.deps.inventory.activity_list(None, profile);
            if activities.is_empty() {
                if profile == main {
                    // No launchable apps for the main user means the inventory
                    // is not ready; do not wipe the store.
                    log::warn!("Empty activity list for main profile {}, skipping sweep", profile);
                    return outcomes;
                }
                continue;
            }

            let ignore = if profile == main {
                ignore_for_main_profile
            } else {
                &no_ignore
            };
            let outcome = self.reconcile_profile(profile, activities, ignore);
            log::info!(
                "Icon sweep {}: {} removed, {} updates, {} adds",
                profile,
                outcome.removed,
                outcome.updates,
                outcome.adds
            );
            outcomes.push((profile, outcome));
        }
        outcomes
    }

    /// Reconcile one profile's rows against `activities`.
    pub fn reconcile_profile(
        &self,
        profile: ProfileHandle,
        activities: Vec<ActivityInfo>,
        ignore: &HashSet<String>,
    ) -> ReconcileOutcome {
        let inner = &self.inner;
        let serial = inner.serial(profile);

        let packages: HashMap<String, PackageInfo> = match inner.deps.inventory.installed_packages() {
            Ok(list) => list
                .into_iter()
                .map(|p| (p.package_name.clone(), p))
                .collect(),
            Err(e) => {
                log::warn!("Cannot list installed packages, skipping {}: {}", profile, e);
                return ReconcileOutcome::default();
            }
        };

        let mut sets = Classification {
            packages: &packages,
            ignore,
            components: activities
                .into_iter()
                .map(|a| (a.component.clone(), a))
                .collect(),
            rows_to_remove: Vec::new(),
            memory_to_remove: Vec::new(),
            to_update: Vec::new(),
        };

        let provider = &inner.deps.provider;
        let scanned = inner.db.query_with(&SCAN_COLUMNS, &Selection::Profile(serial), |row| {
            sets.classify(row, |package| provider.system_state_fingerprint(package));
        });
        if let Err(e) = scanned {
            log::warn!("Icon scan for {} stopped early: {}", profile, e);
        }

        let Classification {
            components,
            rows_to_remove,
            memory_to_remove,
            to_update,
            ..
        } = sets;

        if !memory_to_remove.is_empty() {
            let mut state = inner.lock_state();
            for component in memory_to_remove {
                state.memory.remove(&ComponentKey::new(component, profile));
            }
        }

        let mut outcome = ReconcileOutcome::default();
        if !rows_to_remove.is_empty() {
            match inner.db.delete(&Selection::RowIds(&rows_to_remove)) {
                Ok(n) => outcome.removed = n,
                Err(e) => log::warn!("Failed to delete {} stale icon rows: {}", rows_to_remove.len(), e),
            }
        }

        let to_add: Vec<ActivityInfo> = components.into_values().collect();
        outcome.updates = to_update.len();
        outcome.adds = to_add.len();

        if !to_add.is_empty() || !to_update.is_empty() {
            SerializedIconUpdateTask::new(self.clone(), serial, Arc::new(packages), to_update, to_add)
                .schedule_next();
        }
        outcome
    }
}
