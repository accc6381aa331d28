// iconcache - Library Entry Point
//
// Two-tier icon/label cache for launcher components: a memory tier for hot
// lookups in front of a versioned SQLite store, kept in step with the live
// package inventory by a background worker.

pub mod constants;
pub mod error;
pub mod model;
pub mod bitmap;
pub mod config;
pub mod provider;
pub mod db;
pub mod jobs;
pub mod cache;

#[cfg(test)]
pub(crate) mod test_support;

pub use bitmap::{Color, IconBitmap};
pub use cache::{CacheEntry, Collaborators, IconCache, ItemIcon};
pub use config::IconCacheConfig;
pub use db::IconDb;
pub use error::{IconCacheError, Result};
pub use jobs::background::{IconLoadRequest, IconRequest};
pub use jobs::reconcile::ReconcileOutcome;
pub use jobs::worker::WorkerHandle;
pub use jobs::WorkerQueue;
pub use model::{ActivityInfo, ComponentKey, ComponentName, PackageFlags, PackageInfo, ProfileHandle};
pub use provider::{
    CallbackExecutor, ChangeNotifier, IconProvider, InlineExecutor, InventoryLister, NoopNotifier,
    ProfileDirectory,
};
