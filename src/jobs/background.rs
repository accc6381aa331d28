// Off-thread icon loads with cancellable handles

use crate::cache::{IconCache, ItemIcon};
use crate::model::{ComponentName, ProfileHandle};

use super::{TaskId, WorkerQueue};

/// What to resolve in the background.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconRequest {
    /// A launcher app; no activity info, no package fallback.
    App {
        component: ComponentName,
        profile: ProfileHandle,
    },
    /// A shortcut; resolves the activity and falls back to the package.
    Shortcut {
        component: Option<ComponentName>,
        profile: ProfileHandle,
    },
    /// A package-level entry.
    Package {
        package: String,
        profile: ProfileHandle,
    },
}

/// Handle to a queued background load.
#[derive(Clone)]
pub struct IconLoadRequest {
    queue: WorkerQueue,
    id: TaskId,
}

impl IconLoadRequest {
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Remove the load if it has not started. Running loads are never
    /// interrupted; their callback still fires.
    pub fn cancel(&self) -> bool {
        self.queue.remove(self.id)
    }
}

impl IconCache {
    /// Resolve a high-res icon on the worker, then hand the result to
    /// `callback` through the configured callback executor.
    pub fn update_icon_in_background<F>(&self, request: IconRequest, callback: F) -> IconLoadRequest
    where
        F: FnOnce(ItemIcon) + Send + 'static,
    {
        let cache = self.clone();
        let id = self.inner.worker.post(Box::new(move || {
            let item = cache.resolve_request(&request);
            cache
                .inner
                .deps
                .callbacks
                .execute(Box::new(move || callback(item)));
        }));
        IconLoadRequest {
            queue: self.inner.worker.clone(),
            id,
        }
    }

    fn resolve_request(&self, request: &IconRequest) -> ItemIcon {
        match request {
            IconRequest::App { component, profile } => {
                self.get_title_and_icon(component, None, *profile, false)
            }
            IconRequest::Shortcut { component, profile } => {
                self.get_shortcut_title_and_icon(component.as_ref(), *profile, false)
            }
            IconRequest::Package { package, profile } => {
                self.get_title_and_icon_for_package(package, *profile, false)
            }
        }
    }
}
