// Identity and inventory types shared by both cache tiers

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::EMPTY_CLASS_NAME;
use crate::error::{IconCacheError, Result};

/// A launchable entry point: package plus fully-qualified class name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentName {
    pub package: String,
    pub class: String,
}

impl ComponentName {
    pub fn new(package: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            class: class.into(),
        }
    }

    /// Parse the `package/class` form. A class starting with `.` is relative
    /// to the package.
    pub fn unflatten(flat: &str) -> Result<Self> {
        let (package, class) = flat
            .split_once('/')
            .ok_or_else(|| IconCacheError::InvalidComponent(flat.to_string()))?;
        if package.is_empty() || class.is_empty() {
            return Err(IconCacheError::InvalidComponent(flat.to_string()));
        }

        let class = if class.starts_with('.') && class.len() > 1 {
            format!("{}{}", package, class)
        } else {
            class.to_string()
        };

        Ok(Self::new(package, class))
    }

    pub fn flatten(&self) -> String {
        format!("{}/{}", self.package, self.class)
    }

    /// Synthetic component used to key package-level fallback entries.
    pub fn package_key(package: &str) -> Self {
        Self::new(package, format!("{}{}", package, EMPTY_CLASS_NAME))
    }
}

impl fmt::Display for ComponentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.package, self.class)
    }
}

/// Transient OS handle for a user profile. Not stable across reboots; the
/// store keys on the profile serial instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProfileHandle(pub u32);

impl fmt::Display for ProfileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "u{}", self.0)
    }
}

/// Join key between the memory tier and the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentKey {
    pub component: ComponentName,
    pub profile: ProfileHandle,
}

impl ComponentKey {
    pub fn new(component: ComponentName, profile: ProfileHandle) -> Self {
        Self { component, profile }
    }

    pub fn for_package(package: &str, profile: ProfileHandle) -> Self {
        Self::new(ComponentName::package_key(package), profile)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageFlags {
    /// Package data is present but the app itself is not installed.
    pub data_only: bool,
}

/// Installed package as reported by the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub package_name: String,
    pub version_code: i64,
    /// Milliseconds since the epoch.
    pub last_update_time: i64,
    pub label: String,
    #[serde(default)]
    pub flags: PackageFlags,
}

/// A live launchable activity for one profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityInfo {
    pub component: ComponentName,
    pub profile: ProfileHandle,
    pub label: String,
}

impl ActivityInfo {
    pub fn package(&self) -> &str {
        &self.component.package
    }

    pub fn key(&self) -> ComponentKey {
        ComponentKey::new(self.component.clone(), self.profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unflatten_round_trip() {
        let cn = ComponentName::unflatten("com.a/com.a.Main").unwrap();
        assert_eq!(cn.package, "com.a");
        assert_eq!(cn.class, "com.a.Main");
        assert_eq!(cn.flatten(), "com.a/com.a.Main");
    }

    #[test]
    fn test_unflatten_relative_class() {
        let cn = ComponentName::unflatten("com.a/.Main").unwrap();
        assert_eq!(cn.class, "com.a.Main");
    }

    #[test]
    fn test_unflatten_rejects_garbage() {
        assert!(ComponentName::unflatten("no-slash").is_err());
        assert!(ComponentName::unflatten("/cls").is_err());
        assert!(ComponentName::unflatten("pkg/").is_err());
    }

    #[test]
    fn test_package_key_shape() {
        let key = ComponentName::package_key("com.a");
        assert_eq!(key.flatten(), "com.a/com.a.");
        // Unflatten must not treat the package key class as relative
        assert_eq!(ComponentName::unflatten(&key.flatten()).unwrap(), key);
    }
}
