// Per-profile fallback icons

use std::collections::HashMap;

use crate::bitmap::IconBitmap;
use crate::model::ProfileHandle;

/// One default icon per profile, built on first use and kept for the life of
/// the cache. "Is this the default icon" means "is this that instance".
#[derive(Default)]
pub struct DefaultIconRegistry {
    icons: HashMap<ProfileHandle, IconBitmap>,
}

impl DefaultIconRegistry {
    pub fn get_or_insert_with<F>(&mut self, profile: ProfileHandle, make: F) -> IconBitmap
    where
        F: FnOnce() -> IconBitmap,
    {
        self.icons.entry(profile).or_insert_with(make).clone()
    }

    pub fn is_default(&self, icon: &IconBitmap, profile: ProfileHandle) -> bool {
        self.icons
            .get(&profile)
            .is_some_and(|default| default.same_instance(icon))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn gray() -> IconBitmap {
        IconBitmap::from_rgba(RgbaImage::from_pixel(8, 8, Rgba([128, 128, 128, 255])))
    }

    #[test]
    fn test_built_once_per_profile() {
        let mut registry = DefaultIconRegistry::default();
        let mut built = 0;
        let a = registry.get_or_insert_with(ProfileHandle(0), || {
            built += 1;
            gray()
        });
        let b = registry.get_or_insert_with(ProfileHandle(0), || {
            built += 1;
            gray()
        });
        assert_eq!(built, 1);
        assert!(a.same_instance(&b));
    }

    #[test]
    fn test_identity_not_pixels() {
        let mut registry = DefaultIconRegistry::default();
        let default = registry.get_or_insert_with(ProfileHandle(0), gray);
        assert!(registry.is_default(&default, ProfileHandle(0)));
        assert!(!registry.is_default(&gray(), ProfileHandle(0)));
        // Other profile has its own instance
        assert!(!registry.is_default(&default, ProfileHandle(10)));
    }
}
