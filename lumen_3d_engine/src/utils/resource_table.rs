/// Generation-checked resource storage.
///
/// Keys stay valid until their own entry is removed; a key that outlived
/// its entry is rejected instead of aliasing whatever reused the slot.
/// Size-dependent render targets live here so stale handles held across a
/// swapchain recreation are caught.

use slotmap::{new_key_type, SlotMap};
use crate::error::Result;
use crate::engine_bail;

new_key_type! {
    /// Stable key for an entry of a `ResourceTable`
    pub struct ResourceKey;
}

pub struct ResourceTable<T> {
    entries: SlotMap<ResourceKey, T>,
    /// Display name used in error messages
    name: &'static str,
}

impl<T> ResourceTable<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            entries: SlotMap::with_key(),
            name,
        }
    }

    pub fn insert(&mut self, value: T) -> ResourceKey {
        self.entries.insert(value)
    }

    /// Entry for `key`, or InvalidResource if it was removed
    pub fn get(&self, key: ResourceKey) -> Result<&T> {
        match self.entries.get(key) {
            Some(value) => Ok(value),
            None => {
                engine_bail!("lumen3d::resource_table",
                    "Stale or unknown key {:?} in {}", key, self.name);
            }
        }
    }

    pub fn remove(&mut self, key: ResourceKey) -> Option<T> {
        self.entries.remove(key)
    }

    pub fn contains(&self, key: ResourceKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Drop every entry; all outstanding keys become stale
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceKey, &T)> + '_ {
        self.entries.iter()
    }
}

#[cfg(test)]
#[path = "resource_table_tests.rs"]
mod tests;
