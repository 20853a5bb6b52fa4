//! Bookkeeping of spawned items that are still playing

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::config::SpawnConfig;
use crate::host::{CompletionSubscription, ItemHandle, ObjectHandle};

static NEXT_ITEM_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide unique, monotonically increasing id of a spawned item
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemId(u64);

impl ItemId {
    /// Allocate the next id
    pub fn next() -> Self {
        Self(NEXT_ITEM_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RandomMedia_{}", self.0)
    }
}

/// Non-owning record of a spawned item. The host owns the object itself.
#[derive(Debug)]
pub struct ActiveItem {
    id: ItemId,
    item: ItemHandle,
    object: ObjectHandle,
    file: PathBuf,
    spawned_at: DateTime<Utc>,
    subscription: Option<CompletionSubscription>,
}

impl ActiveItem {
    pub fn new(
        id: ItemId,
        item: ItemHandle,
        object: ObjectHandle,
        file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id,
            item,
            object,
            file: file.into(),
            spawned_at: Utc::now(),
            subscription: None,
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn item(&self) -> ItemHandle {
        self.item
    }

    pub fn object(&self) -> ObjectHandle {
        self.object
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn spawned_at(&self) -> DateTime<Utc> {
        self.spawned_at
    }
}

/// Thread-safe map of live items, shared between the spawning thread and
/// whichever thread the host delivers completion events on.
///
/// The cap is checked once per spawn call, so a batch may push `count()`
/// past `max_active` by up to `spawn_count - 1`.
#[derive(Debug, Default)]
pub struct ActiveItemRegistry {
    items: Mutex<BTreeMap<ItemId, ActiveItem>>,
}

impl ActiveItemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn items(&self) -> MutexGuard<'_, BTreeMap<ItemId, ActiveItem>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `max(0, max_active - count())`
    pub fn remaining_capacity(&self, config: &SpawnConfig) -> usize {
        (config.max_active as usize).saturating_sub(self.count())
    }

    pub fn register(&self, item: ActiveItem) {
        self.items().insert(item.id, item);
    }

    /// Hand a completion subscription to a registered item.
    ///
    /// If the item is already gone (its completion fired first) the
    /// subscription is returned so the caller can drop it.
    pub fn attach_subscription(
        &self,
        id: ItemId,
        subscription: CompletionSubscription,
    ) -> Result<(), CompletionSubscription> {
        match self.items().get_mut(&id) {
            Some(item) => {
                item.subscription = Some(subscription);
                Ok(())
            }
            None => Err(subscription),
        }
    }

    /// Remove an item. Unknown ids are a no-op, so a completion delivered
    /// twice only removes once.
    ///
    /// The removed record is returned rather than dropped here; dropping it
    /// releases its subscription, which must not happen under this lock.
    pub fn unregister(&self, id: ItemId) -> Option<ActiveItem> {
        self.items().remove(&id)
    }

    pub fn count(&self) -> usize {
        self.items().len()
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.items().contains_key(&id)
    }

    /// When the longest-running live item was spawned
    pub fn oldest_spawned_at(&self) -> Option<DateTime<Utc>> {
        self.items().values().map(ActiveItem::spawned_at).min()
    }

    /// Ids of all live items, oldest first
    pub fn ids(&self) -> Vec<ItemId> {
        self.items().keys().copied().collect()
    }

    /// Forget every item, returning the records for the caller to drop
    pub fn clear(&self) -> Vec<ActiveItem> {
        std::mem::take(&mut *self.items()).into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn item() -> ActiveItem {
        let id = ItemId::next();
        ActiveItem::new(id, ItemHandle(id.value()), ObjectHandle(id.value()), "/media/a.mp4")
    }

    fn config(max_active: u32) -> SpawnConfig {
        SpawnConfig {
            max_active,
            ..SpawnConfig::default()
        }
    }

    #[test]
    fn test_remaining_capacity_never_negative() {
        let registry = ActiveItemRegistry::new();
        assert_eq!(registry.remaining_capacity(&config(2)), 2);

        for _ in 0..3 {
            registry.register(item());
        }
        assert_eq!(registry.count(), 3);
        assert_eq!(registry.remaining_capacity(&config(2)), 0);
        assert_eq!(registry.remaining_capacity(&config(5)), 2);
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let registry = ActiveItemRegistry::new();
        let first = item();
        let id = first.id();
        registry.register(first);
        registry.register(item());

        assert!(registry.unregister(id).is_some());
        assert_eq!(registry.count(), 1);
        assert!(registry.unregister(id).is_none());
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_ids_are_monotonic() {
        let a = ItemId::next();
        let b = ItemId::next();
        assert!(b > a);
        assert_eq!(format!("{}", ItemId(7)), "RandomMedia_7");
    }

    #[test]
    fn test_oldest_spawned_at_tracks_live_items() {
        let registry = ActiveItemRegistry::new();
        assert!(registry.oldest_spawned_at().is_none());

        let first = item();
        let first_id = first.id();
        let first_spawned = first.spawned_at();
        registry.register(first);
        let second = item();
        let second_spawned = second.spawned_at();
        registry.register(second);
        assert_eq!(registry.oldest_spawned_at(), Some(first_spawned));

        let removed = registry.unregister(first_id).unwrap();
        assert_eq!(removed.file(), Path::new("/media/a.mp4"));
        assert_eq!(registry.oldest_spawned_at(), Some(second_spawned));
    }

    #[test]
    fn test_clear_returns_everything() {
        let registry = ActiveItemRegistry::new();
        registry.register(item());
        registry.register(item());

        let ids = registry.ids();
        let cleared = registry.clear();
        assert_eq!(cleared.len(), 2);
        assert_eq!(cleared.iter().map(|i| i.id()).collect::<Vec<_>>(), ids);
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_concurrent_register_and_unregister() {
        let registry = Arc::new(ActiveItemRegistry::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let record = item();
                        let id = record.id();
                        registry.register(record);
                        assert!(registry.contains(id));
                        assert!(registry.unregister(id).is_some());
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.count(), 0);
    }
}
