//! Registry of live sources that remote requests can be routed to

use std::sync::{Arc, PoisonError, RwLock, Weak};
use tracing::debug;

use crate::source::{InstanceId, RandomMediaSource};

struct Registered {
    id: InstanceId,
    name: String,
    source: Weak<RandomMediaSource>,
}

/// Maps instance ids (and names) to sources without keeping them alive.
///
/// A request without an explicit target goes to the most recently
/// registered source that is still alive.
#[derive(Default)]
pub struct InstanceRegistry {
    instances: RwLock<Vec<Registered>>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, source: &Arc<RandomMediaSource>) {
        let mut instances = self.instances.write().unwrap_or_else(PoisonError::into_inner);
        instances.retain(|r| r.source.strong_count() > 0 && r.id != source.id());
        instances.push(Registered {
            id: source.id(),
            name: source.name().to_string(),
            source: Arc::downgrade(source),
        });
        debug!(
            "Registered source '{}' ({}) for remote requests",
            source.name(),
            source.id()
        );
    }

    pub fn unregister(&self, id: InstanceId) {
        self.instances
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|r| r.id != id);
    }

    /// Find a live source by id or name, or the newest one when `target`
    /// is `None`
    pub fn resolve(&self, target: Option<&str>) -> Option<Arc<RandomMediaSource>> {
        let instances = self.instances.read().unwrap_or_else(PoisonError::into_inner);
        let mut candidates = instances.iter().rev();
        match target {
            None => candidates.find_map(|r| r.source.upgrade()),
            Some(target) => {
                let id = target.parse::<InstanceId>().ok();
                candidates
                    .filter(|r| r.name == target || Some(r.id) == id)
                    .find_map(|r| r.source.upgrade())
            }
        }
    }

    /// Number of registered sources that are still alive
    pub fn len(&self) -> usize {
        self.instances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.source.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
