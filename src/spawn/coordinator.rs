//! One spawn trigger, from catalog pick to completion wiring

use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};

use super::registry::{ActiveItem, ActiveItemRegistry, ItemId};
use super::transform::{Placement, TransformSampler};
use super::{SpawnOutcome, SpawnResult};
use crate::config::SpawnConfig;
use crate::host::{
    CompletionSubscription, Host, HostError, ItemHandle, ObjectHandle, PlayableOptions,
    SceneHandle,
};
use crate::media::{MediaCatalog, MediaEntry};

/// Runs spawn batches against a host.
///
/// Units inside a batch are materialized one after another on the calling
/// thread. Completion callbacks arrive on the host's threads and only touch
/// the registry and `Host::destroy_item`.
pub struct SpawnCoordinator {
    host: Arc<dyn Host>,
    catalog: Arc<MediaCatalog>,
    registry: Arc<ActiveItemRegistry>,
    sampler: TransformSampler,
}

impl SpawnCoordinator {
    pub fn new(
        host: Arc<dyn Host>,
        catalog: Arc<MediaCatalog>,
        registry: Arc<ActiveItemRegistry>,
    ) -> Self {
        Self {
            host,
            catalog,
            registry,
            sampler: TransformSampler::new(),
        }
    }

    pub fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }

    pub fn catalog(&self) -> &Arc<MediaCatalog> {
        &self.catalog
    }

    pub fn registry(&self) -> &Arc<ActiveItemRegistry> {
        &self.registry
    }

    /// Run one batch with the thread-local generator
    pub fn spawn(&self, config: &SpawnConfig) -> SpawnResult {
        self.spawn_with(&mut rand::thread_rng(), config)
    }

    /// Run one batch.
    ///
    /// Capacity is checked once for the whole batch. A unit the host fails
    /// to materialize is logged and skipped; the rest of the batch goes on.
    pub fn spawn_with<R: Rng + ?Sized>(&self, rng: &mut R, config: &SpawnConfig) -> SpawnResult {
        let entries = self.catalog.list();
        if entries.is_empty() {
            warn!("No media files - skipping spawn");
            return self.skipped(SpawnOutcome::NoEligibleFiles);
        }

        let remaining = self.registry.remaining_capacity(config);
        if remaining == 0 {
            info!(
                "Active cap reached ({}/{}) - skipping spawn",
                self.registry.count(),
                config.max_active
            );
            return self.skipped(SpawnOutcome::AtCapacity);
        }

        let Some(scene) = self.host.current_scene() else {
            warn!("No current scene - skipping spawn");
            return self.skipped(SpawnOutcome::NoActiveScene);
        };

        let (canvas_width, canvas_height) = self.host.canvas_size();
        let attempted = config.spawn_count.max(1) as usize;
        let mut succeeded = 0;

        for _ in 0..attempted {
            let Some(entry) = entries.choose(rng) else {
                break;
            };

            let placement = config
                .random_transform
                .then(|| self.sampler.sample_with(rng, canvas_width, canvas_height, config));

            match self.spawn_unit(scene, entry, placement, config) {
                Ok(id) => {
                    succeeded += 1;
                    info!("Spawned {}: {:?}", id, entry.path());
                }
                Err(e) => error!("Skipping unit: {}", e),
            }
        }

        let active_count_after = self.registry.count();
        debug!(
            "Spawn batch done: {}/{} units, {} active",
            succeeded, attempted, active_count_after
        );

        SpawnResult {
            attempted,
            succeeded,
            active_count_after,
            outcome: SpawnOutcome::Spawned,
        }
    }

    fn skipped(&self, outcome: SpawnOutcome) -> SpawnResult {
        SpawnResult {
            attempted: 0,
            succeeded: 0,
            active_count_after: self.registry.count(),
            outcome,
        }
    }

    fn spawn_unit(
        &self,
        scene: SceneHandle,
        entry: &MediaEntry,
        placement: Option<Placement>,
        config: &SpawnConfig,
    ) -> Result<ItemId, HostError> {
        let id = ItemId::next();
        let options = PlayableOptions::for_file(entry.path());

        let object = self.host.create_playable(&id.to_string(), &options)?;
        let item = match self.host.place_in_scene(scene, object) {
            Ok(item) => item,
            Err(e) => {
                self.host.release_object(object);
                return Err(e);
            }
        };

        self.host.set_object_volume(object, config.volume);
        self.host.set_object_monitoring(object, config.monitoring);

        self.registry
            .register(ActiveItem::new(id, item, object, entry.path()));

        if let Some(placement) = placement {
            self.apply_placement(item, object, &placement, config);
        }

        if config.remove_on_end {
            self.remove_on_completion(id, item, object);
        }

        Ok(id)
    }

    fn apply_placement(
        &self,
        item: ItemHandle,
        object: ObjectHandle,
        placement: &Placement,
        config: &SpawnConfig,
    ) {
        let native_width = self.host.native_size(object).map(|(width, _)| width);
        let (scale_x, scale_y) = placement.item_scale(native_width);

        self.host.set_item_position(item, placement.x, placement.y);
        self.host.set_item_scale(item, scale_x, scale_y);
        if !config.transform.disable_rotation {
            self.host.set_item_rotation(item, placement.rotation);
        }
    }

    /// Subscribe so that end of playback unregisters and destroys the item
    fn remove_on_completion(&self, id: ItemId, item: ItemHandle, object: ObjectHandle) {
        let registry: Weak<ActiveItemRegistry> = Arc::downgrade(&self.registry);
        let host: Weak<dyn Host> = Arc::downgrade(&self.host);

        let callback = Box::new(move || {
            let Some(registry) = registry.upgrade() else {
                return;
            };
            // None: already removed by an earlier delivery or by teardown.
            let Some(removed) = registry.unregister(id) else {
                return;
            };
            if let Some(host) = host.upgrade() {
                host.destroy_item(removed.item());
            }
            info!("Media ended - {} removed ({:?})", id, removed.file());
        });

        match CompletionSubscription::subscribe(&self.host, object, callback) {
            Ok(subscription) => {
                if let Err(subscription) = self.registry.attach_subscription(id, subscription) {
                    debug!("{} finished before its subscription was attached", id);
                    drop(subscription);
                }
            }
            Err(e) => error!("{} ({}) will not be removed on end: {}", id, item, e),
        }
    }
}
