//! In-memory host
//!
//! Keeps scenes, objects and items as plain maps so the spawner can run
//! headless. Playback either never ends (tests drive it through
//! `finish_playback`) or ends a fixed duration after the first completion
//! subscription, on a tokio runtime.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, info};

use super::{
    CompletionCallback, Host, HostError, ItemHandle, ObjectHandle, PlayableOptions, SceneHandle,
    SubscriptionId,
};
use crate::config::MonitoringType;

const DEFAULT_SCENE: SceneHandle = SceneHandle(1);
const DEFAULT_NATIVE_SIZE: (u32, u32) = (1280, 720);

/// A playable object as the simulated host sees it
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedObject {
    pub name: String,
    pub options: PlayableOptions,
    pub volume: f32,
    pub monitoring: MonitoringType,
}

/// A scene item as the simulated host sees it
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedItem {
    pub object: ObjectHandle,
    pub scene: SceneHandle,
    pub position: (f32, f32),
    pub scale: (f32, f32),
    pub rotation: f32,
}

#[derive(Default)]
struct SimState {
    scene: Option<SceneHandle>,
    native_size: Option<(u32, u32)>,
    objects: HashMap<ObjectHandle, SimulatedObject>,
    items: HashMap<ItemHandle, SimulatedItem>,
    subscriptions: HashMap<SubscriptionId, (ObjectHandle, Arc<CompletionCallback>)>,
    /// Objects whose playback timer is already running
    scheduled: HashSet<ObjectHandle>,
    failing_files: HashSet<PathBuf>,
    fail_placement: bool,
    end_on_subscribe: bool,
    create_calls: usize,
    destroyed_items: usize,
}

/// Host double backed by in-memory maps
pub struct SimulatedHost {
    canvas: (u32, u32),
    state: Mutex<SimState>,
    next_id: AtomicU64,
    auto_complete: Option<(Handle, Duration)>,
    weak_self: Weak<SimulatedHost>,
}

impl SimulatedHost {
    /// Host with one active scene whose playback never ends on its own
    pub fn new(canvas_width: u32, canvas_height: u32) -> Self {
        Self {
            canvas: (canvas_width, canvas_height),
            state: Mutex::new(SimState {
                scene: Some(DEFAULT_SCENE),
                native_size: Some(DEFAULT_NATIVE_SIZE),
                ..SimState::default()
            }),
            next_id: AtomicU64::new(1),
            auto_complete: None,
            weak_self: Weak::new(),
        }
    }

    /// Host that ends an object's playback `playback` after its first
    /// completion subscription, delivering from a task on `runtime`
    pub fn with_auto_complete(
        canvas_width: u32,
        canvas_height: u32,
        runtime: Handle,
        playback: Duration,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            auto_complete: Some((runtime, playback)),
            weak_self: weak_self.clone(),
            ..Self::new(canvas_width, canvas_height)
        })
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Replace (or clear) the active scene
    pub fn set_scene(&self, scene: Option<SceneHandle>) {
        self.state().scene = scene;
    }

    /// Native size reported for every object; `None` means "not loaded yet"
    pub fn set_native_size(&self, size: Option<(u32, u32)>) {
        self.state().native_size = size;
    }

    /// Make object creation fail for one file
    pub fn fail_creation_for(&self, path: impl AsRef<Path>) {
        self.state().failing_files.insert(path.as_ref().to_path_buf());
    }

    /// Make every scene placement fail
    pub fn fail_placement(&self, fail: bool) {
        self.state().fail_placement = fail;
    }

    /// Report playback as already over at subscription time, so the
    /// callback runs before `subscribe_completion` returns
    pub fn end_playback_on_subscribe(&self, end: bool) {
        self.state().end_on_subscribe = end;
    }

    /// Deliver end of playback for `object`; returns how many callbacks ran
    pub fn finish_playback(&self, object: ObjectHandle) -> usize {
        let callbacks: Vec<Arc<CompletionCallback>> = self
            .state()
            .subscriptions
            .values()
            .filter(|(subscribed, _)| *subscribed == object)
            .map(|(_, callback)| callback.clone())
            .collect();

        // Lock released above; callbacks re-enter the host.
        for callback in &callbacks {
            callback();
        }
        callbacks.len()
    }

    pub fn create_calls(&self) -> usize {
        self.state().create_calls
    }

    pub fn destroyed_items(&self) -> usize {
        self.state().destroyed_items
    }

    pub fn live_items(&self) -> usize {
        self.state().items.len()
    }

    pub fn live_objects(&self) -> usize {
        self.state().objects.len()
    }

    pub fn subscription_count(&self) -> usize {
        self.state().subscriptions.len()
    }

    pub fn item(&self, item: ItemHandle) -> Option<SimulatedItem> {
        self.state().items.get(&item).cloned()
    }

    pub fn object(&self, object: ObjectHandle) -> Option<SimulatedObject> {
        self.state().objects.get(&object).cloned()
    }

    /// Items currently placed, in no particular order
    pub fn items(&self) -> Vec<(ItemHandle, SimulatedItem)> {
        self.state()
            .items
            .iter()
            .map(|(handle, item)| (*handle, item.clone()))
            .collect()
    }

    fn schedule_completion(&self, object: ObjectHandle) {
        let Some((runtime, playback)) = &self.auto_complete else {
            return;
        };
        let host = self.weak_self.clone();
        let playback = *playback;
        runtime.spawn(async move {
            tokio::time::sleep(playback).await;
            if let Some(host) = host.upgrade() {
                debug!("Simulated playback of {} finished", object);
                host.finish_playback(object);
            }
        });
    }
}

impl Host for SimulatedHost {
    fn canvas_size(&self) -> (u32, u32) {
        self.canvas
    }

    fn current_scene(&self) -> Option<SceneHandle> {
        self.state().scene
    }

    fn create_playable(
        &self,
        name: &str,
        options: &PlayableOptions,
    ) -> Result<ObjectHandle, HostError> {
        let mut state = self.state();
        state.create_calls += 1;

        if state.failing_files.contains(&options.local_file) {
            return Err(HostError::CreateFailed {
                path: options.local_file.clone(),
                reason: "simulated decoder failure".to_string(),
            });
        }

        let handle = ObjectHandle(self.next_id());
        state.objects.insert(
            handle,
            SimulatedObject {
                name: name.to_string(),
                options: options.clone(),
                volume: 1.0,
                monitoring: MonitoringType::None,
            },
        );
        Ok(handle)
    }

    fn release_object(&self, object: ObjectHandle) {
        let mut state = self.state();
        state.objects.remove(&object);
        state.scheduled.remove(&object);
    }

    fn place_in_scene(
        &self,
        scene: SceneHandle,
        object: ObjectHandle,
    ) -> Result<ItemHandle, HostError> {
        let mut state = self.state();
        if state.fail_placement {
            return Err(HostError::PlaceFailed {
                object,
                reason: "simulated scene failure".to_string(),
            });
        }
        if !state.objects.contains_key(&object) {
            return Err(HostError::UnknownHandle(object.to_string()));
        }

        let handle = ItemHandle(self.next_id());
        state.items.insert(
            handle,
            SimulatedItem {
                object,
                scene,
                position: (0.0, 0.0),
                scale: (1.0, 1.0),
                rotation: 0.0,
            },
        );
        Ok(handle)
    }

    fn native_size(&self, object: ObjectHandle) -> Option<(u32, u32)> {
        let state = self.state();
        if state.objects.contains_key(&object) {
            state.native_size
        } else {
            None
        }
    }

    fn set_item_position(&self, item: ItemHandle, x: f32, y: f32) {
        if let Some(item) = self.state().items.get_mut(&item) {
            item.position = (x, y);
        }
    }

    fn set_item_scale(&self, item: ItemHandle, x: f32, y: f32) {
        if let Some(item) = self.state().items.get_mut(&item) {
            item.scale = (x, y);
        }
    }

    fn set_item_rotation(&self, item: ItemHandle, degrees: f32) {
        if let Some(item) = self.state().items.get_mut(&item) {
            item.rotation = degrees;
        }
    }

    fn set_object_volume(&self, object: ObjectHandle, linear_gain: f32) {
        if let Some(object) = self.state().objects.get_mut(&object) {
            object.volume = linear_gain;
        }
    }

    fn set_object_monitoring(&self, object: ObjectHandle, monitoring: MonitoringType) {
        if let Some(object) = self.state().objects.get_mut(&object) {
            object.monitoring = monitoring;
        }
    }

    fn destroy_item(&self, item: ItemHandle) {
        let mut state = self.state();
        if let Some(removed) = state.items.remove(&item) {
            // Objects live only as long as their single scene item.
            state.objects.remove(&removed.object);
            state.scheduled.remove(&removed.object);
            state.destroyed_items += 1;
            info!("Simulated host removed {} ({})", item, removed.object);
        }
    }

    fn subscribe_completion(
        &self,
        object: ObjectHandle,
        callback: CompletionCallback,
    ) -> Result<SubscriptionId, HostError> {
        let mut state = self.state();
        if !state.objects.contains_key(&object) {
            return Err(HostError::SubscribeFailed {
                object,
                reason: "object does not exist".to_string(),
            });
        }

        let id = SubscriptionId(self.next_id());
        let callback = Arc::new(callback);
        state.subscriptions.insert(id, (object, callback.clone()));
        let ended = state.end_on_subscribe;
        let start_timer = !ended && state.scheduled.insert(object);
        drop(state);

        if ended {
            callback();
        } else if start_timer {
            self.schedule_completion(object);
        }
        Ok(id)
    }

    fn unsubscribe_completion(&self, _object: ObjectHandle, subscription: SubscriptionId) {
        self.state().subscriptions.remove(&subscription);
    }
}
