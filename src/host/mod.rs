//! Host collaborator interface
//!
//! The host (scene graph, decoder, renderer) owns every spawned object.
//! This module only describes what the spawner asks of it: canvas and
//! scene queries, the playable-object lifecycle, and completion events.
//! Handles are opaque ids; holding one never keeps the host object alive.

mod simulated;
mod subscription;

pub use simulated::{SimulatedHost, SimulatedItem, SimulatedObject};
pub use subscription::CompletionSubscription;

use std::fmt;
use std::path::PathBuf;

use crate::config::MonitoringType;

/// Host handle to a scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SceneHandle(pub u64);

/// Host handle to a playable (media) object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectHandle(pub u64);

/// Host handle to an object's placement inside a scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemHandle(pub u64);

/// Host-issued id of one completion subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object#{}", self.0)
    }
}

impl fmt::Display for ItemHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item#{}", self.0)
    }
}

/// Settings a playable object is created with
#[derive(Debug, Clone, PartialEq)]
pub struct PlayableOptions {
    /// Media file to play
    pub local_file: PathBuf,
    pub is_local_file: bool,
    /// Restart playback whenever the object becomes visible
    pub restart_on_activate: bool,
    /// Release the decoder while the object is hidden
    pub close_when_inactive: bool,
}

impl PlayableOptions {
    /// Options used for every spawned media file
    pub fn for_file(path: impl Into<PathBuf>) -> Self {
        Self {
            local_file: path.into(),
            is_local_file: true,
            restart_on_activate: true,
            close_when_inactive: true,
        }
    }
}

/// Callback fired by the host when an object's playback ends.
///
/// The host may call it from any thread.
pub type CompletionCallback = Box<dyn Fn() + Send + Sync + 'static>;

/// Errors reported by a host collaborator
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("failed to create playable object for {path:?}: {reason}")]
    CreateFailed { path: PathBuf, reason: String },

    #[error("failed to place {object} in scene: {reason}")]
    PlaceFailed { object: ObjectHandle, reason: String },

    #[error("failed to subscribe to completion of {object}: {reason}")]
    SubscribeFailed { object: ObjectHandle, reason: String },

    #[error("unknown host handle: {0}")]
    UnknownHandle(String),
}

/// Everything the spawner needs from the host.
///
/// Implementations must not hold internal locks while invoking a
/// `CompletionCallback`: the callback unsubscribes and destroys the item,
/// which calls straight back into the host.
pub trait Host: Send + Sync {
    /// Base canvas size in pixels
    fn canvas_size(&self) -> (u32, u32);

    /// Scene currently shown on program output, if any
    fn current_scene(&self) -> Option<SceneHandle>;

    /// Create a playable object; `name` must be unique within the host
    fn create_playable(
        &self,
        name: &str,
        options: &PlayableOptions,
    ) -> Result<ObjectHandle, HostError>;

    /// Release an object that never made it into a scene
    fn release_object(&self, object: ObjectHandle);

    /// Add an object to a scene
    fn place_in_scene(
        &self,
        scene: SceneHandle,
        object: ObjectHandle,
    ) -> Result<ItemHandle, HostError>;

    /// Natural size of an object, if the host knows it yet
    fn native_size(&self, object: ObjectHandle) -> Option<(u32, u32)>;

    fn set_item_position(&self, item: ItemHandle, x: f32, y: f32);

    fn set_item_scale(&self, item: ItemHandle, x: f32, y: f32);

    fn set_item_rotation(&self, item: ItemHandle, degrees: f32);

    fn set_object_volume(&self, object: ObjectHandle, linear_gain: f32);

    fn set_object_monitoring(&self, object: ObjectHandle, monitoring: MonitoringType);

    /// Remove an item from its scene and drop the host's reference
    fn destroy_item(&self, item: ItemHandle);

    /// Subscribe to the end of playback of `object`
    fn subscribe_completion(
        &self,
        object: ObjectHandle,
        callback: CompletionCallback,
    ) -> Result<SubscriptionId, HostError>;

    /// Drop a subscription; unknown ids are ignored
    fn unsubscribe_completion(&self, object: ObjectHandle, subscription: SubscriptionId);
}
