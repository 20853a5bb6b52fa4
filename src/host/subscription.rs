//! Scoped completion subscriptions

use std::sync::{Arc, Weak};
use tracing::debug;

use super::{CompletionCallback, Host, HostError, ObjectHandle, SubscriptionId};

/// A live completion subscription.
///
/// Dropping it unsubscribes, so whoever owns the spawned item's
/// bookkeeping also owns the subscription and both go away together.
pub struct CompletionSubscription {
    host: Weak<dyn Host>,
    object: ObjectHandle,
    id: SubscriptionId,
}

impl CompletionSubscription {
    /// Subscribe `callback` to the end of playback of `object`
    pub fn subscribe(
        host: &Arc<dyn Host>,
        object: ObjectHandle,
        callback: CompletionCallback,
    ) -> Result<Self, HostError> {
        let id = host.subscribe_completion(object, callback)?;
        Ok(Self {
            host: Arc::downgrade(host),
            object,
            id,
        })
    }

    pub fn object(&self) -> ObjectHandle {
        self.object
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

impl Drop for CompletionSubscription {
    fn drop(&mut self) {
        // Host already gone: nothing left to disconnect from.
        if let Some(host) = self.host.upgrade() {
            host.unsubscribe_completion(self.object, self.id);
            debug!("Released completion subscription for {}", self.object);
        }
    }
}

impl std::fmt::Debug for CompletionSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionSubscription")
            .field("object", &self.object)
            .field("id", &self.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{PlayableOptions, SimulatedHost};

    #[test]
    fn test_drop_unsubscribes() {
        let sim = Arc::new(SimulatedHost::new(1920, 1080));
        let host: Arc<dyn Host> = sim.clone();
        let object = host
            .create_playable("clip", &PlayableOptions::for_file("/media/a.mp4"))
            .unwrap();

        let subscription =
            CompletionSubscription::subscribe(&host, object, Box::new(|| {})).unwrap();
        assert_eq!(sim.subscription_count(), 1);

        drop(subscription);
        assert_eq!(sim.subscription_count(), 0);
    }

    #[test]
    fn test_drop_after_host_is_gone() {
        let host: Arc<dyn Host> = Arc::new(SimulatedHost::new(1920, 1080));
        let object = host
            .create_playable("clip", &PlayableOptions::for_file("/media/a.mp4"))
            .unwrap();
        let subscription =
            CompletionSubscription::subscribe(&host, object, Box::new(|| {})).unwrap();

        drop(host);
        drop(subscription);
    }
}
