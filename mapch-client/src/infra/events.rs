//! In-process fan-out of cross-screen signals. One broadcast channel per
//! event kind; subscribers only ever hold receivers.

use log::trace;
use tokio::sync::broadcast;

use mapch_model::SpotId;

pub const DEFAULT_EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum SpotEvent {
    /// `id` is present when the backend echoed the new record.
    Created { id: Option<SpotId> },
    Updated {
        id: SpotId,
        name: Option<String>,
        evaluation: Option<u8>,
    },
    Deleted { id: SpotId },
    PhotosUpdated { id: SpotId, paths: Vec<String> },
}

impl SpotEvent {
    pub fn spot_id(&self) -> Option<SpotId> {
        match self {
            SpotEvent::Created { id } => *id,
            SpotEvent::Updated { id, .. }
            | SpotEvent::Deleted { id }
            | SpotEvent::PhotosUpdated { id, .. } => Some(*id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Foreground,
    Background,
}

#[derive(Debug, Clone)]
pub struct EventBus {
    spots: broadcast::Sender<SpotEvent>,
    lifecycle: broadcast::Sender<LifecycleEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (spots, _) = broadcast::channel(capacity);
        let (lifecycle, _) = broadcast::channel(capacity);
        Self { spots, lifecycle }
    }

    pub fn publish_spot(&self, event: SpotEvent) {
        trace!("[EventBus] spot event {:?}", event);
        // No subscribers is fine.
        let _ = self.spots.send(event);
    }

    pub fn publish_lifecycle(&self, event: LifecycleEvent) {
        trace!("[EventBus] lifecycle event {:?}", event);
        let _ = self.lifecycle.send(event);
    }

    pub fn subscribe_spots(&self) -> broadcast::Receiver<SpotEvent> {
        self.spots.subscribe()
    }

    pub fn subscribe_lifecycle(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.lifecycle.subscribe()
    }
}
