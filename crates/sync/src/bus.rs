//! Broadcast of sync outcomes backed by a `tokio::sync::broadcast` channel.
//!
//! UI consumers subscribe to learn which annotation is highlighted, what
//! was persisted, and which mutations silently failed.

use serde::Serialize;
use tokio::sync::broadcast;

use marginalia_core::types::{StoreId, ViewerId};

// ---------------------------------------------------------------------------
// SyncEvent
// ---------------------------------------------------------------------------

/// Something the session did, or failed to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    DocumentOpened {
        scope: String,
        /// Annotations pushed into the viewer.
        loaded: usize,
        orphans_removed: usize,
    },
    DocumentClosed {
        scope: String,
    },
    AnnotationCreated {
        annotation_id: StoreId,
        viewer_id: ViewerId,
    },
    AnnotationUpdated {
        annotation_id: StoreId,
        viewer_id: ViewerId,
    },
    AnnotationDeleted {
        annotation_id: StoreId,
        viewer_id: ViewerId,
    },
    OrphansRemoved {
        annotation_ids: Vec<StoreId>,
    },
    /// Highlight moved to `viewer_id`, or cleared when `None`.
    SelectionChanged {
        viewer_id: Option<ViewerId>,
    },
    /// A mutation did not apply. Nothing is retried.
    MutationFailed {
        action: String,
        viewer_id: Option<ViewerId>,
        error: String,
    },
}

// ---------------------------------------------------------------------------
// SyncBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// Fan-out of [`SyncEvent`]s to any number of subscribers.
pub struct SyncBus {
    sender: broadcast::Sender<SyncEvent>,
}

impl SyncBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// Slow receivers observe `RecvError::Lagged` once the buffer is full.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to all current subscribers. Dropped if there are none.
    pub fn publish(&self, event: SyncEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }
}

impl Default for SyncBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
