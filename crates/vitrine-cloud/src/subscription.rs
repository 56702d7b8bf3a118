//! Cancellable subscription handles.
//!
//! Every continuous remote read is served by a background tokio task that
//! feeds snapshots into an mpsc channel.  The task is owned by a
//! [`SubscriptionHandle`]; dropping (or [`stop`]ping) the handle aborts the
//! task, so a superseded subscription is released deterministically instead
//! of lingering until someone remembers to tear it down.
//!
//! [`stop`]: SubscriptionHandle::stop

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use vitrine_shared::document::Document;

use crate::error::CloudError;

/// A batch of documents from a collection subscription: (document id, fields).
pub type CollectionSnapshot = Vec<(String, Document)>;

/// One delivery on a subscription: a fresh snapshot, or a transport error.
/// Errors do not close the subscription; the feeding task keeps going.
pub type SnapshotEvent<T> = Result<T, CloudError>;

/// Owned handle to the background task feeding a subscription.
pub struct SubscriptionHandle {
    task: JoinHandle<()>,
}

impl SubscriptionHandle {
    pub(crate) fn new(task: JoinHandle<()>) -> Self {
        Self { task }
    }

    /// Stop the subscription now.  Equivalent to dropping the handle.
    pub fn stop(self) {}

    /// Whether the feeding task is still running.
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Continuous snapshots of a whole collection.
pub struct CollectionSubscription {
    pub events: mpsc::Receiver<SnapshotEvent<CollectionSnapshot>>,
    pub handle: SubscriptionHandle,
}

impl CollectionSubscription {
    /// Wait for the next snapshot or error.  `None` once the feed is gone.
    pub async fn next(&mut self) -> Option<SnapshotEvent<CollectionSnapshot>> {
        self.events.recv().await
    }
}

/// Continuous snapshots of a single document (`None` = absent).
pub struct DocumentSubscription {
    pub events: mpsc::Receiver<SnapshotEvent<Option<Document>>>,
    pub handle: SubscriptionHandle,
}

impl DocumentSubscription {
    /// Wait for the next snapshot or error.  `None` once the feed is gone.
    pub async fn next(&mut self) -> Option<SnapshotEvent<Option<Document>>> {
        self.events.recv().await
    }
}
