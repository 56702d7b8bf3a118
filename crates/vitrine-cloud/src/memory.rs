//! In-memory remote store, used by tests and offline development.
//!
//! Mutations fan out to live subscribers through a broadcast of "collection
//! changed" notices; each subscription task then re-reads the shared state
//! and ships a full snapshot, mirroring the snapshot-listener semantics of
//! the real backend.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use vitrine_shared::document::Document;

use crate::error::CloudError;
use crate::store::RemoteStore;
use crate::subscription::{
    CollectionSnapshot, CollectionSubscription, DocumentSubscription, SubscriptionHandle,
};

type Collections = HashMap<String, BTreeMap<String, Document>>;

struct Inner {
    collections: Mutex<Collections>,
    changes: broadcast::Sender<String>,
}

/// A fake [`RemoteStore`] backed by process memory.
#[derive(Clone)]
pub struct MemoryRemoteStore {
    inner: Arc<Inner>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                collections: Mutex::new(Collections::new()),
                changes,
            }),
        }
    }

    /// Seed a document wholesale (tests).  Unlike `set_merge` this replaces
    /// the document.
    pub fn insert(&self, collection: &str, id: &str, doc: Document) {
        lock(&self.inner.collections)
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), doc);
        self.notify(collection);
    }

    /// Number of documents currently in a collection (tests).
    pub fn len(&self, collection: &str) -> usize {
        lock(&self.inner.collections)
            .get(collection)
            .map(|c| c.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    fn notify(&self, collection: &str) {
        // No live subscriber is fine.
        let _ = self.inner.changes.send(collection.to_string());
    }
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, CloudError> {
        Ok(lock(&self.inner.collections)
            .get(collection)
            .and_then(|c| c.get(id))
            .cloned())
    }

    async fn set_merge(
        &self,
        collection: &str,
        id: &str,
        fields: Document,
    ) -> Result<(), CloudError> {
        {
            let mut collections = lock(&self.inner.collections);
            let doc = collections
                .entry(collection.to_string())
                .or_default()
                .entry(id.to_string())
                .or_default();
            for (key, value) in fields {
                doc.insert(key, value);
            }
        }
        self.notify(collection);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), CloudError> {
        {
            let mut collections = lock(&self.inner.collections);
            if let Some(c) = collections.get_mut(collection) {
                c.remove(id);
            }
        }
        self.notify(collection);
        Ok(())
    }

    fn subscribe_collection(&self, collection: &str) -> CollectionSubscription {
        let (tx, rx) = mpsc::channel(16);
        let mut changes = self.inner.changes.subscribe();
        let inner = self.inner.clone();
        let collection = collection.to_string();

        let task = tokio::spawn(async move {
            let snapshot = collection_snapshot(&inner, &collection);
            if tx.send(Ok(snapshot)).await.is_err() {
                return;
            }

            loop {
                match changes.recv().await {
                    Ok(changed) if changed == collection => {
                        let snapshot = collection_snapshot(&inner, &collection);
                        if tx.send(Ok(snapshot)).await.is_err() {
                            return;
                        }
                    }
                    Ok(_) => {}
                    // Missed notices collapse into one fresh snapshot.
                    Err(broadcast::error::RecvError::Lagged(_)) => {
                        let snapshot = collection_snapshot(&inner, &collection);
                        if tx.send(Ok(snapshot)).await.is_err() {
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });

        CollectionSubscription {
            events: rx,
            handle: SubscriptionHandle::new(task),
        }
    }

    fn subscribe_document(&self, collection: &str, id: &str) -> DocumentSubscription {
        let (tx, rx) = mpsc::channel(16);
        let mut changes = self.inner.changes.subscribe();
        let inner = self.inner.clone();
        let collection = collection.to_string();
        let id = id.to_string();

        let task = tokio::spawn(async move {
            let doc = document_snapshot(&inner, &collection, &id);
            if tx.send(Ok(doc)).await.is_err() {
                return;
            }

            loop {
                match changes.recv().await {
                    Ok(changed) if changed == collection => {
                        let doc = document_snapshot(&inner, &collection, &id);
                        if tx.send(Ok(doc)).await.is_err() {
                            return;
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(_)) => {
                        let doc = document_snapshot(&inner, &collection, &id);
                        if tx.send(Ok(doc)).await.is_err() {
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });

        DocumentSubscription {
            events: rx,
            handle: SubscriptionHandle::new(task),
        }
    }
}

fn collection_snapshot(inner: &Arc<Inner>, collection: &str) -> CollectionSnapshot {
    lock(&inner.collections)
        .get(collection)
        .map(|c| c.iter().map(|(id, doc)| (id.clone(), doc.clone())).collect())
        .unwrap_or_default()
}

fn document_snapshot(inner: &Arc<Inner>, collection: &str, id: &str) -> Option<Document> {
    lock(&inner.collections)
        .get(collection)
        .and_then(|c| c.get(id))
        .cloned()
}

/// Recover the guard even from a poisoned mutex; the fake holds plain data.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
