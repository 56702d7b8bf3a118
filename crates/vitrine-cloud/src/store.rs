//! Remote document store contract.
//!
//! Collections hold untyped field-map documents addressed by a string id.
//! Writes are merges (partial updates); reads are point gets or continuous
//! subscriptions delivering snapshot-or-error events.

use async_trait::async_trait;

use vitrine_shared::document::Document;

use crate::error::CloudError;
use crate::subscription::{CollectionSubscription, DocumentSubscription};

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch a single document, `None` when absent.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, CloudError>;

    /// Merge fields into a document, creating it when absent.
    async fn set_merge(
        &self,
        collection: &str,
        id: &str,
        fields: Document,
    ) -> Result<(), CloudError>;

    /// Delete a document.  Deleting an absent document is not an error.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), CloudError>;

    /// Open a continuous subscription to a whole collection.
    fn subscribe_collection(&self, collection: &str) -> CollectionSubscription;

    /// Open a continuous subscription to a single document.
    fn subscribe_document(&self, collection: &str, id: &str) -> DocumentSubscription;
}
