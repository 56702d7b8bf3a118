//! HTTP implementation of the remote document store.
//!
//! Documents live behind plain REST conventions:
//!
//! - `GET    {base}/{collection}`        — all documents, keyed by id
//! - `GET    {base}/{collection}/{id}`   — one document's fields
//! - `PATCH  {base}/{collection}/{id}`   — merge fields
//! - `DELETE {base}/{collection}/{id}`
//!
//! Subscriptions are change-detecting polls: the feeding task re-fetches on
//! an interval and only ships a snapshot when the payload differs from the
//! previous one.  A failed poll is delivered as an error event and the loop
//! keeps polling; the transport owns reconnection, not us.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use vitrine_shared::constants::DEFAULT_POLL_SECS;
use vitrine_shared::document::Document;

use crate::error::CloudError;
use crate::store::RemoteStore;
use crate::subscription::{
    CollectionSubscription, DocumentSubscription, SnapshotEvent, SubscriptionHandle,
};

/// Configuration for the HTTP cloud client.
#[derive(Debug, Clone)]
pub struct CloudConfig {
    /// Base URL of the document store, without a trailing slash.
    pub base_url: String,
    /// Optional API key sent as `x-api-key` on every request.
    pub api_key: Option<String>,
    /// Interval between subscription polls.
    pub poll_interval: Duration,
}

impl CloudConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            poll_interval: Duration::from_secs(DEFAULT_POLL_SECS),
        }
    }
}

/// Remote store client backed by reqwest.
#[derive(Clone)]
pub struct HttpRemoteStore {
    http: reqwest::Client,
    config: Arc<CloudConfig>,
}

impl HttpRemoteStore {
    pub fn new(config: CloudConfig) -> Result<Self, CloudError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            config: Arc::new(config),
        })
    }

    fn collection_url(&self, collection: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            collection
        )
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{}", self.collection_url(collection), id)
    }
}

fn apply_key(req: reqwest::RequestBuilder, config: &CloudConfig) -> reqwest::RequestBuilder {
    match &config.api_key {
        Some(key) => req.header("x-api-key", key),
        None => req,
    }
}

async fn fetch_document(
    http: &reqwest::Client,
    config: &CloudConfig,
    url: &str,
) -> Result<Option<Document>, CloudError> {
    let resp = apply_key(http.get(url), config).send().await?;

    if resp.status() == reqwest::StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if !resp.status().is_success() {
        return Err(CloudError::Status {
            status: resp.status().as_u16(),
            url: url.to_string(),
        });
    }

    Ok(Some(resp.json().await?))
}

async fn fetch_collection(
    http: &reqwest::Client,
    config: &CloudConfig,
    url: &str,
) -> Result<BTreeMap<String, Document>, CloudError> {
    let resp = apply_key(http.get(url), config).send().await?;

    if !resp.status().is_success() {
        return Err(CloudError::Status {
            status: resp.status().as_u16(),
            url: url.to_string(),
        });
    }

    Ok(resp.json().await?)
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, CloudError> {
        let url = self.document_url(collection, id);
        fetch_document(&self.http, &self.config, &url).await
    }

    async fn set_merge(
        &self,
        collection: &str,
        id: &str,
        fields: Document,
    ) -> Result<(), CloudError> {
        let url = self.document_url(collection, id);
        let resp = apply_key(self.http.patch(&url), &self.config)
            .json(&fields)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(CloudError::Status {
                status: resp.status().as_u16(),
                url,
            });
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), CloudError> {
        let url = self.document_url(collection, id);
        let resp = apply_key(self.http.delete(&url), &self.config)
            .send()
            .await?;

        // Deleting an absent document is fine.
        if resp.status() == reqwest::StatusCode::NOT_FOUND || resp.status().is_success() {
            return Ok(());
        }
        Err(CloudError::Status {
            status: resp.status().as_u16(),
            url,
        })
    }

    fn subscribe_collection(&self, collection: &str) -> CollectionSubscription {
        let (tx, rx) = mpsc::channel(16);
        let http = self.http.clone();
        let config = self.config.clone();
        let url = self.collection_url(collection);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(config.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last: Option<serde_json::Value> = None;

            loop {
                ticker.tick().await;

                let event: Option<SnapshotEvent<_>> =
                    match fetch_collection(&http, &config, &url).await {
                        Ok(documents) => {
                            let fingerprint = serde_json::to_value(&documents).ok();
                            if fingerprint == last {
                                None
                            } else {
                                last = fingerprint;
                                debug!(url = %url, count = documents.len(), "collection poll changed");
                                Some(Ok(documents.into_iter().collect()))
                            }
                        }
                        Err(e) => Some(Err(e)),
                    };

                if let Some(event) = event {
                    if tx.send(event).await.is_err() {
                        return;
                    }
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
        let http = self.http.clone();
        let config = self.config.clone();
        let url = self.document_url(collection, id);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(config.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last: Option<Option<Document>> = None;

            loop {
                ticker.tick().await;

                let event: Option<SnapshotEvent<_>> =
                    match fetch_document(&http, &config, &url).await {
                        Ok(doc) => {
                            if last.as_ref() == Some(&doc) {
                                None
                            } else {
                                last = Some(doc.clone());
                                Some(Ok(doc))
                            }
                        }
                        Err(e) => Some(Err(e)),
                    };

                if let Some(event) = event {
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
            }
        });

        DocumentSubscription {
            events: rx,
            handle: SubscriptionHandle::new(task),
        }
    }
}
