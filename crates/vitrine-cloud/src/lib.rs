// Remote document store and auth collaborators, spoken to over HTTP.

pub mod auth;
pub mod http;
pub mod memory;
pub mod store;
pub mod subscription;

mod error;

pub use auth::{AuthClient, HttpAuthClient, MemoryAuthClient, RemoteIdentity};
pub use error::CloudError;
pub use http::{CloudConfig, HttpRemoteStore};
pub use memory::MemoryRemoteStore;
pub use store::RemoteStore;
pub use subscription::{
    CollectionSnapshot, CollectionSubscription, DocumentSubscription, SnapshotEvent,
    SubscriptionHandle,
};
