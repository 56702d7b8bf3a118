use thiserror::Error;

use vitrine_cloud::CloudError;
use vitrine_store::StoreError;

/// Errors surfaced by the client services.
#[derive(Error, Debug)]
pub enum ShopError {
    /// A required field is blank, a value is out of range, or some other
    /// precondition failed.  The operation did not proceed.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The acting user lacks the admin entitlement.
    #[error("Permission denied")]
    PermissionDenied,

    /// The operation requires a logged-in user.
    #[error("No user is logged in")]
    LoginRequired,

    /// An explicitly requested record is absent.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Credentials were rejected by the auth collaborator.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The cache mutex was poisoned by a panicking writer.
    #[error("Cache lock poisoned")]
    LockPoisoned,

    /// Local cache failure.
    #[error("Cache error: {0}")]
    Store(#[from] StoreError),

    /// Remote store failure that had to be surfaced.
    #[error("Cloud error: {0}")]
    Cloud(#[from] CloudError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ShopError>;
