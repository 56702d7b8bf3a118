use thiserror::Error;

/// Errors produced by the cloud layer.
#[derive(Error, Debug)]
pub enum CloudError {
    /// HTTP transport failure (connect, timeout, body read).
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote store answered with a non-success status.
    #[error("Remote store returned status {status} for {url}")]
    Status { status: u16, url: String },

    /// Credentials were rejected or an account conflict occurred.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The remote answered with a body we could not interpret.
    #[error("Malformed remote response: {0}")]
    Decode(String),
}
