//! Error types for the discovery client.
//!
//! # Design
//! Every failure the client can report is a variant here, and every variant
//! reaches the caller through a `Result`. `UpstreamError` keeps the status code
//! and the raw body so callers can inspect whatever the server sent back.
//! The enum is `Clone` because discovery failures are also published on the
//! client's status channel; transport failures are flattened to a message for
//! the same reason.

use thiserror::Error;

use crate::http::HttpMethod;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// No token was configured; raised before any request is issued.
    #[error("no auth token configured")]
    MissingCredential,

    /// The discovery call answered with a non-object body or `success: false`.
    #[error("authentication failed: {0}")]
    AuthenticationFailure(String),

    /// The resource has no descriptor for the requested verb.
    #[error("method {method} not allowed on resource `{resource}`")]
    MethodNotAllowed { resource: String, method: HttpMethod },

    /// A path placeholder had no value on a mutating request.
    #[error("missing required path parameter `{0}`")]
    MissingPathParameter(String),

    /// The HTTP round-trip itself failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a status of 400 or above.
    #[error("HTTP {status}: {body}")]
    UpstreamError { status: u16, body: String },

    /// `all`/`iter` on a resource whose GET does not accept `page`.
    #[error("resource `{0}` is not iterable")]
    NotIterable(String),

    /// `next_page` called after the last page was delivered.
    #[error("iteration complete")]
    IterationComplete,

    /// A request body could not be encoded.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Configuration could not be read or was invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError::Transport(e.to_string())
    }
}
