//! Service-level error definitions.

use std::time::Duration;

use thiserror::Error;

use crate::service::definition::ServiceFormat;

/// Errors that can occur while building, executing, or finalizing a
/// service operation.
///
/// Every failure surfaces through the completion callback as a
/// [`ServiceResult::Failed`](crate::service::definition::ServiceResult)
/// delivery; no error crosses the queue boundary as a panic. Cancellation
/// is not an error and has no variant here.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request URL could not be parsed.
    #[error("invalid request URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The transport-level request could not be constructed.
    #[error("failed to build request: {0}")]
    RequestBuild(String),

    /// Network-level failure reported by the transport.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The transport did not produce a response within the deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Terminal non-success HTTP status.
    #[error("HTTP status {0}")]
    HttpStatus(u16),

    /// The response body does not satisfy the declared decode format.
    #[error("response does not match declared format {format:?}: {detail}")]
    InvalidFormat {
        format: ServiceFormat,
        detail: String,
    },

    /// The caller-supplied transform rejected the decoded value.
    #[error("transform failed: {0}")]
    Transform(String),

    /// A multipart payload source could not produce its bytes.
    #[error("multipart payload '{name}' unavailable: {detail}")]
    PartPayload { name: String, detail: String },

    /// The owning client's queue is no longer accepting work.
    #[error("service client is shutting down")]
    Shutdown,
}
