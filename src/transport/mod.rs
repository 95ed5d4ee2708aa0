//! Transport boundary: the HTTP wire layer the operation core sits on.
//!
//! # Data Flow
//! ```text
//! TransportRequest (method, url, headers, body, timeout)
//!     → Transport::send
//!     → (ServiceResponse metadata, body Bytes) | ServiceError
//! ```
//!
//! # Design Decisions
//! - One trait method; cancellation is dropping the returned future
//! - Timeouts enforced per request, not per client
//! - `HttpTransport` delegates connection management to reqwest

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::service::definition::ServiceMethod;
use crate::service::error::ServiceError;
use crate::service::value::ServiceResponse;

/// A fully assembled request, ready for the wire.
#[derive(Debug)]
pub struct TransportRequest {
    pub method: ServiceMethod,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub timeout: std::time::Duration,
}

/// The HTTP client abstraction under the operation core.
///
/// Implementations must be abortable: if the caller drops the `send`
/// future, any in-flight transfer is torn down promptly.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: TransportRequest,
    ) -> Result<(ServiceResponse, Bytes), ServiceError>;
}

/// Default [`Transport`] backed by a shared [`reqwest::Client`].
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: TransportRequest,
    ) -> Result<(ServiceResponse, Bytes), ServiceError> {
        let timeout = request.timeout;
        let mut builder = self
            .client
            .request(request.method.into(), request.url)
            .timeout(timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ServiceError::Timeout(timeout)
            } else {
                ServiceError::Transport(e)
            }
        })?;

        let metadata = ServiceResponse {
            status: response.status().as_u16(),
            headers: response.headers().clone(),
            url: response.url().to_string(),
        };
        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                ServiceError::Timeout(timeout)
            } else {
                ServiceError::Transport(e)
            }
        })?;
        Ok((metadata, body))
    }
}
