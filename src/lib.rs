//! Asynchronous HTTP service-client library.
//!
//! Issues GET/POST/PUT/DELETE requests through a bounded, prioritized
//! operation queue, encodes query parameters and multipart bodies,
//! decodes responses by declared format, and delivers results through
//! exactly-once completion callbacks with retry and cancellation support.
//!
//! ```no_run
//! use service_client::{ServiceClient, ServiceFormat, ServiceMethod, ServiceResult};
//!
//! # async fn demo() -> Result<(), service_client::ServiceError> {
//! let client = ServiceClient::new();
//! let operation = client
//!     .request(ServiceMethod::Get, "https://api.example.com/repos")
//!     .parameter("page", "1")
//!     .format(ServiceFormat::Json)
//!     .begin(|result, _response, value| {
//!         if result == ServiceResult::Success {
//!             println!("repos: {:?}", value);
//!         }
//!     })?;
//! // The handle can cancel the in-flight request at any point.
//! operation.cancel();
//! # Ok(())
//! # }
//! ```

pub mod multipart;
pub mod service;
pub mod transport;

pub use multipart::{MultipartCollection, MultipartPart, PartSource};
pub use service::{
    AuthChallenge, CachePolicy, ClientConfig, Credential, DefaultPolicy, DispatchPriority,
    OperationState, QueuePriority, RequestBody, RequestDefinition, ServiceClient, ServiceError,
    ServiceFormat, ServiceMethod, ServiceOperation, ServicePolicy, ServiceRequestBuilder,
    ServiceResponse, ServiceResult, ServiceValue,
};
pub use transport::{HttpTransport, Transport, TransportRequest};
