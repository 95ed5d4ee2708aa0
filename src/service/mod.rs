//! Service client core: operations, queueing, policy hooks.
//!
//! # Data Flow
//! ```text
//! ServiceClient (client.rs):
//!     builds a RequestDefinition (definition.rs)
//!     → wraps it in a ServiceOperation (operation.rs)
//!     → submits to the bounded OperationQueue (queue.rs)
//!
//! ServiceOperation attempt:
//!     transport send → response
//!     → ServicePolicy (policy.rs): retry / auth / decode hooks
//!     → decode per format (value.rs) → transform → completion
//! ```
//!
//! # Design Decisions
//! - Extension by composition: concrete API clients supply a
//!   ServicePolicy instead of subclassing the client
//! - Failures are values delivered to completion; nothing panics across
//!   the queue boundary

pub mod client;
pub mod definition;
pub mod error;
pub mod helper;
pub mod operation;
pub mod policy;
pub(crate) mod queue;
pub mod value;

pub use client::{ClientConfig, ServiceClient, ServiceRequestBuilder};
pub use definition::{
    CachePolicy, DispatchPriority, QueuePriority, RequestBody, RequestDefinition, ServiceFormat,
    ServiceMethod, ServiceResult, DEFAULT_REQUEST_TIMEOUT,
};
pub use error::ServiceError;
pub use operation::{CompletionFn, OperationState, ServiceOperation, TransformFn};
pub use policy::{
    jittered_retry_delay, AuthChallenge, Credential, DefaultPolicy, ServicePolicy,
};
pub use value::{ServiceResponse, ServiceValue};
