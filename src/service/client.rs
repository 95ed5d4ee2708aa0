//! The service client: request assembly and operation submission.
//!
//! # Data Flow
//! ```text
//! ServiceClient::request(method, url)
//!     → ServiceRequestBuilder (headers, parameters, body, format, hooks)
//!     → begin(completion): wrap in ServiceOperation, submit to the queue
//!     → caller holds the Arc<ServiceOperation> handle for cancellation
//! ```
//!
//! # Design Decisions
//! - No global singleton: every client owns its queue, transport handle
//!   and policy, and many clients coexist independently
//! - Changing the client timeout affects only requests built afterwards
//! - Dropping the last client handle shuts the queue down; pending
//!   operations finalize as Cancelled

use std::any::Any;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use url::Url;

use crate::multipart::MultipartCollection;
use crate::service::definition::{
    CachePolicy, DispatchPriority, QueuePriority, RequestBody, RequestDefinition, ServiceFormat,
    ServiceMethod, ServiceResult, DEFAULT_REQUEST_TIMEOUT,
};
use crate::service::error::ServiceError;
use crate::service::operation::{CompletionFn, ServiceOperation, TransformFn};
use crate::service::policy::{DefaultPolicy, ServicePolicy};
use crate::service::queue::OperationQueue;
use crate::service::value::{ServiceResponse, ServiceValue};
use crate::transport::{HttpTransport, Transport, TransportRequest};

/// Construction-time client settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Maximum operations executing concurrently.
    pub max_concurrency: usize,
    /// Timeout seeded into each request definition at build time.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// State shared between the client handle, its queue workers, and every
/// operation (which holds it weakly).
pub(crate) struct ClientShared {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) policy: Arc<dyn ServicePolicy>,
    pub(crate) queue: OperationQueue,
    request_timeout: Mutex<Duration>,
}

/// Asynchronous HTTP service client with a bounded, prioritized
/// operation queue.
///
/// Must be created inside a tokio runtime (workers are spawned at
/// construction).
pub struct ServiceClient {
    shared: Arc<ClientShared>,
}

impl ServiceClient {
    /// Client with default configuration, reqwest transport, and the
    /// no-retry [`DefaultPolicy`].
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Self {
        Self::with_components(
            config,
            Arc::new(HttpTransport::new()),
            Arc::new(DefaultPolicy),
        )
    }

    /// Full-control constructor: inject the transport and the policy
    /// hooks a concrete API client composes.
    pub fn with_components(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        policy: Arc<dyn ServicePolicy>,
    ) -> Self {
        let shared = Arc::new(ClientShared {
            transport,
            policy,
            queue: OperationQueue::new(config.max_concurrency),
            request_timeout: Mutex::new(config.request_timeout),
        });
        Self { shared }
    }

    pub fn request_timeout(&self) -> Duration {
        *self
            .shared
            .request_timeout
            .lock()
            .expect("request timeout mutex poisoned")
    }

    /// Applies to requests built after this call; in-flight operations
    /// keep the timeout they were built with.
    pub fn set_request_timeout(&self, timeout: Duration) {
        *self
            .shared
            .request_timeout
            .lock()
            .expect("request timeout mutex poisoned") = timeout;
    }

    /// Start building a request. `begin` on the returned builder submits
    /// it and hands back the operation handle.
    pub fn request(&self, method: ServiceMethod, url: impl Into<String>) -> ServiceRequestBuilder<'_> {
        let mut definition = RequestDefinition::new(url, method);
        definition.timeout = self.request_timeout();
        ServiceRequestBuilder {
            client: self,
            definition,
            transform: None,
            queue_priority: QueuePriority::default(),
            dispatch_priority: DispatchPriority::default(),
            context: None,
        }
    }

    /// Submit a prebuilt definition. Non-blocking: the operation handle
    /// returns immediately and completion fires later on a queue worker.
    #[allow(clippy::too_many_arguments)]
    pub fn begin_request(
        &self,
        definition: RequestDefinition,
        transform: Option<TransformFn>,
        completion: CompletionFn,
        queue_priority: QueuePriority,
        dispatch_priority: DispatchPriority,
        context: Option<Box<dyn Any + Send + Sync>>,
    ) -> Result<Arc<ServiceOperation>, ServiceError> {
        let operation = Arc::new(ServiceOperation::new(
            definition,
            queue_priority,
            dispatch_priority,
            transform,
            completion,
            context,
            Arc::downgrade(&self.shared),
            self.shared.queue.operation_token(),
        ));
        self.shared.queue.submit(operation.clone())?;
        Ok(operation)
    }

    /// Stop accepting work and cancel everything pending or in flight.
    pub fn shutdown(&self) {
        self.shared.queue.shutdown();
    }
}

impl Default for ServiceClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Accumulates one request's definition and callbacks before submission.
pub struct ServiceRequestBuilder<'a> {
    client: &'a ServiceClient,
    definition: RequestDefinition,
    transform: Option<TransformFn>,
    queue_priority: QueuePriority,
    dispatch_priority: DispatchPriority,
    context: Option<Box<dyn Any + Send + Sync>>,
}

impl<'a> ServiceRequestBuilder<'a> {
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.definition.headers.insert(name.into(), value.into());
        self
    }

    pub fn headers(
        mut self,
        headers: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        self.definition.headers.extend(headers);
        self
    }

    /// Query parameter. Encoded into the URL for GET/DELETE; POST/PUT
    /// parameters become a form body when no explicit body is set.
    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.definition.parameters.insert(key.into(), value.into());
        self
    }

    pub fn parameters(
        mut self,
        parameters: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        self.definition.parameters.extend(parameters);
        self
    }

    pub fn body_text(mut self, body: impl Into<String>) -> Self {
        self.definition.body = RequestBody::Text(body.into());
        self
    }

    pub fn body_bytes(mut self, body: Vec<u8>) -> Self {
        self.definition.body = RequestBody::Bytes(body);
        self
    }

    /// Multipart body; the collection's boundary content-type replaces
    /// any explicit content-type header.
    pub fn multipart(mut self, parts: MultipartCollection) -> Self {
        self.definition.body = RequestBody::Multipart(parts);
        self
    }

    pub fn format(mut self, format: ServiceFormat) -> Self {
        self.definition.format = format;
        self
    }

    pub fn cache_policy(mut self, policy: CachePolicy) -> Self {
        self.definition.cache_policy = policy;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.definition.timeout = timeout;
        self
    }

    pub fn queue_priority(mut self, priority: QueuePriority) -> Self {
        self.queue_priority = priority;
        self
    }

    pub fn dispatch_priority(mut self, priority: DispatchPriority) -> Self {
        self.dispatch_priority = priority;
        self
    }

    /// Post-decode hook producing the final value handed to completion.
    pub fn transform(
        mut self,
        transform: impl FnOnce(&ServiceResponse, ServiceValue) -> Result<ServiceValue, ServiceError>
            + Send
            + 'static,
    ) -> Self {
        self.transform = Some(Box::new(transform));
        self
    }

    /// Opaque correlation value, readable from the operation handle in
    /// any hook or callback via [`ServiceOperation::context`].
    pub fn context(mut self, context: impl Any + Send + Sync) -> Self {
        self.context = Some(Box::new(context));
        self
    }

    /// Submit the request. Returns the cancellable operation handle
    /// immediately; `completion` fires exactly once later.
    pub fn begin(
        self,
        completion: impl FnOnce(ServiceResult, Option<ServiceResponse>, Option<ServiceValue>)
            + Send
            + 'static,
    ) -> Result<Arc<ServiceOperation>, ServiceError> {
        self.client.begin_request(
            self.definition,
            self.transform,
            Box::new(completion),
            self.queue_priority,
            self.dispatch_priority,
            self.context,
        )
    }
}

/// Replace-or-insert a header, matching names case-insensitively.
fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: String) {
    headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
    headers.push((name.to_owned(), value));
}

fn has_header(headers: &[(String, String)], name: &str) -> bool {
    headers
        .iter()
        .any(|(existing, _)| existing.eq_ignore_ascii_case(name))
}

/// Assemble the transport-level request from a definition: parse the
/// URL, place parameters, serialize the body, apply cache directives.
/// Re-invoked per attempt, so multipart payload sources re-resolve on
/// every retry.
pub(crate) fn build_transport_request(
    definition: &RequestDefinition,
) -> Result<TransportRequest, ServiceError> {
    let mut url = Url::parse(&definition.url).map_err(|e| ServiceError::InvalidUrl {
        url: definition.url.clone(),
        reason: e.to_string(),
    })?;

    let mut headers: Vec<(String, String)> = definition
        .headers
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let params_as_form_body = definition.method.carries_form_body()
        && matches!(definition.body, RequestBody::None)
        && !definition.parameters.is_empty();

    if !definition.parameters.is_empty() && !params_as_form_body {
        let mut pairs: Vec<(&String, &String)> = definition.parameters.iter().collect();
        pairs.sort_by_key(|(k, _)| k.as_str());
        let mut editor = url.query_pairs_mut();
        for (key, value) in pairs {
            editor.append_pair(key, value);
        }
        drop(editor);
    }

    let body = if params_as_form_body {
        if !has_header(&headers, "content-type") {
            set_header(
                &mut headers,
                "content-type",
                "application/x-www-form-urlencoded".to_owned(),
            );
        }
        Some(crate::service::helper::url_arguments_from_map(&definition.parameters).into_bytes())
    } else {
        match &definition.body {
            RequestBody::None => None,
            RequestBody::Text(text) => Some(text.clone().into_bytes()),
            RequestBody::Bytes(bytes) => Some(bytes.clone()),
            RequestBody::Multipart(collection) => {
                set_header(&mut headers, "content-type", collection.content_type());
                Some(collection.serialize()?)
            }
        }
    };

    match definition.cache_policy {
        CachePolicy::UseProtocolDefault => {}
        CachePolicy::ReloadIgnoringCache => {
            set_header(&mut headers, "cache-control", "no-cache".to_owned());
        }
        CachePolicy::ReturnCacheDataElseLoad => {
            set_header(&mut headers, "cache-control", "max-stale".to_owned());
        }
    }

    Ok(TransportRequest {
        method: definition.method,
        url,
        headers,
        body,
        timeout: definition.timeout,
    })
}
