//! Request definition types: methods, formats, priorities, bodies.

use std::collections::HashMap;
use std::time::Duration;

use crate::multipart::MultipartCollection;

/// Timeout applied to requests when neither the definition nor the client
/// overrides it.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP methods the client issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl ServiceMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceMethod::Get => "GET",
            ServiceMethod::Post => "POST",
            ServiceMethod::Put => "PUT",
            ServiceMethod::Delete => "DELETE",
        }
    }

    /// Whether request parameters belong in the entity body (form post)
    /// when no explicit body is supplied.
    pub(crate) fn carries_form_body(&self) -> bool {
        matches!(self, ServiceMethod::Post | ServiceMethod::Put)
    }
}

impl From<ServiceMethod> for reqwest::Method {
    fn from(method: ServiceMethod) -> Self {
        match method {
            ServiceMethod::Get => reqwest::Method::GET,
            ServiceMethod::Post => reqwest::Method::POST,
            ServiceMethod::Put => reqwest::Method::PUT,
            ServiceMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// How the response body is decoded before transform/completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ServiceFormat {
    /// Bytes delivered unchanged.
    #[default]
    Raw,
    /// UTF-8 text (per the response's declared charset).
    Text,
    /// `key=value&...` body parsed into a string map.
    FormEncoded,
    /// JSON parsed into a structured value.
    Json,
}

/// Final outcome delivered to the completion callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceResult {
    Cancelled,
    Failed,
    Success,
}

impl ServiceResult {
    /// Wire-stable sentinel: Cancelled = -1, Failed = 0, Success = 1.
    pub fn code(&self) -> i8 {
        match self {
            ServiceResult::Cancelled => -1,
            ServiceResult::Failed => 0,
            ServiceResult::Success => 1,
        }
    }
}

/// Preference for worker-slot assignment. Higher priorities are popped
/// first; operations at the same priority run in submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum QueuePriority {
    VeryLow,
    Low,
    #[default]
    Normal,
    High,
    VeryHigh,
}

/// Advisory hint for the context completion callbacks run on. Tokio has
/// no priority lanes, so this is carried and logged but does not alter
/// scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DispatchPriority {
    Background,
    Low,
    #[default]
    Default,
    High,
}

/// Cache directive attached to the outgoing request. There is no local
/// cache; policies map onto standard request headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CachePolicy {
    /// Let intermediaries apply protocol-default caching.
    #[default]
    UseProtocolDefault,
    /// Demand a fresh response (`Cache-Control: no-cache`).
    ReloadIgnoringCache,
    /// Accept stale cached responses (`Cache-Control: max-stale`).
    ReturnCacheDataElseLoad,
}

/// Entity body attached to a request.
#[derive(Debug, Default)]
pub enum RequestBody {
    #[default]
    None,
    Text(String),
    Bytes(Vec<u8>),
    Multipart(MultipartCollection),
}

/// Everything needed to build one transport-level request.
///
/// Query parameters go into the URL for GET/DELETE; for POST/PUT with no
/// explicit body they become a form-urlencoded body, otherwise they are
/// appended to the query string alongside the body.
#[derive(Debug)]
pub struct RequestDefinition {
    pub url: String,
    pub method: ServiceMethod,
    pub headers: HashMap<String, String>,
    pub parameters: HashMap<String, String>,
    pub body: RequestBody,
    pub format: ServiceFormat,
    pub cache_policy: CachePolicy,
    pub timeout: Duration,
}

impl RequestDefinition {
    pub fn new(url: impl Into<String>, method: ServiceMethod) -> Self {
        Self {
            url: url.into(),
            method,
            headers: HashMap::new(),
            parameters: HashMap::new(),
            body: RequestBody::None,
            format: ServiceFormat::default(),
            cache_policy: CachePolicy::default(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_codes() {
        assert_eq!(ServiceResult::Cancelled.code(), -1);
        assert_eq!(ServiceResult::Failed.code(), 0);
        assert_eq!(ServiceResult::Success.code(), 1);
    }

    #[test]
    fn test_queue_priority_ordering() {
        assert!(QueuePriority::VeryHigh > QueuePriority::Normal);
        assert!(QueuePriority::Normal > QueuePriority::VeryLow);
    }

    #[test]
    fn test_method_strings() {
        assert_eq!(ServiceMethod::Get.as_str(), "GET");
        assert_eq!(ServiceMethod::Delete.as_str(), "DELETE");
        assert!(ServiceMethod::Post.carries_form_body());
        assert!(!ServiceMethod::Get.carries_form_body());
    }
}
