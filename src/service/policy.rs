//! Client extension points and default response decoding.
//!
//! # Responsibilities
//! - Define the hook surface concrete API clients customize
//! - Decode response bodies per the declared format
//! - Parse authentication challenges into a typed value
//!
//! # Design Decisions
//! - Hooks live on a trait with no-op defaults; API clients compose a
//!   `ServiceClient` with their own policy instead of subclassing
//! - Default policy: no retries, no credentials, standard decoding

use std::time::Duration;

use bytes::Bytes;
use rand::Rng;

use crate::service::definition::ServiceFormat;
use crate::service::error::ServiceError;
use crate::service::helper;
use crate::service::operation::ServiceOperation;
use crate::service::value::{ServiceResponse, ServiceValue};

/// An authentication demand observed mid-flight (HTTP 401).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    pub scheme: String,
    pub realm: Option<String>,
}

impl AuthChallenge {
    /// Parse a `WWW-Authenticate` header value, e.g.
    /// `Basic realm="api"`.
    pub fn parse(header: &str) -> Option<Self> {
        let mut pieces = header.trim().splitn(2, ' ');
        let scheme = pieces.next()?.trim();
        if scheme.is_empty() {
            return None;
        }
        let realm = pieces.next().and_then(|params| {
            params.split(',').find_map(|param| {
                let param = param.trim();
                param
                    .strip_prefix("realm=")
                    .map(|r| r.trim_matches('"').to_owned())
            })
        });
        Some(Self {
            scheme: scheme.to_owned(),
            realm,
        })
    }
}

/// Credential offered in response to an [`AuthChallenge`]. Applied as
/// HTTP Basic authorization.
#[derive(Debug, Clone)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    pub(crate) fn authorization_header(&self) -> String {
        let pair = format!("{}:{}", self.username, self.password);
        format!("Basic {}", helper::base64_encode_text(&pair))
    }
}

/// Per-client behavior hooks, consulted by every operation the client
/// runs. All methods have defaults; implement only what you need.
pub trait ServicePolicy: Send + Sync {
    /// Whether a failed attempt should be retried. `response` is `None`
    /// for transport-level failures (DNS, reset, timeout). The core
    /// imposes no attempt cap; returning `true` unconditionally retries
    /// forever.
    fn should_retry(
        &self,
        operation: &ServiceOperation,
        response: Option<&ServiceResponse>,
        body: Option<&[u8]>,
        attempt: u32,
    ) -> bool {
        let _ = (operation, response, body, attempt);
        false
    }

    /// How long to wait before re-queueing a retry.
    fn retry_delay(&self, attempt: u32) -> Duration {
        jittered_retry_delay(attempt, DEFAULT_RETRY_BASE, DEFAULT_RETRY_CAP)
    }

    /// Credential to offer when the server answers 401. `None` lets the
    /// 401 flow into the normal retry/failure path.
    fn credential_for_challenge(
        &self,
        operation: &ServiceOperation,
        challenge: &AuthChallenge,
    ) -> Option<Credential> {
        let _ = (operation, challenge);
        None
    }

    /// Decode a response body per the declared format. Override to plug
    /// in custom formats layered on the standard ones.
    fn transform_data(
        &self,
        operation: &ServiceOperation,
        data: &Bytes,
        format: ServiceFormat,
        response: &ServiceResponse,
    ) -> Result<ServiceValue, ServiceError> {
        let _ = operation;
        decode_body(data, format, response)
    }

    /// Notification: an operation's attempt is about to execute.
    fn operation_did_begin(&self, operation: &ServiceOperation) {
        let _ = operation;
    }

    /// Notification: an operation's attempt finished executing.
    fn operation_did_end(&self, operation: &ServiceOperation) {
        let _ = operation;
    }

    /// Notification: an operation is finalizing as failed. Fires in
    /// addition to (never instead of) the completion callback.
    fn operation_failed(&self, operation: &ServiceOperation, error: &ServiceError) {
        let _ = (operation, error);
    }
}

/// The stock policy: no retries, no credentials, standard decoding.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPolicy;

impl ServicePolicy for DefaultPolicy {}

/// First delay of the stock retry schedule.
pub const DEFAULT_RETRY_BASE: Duration = Duration::from_millis(100);
/// Ceiling of the stock retry schedule.
pub const DEFAULT_RETRY_CAP: Duration = Duration::from_secs(2);

/// Doubling delay schedule for [`ServicePolicy::retry_delay`]: `base`
/// doubled per prior attempt, clamped to `cap`, widened by up to 10%
/// random jitter so simultaneous retries spread out. Attempt numbers
/// are 1-based; attempt zero waits nothing.
pub fn jittered_retry_delay(attempt: u32, base: Duration, cap: Duration) -> Duration {
    if attempt == 0 || base.is_zero() {
        return Duration::ZERO;
    }
    let factor = 1u32
        .checked_shl(attempt.saturating_sub(1))
        .unwrap_or(u32::MAX);
    let delay = base.saturating_mul(factor).min(cap);

    let jitter_window = delay.as_millis() as u64 / 10;
    if jitter_window == 0 {
        return delay;
    }
    delay + Duration::from_millis(rand::thread_rng().gen_range(0..jitter_window))
}

/// Standard decoding for the four declared formats.
pub fn decode_body(
    data: &Bytes,
    format: ServiceFormat,
    response: &ServiceResponse,
) -> Result<ServiceValue, ServiceError> {
    match format {
        ServiceFormat::Raw => Ok(ServiceValue::Raw(data.clone())),
        ServiceFormat::Text => {
            if let Some(charset) = response.charset() {
                if !matches!(charset.as_str(), "utf-8" | "utf8" | "us-ascii" | "ascii") {
                    return Err(ServiceError::InvalidFormat {
                        format,
                        detail: format!("unsupported charset '{charset}'"),
                    });
                }
            }
            String::from_utf8(data.to_vec())
                .map(ServiceValue::Text)
                .map_err(|e| ServiceError::InvalidFormat {
                    format,
                    detail: e.to_string(),
                })
        }
        ServiceFormat::FormEncoded => {
            let text = std::str::from_utf8(data).map_err(|e| ServiceError::InvalidFormat {
                format,
                detail: e.to_string(),
            })?;
            Ok(ServiceValue::Form(helper::map_from_url_arguments(text)))
        }
        ServiceFormat::Json => serde_json::from_slice(data)
            .map(ServiceValue::Json)
            .map_err(|e| ServiceError::InvalidFormat {
                format,
                detail: e.to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderMap;
    use serde_json::json;

    fn response() -> ServiceResponse {
        ServiceResponse {
            status: 200,
            headers: HeaderMap::new(),
            url: "http://example.test/".into(),
        }
    }

    #[test]
    fn test_decode_raw_is_identity() {
        let data = Bytes::from_static(b"\x00\x01binary");
        let value = decode_body(&data, ServiceFormat::Raw, &response()).unwrap();
        assert_eq!(value.as_bytes().unwrap(), &data);
    }

    #[test]
    fn test_decode_json_object() {
        let data = Bytes::from_static(b"{\"a\":1}");
        let value = decode_body(&data, ServiceFormat::Json, &response()).unwrap();
        assert_eq!(value.as_json().unwrap(), &json!({"a": 1}));
    }

    #[test]
    fn test_decode_json_rejects_garbage() {
        let data = Bytes::from_static(b"not json");
        let err = decode_body(&data, ServiceFormat::Json, &response()).unwrap_err();
        assert!(matches!(
            err,
            ServiceError::InvalidFormat {
                format: ServiceFormat::Json,
                ..
            }
        ));
    }

    #[test]
    fn test_decode_form_encoded() {
        let data = Bytes::from_static(b"a=1&b=two+words");
        let value = decode_body(&data, ServiceFormat::FormEncoded, &response()).unwrap();
        let form = value.as_form().unwrap();
        assert_eq!(form.get("a").unwrap(), "1");
        assert_eq!(form.get("b").unwrap(), "two words");
    }

    #[test]
    fn test_decode_text_rejects_invalid_utf8() {
        let data = Bytes::from_static(&[0xff, 0xfe]);
        let err = decode_body(&data, ServiceFormat::Text, &response()).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidFormat { .. }));
    }

    #[test]
    fn test_retry_delay_doubles_and_clamps() {
        let base = Duration::from_millis(100);
        let cap = Duration::from_secs(2);

        assert_eq!(jittered_retry_delay(0, base, cap), Duration::ZERO);
        assert!(jittered_retry_delay(1, base, cap) >= base);
        assert!(jittered_retry_delay(2, base, cap) >= Duration::from_millis(200));

        let clamped = jittered_retry_delay(30, base, cap);
        assert!(clamped >= cap);
        assert!(clamped <= cap + cap / 10);
    }

    #[test]
    fn test_parse_challenge() {
        let challenge = AuthChallenge::parse("Basic realm=\"api\"").unwrap();
        assert_eq!(challenge.scheme, "Basic");
        assert_eq!(challenge.realm.as_deref(), Some("api"));

        let bare = AuthChallenge::parse("Bearer").unwrap();
        assert_eq!(bare.scheme, "Bearer");
        assert_eq!(bare.realm, None);
    }

    #[test]
    fn test_basic_authorization_header() {
        let credential = Credential {
            username: "user".into(),
            password: "pass".into(),
        };
        assert_eq!(credential.authorization_header(), "Basic dXNlcjpwYXNz");
    }
}
