//! Response metadata and decoded payload values.

use std::collections::HashMap;

use bytes::Bytes;
use reqwest::header::{HeaderMap, CONTENT_TYPE};

/// Metadata of the HTTP response an operation received, independent of
/// the body. Cloned freely; the body travels separately as [`Bytes`].
#[derive(Debug, Clone)]
pub struct ServiceResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub url: String,
}

impl ServiceResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// A named header as text, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Charset declared in the `Content-Type` header, lowercased.
    pub fn charset(&self) -> Option<String> {
        let content_type = self.headers.get(CONTENT_TYPE)?.to_str().ok()?;
        content_type.split(';').find_map(|segment| {
            let segment = segment.trim();
            segment
                .strip_prefix("charset=")
                .map(|cs| cs.trim_matches('"').to_ascii_lowercase())
        })
    }
}

/// A decoded response body, shaped by the request's declared
/// [`ServiceFormat`](crate::service::definition::ServiceFormat).
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceValue {
    Raw(Bytes),
    Text(String),
    Form(HashMap<String, String>),
    Json(serde_json::Value),
}

impl ServiceValue {
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            ServiceValue::Raw(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ServiceValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_form(&self) -> Option<&HashMap<String, String>> {
        match self {
            ServiceValue::Form(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            ServiceValue::Json(v) => Some(v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn response_with_content_type(value: &str) -> ServiceResponse {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_str(value).unwrap());
        ServiceResponse {
            status: 200,
            headers,
            url: "http://example.test/".into(),
        }
    }

    #[test]
    fn test_charset_extraction() {
        let response = response_with_content_type("text/plain; charset=UTF-8");
        assert_eq!(response.charset().as_deref(), Some("utf-8"));

        let response = response_with_content_type("application/json");
        assert_eq!(response.charset(), None);
    }

    #[test]
    fn test_status_classification() {
        let mut response = response_with_content_type("text/plain");
        assert!(response.is_success());
        response.status = 404;
        assert!(!response.is_success());
        response.status = 299;
        assert!(response.is_success());
    }
}
