//! A single `multipart/form-data` body part.
//!
//! # Responsibilities
//! - Hold a part's name, optional filename, and content type
//! - Resolve the payload from one of four sources (text, bytes, file, provider)
//! - Frame the part's headers and payload as wire bytes

use std::fmt;
use std::path::PathBuf;

use crate::service::error::ServiceError;

/// Content type used when a part is constructed without one.
pub const DEFAULT_PART_CONTENT_TYPE: &str = "application/octet-stream";

/// Where a part's payload bytes come from.
///
/// `File` and `Provider` resolve lazily, at serialization time. The
/// provider closure is re-invoked on every serialization; its output is
/// never cached.
pub enum PartSource {
    Text(String),
    Bytes(Vec<u8>),
    File(PathBuf),
    Provider(Box<dyn Fn() -> Vec<u8> + Send + Sync>),
}

impl fmt::Debug for PartSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartSource::Text(s) => f.debug_tuple("Text").field(&s.len()).finish(),
            PartSource::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            PartSource::File(p) => f.debug_tuple("File").field(p).finish(),
            PartSource::Provider(_) => f.write_str("Provider(..)"),
        }
    }
}

/// One part of a multipart body. Immutable after construction.
///
/// # Panics
///
/// Every constructor panics when `name` is empty: an anonymous part
/// cannot be framed into a valid `Content-Disposition` and the mistake
/// is always a programming error, not runtime input.
#[derive(Debug)]
pub struct MultipartPart {
    name: String,
    filename: Option<String>,
    content_type: String,
    source: PartSource,
}

impl MultipartPart {
    fn new(
        name: impl Into<String>,
        filename: Option<String>,
        content_type: Option<&str>,
        source: PartSource,
    ) -> Self {
        let name = name.into();
        assert!(!name.is_empty(), "multipart part name must be non-empty");
        Self {
            name,
            filename,
            content_type: content_type.unwrap_or(DEFAULT_PART_CONTENT_TYPE).to_owned(),
            source,
        }
    }

    /// Part backed by a UTF-8 string.
    pub fn from_text(
        name: impl Into<String>,
        text: impl Into<String>,
        content_type: Option<&str>,
    ) -> Self {
        Self::new(name, None, content_type, PartSource::Text(text.into()))
    }

    /// Part backed by in-memory bytes.
    pub fn from_bytes(
        name: impl Into<String>,
        data: Vec<u8>,
        content_type: Option<&str>,
    ) -> Self {
        Self::new(name, None, content_type, PartSource::Bytes(data))
    }

    /// File-upload part whose content is already in memory.
    pub fn from_file_data(
        name: impl Into<String>,
        data: Vec<u8>,
        filename: impl Into<String>,
        content_type: Option<&str>,
    ) -> Self {
        Self::new(
            name,
            Some(filename.into()),
            content_type,
            PartSource::Bytes(data),
        )
    }

    /// File-upload part read from disk at serialization time.
    ///
    /// An unreadable file fails serialization with
    /// [`ServiceError::PartPayload`]; the payload is never silently empty.
    pub fn from_file(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        filename: impl Into<String>,
        content_type: Option<&str>,
    ) -> Self {
        Self::new(
            name,
            Some(filename.into()),
            content_type,
            PartSource::File(path.into()),
        )
    }

    /// Part whose payload is produced by a closure at serialization time.
    pub fn from_provider(
        name: impl Into<String>,
        provider: impl Fn() -> Vec<u8> + Send + Sync + 'static,
        filename: Option<String>,
        content_type: Option<&str>,
    ) -> Self {
        Self::new(
            name,
            filename,
            content_type,
            PartSource::Provider(Box::new(provider)),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Resolve the payload bytes from the part's source.
    pub fn payload(&self) -> Result<Vec<u8>, ServiceError> {
        match &self.source {
            PartSource::Text(s) => Ok(s.clone().into_bytes()),
            PartSource::Bytes(b) => Ok(b.clone()),
            PartSource::File(path) => {
                std::fs::read(path).map_err(|e| ServiceError::PartPayload {
                    name: self.name.clone(),
                    detail: format!("{}: {}", path.display(), e),
                })
            }
            PartSource::Provider(f) => Ok(f()),
        }
    }

    /// Frame the part as wire bytes: disposition and content-type headers,
    /// a blank line, then the payload. The enclosing collection supplies
    /// the boundary markers around it.
    pub fn serialize(&self) -> Result<Vec<u8>, ServiceError> {
        let mut out = Vec::new();
        out.extend_from_slice(b"Content-Disposition: form-data; name=\"");
        out.extend_from_slice(self.name.as_bytes());
        out.extend_from_slice(b"\"");
        if let Some(filename) = &self.filename {
            out.extend_from_slice(b"; filename=\"");
            out.extend_from_slice(filename.as_bytes());
            out.extend_from_slice(b"\"");
        }
        out.extend_from_slice(b"\r\nContent-Type: ");
        out.extend_from_slice(self.content_type.as_bytes());
        out.extend_from_slice(b"\r\n\r\n");
        out.extend_from_slice(&self.payload()?);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_text_part_framing() {
        let part = MultipartPart::from_text("field", "hello", Some("text/plain"));
        let bytes = part.serialize().unwrap();
        let framed = String::from_utf8(bytes).unwrap();
        assert_eq!(
            framed,
            "Content-Disposition: form-data; name=\"field\"\r\nContent-Type: text/plain\r\n\r\nhello"
        );
    }

    #[test]
    fn test_filename_and_default_content_type() {
        let part = MultipartPart::from_file_data("upload", vec![1, 2, 3], "a.bin", None);
        let bytes = part.serialize().unwrap();
        let header_end = bytes.windows(4).position(|w| w == b"\r\n\r\n").unwrap();
        let headers = std::str::from_utf8(&bytes[..header_end]).unwrap();
        assert!(headers.contains("filename=\"a.bin\""));
        assert!(headers.contains(DEFAULT_PART_CONTENT_TYPE));
        assert_eq!(&bytes[header_end + 4..], &[1, 2, 3]);
    }

    #[test]
    fn test_provider_invoked_per_serialization() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let part = MultipartPart::from_provider(
            "lazy",
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                b"data".to_vec()
            },
            None,
            None,
        );
        part.serialize().unwrap();
        part.serialize().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_missing_file_fails() {
        let part = MultipartPart::from_file("f", "/nonexistent/path.bin", "p.bin", None);
        let err = part.serialize().unwrap_err();
        assert!(matches!(err, ServiceError::PartPayload { .. }));
    }

    #[test]
    #[should_panic(expected = "non-empty")]
    fn test_empty_name_rejected() {
        let _ = MultipartPart::from_text("", "x", None);
    }
}
