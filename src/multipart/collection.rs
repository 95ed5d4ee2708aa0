//! Ordered multipart parts joined by a boundary delimiter.

use crate::multipart::part::MultipartPart;
use crate::service::error::ServiceError;

/// Delimiter used when a collection is built without an explicit one.
pub const DEFAULT_PART_DELIMITER: &str = "----service-client-part-boundary";

/// An ordered set of [`MultipartPart`]s plus the boundary delimiter that
/// frames them into one `multipart/form-data` body.
///
/// Serialization always reflects the current parts and delimiter; nothing
/// is cached, so lazy part sources are re-resolved on every call. The
/// delimiter is not escaped — callers must pick one that does not occur in
/// any part payload.
#[derive(Debug)]
pub struct MultipartCollection {
    parts: Vec<MultipartPart>,
    delimiter: String,
}

impl MultipartCollection {
    pub fn new() -> Self {
        Self::with_parts(Vec::new())
    }

    pub fn with_parts(parts: Vec<MultipartPart>) -> Self {
        Self {
            parts,
            delimiter: DEFAULT_PART_DELIMITER.to_owned(),
        }
    }

    pub fn push(&mut self, part: MultipartPart) {
        self.parts.push(part);
    }

    pub fn parts(&self) -> &[MultipartPart] {
        &self.parts
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    pub fn set_delimiter(&mut self, delimiter: impl Into<String>) {
        self.delimiter = delimiter.into();
    }

    /// Content-type value for the outer request header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.delimiter)
    }

    /// Concatenate all parts in insertion order into the final body:
    /// `--D\r\n<part>\r\n` per part, closed by `--D--\r\n`.
    pub fn serialize(&self) -> Result<Vec<u8>, ServiceError> {
        let mut out = Vec::new();
        for part in &self.parts {
            out.extend_from_slice(b"--");
            out.extend_from_slice(self.delimiter.as_bytes());
            out.extend_from_slice(b"\r\n");
            out.extend_from_slice(&part.serialize()?);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"--");
        out.extend_from_slice(self.delimiter.as_bytes());
        out.extend_from_slice(b"--\r\n");
        Ok(out)
    }
}

impl Default for MultipartCollection {
    fn default() -> Self {
        Self::new()
    }
}
