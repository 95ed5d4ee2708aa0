//! Multipart body construction.
//!
//! # Data Flow
//! ```text
//! MultipartPart (part.rs):
//!     name/filename/content-type + payload source
//!     → framed header + payload bytes
//!
//! MultipartCollection (collection.rs):
//!     ordered parts + delimiter
//!     → concatenated body blob + boundary content-type
//! ```
//!
//! # Design Decisions
//! - File and provider payloads resolve lazily at serialization time
//! - Nothing is cached; each serialize() reflects current state
//! - Unreadable file payloads fail serialization instead of producing
//!   silently empty content

pub mod collection;
pub mod part;

pub use collection::{MultipartCollection, DEFAULT_PART_DELIMITER};
pub use part::{MultipartPart, PartSource, DEFAULT_PART_CONTENT_TYPE};
