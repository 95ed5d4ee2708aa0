//! Encoding helpers: base64, URL-argument escaping, query-string maps.
//!
//! # Responsibilities
//! - Base64-encode credentials and binary values
//! - Escape/unescape single URL argument values
//! - Convert between string maps and `key=value&...` query strings
//! - Edit individual query parameters on a parsed URL

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use url::form_urlencoded;
use url::Url;

/// Base64-encode arbitrary bytes using the standard alphabet.
pub fn base64_encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Base64-encode the UTF-8 bytes of a string.
pub fn base64_encode_text(text: &str) -> String {
    STANDARD.encode(text.as_bytes())
}

/// Percent-escape one argument value for use inside a query string.
/// Reserved characters per RFC 3986 are escaped; spaces become `+`.
pub fn escape_url_argument(argument: &str) -> String {
    form_urlencoded::byte_serialize(argument.as_bytes()).collect()
}

/// Reverse of [`escape_url_argument`]. Input is a single escaped value,
/// so it must not contain an unescaped `&` or `=`.
pub fn unescape_url_argument(argument: &str) -> String {
    let synthetic = format!("v={argument}");
    form_urlencoded::parse(synthetic.as_bytes())
        .next()
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default()
}

/// Serialize a string map as `key=value&...`, keys sorted for stable
/// output, values percent-escaped.
pub fn url_arguments_from_map(map: &HashMap<String, String>) -> String {
    let mut pairs: Vec<(&String, &String)> = map.iter().collect();
    pairs.sort_by_key(|(k, _)| k.as_str());
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

/// Parse `key=value&...` back into a string map. Later duplicates of a
/// key overwrite earlier ones.
pub fn map_from_url_arguments(arguments: &str) -> HashMap<String, String> {
    form_urlencoded::parse(arguments.as_bytes())
        .into_owned()
        .collect()
}

/// Set (or replace) one query parameter on a URL, preserving the others.
pub fn set_query_parameter(url: &mut Url, key: &str, value: &str) {
    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != key)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.set_query(None);
    let mut editor = url.query_pairs_mut();
    for (k, v) in &retained {
        editor.append_pair(k, v);
    }
    editor.append_pair(key, value);
    drop(editor);
}

/// Remove one query parameter from a URL, preserving the others.
pub fn delete_query_parameter(url: &mut Url, key: &str) {
    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != key)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.set_query(None);
    if !retained.is_empty() {
        let mut editor = url.query_pairs_mut();
        for (k, v) in &retained {
            editor.append_pair(k, v);
        }
        drop(editor);
    }
}
