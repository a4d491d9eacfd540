#![deny(missing_docs)]

//! # Reference Utilities
//!
//! JSON Pointer handling for `$ref` inlining.
//!
//! External documents are never fetched. A reference whose document part
//! matches the current document's `$self` URI is treated as local.

use percent_encoding::percent_decode_str;
use serde_json::Value;
use std::path::Path;
use url::Url;

/// Normalizes a `$ref` to a local pointer (`#/components/...`).
///
/// Returns `None` when the reference targets another document or has no fragment.
pub fn normalize_ref_to_local(ref_str: &str, self_uri: Option<&str>) -> Option<String> {
    if ref_str.starts_with('#') {
        return Some(ref_str.to_string());
    }
    let (document, fragment) = ref_str.split_once('#')?;
    let self_uri = self_uri?;
    if ref_doc_matches_self(document, self_uri) {
        Some(format!("#{}", fragment))
    } else {
        None
    }
}

/// Splits a local pointer (`#/a/b~1c`) into decoded segments.
pub fn pointer_segments(local_ref: &str) -> Vec<String> {
    let pointer = local_ref.trim_start_matches('#').trim_start_matches('/');
    if pointer.is_empty() {
        return Vec::new();
    }
    pointer.split('/').map(decode_pointer_segment).collect()
}

/// Follows a local pointer inside `root`.
pub fn resolve_pointer<'a>(root: &'a Value, local_ref: &str) -> Option<&'a Value> {
    pointer_segments(local_ref)
        .iter()
        .try_fold(root, |node, segment| match node {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

/// Decodes a JSON Pointer segment (`~1`, `~0` and percent escapes).
pub fn decode_pointer_segment(segment: &str) -> String {
    let decoded = segment.replace("~1", "/").replace("~0", "~");
    percent_decode_str(&decoded).decode_utf8_lossy().into_owned()
}

fn ref_doc_matches_self(ref_doc: &str, self_uri: &str) -> bool {
    if ref_doc == self_uri {
        return true;
    }

    if let (Ok(ref_url), Ok(self_url)) = (Url::parse(ref_doc), Url::parse(self_uri)) {
        return ref_url.scheme() == self_url.scheme()
            && ref_url.host() == self_url.host()
            && ref_url.port() == self_url.port()
            && ref_url.path() == self_url.path();
    }

    if self_uri.starts_with('/') {
        if let Ok(ref_url) = Url::parse(ref_doc) {
            return ref_url.path() == self_uri;
        }
    }

    if !self_uri.contains("://") && !ref_doc.contains("://") {
        return Path::new(ref_doc) == Path::new(self_uri);
    }

    false
}
