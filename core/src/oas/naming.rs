#![deny(missing_docs)]

//! # Naming Utilities
//!
//! Name derivation shared by the parser, the binder and the type managers:
//! type names, attribute names, enum variant names, singular/plural resource
//! names and module names derived from URL templates.

use heck::{ToSnakeCase, ToUpperCamelCase};
use regex::Regex;
use std::sync::OnceLock;

/// Identifiers that can not be used verbatim as local attribute names.
pub const RESERVED_NAMES: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "default", "dyn", "else",
    "enum", "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod",
    "move", "mut", "pub", "ref", "return", "self", "static", "struct", "super", "trait", "true",
    "type", "unsafe", "use", "where", "while",
];

/// Singularisation exceptions: words ending in `s` that are already singular.
const SINGULAR_EXCEPTIONS: &[&str] = &["dns", "qos", "details", "status"];

fn version_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^v(\d+)(\.\d+)?$").expect("static regex"))
}

/// Splits a name into lowercase words on `_`, `-`, `:`, `.`, other
/// non-alphanumerics and lower-to-upper case boundaries.
pub fn split_name(name: &str) -> Vec<String> {
    name.to_snake_case()
        .split('_')
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// UpperCamel type name for a schema name.
///
/// `server_flavor` -> `ServerFlavor`, `OS-EXT-SRV-ATTR:host` -> `OsExtSrvAttrHost`.
pub fn model_name(name: &str) -> String {
    let camel: String = name
        .to_upper_camel_case()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    if camel.starts_with(|c: char| c.is_ascii_digit()) {
        format!("_{}", camel)
    } else {
        camel
    }
}

/// snake_case attribute name for a wire name, escaping reserved words with `_`.
pub fn local_attribute_name(name: &str) -> String {
    let snake: String = split_name(name)
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if snake.is_empty() {
        return "_empty".to_string();
    }
    if RESERVED_NAMES.contains(&snake.as_str()) || snake.starts_with(|c: char| c.is_ascii_digit())
    {
        format!("_{}", snake)
    } else {
        snake
    }
}

/// Enum variant identifier for a string literal.
pub fn variant_name(literal: &str) -> String {
    let camel = model_name(literal);
    if camel.is_empty() {
        "Empty".to_string()
    } else {
        camel
    }
}

/// Singular form of a plural resource word.
pub fn singular(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        format!("{}y", stem)
    } else if word.ends_with("sses") {
        word[..word.len() - 2].to_string()
    } else if word.ends_with('s')
        && !word.ends_with("ss")
        && !SINGULAR_EXCEPTIONS.iter().any(|e| word.ends_with(e))
    {
        word[..word.len() - 1].to_string()
    } else {
        word.to_string()
    }
}

/// Plural form of a singular resource word.
pub fn plural(word: &str) -> String {
    if let Some(stem) = word.strip_suffix('y') {
        if stem.ends_with(['a', 'e', 'i', 'o', 'u']) {
            format!("{}s", word)
        } else {
            format!("{}ies", stem)
        }
    } else if word.ends_with('s') || word.ends_with('x') || word.ends_with("sh") {
        format!("{}es", word)
    } else {
        format!("{}s", word)
    }
}

/// Whether a URL segment is an API version (`v2`, `v2.1`).
pub fn is_version_segment(segment: &str) -> bool {
    version_re().is_match(segment)
}

/// Major API version (`v2.1` -> `v2`).
pub fn major_version(segment: &str) -> Option<String> {
    version_re()
        .captures(segment)
        .and_then(|c| c.get(1))
        .map(|m| format!("v{}", m.as_str()))
}

/// Singular resource names derived from a URL template.
///
/// The leading version segment and placeholders are skipped, `os-` prefixes
/// dropped and a trailing action-like element removed:
/// `/v2.1/servers/{id}/os-volume_attachments` -> `["server", "volume_attachment"]`.
pub fn resource_names_from_url(path: &str) -> Vec<String> {
    let mut elements: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if elements.first().is_some_and(|e| is_version_segment(e)) {
        elements.remove(0);
    }
    if elements.is_empty() {
        return vec!["version".to_string()];
    }

    let mut names: Vec<String> = elements
        .iter()
        .filter(|e| !e.contains('{'))
        .map(|e| {
            let el = e.replace('-', "_");
            let part = singular(&el);
            part.strip_prefix("os_").map(str::to_string).unwrap_or(part)
        })
        .collect();

    if names.len() > 1 {
        if let Some(last) = names.last() {
            let action_like = matches!(last.as_str(), "action" | "detail")
                || ["add", "remove", "update"].iter().any(|w| last.starts_with(w));
            if action_like {
                names.pop();
            }
        }
    }
    names
}

/// Module name for an action (`os-migrateLive` -> `os_migrate_live`).
pub fn action_module_name(operation_name: &str) -> String {
    local_attribute_name(operation_name)
        .trim_start_matches('_')
        .to_string()
}

/// Module suffix for a microversion (`2.47` -> `_247`).
pub fn microversion_suffix(version: &str) -> String {
    format!("_{}", version.replace('.', ""))
}
