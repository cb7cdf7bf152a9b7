//! Heuristic repair of truncated structured output.
//!
//! The completion collaborator caps its own output length, so responses
//! routinely arrive cut mid-structure. [`repair`] runs an ordered
//! sequence of text fixes over an owned buffer; it raises the odds that
//! [`parse`] succeeds but gives no correctness guarantee. A value cut
//! mid-token in a non-string field (a number cut mid-digit, a bare
//! `true`/`false`) is not recoverable here.

use std::sync::LazyLock;

use regex::Regex;

use repodocs_shared::{RepodocsError, Result};

/// The text ends inside an array that was never closed.
static ENDS_IN_ARRAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\s*[^\]]*$").expect("array pattern compiles"));

/// The text ends inside an object that was never closed.
static ENDS_IN_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\s*[^}]*$").expect("object pattern compiles"));

/// A quoted `example` field value cut mid-string at the end of the text.
static DANGLING_EXAMPLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""example":\s*"([^"]*)$"#).expect("example pattern compiles"));

/// Best-effort repair of a raw completion response.
///
/// Ordered fixes: strip code fences; close the dangling string, array,
/// or object the text was cut inside of; balance remaining braces; patch
/// a dangling `example` value; finally guarantee a closing brace when
/// the text opened with one.
pub fn repair(raw: &str) -> String {
    let mut text = strip_fences(raw);

    if !text.ends_with('}') {
        close_truncation(&mut text);
    }
    balance_braces(&mut text);
    patch_dangling_example(&mut text);

    if text.starts_with('{') && !text.ends_with('}') {
        text.push('}');
    }

    text
}

/// Parse repaired text into a document, attaching the repaired text to
/// the error when parsing still fails.
pub fn parse(repaired: String) -> Result<serde_json::Value> {
    serde_json::from_str(&repaired).map_err(|e| RepodocsError::Synthesis {
        message: format!("failed to parse even after repair: {e}"),
        repaired: Some(repaired),
    })
}

/// Strip leading/trailing markdown code-fence markers.
fn strip_fences(raw: &str) -> String {
    let mut text = raw.trim();
    for prefix in ["```json", "```"] {
        if let Some(stripped) = text.strip_prefix(prefix) {
            text = stripped;
            break;
        }
    }
    if let Some(stripped) = text.strip_suffix("```") {
        text = stripped;
    }
    text.trim().to_string()
}

/// Close whatever structure the text was cut inside of.
fn close_truncation(text: &mut String) {
    let quotes = unescaped_quote_count(text);

    if quotes % 2 == 1 && !text.ends_with('"') {
        // Cut mid-string: close the string, then its enclosing object.
        text.push('"');
        text.push('}');
    } else if ENDS_IN_ARRAY.is_match(text) {
        text.push_str("]}");
    } else if ENDS_IN_OBJECT.is_match(text) {
        text.push('}');
    } else if quotes % 2 == 1 {
        text.push('"');
    }
}

/// Append as many `}` as needed to balance excess `{`.
fn balance_braces(text: &mut String) {
    let opens = text.matches('{').count();
    let closes = text.matches('}').count();
    for _ in closes..opens {
        text.push('}');
    }
}

/// Close the quote of an `example` value the response was cut inside of.
fn patch_dangling_example(text: &mut String) {
    if let Some(caps) = DANGLING_EXAMPLE.captures(text) {
        let full = caps.get(0).expect("match exists");
        let value = caps.get(1).expect("group exists").as_str().to_string();
        let start = full.start();
        text.truncate(start);
        text.push_str(&format!(r#""example": "{value}""#));
    }
}

/// Count quotes that are not escaped with a backslash.
fn unescaped_quote_count(text: &str) -> usize {
    let bytes = text.as_bytes();
    bytes
        .iter()
        .enumerate()
        .filter(|(i, b)| **b == b'"' && (*i == 0 || bytes[i - 1] != b'\\'))
        .count()
}
