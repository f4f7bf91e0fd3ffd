//! Query-string construction for management API reads.
//!
//! Query objects are plain `Serialize` structs; their property names are
//! converted to lower snake_case, which is what the management API expects.

use serde::ser::Error as _;
use serde::Serialize;
use serde_json::Value;

/// Convert `pageSize`/`PageSize` style names into `page_size`.
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for ch in name.chars() {
        if ch.is_ascii_uppercase() && prev_lower {
            out.push('_');
        }
        prev_lower = ch.is_ascii_lowercase();
        out.push(ch.to_ascii_lowercase());
    }
    out
}

/// Flatten a query object into `(name, value)` pairs.
///
/// `None`/null properties are left out.
pub fn query_pairs<T: Serialize>(query: &T) -> Result<Vec<(String, String)>, serde_json::Error> {
    match serde_json::to_value(query)? {
        Value::Null => Ok(Vec::new()),
        Value::Object(map) => Ok(map
            .into_iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(name, value)| {
                let value = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (to_snake_case(&name), value)
            })
            .collect()),
        _ => Err(serde_json::Error::custom("query object must serialize to a map")),
    }
}
