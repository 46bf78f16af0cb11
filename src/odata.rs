//! Pure helpers for building OData values.
//!
//! None of these touch the network; they shape queries and payloads for the
//! client and for callers that build their own.

use serde_json::Value;

use crate::models::IdResults;

/// Token SharePoint uses for a space inside an internal name.
const ENCODED_SPACE: &str = "_x0020_";

/// Default property read by [`cast_list_values_to`].
pub const DEFAULT_VALUE_PROPERTY: &str = "Title";

/// Returns the entity type name of items in the list called `name`.
///
/// Whitespace becomes `_x0020_` and only the first character of the whole
/// name is uppercased: `"issue tracking"` → `SP.Data.Issue_x0020_trackingListItem`.
pub fn list_item_type(name: &str) -> String {
    let encoded: String = name
        .chars()
        .map(|c| {
            if c.is_whitespace() {
                ENCODED_SPACE.to_string()
            } else {
                c.to_string()
            }
        })
        .collect();

    let mut chars = encoded.chars();
    let capitalized = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => String::new(),
    };

    format!("SP.Data.{}ListItem", capitalized)
}

/// Builds `(field eq 'v1' or field eq 'v2' ...)` from `values`.
///
/// Every value is percent-encoded, including `'` and parentheses, so a value
/// cannot close the literal or the group. Empty values are skipped, and an input
/// without any usable value yields an empty string.
pub fn query_filter<S: AsRef<str>>(values: &[S], field: &str) -> String {
    let clauses: Vec<String> = values
        .iter()
        .map(AsRef::as_ref)
        .filter(|value| !value.is_empty())
        .map(|value| format!("{} eq '{}'", field, urlencoding::encode(value)))
        .collect();

    if clauses.is_empty() {
        return String::new();
    }
    format!("({})", clauses.join(" or "))
}

/// Replaces the contents of `target` with `prop` of every entry in
/// `list_item.results`.
///
/// `prop` defaults to `Title`. Entries whose value is missing or falsy are
/// skipped. `target` is cleared even when `list_item` has no results.
pub fn cast_list_values_to(list_item: &Value, target: &mut Vec<Value>, prop: Option<&str>) {
    let prop = prop.unwrap_or(DEFAULT_VALUE_PROPERTY);
    target.clear();

    if let Some(results) = list_item.get("results").and_then(Value::as_array) {
        target.extend(
            results
                .iter()
                .filter_map(|item| item.get(prop))
                .filter(|value| is_truthy(value))
                .cloned(),
        );
    }
}

/// Maps text keys to lookup IDs for a multi-value lookup field.
///
/// IDs are read from `lookup.items` when present, otherwise from `lookup`
/// itself. Keys without a (truthy) ID are dropped.
pub fn id_results_object<S: AsRef<str>>(lookup: &Value, keys: &[S]) -> IdResults {
    let table = lookup.get("items").unwrap_or(lookup);

    IdResults {
        results: keys
            .iter()
            .filter_map(|key| table.get(key.as_ref()))
            .filter(|id| is_truthy(id))
            .cloned()
            .collect(),
    }
}

/// Quotes `value` as an OData string literal body (single quotes doubled).
pub fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// JSON truthiness: null, false, 0, `""` and NaN are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
