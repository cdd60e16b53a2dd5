//! In-memory query and aggregation engine.
//!
//! Pure, synchronous operations over an already-decoded [`Collection`]:
//! filtering, sorting, projection, aggregation, schema introspection and
//! schema enforcement. Nothing here touches the network; write operations
//! transform the collection here and re-encode it afterwards.
//!
//! # Filters
//!
//! A query is a record mapping field names to matchers. A matcher is
//! either a literal (equality) or a string of the form `op:value`:
//!
//! ```text
//! {"age": "gt:25", "name": "like:al", "id": "in:1,2,3"}
//! ```
//!
//! Supported operators: `eq`, `ne`, `gt`, `gte`, `lt`, `lte`, `in`,
//! `like`. All supplied fields must match (logical AND). The string form
//! is parsed once into a tagged [`Matcher`] at this boundary; nothing
//! downstream re-parses operator strings.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Serialize;
use serde_json::Value;

use crate::models::{Collection, Record};
use crate::path::FileType;

// ============ Filtering ============

/// A filter operator, parsed from its wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Like,
}

/// A parsed matcher: operator plus operand.
#[derive(Debug, Clone, PartialEq)]
pub struct Matcher {
    pub op: FilterOp,
    pub operand: Value,
}

impl Matcher {
    /// Parse a matcher from its query value. Strings of the form
    /// `op:value` become tagged operators; everything else is a literal
    /// equality match.
    pub fn parse(value: &Value) -> Self {
        if let Value::String(s) = value {
            if let Some((op, operand)) = s.split_once(':') {
                let op = match op {
                    "eq" => Some(FilterOp::Eq),
                    "ne" | "not" => Some(FilterOp::Ne),
                    "gt" => Some(FilterOp::Gt),
                    "gte" => Some(FilterOp::Gte),
                    "lt" => Some(FilterOp::Lt),
                    "lte" => Some(FilterOp::Lte),
                    "in" => Some(FilterOp::In),
                    "like" => Some(FilterOp::Like),
                    _ => None,
                };
                if let Some(op) = op {
                    return Matcher {
                        op,
                        operand: Value::String(operand.to_string()),
                    };
                }
            }
        }
        Matcher {
            op: FilterOp::Eq,
            operand: value.clone(),
        }
    }

    /// Whether a field value satisfies this matcher. Absent fields are
    /// treated as null: they satisfy only `ne` (against a non-null
    /// operand) and an explicit null equality.
    pub fn matches(&self, field: Option<&Value>) -> bool {
        let field = field.unwrap_or(&Value::Null);
        match self.op {
            FilterOp::Eq => loose_eq(field, &self.operand),
            FilterOp::Ne => !loose_eq(field, &self.operand),
            FilterOp::Gt => compare(field, &self.operand) == Some(std::cmp::Ordering::Greater),
            FilterOp::Gte => matches!(
                compare(field, &self.operand),
                Some(std::cmp::Ordering::Greater) | Some(std::cmp::Ordering::Equal)
            ),
            FilterOp::Lt => compare(field, &self.operand) == Some(std::cmp::Ordering::Less),
            FilterOp::Lte => matches!(
                compare(field, &self.operand),
                Some(std::cmp::Ordering::Less) | Some(std::cmp::Ordering::Equal)
            ),
            FilterOp::In => self
                .operand
                .as_str()
                .map(|list| {
                    list.split(',')
                        .any(|item| loose_eq(field, &Value::String(item.trim().to_string())))
                })
                .unwrap_or(false),
            FilterOp::Like => match (scalar_text(field), scalar_text(&self.operand)) {
                (Some(haystack), Some(needle)) => haystack
                    .to_ascii_lowercase()
                    .contains(&needle.to_ascii_lowercase()),
                _ => false,
            },
        }
    }
}

/// Scalar as comparable text; `None` for nested values.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => None,
        _ => None,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Loose scalar equality: numeric when both sides are numeric, textual
/// otherwise, so `1` matches `"1"` the way wire-form filters expect.
fn loose_eq(a: &Value, b: &Value) -> bool {
    if a.is_null() || b.is_null() {
        return a.is_null() && b.is_null();
    }
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return x == y;
    }
    match (scalar_text(a), scalar_text(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Natural ordering: numeric when both sides are numeric, lexicographic
/// otherwise. `None` when either side is not a scalar.
fn compare(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return x.partial_cmp(&y);
    }
    Some(scalar_text(a)?.cmp(&scalar_text(b)?))
}

/// Whether a record satisfies every matcher of a query (logical AND).
/// The empty query matches every record.
pub fn record_matches(record: &Record, query: &Record) -> bool {
    query
        .iter()
        .all(|(field, value)| Matcher::parse(value).matches(record.get(field)))
}

/// Return the records of `collection` that satisfy `query`, in order.
/// The empty query is the identity.
pub fn apply_filters(collection: &Collection, query: &Record) -> Collection {
    collection
        .iter()
        .filter(|record| record_matches(record, query))
        .cloned()
        .collect()
}

// ============ Sort, limit, projection ============

/// Stable ascending sort by a field's natural ordering.
pub fn asc(mut collection: Collection, key: &str) -> Collection {
    collection.sort_by(|a, b| {
        compare(
            a.get(key).unwrap_or(&Value::Null),
            b.get(key).unwrap_or(&Value::Null),
        )
        .unwrap_or(std::cmp::Ordering::Equal)
    });
    collection
}

/// Stable descending sort by a field's natural ordering.
pub fn desc(mut collection: Collection, key: &str) -> Collection {
    collection.sort_by(|a, b| {
        compare(
            b.get(key).unwrap_or(&Value::Null),
            a.get(key).unwrap_or(&Value::Null),
        )
        .unwrap_or(std::cmp::Ordering::Equal)
    });
    collection
}

/// Truncate to the first `n` records.
pub fn limit(mut collection: Collection, n: usize) -> Collection {
    collection.truncate(n);
    collection
}

/// Project every record to only `keys`, in the order of `keys`.
pub fn pluck(collection: &Collection, keys: &[String]) -> Collection {
    collection
        .iter()
        .map(|record| {
            let mut projected = Record::new();
            for key in keys {
                if let Some(value) = record.get(key) {
                    projected.insert(key.clone(), value.clone());
                }
            }
            projected
        })
        .collect()
}

// ============ Aggregation ============

/// Result of [`aggregate`]: the (ordered, limited) records plus named
/// aggregate values computed over the full input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    pub records: Collection,
    /// Named aggregates, e.g. `sum(age)` or `count(name)`.
    pub stats: Record,
}

/// Run an aggregation spec over a collection.
///
/// Spec keys `$count`, `$sum`, `$avg`, `$min` and `$max` each name a
/// target field; `$order` (`field:asc|desc`) and `$limit` shape the
/// returned records. Aggregates are computed over the full input before
/// order and limit are applied.
pub fn aggregate(collection: &Collection, spec: &Record) -> AggregateResult {
    let mut stats = Record::new();

    for (key, value) in spec {
        let field = match value.as_str() {
            Some(f) => f,
            None => continue,
        };
        let numbers: Vec<f64> = collection
            .iter()
            .filter_map(|r| r.get(field))
            .filter_map(as_number)
            .collect();
        match key.as_str() {
            "$count" => {
                let count = collection.iter().filter(|r| r.contains_key(field)).count();
                stats.insert(format!("count({})", field), number_value(count as f64));
            }
            "$sum" => {
                stats.insert(
                    format!("sum({})", field),
                    number_value(numbers.iter().sum()),
                );
            }
            "$avg" => {
                if !numbers.is_empty() {
                    let avg = numbers.iter().sum::<f64>() / numbers.len() as f64;
                    stats.insert(format!("avg({})", field), number_value(avg));
                }
            }
            "$min" => {
                if let Some(min) = numbers.iter().cloned().reduce(f64::min) {
                    stats.insert(format!("min({})", field), number_value(min));
                }
            }
            "$max" => {
                if let Some(max) = numbers.iter().cloned().reduce(f64::max) {
                    stats.insert(format!("max({})", field), number_value(max));
                }
            }
            _ => {}
        }
    }

    let mut records = collection.clone();
    if let Some(order) = spec.get("$order").and_then(Value::as_str) {
        let (field, direction) = order.split_once(':').unwrap_or((order, "asc"));
        records = if direction.eq_ignore_ascii_case("desc") {
            desc(records, field)
        } else {
            asc(records, field)
        };
    }
    if let Some(n) = spec.get("$limit").and_then(|v| {
        v.as_u64()
            .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
    }) {
        records = limit(records, n as usize);
    }

    AggregateResult { records, stats }
}

/// A whole-valued f64 becomes a JSON integer, anything else a float.
fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}

// ============ Schema introspection and enforcement ============

/// Union of field names across all records, first-seen order.
pub fn columns(collection: &Collection) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for record in collection {
        for key in record.keys() {
            if !names.iter().any(|n| n == key) {
                names.push(key.clone());
            }
        }
    }
    names
}

/// OpenAPI-style type descriptor for a single value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeDescriptor {
    #[serde(rename = "type")]
    pub type_name: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<&'static str>,
}

/// Describe a value's type. Whole numbers report `integer`/`int32`,
/// non-integral numbers `number`. Date-looking strings are still
/// `string`: there is no implicit date type. Null has no type.
pub fn type_of(value: &Value) -> Option<TypeDescriptor> {
    let descriptor = match value {
        Value::Null => return None,
        Value::Bool(_) => TypeDescriptor {
            type_name: "boolean",
            format: None,
        },
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                TypeDescriptor {
                    type_name: "integer",
                    format: Some("int32"),
                }
            } else {
                TypeDescriptor {
                    type_name: "number",
                    format: None,
                }
            }
        }
        Value::String(_) => TypeDescriptor {
            type_name: "string",
            format: None,
        },
        Value::Array(_) => TypeDescriptor {
            type_name: "array",
            format: None,
        },
        Value::Object(_) => TypeDescriptor {
            type_name: "object",
            format: None,
        },
    };
    Some(descriptor)
}

/// Field-to-type mapping over a collection, first non-null type wins
/// per field. Fields appear in first-seen order.
pub fn types(collection: &Collection) -> Record {
    let mut result = Record::new();
    for record in collection {
        for (key, value) in record {
            if result.contains_key(key) {
                continue;
            }
            if let Some(descriptor) = type_of(value) {
                result.insert(
                    key.clone(),
                    serde_json::to_value(descriptor).unwrap_or(Value::Null),
                );
            }
        }
    }
    result
}

/// Coerce every record to exactly the given column list: missing columns
/// are added with `default`, fields outside the list are dropped, and
/// key order follows `column_list`.
pub fn columns_apply(collection: &mut Collection, column_list: &[String], default: &Value) {
    for record in collection.iter_mut() {
        let mut coerced = Record::new();
        for column in column_list {
            let value = record.get(column).cloned().unwrap_or_else(|| default.clone());
            coerced.insert(column.clone(), value);
        }
        *record = coerced;
    }
}

/// Shallow-merge `values` into every record matching `query`; last write
/// wins per field. Non-matching records pass through untouched.
pub fn values_apply(collection: &mut Collection, values: &Record, query: &Record) {
    for record in collection.iter_mut() {
        if record_matches(record, query) {
            for (key, value) in values {
                record.insert(key.clone(), value.clone());
            }
        }
    }
}

// ============ Utilities ============

/// Drop fields whose value is null or the empty string. Zero and `false`
/// are kept.
pub fn remove_empty(record: Record) -> Record {
    record
        .into_iter()
        .filter(|(_, value)| match value {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            _ => true,
        })
        .collect()
}

/// True for an empty array or an array containing only empty objects.
/// Such collections encode to empty file content rather than `[{}]`.
pub fn is_empty_object_array(value: &Value) -> bool {
    match value {
        Value::Array(items) => items
            .iter()
            .all(|item| item.as_object().map_or(false, |map| map.is_empty())),
        _ => false,
    }
}

/// MIME type for a collection file extension; unrecognized extensions
/// report plain text.
pub fn mime(ext: &str) -> &'static str {
    FileType::from_ext(ext).map_or("text/plain", |t| t.mime())
}

/// Base64-encode a UTF-8 string.
pub fn btoa(text: &str) -> String {
    BASE64.encode(text.as_bytes())
}

/// Decode a base64 string, tolerating embedded newlines the way platform
/// content payloads arrive. `None` for invalid input.
pub fn atob(encoded: &str) -> Option<String> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = BASE64.decode(compact).ok()?;
    String::from_utf8(bytes).ok()
}
