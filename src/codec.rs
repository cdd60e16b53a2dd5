//! Bidirectional codecs between raw file text and record collections.
//!
//! Three formats are supported, selected by the file extension of the
//! resolved path:
//!
//! - **JSON**: pretty-printed with 2-space indentation on encode.
//! - **YAML**: standard block mapping/sequence emission.
//! - **CSV**: header row derived from the union of field names in
//!   first-seen order. CSV is lossy by design: values decode as strings
//!   and nested values are stringified on encode.
//!
//! Both directions fail soft: malformed input decodes to `None` and
//! unencodable data encodes to `None`, never a panic, so callers treat
//! codec failure uniformly as "no data".
//!
//! The CSV reader/writer is a minimal in-crate implementation (quote
//! handling, delimiter configurable) rather than a dependency.

use serde_json::Value;

use crate::models::{Collection, Record};
use crate::path::FileType;

/// Serialize `data` to text in the given format.
///
/// CSV requires `data` to be an array; anything else yields `None`.
pub fn encode(data: &Value, file_type: FileType, delimiter: char) -> Option<String> {
    match file_type {
        FileType::Json => serde_json::to_string_pretty(data).ok(),
        FileType::Yaml => serde_yaml::to_string(data).ok(),
        FileType::Csv => encode_csv(data, delimiter),
    }
}

/// Deserialize text in the given format.
///
/// Returns `None` for malformed input of any format.
pub fn decode(text: &str, file_type: FileType, delimiter: char) -> Option<Value> {
    match file_type {
        FileType::Json => serde_json::from_str(text).ok(),
        FileType::Yaml => serde_yaml::from_str(text).ok(),
        FileType::Csv => decode_csv(text, delimiter),
    }
}

/// Coerce a decoded value into a collection of records.
///
/// An array keeps its object elements in order, a lone object becomes a
/// single-record collection, anything else is empty.
pub fn to_collection(value: Value) -> Collection {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect(),
        Value::Object(map) => vec![map],
        _ => Vec::new(),
    }
}

// ============ CSV ============

fn encode_csv(data: &Value, delimiter: char) -> Option<String> {
    let rows = data.as_array()?;

    // Header: union of field names across all records, first-seen order.
    let mut header: Vec<String> = Vec::new();
    for row in rows {
        if let Value::Object(map) = row {
            for key in map.keys() {
                if !header.iter().any(|h| h == key) {
                    header.push(key.clone());
                }
            }
        }
    }

    let mut out = String::new();
    out.push_str(
        &header
            .iter()
            .map(|h| escape_cell(h, delimiter))
            .collect::<Vec<_>>()
            .join(&delimiter.to_string()),
    );
    out.push('\n');

    for row in rows {
        let map = match row {
            Value::Object(map) => map,
            _ => continue,
        };
        let line = header
            .iter()
            .map(|key| escape_cell(&cell_text(map.get(key)), delimiter))
            .collect::<Vec<_>>()
            .join(&delimiter.to_string());
        out.push_str(&line);
        out.push('\n');
    }

    Some(out)
}

/// Render one cell. Scalars print bare, nested values are stringified as
/// compact JSON, absent and null values print empty.
fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(nested) => serde_json::to_string(nested).unwrap_or_default(),
    }
}

fn escape_cell(cell: &str, delimiter: char) -> String {
    if cell.contains(delimiter) || cell.contains('"') || cell.contains('\n') || cell.contains('\r')
    {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

fn decode_csv(text: &str, delimiter: char) -> Option<Value> {
    let mut rows = parse_csv_rows(text, delimiter)?;
    if rows.is_empty() {
        return Some(Value::Array(Vec::new()));
    }
    let header = rows.remove(0);

    let records: Vec<Value> = rows
        .into_iter()
        .map(|row| {
            let mut record = Record::new();
            for (key, cell) in header.iter().zip(row.into_iter()) {
                record.insert(key.clone(), Value::String(cell));
            }
            Value::Object(record)
        })
        .collect();

    Some(Value::Array(records))
}

/// Split CSV text into rows of cells, honoring quoted cells with embedded
/// delimiters, newlines and doubled quotes. An unterminated quote makes
/// the whole input malformed.
fn parse_csv_rows(text: &str, delimiter: char) -> Option<Vec<Vec<String>>> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();
    let mut seen_any = false;

    while let Some(c) = chars.next() {
        seen_any = true;
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    cell.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                cell.push(c);
            }
        } else if c == '"' && cell.is_empty() {
            in_quotes = true;
        } else if c == delimiter {
            row.push(std::mem::take(&mut cell));
        } else if c == '\n' || c == '\r' {
            if c == '\r' && chars.peek() == Some(&'\n') {
                chars.next();
            }
            row.push(std::mem::take(&mut cell));
            rows.push(std::mem::take(&mut row));
        } else {
            cell.push(c);
        }
    }

    if in_quotes {
        return None;
    }
    if seen_any && (!cell.is_empty() || !row.is_empty()) {
        row.push(cell);
        rows.push(row);
    }

    // Drop fully empty trailing lines.
    while rows.last().map_or(false, |r| r.iter().all(|c| c.is_empty())) {
        rows.pop();
    }

    Some(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!([
            {"id": 1, "name": "Alice", "active": true},
            {"id": 2, "name": "Bob", "active": false}
        ])
    }

    #[test]
    fn json_roundtrip_preserves_records() {
        let text = encode(&sample(), FileType::Json, ',').unwrap();
        assert!(text.contains("  \"id\": 1"));
        let back = decode(&text, FileType::Json, ',').unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn yaml_roundtrip_preserves_records() {
        let text = encode(&sample(), FileType::Yaml, ',').unwrap();
        let back = decode(&text, FileType::Yaml, ',').unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn csv_header_is_union_in_first_seen_order() {
        let data = json!([
            {"a": 1, "b": 2},
            {"b": 3, "c": 4}
        ]);
        let text = encode(&data, FileType::Csv, ',').unwrap();
        assert!(text.starts_with("a,b,c\n"));
        assert!(text.contains("1,2,\n"));
        assert!(text.contains(",3,4\n"));
    }

    #[test]
    fn csv_requires_an_array() {
        assert_eq!(encode(&json!({"a": 1}), FileType::Csv, ','), None);
        assert_eq!(encode(&json!("scalar"), FileType::Csv, ','), None);
    }

    #[test]
    fn csv_roundtrip_loses_type_fidelity() {
        let text = encode(&sample(), FileType::Csv, ',').unwrap();
        let back = to_collection(decode(&text, FileType::Csv, ',').unwrap());
        assert_eq!(back[0]["id"], json!("1"));
        assert_eq!(back[0]["name"], json!("Alice"));
        assert_eq!(back[1]["active"], json!("false"));
    }

    #[test]
    fn csv_flat_string_records_roundtrip_exactly() {
        let data = json!([
            {"name": "Alice", "city": "Berlin"},
            {"name": "Bob", "city": "Paris"}
        ]);
        let text = encode(&data, FileType::Csv, ',').unwrap();
        let back = decode(&text, FileType::Csv, ',').unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn csv_quotes_cells_with_delimiters_and_quotes() {
        let data = json!([{"note": "a,b", "quote": "say \"hi\""}]);
        let text = encode(&data, FileType::Csv, ',').unwrap();
        assert!(text.contains("\"a,b\""));
        assert!(text.contains("\"say \"\"hi\"\"\""));
        let back = to_collection(decode(&text, FileType::Csv, ',').unwrap());
        assert_eq!(back[0]["note"], json!("a,b"));
        assert_eq!(back[0]["quote"], json!("say \"hi\""));
    }

    #[test]
    fn csv_respects_custom_delimiter() {
        let data = json!([{"a": 1, "b": 2}]);
        let text = encode(&data, FileType::Csv, ';').unwrap();
        assert!(text.starts_with("a;b\n"));
        let back = to_collection(decode(&text, FileType::Csv, ';').unwrap());
        assert_eq!(back[0]["b"], json!("2"));
    }

    #[test]
    fn malformed_input_decodes_to_none() {
        assert_eq!(decode("{not json", FileType::Json, ','), None);
        assert_eq!(decode("a: [unclosed", FileType::Yaml, ','), None);
        assert_eq!(decode("a,b\n\"unterminated", FileType::Csv, ','), None);
    }

    #[test]
    fn nested_values_stringify_in_csv() {
        let data = json!([{"id": 1, "tags": ["a", "b"]}]);
        let text = encode(&data, FileType::Csv, ',').unwrap();
        assert!(text.contains("\"[\"\"a\"\",\"\"b\"\"]\""));
    }

    #[test]
    fn to_collection_wraps_lone_object() {
        let coll = to_collection(json!({"id": 1}));
        assert_eq!(coll.len(), 1);
        assert_eq!(coll[0]["id"], json!(1));
        assert!(to_collection(json!("scalar")).is_empty());
    }
}
