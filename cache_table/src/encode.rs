use db_adapter::{ColumnValue, IndexColumnType, IndexDescriptor};
use serde_json::{Map, Value};

/// Encodes one row's columns into the wire payload (§4.4 step 6a). Columns
/// that parse as a bare integer literal are emitted as JSON numbers (the
/// common case for an `id` column); everything else is a JSON string. A
/// SQL NULL is omitted when `strip_null` is set, matching the global
/// `strip_null` configuration option, otherwise emitted as JSON `null`.
pub fn encode_row(columns: &[ColumnValue], strip_null: bool) -> Vec<u8> {
    let mut map = Map::with_capacity(columns.len());
    for (name, bytes, is_null) in columns {
        if *is_null {
            if strip_null {
                continue;
            }
            map.insert((*name).to_string(), Value::Null);
            continue;
        }
        map.insert((*name).to_string(), column_value_to_json(bytes));
    }
    serde_json::to_vec(&Value::Object(map)).expect("row json is always serializable")
}

fn column_value_to_json(bytes: &[u8]) -> Value {
    if let Ok(text) = std::str::from_utf8(bytes) {
        if let Ok(i) = text.parse::<i64>() {
            return Value::from(i);
        }
        return Value::String(text.to_string());
    }
    Value::String(hex_encode(bytes))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Extracts the indexed column's key bytes from a decoded row, typed per the
/// index's configured column type: `int` keys are the column's raw 4-byte
/// little-endian representation (matching what clients send on the wire for
/// an integer key), `string` keys are the column's raw bytes untouched.
pub fn extract_key(columns: &[ColumnValue], index: &IndexDescriptor) -> Option<Vec<u8>> {
    let (_, bytes, is_null) = columns.iter().find(|(name, _, _)| *name == index.column_name)?;
    if *is_null {
        return None;
    }
    match index.column_type {
        IndexColumnType::String => Some(bytes.to_vec()),
        IndexColumnType::Int => int_key_bytes(bytes),
    }
}

fn int_key_bytes(bytes: &[u8]) -> Option<Vec<u8>> {
    if bytes.len() == 4 {
        return Some(bytes.to_vec());
    }
    let text = std::str::from_utf8(bytes).ok()?;
    let value: i32 = text.parse().ok()?;
    Some(value.to_le_bytes().to_vec())
}

/// Reads an already-extracted int key back out as an `i64`, for `min_id`/
/// `max_id` tracking.
pub fn int_key_to_i64(key: &[u8]) -> Option<i64> {
    if key.len() != 4 {
        return None;
    }
    let mut buf = [0u8; 4];
    buf.copy_from_slice(key);
    Some(i32::from_le_bytes(buf) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_the_literal_wire_example_row() {
        let cols: Vec<ColumnValue> = vec![("id", b"42", false), ("name", b"alpha", false)];
        let json = encode_row(&cols, true);
        assert_eq!(json, br#"{"id":42,"name":"alpha"}"#);
    }

    #[test]
    fn strips_or_keeps_null_columns() {
        let cols: Vec<ColumnValue> = vec![("id", b"1", false), ("nickname", b"", true)];
        assert_eq!(encode_row(&cols, true), br#"{"id":1}"#);
        assert_eq!(encode_row(&cols, false), br#"{"id":1,"nickname":null}"#);
    }

    #[test]
    fn extracts_int_key_as_four_byte_little_endian() {
        let cols: Vec<ColumnValue> = vec![("id", b"42", false)];
        let idx = IndexDescriptor { id: 0, column_name: "id".into(), column_type: IndexColumnType::Int };
        let key = extract_key(&cols, &idx).unwrap();
        assert_eq!(key, 42i32.to_le_bytes().to_vec());
    }
}
