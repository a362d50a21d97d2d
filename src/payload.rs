// Payload handling: loads a JSON document from disk for bulk topic
// creation and renders JSON the way the server tooling expects it
// (sorted keys, three-space indent).

use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;

/// Loads and validates a JSON payload file. An unreadable file or a body
/// that is not valid JSON is a fatal error for the caller.
pub fn import_payload(path: &Path) -> Result<Value> {
    info!("reading file {}", path.display());
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read payload file {}", path.display()))?;
    let payload: Value = serde_json::from_str(&text)
        .with_context(|| format!("could not read payload from {} - not JSON?", path.display()))?;
    info!("payload length: {}", payload_len(&payload));
    Ok(payload)
}

/// Number of top-level entries of a payload document.
pub fn payload_len(value: &Value) -> usize {
    match value {
        Value::Object(map) => map.len(),
        Value::Array(items) => items.len(),
        Value::Null => 0,
        _ => 1,
    }
}

/// Serializes with three-space indentation. Object keys come out sorted
/// since `serde_json` maps are ordered by key.
pub fn to_pretty_string(value: &Value) -> Result<String> {
    let mut out = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"   ");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    value
        .serialize(&mut ser)
        .context("serializing JSON for display")?;
    String::from_utf8(out).context("serialized JSON was not UTF-8")
}

pub fn pretty_print(value: &Value) -> Result<()> {
    println!("{}", to_pretty_string(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn pretty_output_is_sorted_and_three_space_indented() {
        let value: Value = serde_json::from_str(r#"{"b":1,"a":{"d":[1,2],"c":"x"}}"#).unwrap();
        let expected = "{\n   \"a\": {\n      \"c\": \"x\",\n      \"d\": [\n         1,\n         2\n      ]\n   },\n   \"b\": 1\n}";
        assert_eq!(to_pretty_string(&value).unwrap(), expected);
    }

    #[test]
    fn loaded_payload_reserializes_byte_identical() {
        let doc = "{\n   \"alpha\": 1,\n   \"beta\": {\n      \"gamma\": true\n   }\n}";
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{doc}").unwrap();
        let payload = import_payload(file.path()).unwrap();
        assert_eq!(to_pretty_string(&payload).unwrap(), doc);
    }

    #[test]
    fn import_rejects_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "definitely not json").unwrap();
        let err = import_payload(file.path()).unwrap_err();
        assert!(err.to_string().contains("not JSON"));
    }

    #[test]
    fn import_rejects_a_missing_file() {
        let err = import_payload(Path::new("/nonexistent/payload.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }

    #[test]
    fn payload_len_counts_top_level_entries() {
        assert_eq!(payload_len(&serde_json::json!({"a": 1, "b": 2})), 2);
        assert_eq!(payload_len(&serde_json::json!([1, 2, 3])), 3);
        assert_eq!(payload_len(&serde_json::json!(null)), 0);
        assert_eq!(payload_len(&serde_json::json!("scalar")), 1);
    }
}
