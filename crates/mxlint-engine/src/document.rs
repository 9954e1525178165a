//! Decoding of model-source documents.
//!
//! Only the first YAML document of a file is read. Tags are dropped and the
//! tagged value is kept, and non-string mapping keys are rendered as text.

use std::path::Path;

use mxlint_types::{LintError, Result};
use serde::Deserialize;
use serde_json::Value as Json;
use serde_yaml::Value as Yaml;

/// Decode the first YAML document in `bytes` into a JSON value.
///
/// An empty file decodes to `null`.
pub fn decode_document(path: &Path, bytes: &[u8]) -> Result<Json> {
    let yaml_err = |e: serde_yaml::Error| LintError::Yaml {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let first = match serde_yaml::Deserializer::from_slice(bytes).next() {
        Some(document) => Yaml::deserialize(document).map_err(yaml_err)?,
        None => Yaml::Null,
    };
    Ok(to_json(first))
}

fn to_json(value: Yaml) -> Json {
    match value {
        Yaml::Null => Json::Null,
        Yaml::Bool(b) => Json::Bool(b),
        Yaml::Number(n) => number(&n),
        Yaml::String(s) => Json::String(s),
        Yaml::Sequence(items) => Json::Array(items.into_iter().map(to_json).collect()),
        Yaml::Mapping(mapping) => Json::Object(
            mapping
                .into_iter()
                .map(|(k, v)| (key_text(k), to_json(v)))
                .collect(),
        ),
        Yaml::Tagged(tagged) => to_json(tagged.value),
    }
}

fn number(n: &serde_yaml::Number) -> Json {
    if let Some(i) = n.as_i64() {
        Json::from(i)
    } else if let Some(u) = n.as_u64() {
        Json::from(u)
    } else {
        n.as_f64()
            .and_then(serde_json::Number::from_f64)
            .map_or(Json::Null, Json::Number)
    }
}

fn key_text(key: Yaml) -> String {
    match key {
        Yaml::String(s) => s,
        Yaml::Null => "null".to_string(),
        Yaml::Bool(b) => b.to_string(),
        Yaml::Number(n) => n.to_string(),
        Yaml::Tagged(tagged) => key_text(tagged.value),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(text: &str) -> Result<Json> {
        decode_document(Path::new("doc.yaml"), text.as_bytes())
    }

    #[test]
    fn plain_mapping() {
        let doc = decode("Name: MyEntity\nAttributes:\n  - Name: Id\n    Length: 200\n").unwrap();
        assert_eq!(
            doc,
            json!({"Name": "MyEntity", "Attributes": [{"Name": "Id", "Length": 200}]})
        );
    }

    #[test]
    fn only_first_document_is_read() {
        let doc = decode("Name: first\n---\nName: second\n").unwrap();
        assert_eq!(doc, json!({"Name": "first"}));
    }

    #[test]
    fn tags_are_dropped() {
        let doc = decode("Name: !foo x\nItems: !list\n  - !num 3\n").unwrap();
        assert_eq!(doc, json!({"Name": "x", "Items": [3]}));
    }

    #[test]
    fn non_string_keys_become_text() {
        let doc = decode("1: one\ntrue: yes\n").unwrap();
        assert_eq!(doc, json!({"1": "one", "true": "yes"}));
    }

    #[test]
    fn empty_file_is_null() {
        assert_eq!(decode("").unwrap(), Json::Null);
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let err = decode("key: [unclosed\n").unwrap_err();
        assert!(matches!(err, LintError::Yaml { .. }));
    }
}
