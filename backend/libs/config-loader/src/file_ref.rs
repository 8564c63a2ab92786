//! Replacement of `file://` references with file contents

use crate::ConfigLoaderError;
use serde_json::Value;
use std::path::PathBuf;

const FILE_URI_PREFIX: &str = "file://";

/// Replace every `file://<path>` string in `value` with the trimmed
/// contents of `<path>`
///
/// Maps and arrays are walked recursively. Other strings and scalar values
/// are left untouched.
pub fn resolve_file_refs(value: Value) -> Result<Value, ConfigLoaderError> {
    resolve(value, "")
}

fn resolve(value: Value, key: &str) -> Result<Value, ConfigLoaderError> {
    match value {
        Value::String(s) => resolve_string(s, key).map(Value::String),
        Value::Object(map) => map
            .into_iter()
            .map(|(k, v)| {
                let child = join_key(key, &k);
                resolve(v, &child).map(|v| (k, v))
            })
            .collect::<Result<_, _>>()
            .map(Value::Object),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, v)| resolve(v, &format!("{}[{}]", key, i)))
            .collect::<Result<_, _>>()
            .map(Value::Array),
        other => Ok(other),
    }
}

fn resolve_string(s: String, key: &str) -> Result<String, ConfigLoaderError> {
    let Some(path) = s.strip_prefix(FILE_URI_PREFIX) else {
        return Ok(s);
    };

    let path = PathBuf::from(path);
    let contents = std::fs::read_to_string(&path).map_err(|source| ConfigLoaderError::FileRef {
        key: key.to_string(),
        path: path.clone(),
        source,
    })?;

    tracing::debug!(key = %key, path = %path.display(), "Resolved file reference");
    Ok(contents.trim().to_string())
}

fn join_key(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn secret_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_replaces_nested_refs_and_trims() {
        let password = secret_file("  s3cret\n");
        let token = secret_file("tok");
        let input = json!({
            "database": {
                "password": format!("file://{}", password.path().display()),
                "host": "localhost",
                "port": 5432,
            },
            "tokens": [format!("file://{}", token.path().display()), "inline"],
            "enabled": true,
        });

        let resolved = resolve_file_refs(input).unwrap();
        assert_eq!(resolved["database"]["password"], "s3cret");
        assert_eq!(resolved["database"]["host"], "localhost");
        assert_eq!(resolved["database"]["port"], 5432);
        assert_eq!(resolved["tokens"], json!(["tok", "inline"]));
        assert_eq!(resolved["enabled"], true);
    }

    #[test]
    fn test_plain_strings_untouched() {
        let input = json!({"url": "https://example.com", "note": "see file:// docs"});
        assert_eq!(resolve_file_refs(input.clone()).unwrap(), input);
    }

    #[test]
    fn test_missing_file_reports_key_and_path() {
        let input = json!({"auth": {"secret": "file:///nonexistent/secret.txt"}});

        match resolve_file_refs(input) {
            Err(ConfigLoaderError::FileRef { key, path, .. }) => {
                assert_eq!(key, "auth.secret");
                assert_eq!(path, PathBuf::from("/nonexistent/secret.txt"));
            }
            other => panic!("expected FileRef error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file_in_array_reports_index() {
        let input = json!({"keys": ["a", "file:///nonexistent/key"]});
        match resolve_file_refs(input) {
            Err(ConfigLoaderError::FileRef { key, .. }) => assert_eq!(key, "keys[1]"),
            other => panic!("expected FileRef error, got {:?}", other),
        }
    }
}
