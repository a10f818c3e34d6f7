//! Shared helpers for command handlers.

use std::path::Path;

use serde_json::{Map, Value};

use crate::error::CliError;

/// Accept a write response, turning `{"successful": false, ...}` into an error.
pub fn ensure_successful(response: Value) -> Result<Value, CliError> {
    if response.get("successful") == Some(&Value::Bool(false)) {
        let message = match response.get("error").or_else(|| response.get("message")) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => response.to_string(),
        };
        return Err(CliError::Rejected { message });
    }
    Ok(response)
}

/// Read and parse a JSON object file for `--from-file` flags.
pub fn read_json_object(path: &Path) -> Result<Map<String, Value>, CliError> {
    let contents = std::fs::read_to_string(path)?;
    match serde_json::from_str(&contents)? {
        Value::Object(map) => Ok(map),
        _ => Err(CliError::Validation {
            field: "from-file".into(),
            reason: "expected a JSON object".into(),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn unsuccessful_response_is_rejected() {
        let err = ensure_successful(json!({"successful": false, "error": "busy"})).unwrap_err();
        assert!(matches!(err, CliError::Rejected { ref message } if message == "busy"));
    }

    #[test]
    fn other_responses_pass() {
        let body = json!({"successful": true, "result": {}});
        assert_eq!(ensure_successful(body.clone()).unwrap(), body);
        assert_eq!(ensure_successful(Value::Null).unwrap(), Value::Null);
    }

    #[test]
    fn from_file_must_hold_an_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patch.json");

        std::fs::write(&path, r#"{"maxPower": 3000}"#).unwrap();
        assert_eq!(read_json_object(&path).unwrap().get("maxPower"), Some(&json!(3000)));

        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(read_json_object(&path), Err(CliError::Validation { .. })));
    }
}
