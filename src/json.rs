use serde_json::{json, Value};

use crate::error::Error;

/// Serialize IR to a compact JSON string (no whitespace).
pub fn to_json(ir: &Value) -> String {
    ir.to_string()
}

/// Serialize IR to a pretty-printed JSON string (2-space indent).
pub fn to_json_pretty(ir: &Value) -> String {
    serde_json::to_string_pretty(ir).unwrap_or_else(|_| ir.to_string())
}

/// Describe a failure as a JSON object, for hosts that want
/// machine-readable errors.
///
/// Parse errors carry `line` (1-based) and `column` (0-based); compile
/// errors have no source position and report both as `null`.
pub fn error_to_json(err: &Error) -> Value {
    match err {
        Error::Parse(parse) => json!({
            "code": parse.code,
            "message": parse.message,
            "line": parse.position.line,
            "column": parse.position.column,
            "snippet": parse.snippet,
        }),
        Error::Compile(compile) => json!({
            "code": compile.code(),
            "message": compile.message(),
            "line": null,
            "column": null,
        }),
    }
}
