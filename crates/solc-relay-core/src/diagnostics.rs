//! Classification of backend result payloads.
//!
//! A payload fails a compilation when its `error` field, or any entry of its
//! `errors` array, is neither a warning nor the deferred-import marker.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

/// Reply text handed to the compiler for a path it could not resolve. The
/// compiler echoes it back as an error, which must not count as fatal.
pub const DEFERRED_IMPORT: &str = "Deferred import";

/// Severity of a single diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

fn legacy_warning_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // "<file>:<line>:<col> Warning: ..." or a bare "Warning: ..."
    RE.get_or_init(|| Regex::new(r"^(.*:[0-9]*:[0-9]* )?Warning: ").expect("static regex"))
}

fn message_of(diagnostic: &Value) -> Option<&str> {
    match diagnostic {
        Value::String(s) => Some(s),
        Value::Object(map) => map
            .get("formattedMessage")
            .or_else(|| map.get("message"))
            .and_then(Value::as_str),
        _ => None,
    }
}

/// Severity of a diagnostic entry.
///
/// Structured entries carry a `severity` field; legacy entries are plain
/// strings prefixed with an optional location and `Warning: `.
pub fn severity(diagnostic: &Value) -> Severity {
    let is_warning = match diagnostic {
        Value::Object(map) => map
            .get("severity")
            .and_then(Value::as_str)
            .map(|s| s.eq_ignore_ascii_case("warning"))
            .unwrap_or(false),
        Value::String(s) => legacy_warning_regex().is_match(s),
        _ => false,
    };
    if is_warning {
        Severity::Warning
    } else {
        Severity::Error
    }
}

/// Whether the entry is the deferred-import marker rather than a diagnostic.
pub fn is_deferred_import(diagnostic: &Value) -> bool {
    message_of(diagnostic)
        .map(|m| m.contains(DEFERRED_IMPORT))
        .unwrap_or(false)
}

/// Whether a single entry fails the compilation.
pub fn is_fatal(diagnostic: &Value) -> bool {
    !is_deferred_import(diagnostic) && severity(diagnostic) == Severity::Error
}

/// Whether the payload holds any fatal entry.
pub fn has_fatal_errors(data: &Value) -> bool {
    let single = data.get("error").filter(|e| !e.is_null()).map(is_fatal);
    let many = data
        .get("errors")
        .and_then(Value::as_array)
        .map(|errors| errors.iter().any(is_fatal));
    single.unwrap_or(false) || many.unwrap_or(false)
}

/// Payload shape used for every synthetic failure.
pub fn error_payload(message: impl Into<String>) -> Value {
    serde_json::json!({ "error": message.into() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn legacy_warning_strings() {
        assert_eq!(
            severity(&json!("A.sol:3:5: Warning: unused variable")),
            Severity::Warning
        );
        assert_eq!(
            severity(&json!("A.sol:3:5 Warning: unused variable")),
            Severity::Warning
        );
        assert_eq!(
            severity(&json!("A.sol:3:5: Error: Warning: nested")),
            Severity::Error
        );
        assert_eq!(severity(&json!("Warning: shadowing")), Severity::Warning);
        assert_eq!(
            severity(&json!("A.sol:1:1 Error: expected ';'")),
            Severity::Error
        );
    }

    #[test]
    fn structured_severity() {
        assert_eq!(
            severity(&json!({ "severity": "warning", "message": "x" })),
            Severity::Warning
        );
        assert_eq!(
            severity(&json!({ "severity": "error", "message": "x" })),
            Severity::Error
        );
    }

    #[test]
    fn deferred_import_is_never_fatal() {
        assert!(!is_fatal(&json!("Deferred import")));
        assert!(!is_fatal(&json!("B.sol:1:1 Error: Source \"B.sol\" not found: Deferred import")));
        assert!(!is_fatal(&json!({
            "severity": "error",
            "formattedMessage": "ParserError: Deferred import"
        })));
    }

    #[test]
    fn payload_classification() {
        assert!(!has_fatal_errors(&json!({ "contracts": {} })));
        assert!(!has_fatal_errors(&json!({ "error": "Deferred import" })));
        assert!(!has_fatal_errors(&json!({ "errors": ["Warning: a", "Warning: b"] })));
        assert!(has_fatal_errors(&json!({ "errors": ["Warning: a", "A.sol:1:1 Error: b"] })));
        assert!(has_fatal_errors(&json!({ "error": "Compiler not yet loaded." })));
        assert!(has_fatal_errors(&json!({
            "errors": [{ "severity": "error", "message": "TypeError" }]
        })));
    }
}
