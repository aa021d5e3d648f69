//! Purpose: Define a stable, structured schema for non-fatal stderr notices.
//! Exports: `Notice`, `notice_json`, `field_failures_notice`.
//! Role: Shared contract helper for CLI diagnostics such as recovered field failures.
//! Invariants: Notices are non-fatal and never alter stdout payloads.
//! Invariants: JSON schema is stable once published; fields are additive-only.
use serde_json::{Map, Value, json};

use crate::api::FieldFailure;

/// Failures listed individually in a summary notice; the rest are only counted.
pub const MAX_LISTED_FAILURES: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: String,
    pub time: String,
    pub cmd: String,
    pub source: String,
    pub message: String,
    pub details: Map<String, Value>,
}

pub fn notice_json(notice: &Notice) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(notice.kind));
    inner.insert("time".to_string(), json!(notice.time));
    inner.insert("cmd".to_string(), json!(notice.cmd));
    inner.insert("source".to_string(), json!(notice.source));
    inner.insert("message".to_string(), json!(notice.message));
    inner.insert("details".to_string(), Value::Object(notice.details.clone()));

    let mut outer = Map::new();
    outer.insert("notice".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn failure_json(failure: &FieldFailure) -> Value {
    json!({
        "line": failure.line,
        "row": failure.row,
        "column": failure.column,
        "value": failure.value,
        "kind": format!("{:?}", failure.kind),
        "message": failure.message,
    })
}

/// Summary of the field failures recovered while reading `source`.
pub fn field_failures_notice(
    cmd: &str,
    source: &str,
    time: String,
    total: u64,
    failures: &[FieldFailure],
) -> Notice {
    let mut details = Map::new();
    details.insert("failed_count".to_string(), json!(total));
    details.insert(
        "failures".to_string(),
        Value::Array(
            failures
                .iter()
                .take(MAX_LISTED_FAILURES)
                .map(failure_json)
                .collect(),
        ),
    );
    details.insert(
        "truncated".to_string(),
        json!(failures.len() > MAX_LISTED_FAILURES || (failures.len() as u64) < total),
    );
    Notice {
        kind: "field_failures".to_string(),
        time,
        cmd: cmd.to_string(),
        source: source.to_string(),
        message: format!("{total} field(s) could not be read and were left absent"),
        details,
    }
}

#[cfg(test)]
mod tests {
    use super::{MAX_LISTED_FAILURES, Notice, field_failures_notice, notice_json};
    use crate::api::{ErrorKind, FieldFailure};
    use serde_json::{Map, Value};

    fn failure(line: u64) -> FieldFailure {
        FieldFailure {
            line,
            row: line - 2,
            column: "total_cases".to_string(),
            value: Some("abc".to_string()),
            raw_line: "Chad,abc".to_string(),
            kind: ErrorKind::Parse,
            message: "invalid float literal".to_string(),
        }
    }

    #[test]
    fn notice_json_has_required_fields() {
        let mut details = Map::new();
        details.insert("failed_count".to_string(), Value::from(3));

        let notice = Notice {
            kind: "field_failures".to_string(),
            time: "2026-02-01T00:00:00Z".to_string(),
            cmd: "show".to_string(),
            source: "covid.csv".to_string(),
            message: "3 field(s) could not be read".to_string(),
            details,
        };

        let value = notice_json(&notice);
        let obj = value
            .get("notice")
            .and_then(|v| v.as_object())
            .expect("notice object");

        assert_eq!(obj.get("kind").and_then(|v| v.as_str()), Some("field_failures"));
        assert_eq!(
            obj.get("time").and_then(|v| v.as_str()),
            Some("2026-02-01T00:00:00Z")
        );
        assert_eq!(obj.get("cmd").and_then(|v| v.as_str()), Some("show"));
        assert_eq!(obj.get("source").and_then(|v| v.as_str()), Some("covid.csv"));
        assert!(obj.get("details").and_then(|v| v.as_object()).is_some());
    }

    #[test]
    fn failures_notice_caps_listed_entries() {
        let failures: Vec<FieldFailure> = (2..2 + MAX_LISTED_FAILURES as u64 + 5)
            .map(failure)
            .collect();
        let notice = field_failures_notice(
            "show",
            "covid.csv",
            "2026-02-01T00:00:00Z".to_string(),
            failures.len() as u64,
            &failures,
        );
        let listed = notice.details["failures"].as_array().expect("array");
        assert_eq!(listed.len(), MAX_LISTED_FAILURES);
        assert_eq!(listed[0]["column"], "total_cases");
        assert_eq!(listed[0]["kind"], "Parse");
        assert_eq!(notice.details["truncated"], true);
        assert_eq!(notice.details["failed_count"], 25);
    }
}
