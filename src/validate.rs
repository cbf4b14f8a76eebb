//! Structural checks on a generated document.
//!
//! This is not a full OpenAPI validator. It answers the questions that matter after a
//! generation run: is the skeleton there, did any route make it into `paths`, and does
//! every operation declare its responses.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

static OPERATION_KEYS: [&str; 8] = [
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    /// Reported but does not fail the report
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Check {
    pub name: String,
    pub passed: bool,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub checks: Vec<Check>,
}

impl ValidationReport {
    fn record(&mut self, name: &str, severity: Severity, failure: Option<String>) {
        self.checks.push(Check {
            name: name.to_string(),
            passed: failure.is_none(),
            severity,
            message: failure,
        });
    }

    /// True unless an error-level check failed
    pub fn passed(&self) -> bool {
        self.checks
            .iter()
            .all(|check| check.passed || check.severity == Severity::Warning)
    }

    pub fn failures(&self) -> impl Iterator<Item = &Check> {
        self.checks.iter().filter(|check| !check.passed)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for check in &self.checks {
            let status = match (check.passed, check.severity) {
                (true, _) => "PASS",
                (false, Severity::Error) => "FAIL",
                (false, Severity::Warning) => "WARN",
            };
            write!(f, "[{}] {}", status, check.name)?;
            if let Some(message) = &check.message {
                write!(f, ": {}", message)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

pub fn validate_document(document: &Value) -> ValidationReport {
    let mut report = ValidationReport::default();

    let has_string = |pointer: &str| {
        document
            .pointer(pointer)
            .and_then(Value::as_str)
            .map(|s| !s.is_empty())
            .unwrap_or(false)
    };

    report.record(
        "openapi version",
        Severity::Error,
        (!has_string("/openapi")).then(|| "missing `openapi`".to_string()),
    );
    report.record(
        "info.title",
        Severity::Error,
        (!has_string("/info/title")).then(|| "missing `info.title`".to_string()),
    );
    report.record(
        "info.version",
        Severity::Error,
        (!has_string("/info/version")).then(|| "missing `info.version`".to_string()),
    );

    let operations = operations(document);
    let has_paths = document
        .get("paths")
        .and_then(Value::as_object)
        .map(|paths| !paths.is_empty())
        .unwrap_or(false);
    report.record(
        "paths",
        Severity::Error,
        (!has_paths).then(|| "no paths documented".to_string()),
    );

    let without_responses: Vec<String> = operations
        .iter()
        .filter(|(_, operation)| operation.get("responses").is_none())
        .map(|(label, _)| label.clone())
        .collect();
    report.record(
        "operation responses",
        Severity::Error,
        (!without_responses.is_empty())
            .then(|| format!("missing `responses`: {}", without_responses.join(", "))),
    );

    let mut seen: HashMap<&str, usize> = HashMap::new();
    for (_, operation) in &operations {
        if let Some(id) = operation.get("operationId").and_then(Value::as_str) {
            *seen.entry(id).or_default() += 1;
        }
    }
    let mut duplicates: Vec<&str> = seen
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(id, _)| id)
        .collect();
    duplicates.sort_unstable();
    report.record(
        "unique operationIds",
        Severity::Warning,
        (!duplicates.is_empty()).then(|| format!("duplicated: {}", duplicates.join(", "))),
    );

    report
}

/// `("METHOD /path", operation)` for every operation object in the document
fn operations(document: &Value) -> Vec<(String, &Value)> {
    let paths = match document.get("paths").and_then(Value::as_object) {
        Some(paths) => paths,
        None => return Vec::new(),
    };
    paths
        .iter()
        .filter_map(|(path, item)| item.as_object().map(|item| (path, item)))
        .flat_map(|(path, item)| {
            OPERATION_KEYS.iter().filter_map(move |method| {
                item.get(*method)
                    .filter(|operation| operation.is_object())
                    .map(|operation| (format!("{} {}", method.to_uppercase(), path), operation))
            })
        })
        .collect()
}
