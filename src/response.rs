use crate::{Record, Result, ServiceError};
use serde::Serialize;
use serde_json::{json, Value};

/// Successful result of one operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    Record(Record),
    Records(Vec<Record>),
    Id(String),
}

/// Renders a result as the JSON body handed back to the caller.
///
/// Failures become `{"errorType": ..., "errorMessage": ...}` so the GraphQL
/// layer can map each kind to its own client-facing error.
#[must_use]
pub fn render(result: &Result<Outcome>) -> Value {
    match result {
        Ok(outcome) => json!(outcome),
        Err(e) => render_error(e),
    }
}

#[must_use]
pub fn render_error(e: &ServiceError) -> Value {
    json!({
        "errorType": e.kind(),
        "errorMessage": e.to_string(),
    })
}
