use crate::{Record, Result, ServiceError};
use serde_json::{Map, Value};

/// A `set` update built from a partial record.
///
/// Attribute names and values travel as separate placeholder maps
/// (`#name -> name`, `:name -> value`) so attribute names never collide
/// with reserved words of the store's query language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateExpression {
    assignments: Vec<(String, Value)>,
}

impl UpdateExpression {
    /// Builds one assignment per attribute of `partial` other than `id`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::MalformedRequest` if `partial` holds nothing
    /// but its `id`, since the resulting `set` clause would be empty
    pub fn from_partial(partial: &Record) -> Result<Self> {
        let assignments: Vec<(String, Value)> = partial
            .attributes()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        if assignments.is_empty() {
            return Err(ServiceError::malformed(format!(
                "update of '{}' carries no attributes besides `id`",
                partial.id()
            )));
        }
        Ok(Self { assignments })
    }

    /// Expression text, e.g. `set #name = :name, #completed = :completed`
    #[must_use]
    pub fn expression(&self) -> String {
        let clauses: Vec<String> = self
            .assignments
            .iter()
            .map(|(name, _)| format!("#{name} = :{name}"))
            .collect();
        format!("set {}", clauses.join(", "))
    }

    #[must_use]
    pub fn attribute_names(&self) -> Map<String, Value> {
        self.assignments
            .iter()
            .map(|(name, _)| (format!("#{name}"), Value::String(name.clone())))
            .collect()
    }

    #[must_use]
    pub fn attribute_values(&self) -> Map<String, Value> {
        self.assignments
            .iter()
            .map(|(name, value)| (format!(":{name}"), value.clone()))
            .collect()
    }

    /// Resolved `(attribute, value)` pairs, in caller order
    pub fn assignments(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.assignments
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Merges the assignments into `record`, leaving other attributes untouched
    pub fn apply(&self, record: &mut Record) {
        for (name, value) in self.assignments() {
            record.set(name, value.clone());
        }
    }
}
