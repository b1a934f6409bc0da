use crate::ServiceError;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Stored form of a note or user: attribute name to JSON value.
///
/// Always carries a non-empty string `id`. Attribute order is the order
/// the caller supplied them in.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct Record(Map<String, Value>);

impl Record {
    pub const ID: &'static str = "id";

    /// Creates a record holding only its primary key
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let mut attributes = Map::new();
        attributes.insert(Self::ID.to_string(), Value::String(id.into()));
        Self(attributes)
    }

    /// Returns the record with `attribute` set. Setting `id` is ignored.
    #[must_use]
    pub fn with(mut self, attribute: &str, value: Value) -> Self {
        self.set(attribute, value);
        self
    }

    #[must_use]
    pub fn id(&self) -> &str {
        self.0
            .get(Self::ID)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.0.get(attribute)
    }

    /// All attributes except `id`, in insertion order
    pub fn attributes(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter().filter(|(name, _)| name.as_str() != Self::ID)
    }

    /// Overwrites one attribute; the primary key is immutable
    pub fn set(&mut self, attribute: &str, value: Value) {
        if attribute != Self::ID {
            self.0.insert(attribute.to_string(), value);
        }
    }
}

impl TryFrom<Map<String, Value>> for Record {
    type Error = ServiceError;

    fn try_from(attributes: Map<String, Value>) -> Result<Self, Self::Error> {
        let problem = match attributes.get(Self::ID) {
            Some(Value::String(id)) if !id.is_empty() => None,
            Some(Value::String(_)) => Some("`id` is empty"),
            Some(_) => Some("`id` must be a string"),
            None => Some("`id` is missing"),
        };
        match problem {
            None => Ok(Self(attributes)),
            Some(msg) => Err(ServiceError::malformed(msg)),
        }
    }
}

impl TryFrom<Value> for Record {
    type Error = ServiceError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(attributes) => Self::try_from(attributes),
            other => Err(ServiceError::malformed(format!(
                "expected an object, got {other}"
            ))),
        }
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

/// A note as accepted by `createNote`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub name: String,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl TryFrom<Note> for Record {
    type Error = ServiceError;

    fn try_from(note: Note) -> Result<Self, Self::Error> {
        if note.id.is_empty() {
            return Err(ServiceError::malformed("`id` is empty"));
        }
        let mut record = Self::new(note.id)
            .with("name", Value::String(note.name))
            .with("completed", Value::Bool(note.completed));
        if let Some(user_id) = note.user_id {
            record.set("userId", Value::String(user_id));
        }
        Ok(record)
    }
}
