use crate::{Note, Record, Result, ServiceError};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Inbound envelope as delivered by the GraphQL resolver
#[derive(Debug, Clone, Deserialize)]
pub struct Invocation {
    pub info: Info,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Info {
    pub field_name: String,
}

/// Which configured table an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Notes,
    Users,
}

/// Every operation the service understands, decided once at the boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    FetchById { collection: Collection, id: String },
    Create { collection: Collection, record: Record },
    List { collection: Collection },
    Update { collection: Collection, record: Record },
    Delete { collection: Collection, id: String },
    ListByOwner { user_id: String },
}

/// Recognized field names, matched exactly and case-sensitively
pub const FIELD_NAMES: [&str; 11] = [
    "getNoteById",
    "createNote",
    "listNotes",
    "updateNote",
    "deleteNote",
    "getUserById",
    "createUser",
    "listUsers",
    "updateUser",
    "deleteUser",
    "listNotesByUser",
];

impl TryFrom<Invocation> for Operation {
    type Error = ServiceError;

    fn try_from(invocation: Invocation) -> Result<Self> {
        use Collection::{Notes, Users};

        let args = &invocation.arguments;
        let operation = match invocation.info.field_name.as_str() {
            "getNoteById" => Self::FetchById {
                collection: Notes,
                id: string_arg(args, "noteId")?,
            },
            "createNote" => Self::Create {
                collection: Notes,
                record: note_arg(args, "note")?,
            },
            "listNotes" => Self::List { collection: Notes },
            "updateNote" => Self::Update {
                collection: Notes,
                record: record_arg(args, "note")?,
            },
            "deleteNote" => Self::Delete {
                collection: Notes,
                id: string_arg(args, "noteId")?,
            },
            "getUserById" => Self::FetchById {
                collection: Users,
                id: string_arg(args, "userId")?,
            },
            "createUser" => Self::Create {
                collection: Users,
                record: record_arg(args, "user")?,
            },
            "listUsers" => Self::List { collection: Users },
            "updateUser" => Self::Update {
                collection: Users,
                record: record_arg(args, "user")?,
            },
            "deleteUser" => Self::Delete {
                collection: Users,
                id: string_arg(args, "userId")?,
            },
            "listNotesByUser" => Self::ListByOwner {
                user_id: string_arg(args, "userId")?,
            },
            other => return Err(ServiceError::InvalidOperation(other.to_string())),
        };
        Ok(operation)
    }
}

impl Operation {
    /// Decodes one raw JSON envelope
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::MalformedRequest` if the text is not a valid envelope,
    /// `ServiceError::InvalidOperation` for an unrecognized field name, and
    /// `ServiceError::MalformedRequest` for missing or mistyped arguments
    pub fn parse(raw: &str) -> Result<Self> {
        let invocation: Invocation = serde_json::from_str(raw)
            .map_err(|e| ServiceError::malformed(format!("invalid envelope: {e}")))?;
        Self::try_from(invocation)
    }
}

// Non-empty string argument, e.g. `noteId`
fn string_arg(args: &Map<String, Value>, name: &str) -> Result<String> {
    match args.get(name) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::String(_)) => Err(ServiceError::malformed(format!("`{name}` is empty"))),
        Some(_) => Err(ServiceError::malformed(format!("`{name}` must be a string"))),
        None => Err(ServiceError::malformed(format!("`{name}` is missing"))),
    }
}

// Passthrough record argument; must carry an `id`
fn record_arg(args: &Map<String, Value>, name: &str) -> Result<Record> {
    let value = args
        .get(name)
        .cloned()
        .ok_or_else(|| ServiceError::malformed(format!("`{name}` is missing")))?;
    Record::try_from(value).map_err(|e| match e {
        ServiceError::MalformedRequest(msg) => ServiceError::malformed(format!("`{name}`: {msg}")),
        other => other,
    })
}

// Full note with `id`, `name` and `completed`
fn note_arg(args: &Map<String, Value>, name: &str) -> Result<Record> {
    let value = args
        .get(name)
        .cloned()
        .ok_or_else(|| ServiceError::malformed(format!("`{name}` is missing")))?;
    let note: Note = serde_json::from_value(value)
        .map_err(|e| ServiceError::malformed(format!("`{name}`: {e}")))?;
    Record::try_from(note)
}
