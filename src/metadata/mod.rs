//! On-chain metadata for note lifecycle transactions.
//!
//! Wire shape, keyed by the application label:
//!
//! ```json
//! { "42819": { "action": "create", "note_id": "...", "title": "Hi",
//!              "note": ["<64 bytes>", "..."], "created_at": "2024-01-01T00:00:00.000Z" } }
//! ```
//!
//! `title` and `note` are a bare string when they fit in one metadata text
//! value and a list of chunks otherwise.

mod chunk;

pub use chunk::{chunk, METADATA_CHUNK_LEN};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::entity::TxAction;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    #[error("Metadata label {0} not present")]
    MissingLabel(u64),

    #[error("Missing metadata field '{0}'")]
    MissingField(&'static str),

    #[error("Metadata field '{0}' must be text or a list of text")]
    NotText(&'static str),

    #[error("Unknown action '{0}'")]
    UnknownAction(String),
}

/// A text metadatum: one value, or the chunks of a longer string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextField {
    Single(String),
    Chunked(Vec<String>),
}

impl TextField {
    pub fn encode(text: &str) -> Self {
        let mut chunks = chunk(text, METADATA_CHUNK_LEN);
        if chunks.len() == 1 {
            TextField::Single(chunks.remove(0))
        } else {
            TextField::Chunked(chunks)
        }
    }

    /// Reassemble the original text.
    pub fn text(&self) -> String {
        match self {
            TextField::Single(s) => s.clone(),
            TextField::Chunked(parts) => parts.concat(),
        }
    }

    fn from_value(value: &Value, field: &'static str) -> Result<Self, MetadataError> {
        match value {
            Value::String(s) => Ok(TextField::Single(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    _ => Err(MetadataError::NotText(field)),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(TextField::Chunked),
            _ => Err(MetadataError::NotText(field)),
        }
    }
}

/// Body stored under the application label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteMetadata {
    pub action: TxAction,
    pub note_id: String,
    pub title: TextField,
    pub note: TextField,
    pub created_at: String,
}

impl NoteMetadata {
    pub fn new(
        action: TxAction,
        note_id: &str,
        title: &str,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            action,
            note_id: note_id.to_string(),
            title: TextField::encode(title),
            note: TextField::encode(content),
            created_at: created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    /// Wrap the body under `label`, ready to attach to a transaction.
    pub fn to_json(&self, label: u64) -> Value {
        let mut root = Map::new();
        root.insert(label.to_string(), self.body_json());
        Value::Object(root)
    }

    fn body_json(&self) -> Value {
        let mut body = Map::new();
        body.insert("action".to_string(), Value::String(self.action.to_string()));
        body.insert("note_id".to_string(), Value::String(self.note_id.clone()));
        body.insert("title".to_string(), text_value(&self.title));
        body.insert("note".to_string(), text_value(&self.note));
        body.insert("created_at".to_string(), Value::String(self.created_at.clone()));
        Value::Object(body)
    }

    /// Parse metadata previously produced by [`encode`].
    pub fn from_json(value: &Value, label: u64) -> Result<Self, MetadataError> {
        let body = value
            .get(label.to_string())
            .ok_or(MetadataError::MissingLabel(label))?;

        let action_str = plain_field(body, "action")?;
        let action = action_str
            .parse()
            .map_err(|_| MetadataError::UnknownAction(action_str.clone()))?;

        Ok(Self {
            action,
            note_id: plain_field(body, "note_id")?,
            title: TextField::from_value(field(body, "title")?, "title")?,
            note: TextField::from_value(field(body, "note")?, "note")?,
            created_at: plain_field(body, "created_at")?,
        })
    }
}

fn field<'a>(body: &'a Value, name: &'static str) -> Result<&'a Value, MetadataError> {
    body.get(name).ok_or(MetadataError::MissingField(name))
}

fn plain_field(body: &Value, name: &'static str) -> Result<String, MetadataError> {
    match field(body, name)? {
        Value::String(s) => Ok(s.clone()),
        _ => Err(MetadataError::NotText(name)),
    }
}

fn text_value(field: &TextField) -> Value {
    match field {
        TextField::Single(s) => Value::String(s.clone()),
        TextField::Chunked(parts) => {
            Value::Array(parts.iter().cloned().map(Value::String).collect())
        }
    }
}

/// Build the labelled metadata object for one note transaction.
pub fn encode(
    label: u64,
    action: TxAction,
    note_id: &str,
    title: &str,
    content: &str,
    now: DateTime<Utc>,
) -> Value {
    NoteMetadata::new(action, note_id, title, content, now).to_json(label)
}
