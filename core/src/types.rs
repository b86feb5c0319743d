//! Payload types for the project API.
//!
//! # Design
//! A project is an open JSON record whose only required field is `uuid`.
//! `ProjectDescriptor` keeps `uuid` typed and flattens everything else into
//! `fields`, so a descriptor serializes back to exactly the object the
//! front-end handed over. The request envelopes (`{data}`, `{uuid}`,
//! `{project}`) borrow their contents; they only live long enough to be
//! serialized. A project list is never decoded into descriptors: the server
//! owns its shape, so `ProjectList` keeps the body verbatim and only checks
//! that it is a JSON array.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::ApiError;

/// A project record as stored and listed by the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectDescriptor {
    pub uuid: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ProjectDescriptor {
    pub fn new(uuid: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            fields: Map::new(),
        }
    }

    /// A descriptor with a freshly generated v4 uuid.
    pub fn generate() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.fields.get("name").and_then(Value::as_str)
    }
}

/// The body of a successful `/projectlist` response.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectList {
    body: String,
    entries: Vec<Value>,
}

impl ProjectList {
    /// Accept `body` if it is a JSON array; entries are not inspected.
    pub fn from_body(body: impl Into<String>) -> Result<Self, ApiError> {
        let body = body.into();
        let entries: Vec<Value> = serde_json::from_str(&body)
            .map_err(|e| ApiError::DeserializationError(e.to_string()))?;
        Ok(Self { body, entries })
    }

    /// The body exactly as the server sent it.
    pub fn as_str(&self) -> &str {
        &self.body
    }

    pub fn into_body(self) -> String {
        self.body
    }

    pub fn entries(&self) -> &[Value] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Body of an upload request: `{"data": ...}`.
#[derive(Debug, Serialize)]
pub struct UploadBody<'a, T: ?Sized> {
    pub data: &'a T,
}

/// Body of a create-directory request: `{"uuid": ...}`.
#[derive(Debug, Serialize)]
pub struct CreateDirectoryBody<'a> {
    pub uuid: &'a str,
}

/// Body of a save-file request: `{"project": {...}}`.
#[derive(Debug, Serialize)]
pub struct SaveProjectBody<'a> {
    pub project: &'a ProjectDescriptor,
}

/// Check that `uuid` can be used as a single URL path segment.
pub fn validate_uuid(uuid: &str) -> Result<(), ApiError> {
    if uuid.is_empty() {
        return Err(ApiError::InvalidInput("project uuid is empty".to_string()));
    }
    if let Some(bad) = uuid
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(ApiError::InvalidInput(format!(
            "project uuid {uuid:?} contains {bad:?}"
        )));
    }
    Ok(())
}
