use serde::Serialize;
use serde_json::value::RawValue;

use crate::error::{CouchError, CouchResult};

/// One extracted document, serialized as an output line.
///
/// Live documents carry their body under `doc`; deleted documents carry
/// `"_deleted": true` instead.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_db")]
    pub db_name: String,
    #[serde(rename = "doc", skip_serializing_if = "Option::is_none")]
    pub body: Option<Box<RawValue>>,
    #[serde(rename = "_deleted", skip_serializing_if = "is_false")]
    pub deleted: bool,
}

fn is_false(v: &bool) -> bool {
    !*v
}

impl Document {
    /// A live document whose body is already rendered JSON.
    pub fn live(id: &[u8], db_name: &str, body: String) -> CouchResult<Self> {
        let body = RawValue::from_string(body).map_err(|e| CouchError::InvalidJson(e.to_string()))?;
        Ok(Self {
            id: document_id(id),
            db_name: db_name.to_string(),
            body: Some(body),
            deleted: false,
        })
    }

    pub fn deleted(id: &[u8], db_name: &str) -> Self {
        Self {
            id: document_id(id),
            db_name: db_name.to_string(),
            body: None,
            deleted: true,
        }
    }

    /// The document as one JSON line, without the newline.
    pub fn to_json_line(&self) -> CouchResult<String> {
        serde_json::to_string(self).map_err(|e| CouchError::InvalidJson(e.to_string()))
    }
}

fn document_id(id: &[u8]) -> String {
    String::from_utf8_lossy(id).trim().to_string()
}
