use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::ops::{Deref, DerefMut};

use crate::db::{Cursor, RawDocument};
use crate::error::StoreError;

/// A stored document: caller shape plus the store-assigned id and
/// timestamps. Serializes flat, with `id`, `createdAt` and `updatedAt`
/// alongside the shape's own fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document<T> {
    pub id: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub data: T,
}

impl<T: DeserializeOwned> Document<T> {
    pub(crate) fn from_raw(raw: RawDocument) -> Result<Self, StoreError> {
        Ok(Document {
            data: serde_json::from_value(Value::Object(raw.fields))?,
            id: raw.id,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
        })
    }
}

impl<T> Deref for Document<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}

impl<T> DerefMut for Document<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.data
    }
}

/// One page of a paginated listing.
///
/// `cursor` is present exactly when more documents follow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub data: Vec<Document<T>>,
    #[serde(with = "crate::db::cursor_token")]
    pub cursor: Option<Cursor>,
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        self.cursor.is_some()
    }
}
