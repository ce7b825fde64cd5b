use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::db::{json_path, CREATED_AT_FIELD, ID_FIELD, UPDATED_AT_FIELD};
use crate::error::StoreError;

/// A partial update: field paths mapped to their new values.
///
/// Keys may be top-level field names or dotted paths into nested maps.
/// `updatedAt` is always re-stamped by the store, so any value given
/// for it is dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Patch(Map<String, Value>);

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets one field.
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Builds a patch from any struct serializing to an object, e.g. one
    /// whose `Option` fields skip serialization when `None`.
    pub fn from_partial<P: Serialize>(partial: &P) -> Result<Self, StoreError> {
        match serde_json::to_value(partial)? {
            Value::Object(fields) => Ok(Patch(fields)),
            other => Err(StoreError::validation(format!(
                "A patch must be an object, got {}",
                other
            ))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Checks field paths and strips store-owned fields.
    pub(crate) fn into_fields(self) -> Result<Map<String, Value>, StoreError> {
        let mut fields = Map::new();

        for (field, value) in self.0 {
            match field.as_str() {
                "id" | ID_FIELD => {
                    return Err(StoreError::validation("A patch cannot change the document id"))
                }
                CREATED_AT_FIELD => {
                    return Err(StoreError::validation(
                        "A patch cannot change the creation time",
                    ))
                }
                UPDATED_AT_FIELD => continue,
                _ => {
                    json_path(&field)?;
                    fields.insert(field, value);
                }
            }
        }

        Ok(fields)
    }
}

impl From<Map<String, Value>> for Patch {
    fn from(fields: Map<String, Value>) -> Self {
        Patch(fields)
    }
}
