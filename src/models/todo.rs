use serde::{Deserialize, Serialize};
use std::fmt;

use crate::collection::Document;
use crate::db::{Constraint, Direction, CREATED_AT_FIELD};
use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
    pub user_id: String,
}

impl Todo {
    pub fn new(title: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            title: title.into().trim().to_string(),
            description: None,
            completed: false,
            user_id: user_id.into(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        if self.title.trim().is_empty() {
            return Err(StoreError::validation("Todo title must not be empty"));
        }
        Ok(())
    }

    /// A user's todos, newest first.
    pub fn owned_by(user_id: &str) -> Vec<Constraint> {
        vec![
            Constraint::eq("userId", user_id),
            Constraint::order_by(CREATED_AT_FIELD, Direction::Desc),
        ]
    }

    /// Completed and total counts.
    pub fn stats(todos: &[Document<Todo>]) -> (usize, usize) {
        let done = todos.iter().filter(|t| t.completed).count();
        (done, todos.len())
    }
}

impl fmt::Display for Todo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.completed { "x" } else { " " };
        write!(f, "[{}] {}", mark, self.title)?;
        if let Some(description) = &self.description {
            write!(f, " ({})", description)?;
        }
        Ok(())
    }
}
