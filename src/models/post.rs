use serde::{Deserialize, Serialize};

use crate::db::{Constraint, Direction, CREATED_AT_FIELD};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub title: String,
    pub content: String,
    pub author_id: String,
    pub author_name: String,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub likes: i64,
}

impl Post {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        author_id: impl Into<String>,
        author_name: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            author_id: author_id.into(),
            author_name: author_name.into(),
            published: false,
            tags: Vec::new(),
            likes: 0,
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Published posts, newest first.
    pub fn published_feed() -> Vec<Constraint> {
        vec![
            Constraint::eq("published", true),
            Constraint::order_by(CREATED_AT_FIELD, Direction::Desc),
        ]
    }
}
