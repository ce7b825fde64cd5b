//! SQLite-backed document store.
//!
//! Stores schema-flexible documents in a single table:
//! ```text
//! documents(collection, id, data JSON, created_at µs, updated_at µs)
//! ```
//!
//! The store owns every timestamp: both are stamped on insert and
//! `updated_at` is re-stamped on every write, never moving backwards
//! for a given document. Each committed write is announced on the
//! [`ChangeHub`] so live feeds can re-run their queries.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::hub::{ChangeEvent, ChangeHub};
use super::query::{json_path, Query};
use crate::error::{BackendError, StoreError};

/// Maximum number of writes committed in one batch.
pub const MAX_BATCH_WRITES: usize = 500;

/// A stored document before it is given a shape.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub fields: Map<String, Value>,
}

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: String,
    data: String,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<DocumentRow> for RawDocument {
    type Error = StoreError;

    fn try_from(row: DocumentRow) -> Result<Self, Self::Error> {
        let fields: Map<String, Value> = serde_json::from_str(&row.data)?;
        Ok(RawDocument {
            created_at: from_micros(&row.id, row.created_at)?,
            updated_at: from_micros(&row.id, row.updated_at)?,
            id: row.id,
            fields,
        })
    }
}

fn from_micros(id: &str, micros: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_micros(micros).ok_or_else(|| {
        BackendError::internal(format!("Corrupt timestamp {} on document {}", micros, id)).into()
    })
}

/// One write of a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    /// Insert a new document; fails if the id is taken.
    Create { id: String, fields: Map<String, Value> },
    /// Create or overwrite a document's fields, keeping its creation time.
    Set { id: String, fields: Map<String, Value> },
    /// Merge fields into an existing document; fails if it is missing.
    Update { id: String, fields: Map<String, Value> },
    /// Remove a document; missing documents are not an error.
    Delete { id: String },
}

impl Write {
    pub fn id(&self) -> &str {
        match self {
            Write::Create { id, .. }
            | Write::Set { id, .. }
            | Write::Update { id, .. }
            | Write::Delete { id } => id,
        }
    }
}

/// Handle to the document database. Cheap to clone.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    pool: SqlitePool,
    hub: Arc<ChangeHub>,
}

impl DocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            hub: Arc::new(ChangeHub::new()),
        }
    }

    /// Generates a fresh document id.
    pub fn new_id() -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// Receives an event for every committed write to `collection`.
    pub fn watch(&self, collection: &str) -> broadcast::Receiver<ChangeEvent> {
        self.hub.subscribe(collection)
    }

    /// Loads a single document.
    pub async fn get(&self, collection: &str, id: &str) -> Result<Option<RawDocument>, StoreError> {
        let row: Option<DocumentRow> = sqlx::query_as(
            "SELECT id, data, created_at, updated_at FROM documents WHERE collection = ? AND id = ?",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(RawDocument::try_from).transpose()
    }

    /// Runs a compiled query against a collection.
    pub async fn query(&self, collection: &str, query: &Query) -> Result<Vec<RawDocument>, StoreError> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT id, data, created_at, updated_at FROM documents WHERE collection = ",
        );
        qb.push_bind(collection.to_string());
        query.push_sql(&mut qb)?;

        let rows: Vec<DocumentRow> = qb.build_query_as().fetch_all(&self.pool).await?;

        rows.into_iter().map(RawDocument::try_from).collect()
    }

    /// Applies writes atomically: either all of them land or none do.
    pub async fn commit(&self, collection: &str, writes: Vec<Write>) -> Result<(), StoreError> {
        if writes.is_empty() {
            return Ok(());
        }
        if writes.len() > MAX_BATCH_WRITES {
            return Err(StoreError::validation(format!(
                "A batch may contain at most {} writes, got {}",
                MAX_BATCH_WRITES,
                writes.len()
            )));
        }

        let now = Utc::now().timestamp_micros();
        let mut tx = self.pool.begin().await?;

        for write in &writes {
            apply_write(&mut *tx, collection, write, now).await?;
        }

        tx.commit().await?;

        tracing::debug!("Committed {} write(s) to {}", writes.len(), collection);

        self.hub.publish(ChangeEvent {
            collection: collection.to_string(),
            ids: writes.iter().map(|w| w.id().to_string()).collect(),
        });

        Ok(())
    }
}

async fn apply_write(
    conn: &mut SqliteConnection,
    collection: &str,
    write: &Write,
    now: i64,
) -> Result<(), StoreError> {
    match write {
        Write::Create { id, fields } => {
            sqlx::query(
                r#"
                INSERT INTO documents (collection, id, data, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(collection)
            .bind(id)
            .bind(Value::Object(fields.clone()).to_string())
            .bind(now)
            .bind(now)
            .execute(&mut *conn)
            .await?;
        }

        Write::Set { id, fields } => {
            sqlx::query(
                r#"
                INSERT INTO documents (collection, id, data, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT (collection, id) DO UPDATE
                SET data = excluded.data,
                    updated_at = MAX(excluded.updated_at, documents.updated_at + 1)
                "#,
            )
            .bind(collection)
            .bind(id)
            .bind(Value::Object(fields.clone()).to_string())
            .bind(now)
            .bind(now)
            .execute(&mut *conn)
            .await?;
        }

        Write::Update { id, fields } => {
            // Stamp first so the transaction holds the write lock before reading.
            let result = sqlx::query(
                r#"
                UPDATE documents SET updated_at = MAX(?, updated_at + 1)
                WHERE collection = ? AND id = ?
                "#,
            )
            .bind(now)
            .bind(collection)
            .bind(id)
            .execute(&mut *conn)
            .await?;

            if result.rows_affected() == 0 {
                return Err(BackendError::not_found(format!(
                    "No document to update: {}/{}",
                    collection, id
                ))
                .into());
            }

            if fields.is_empty() {
                return Ok(());
            }

            let data: String =
                sqlx::query_scalar("SELECT data FROM documents WHERE collection = ? AND id = ?")
                    .bind(collection)
                    .bind(id)
                    .fetch_one(&mut *conn)
                    .await?;
            let mut merged: Map<String, Value> = serde_json::from_str(&data)?;

            for (field, value) in fields {
                json_path(field)?;
                set_path(&mut merged, field, value.clone());
            }

            sqlx::query("UPDATE documents SET data = ? WHERE collection = ? AND id = ?")
                .bind(Value::Object(merged).to_string())
                .bind(collection)
                .bind(id)
                .execute(&mut *conn)
                .await?;
        }

        Write::Delete { id } => {
            sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
                .bind(collection)
                .bind(id)
                .execute(&mut *conn)
                .await?;
        }
    }

    Ok(())
}

/// Sets a dotted field path, creating intermediate maps and replacing
/// any non-map value found along the way.
fn set_path(fields: &mut Map<String, Value>, path: &str, value: Value) {
    let (parents, leaf) = match path.rsplit_once('.') {
        Some((parents, leaf)) => (Some(parents), leaf),
        None => (None, path),
    };

    let mut target = fields;
    for segment in parents.into_iter().flat_map(|p| p.split('.')) {
        let slot = target
            .entry(segment)
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        let Value::Object(next) = slot else {
            return;
        };
        target = next;
    }

    target.insert(leaf.to_string(), value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_db, Constraint, Direction};
    use serde_json::json;
    use tempfile::TempDir;

    struct TestContext {
        store: DocumentStore,
        _temp_dir: TempDir,
    }

    async fn setup_store() -> TestContext {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_db(&temp_dir.path().join("test.db")).await.unwrap();
        TestContext {
            store: DocumentStore::new(pool),
            _temp_dir: temp_dir,
        }
    }

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    async fn create(store: &DocumentStore, id: &str, value: Value) {
        store
            .commit(
                "items",
                vec![Write::Create {
                    id: id.to_string(),
                    fields: fields(value),
                }],
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let ctx = setup_store().await;
        create(&ctx.store, "a", json!({"name": "first", "n": 1})).await;

        let doc = ctx.store.get("items", "a").await.unwrap().unwrap();
        assert_eq!(doc.id, "a");
        assert_eq!(doc.fields["name"], "first");
        assert_eq!(doc.created_at, doc.updated_at);

        assert!(ctx.store.get("other", "a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_duplicate_id_fails() {
        let ctx = setup_store().await;
        create(&ctx.store, "a", json!({})).await;

        let err = ctx
            .store
            .commit(
                "items",
                vec![Write::Create {
                    id: "a".into(),
                    fields: Map::new(),
                }],
            )
            .await
            .unwrap_err();
        assert_eq!(err.backend_code(), Some(crate::BackendCode::AlreadyExists));
    }

    #[tokio::test]
    async fn test_update_merges_fields_and_restamps() {
        let ctx = setup_store().await;
        create(&ctx.store, "a", json!({"name": "first", "n": 1})).await;
        let before = ctx.store.get("items", "a").await.unwrap().unwrap();

        ctx.store
            .commit(
                "items",
                vec![Write::Update {
                    id: "a".into(),
                    fields: fields(json!({"n": 2, "done": true, "note": null})),
                }],
            )
            .await
            .unwrap();

        let after = ctx.store.get("items", "a").await.unwrap().unwrap();
        assert_eq!(after.fields["name"], "first");
        assert_eq!(after.fields["n"], 2);
        assert_eq!(after.fields["done"], true);
        assert_eq!(after.fields["note"], Value::Null);
        assert_eq!(after.created_at, before.created_at);
        assert!(after.updated_at > before.updated_at);
    }

    #[tokio::test]
    async fn test_update_nested_path_replaces_scalar_parent() {
        let ctx = setup_store().await;
        create(&ctx.store, "a", json!({"a": "str", "x": 1})).await;
        create(&ctx.store, "b", json!({"x": 1})).await;
        create(&ctx.store, "c", json!({"a": {"keep": true}})).await;

        for id in ["a", "b", "c"] {
            ctx.store
                .commit(
                    "items",
                    vec![Write::Update {
                        id: id.into(),
                        fields: fields(json!({"a.b": 1})),
                    }],
                )
                .await
                .unwrap();
        }

        let a = ctx.store.get("items", "a").await.unwrap().unwrap();
        assert_eq!(Value::Object(a.fields), json!({"a": {"b": 1}, "x": 1}));

        let b = ctx.store.get("items", "b").await.unwrap().unwrap();
        assert_eq!(Value::Object(b.fields), json!({"a": {"b": 1}, "x": 1}));

        let c = ctx.store.get("items", "c").await.unwrap().unwrap();
        assert_eq!(Value::Object(c.fields), json!({"a": {"b": 1, "keep": true}}));
    }

    #[test]
    fn test_set_path_walks_and_overwrites() {
        let mut doc = fields(json!({"a": {"b": 5}, "n": [1, 2]}));

        set_path(&mut doc, "a.b.c", json!("deep"));
        set_path(&mut doc, "n.first", json!(1));
        set_path(&mut doc, "top", json!(true));

        assert_eq!(
            Value::Object(doc),
            json!({"a": {"b": {"c": "deep"}}, "n": {"first": 1}, "top": true})
        );
    }

    #[tokio::test]
    async fn test_update_missing_document_is_not_found() {
        let ctx = setup_store().await;

        let err = ctx
            .store
            .commit(
                "items",
                vec![Write::Update {
                    id: "ghost".into(),
                    fields: Map::new(),
                }],
            )
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert!(err.to_string().contains("items/ghost"));
    }

    #[tokio::test]
    async fn test_set_keeps_created_at() {
        let ctx = setup_store().await;
        create(&ctx.store, "a", json!({"name": "first", "n": 1})).await;
        let before = ctx.store.get("items", "a").await.unwrap().unwrap();

        ctx.store
            .commit(
                "items",
                vec![Write::Set {
                    id: "a".into(),
                    fields: fields(json!({"name": "replaced"})),
                }],
            )
            .await
            .unwrap();

        let after = ctx.store.get("items", "a").await.unwrap().unwrap();
        assert_eq!(after.fields.len(), 1);
        assert_eq!(after.fields["name"], "replaced");
        assert_eq!(after.created_at, before.created_at);
        assert!(after.updated_at > before.updated_at);
    }

    #[tokio::test]
    async fn test_delete_missing_is_noop() {
        let ctx = setup_store().await;
        ctx.store
            .commit("items", vec![Write::Delete { id: "ghost".into() }])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_batch_is_atomic() {
        let ctx = setup_store().await;
        create(&ctx.store, "a", json!({"n": 1})).await;

        let result = ctx
            .store
            .commit(
                "items",
                vec![
                    Write::Update {
                        id: "a".into(),
                        fields: fields(json!({"n": 99})),
                    },
                    Write::Update {
                        id: "missing".into(),
                        fields: fields(json!({"n": 5})),
                    },
                ],
            )
            .await;
        assert!(result.is_err());

        let doc = ctx.store.get("items", "a").await.unwrap().unwrap();
        assert_eq!(doc.fields["n"], 1);
    }

    #[tokio::test]
    async fn test_oversized_batch_rejected() {
        let ctx = setup_store().await;
        let writes = (0..=MAX_BATCH_WRITES)
            .map(|i| Write::Delete { id: i.to_string() })
            .collect();

        let err = ctx.store.commit("items", writes).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn test_query_filters_and_orders() {
        let ctx = setup_store().await;
        create(&ctx.store, "a", json!({"owner": "u1", "rank": 2})).await;
        create(&ctx.store, "b", json!({"owner": "u1", "rank": 1})).await;
        create(&ctx.store, "c", json!({"owner": "u2", "rank": 3})).await;
        create(&ctx.store, "d", json!({"owner": "u1"})).await;

        let query = Query::compile(&[
            Constraint::eq("owner", "u1"),
            Constraint::order_by("rank", Direction::Desc),
        ])
        .unwrap();
        let docs = ctx.store.query("items", &query).await.unwrap();

        // "d" has no rank and is excluded by the ordering
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_query_bool_and_null_filters() {
        let ctx = setup_store().await;
        create(&ctx.store, "a", json!({"done": true, "note": null})).await;
        create(&ctx.store, "b", json!({"done": false, "note": "x"})).await;
        create(&ctx.store, "c", json!({"done": true})).await;

        let done = Query::compile(&[Constraint::eq("done", true)]).unwrap();
        let ids: Vec<String> = ctx
            .store
            .query("items", &done)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["a", "c"]);

        let null_note = Query::compile(&[Constraint::eq("note", Value::Null)]).unwrap();
        let docs = ctx.store.query("items", &null_note).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "a");
    }

    #[tokio::test]
    async fn test_query_start_after_cursor() {
        let ctx = setup_store().await;
        for (id, rank) in [("a", 1), ("b", 2), ("c", 2), ("d", 3)] {
            create(&ctx.store, id, json!({ "rank": rank })).await;
        }

        let query = Query::compile(&[Constraint::order_by("rank", Direction::Asc)]).unwrap();
        let first = ctx.store.query("items", &query.clone().with_limit(2)).await.unwrap();
        assert_eq!(first[1].id, "b");

        let cursor = query.cursor_after(&first[1]);
        let rest = ctx
            .store
            .query("items", &query.with_start_after(Some(cursor)))
            .await
            .unwrap();
        let ids: Vec<&str> = rest.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "d"]);
    }

    #[tokio::test]
    async fn test_commit_publishes_change() {
        let ctx = setup_store().await;
        let mut rx = ctx.store.watch("items");

        create(&ctx.store, "a", json!({})).await;

        let event = rx.try_recv().unwrap();
        assert_eq!(event.collection, "items");
        assert_eq!(event.ids, vec!["a"]);
    }

    #[tokio::test]
    async fn test_empty_commit_is_noop() {
        let ctx = setup_store().await;
        let mut rx = ctx.store.watch("items");

        ctx.store.commit("items", Vec::new()).await.unwrap();
        assert!(rx.try_recv().is_err());
    }
}
