use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::marker::PhantomData;
use std::sync::Arc;

use super::document::{Document, Page};
use super::patch::Patch;
use super::subscription::{next_change, Subscription};
use crate::db::{
    Constraint, Cursor, DocumentStore, Query, RawDocument, Write, CREATED_AT_FIELD,
    UPDATED_AT_FIELD,
};
use crate::error::StoreError;

/// CRUD, query and live-feed access to one collection, typed as `T`.
///
/// `T` is the caller's payload shape without id or timestamps; reads
/// return it wrapped in [`Document`]. Every failure is logged with the
/// collection name and then returned unchanged.
pub struct DocumentService<T> {
    store: DocumentStore,
    collection: Arc<str>,
    _shape: PhantomData<fn() -> T>,
}

impl<T> Clone for DocumentService<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            collection: self.collection.clone(),
            _shape: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for DocumentService<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentService")
            .field("collection", &self.collection)
            .finish()
    }
}

impl<T> DocumentService<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(store: DocumentStore, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: Arc::from(collection.into()),
            _shape: PhantomData,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Inserts a new document and returns its generated id.
    pub async fn create(&self, payload: &T) -> Result<String, StoreError> {
        let result: Result<String, StoreError> = async {
            let id = DocumentStore::new_id();
            let fields = to_fields(payload)?;
            self.store
                .commit(&self.collection, vec![Write::Create { id: id.clone(), fields }])
                .await?;
            Ok(id)
        }
        .await;

        result.inspect_err(|e| {
            tracing::error!("Error creating document in {}: {}", self.collection, e)
        })
    }

    /// Writes a document at a chosen id, replacing its fields if it
    /// already exists. The creation time of an existing document is kept.
    pub async fn set(&self, id: &str, payload: &T) -> Result<(), StoreError> {
        let result: Result<(), StoreError> = async {
            check_id(id)?;
            let fields = to_fields(payload)?;
            self.store
                .commit(
                    &self.collection,
                    vec![Write::Set {
                        id: id.to_string(),
                        fields,
                    }],
                )
                .await
        }
        .await;

        result.inspect_err(|e| {
            tracing::error!("Error setting document {} in {}: {}", id, self.collection, e)
        })
    }

    /// Loads a document. Absence is `Ok(None)`, never an error.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Document<T>>, StoreError> {
        let result: Result<Option<Document<T>>, StoreError> = async {
            check_id(id)?;
            self.store
                .get(&self.collection, id)
                .await?
                .map(Document::from_raw)
                .transpose()
        }
        .await;

        result.inspect_err(|e| {
            tracing::error!(
                "Error getting document {} from {}: {}",
                id,
                self.collection,
                e
            )
        })
    }

    /// Applies a partial update and re-stamps `updatedAt`.
    ///
    /// Fails with a not-found backend error if the document is missing.
    pub async fn update(&self, id: &str, patch: Patch) -> Result<(), StoreError> {
        let result: Result<(), StoreError> = async {
            check_id(id)?;
            let fields = patch.into_fields()?;
            self.store
                .commit(
                    &self.collection,
                    vec![Write::Update {
                        id: id.to_string(),
                        fields,
                    }],
                )
                .await
        }
        .await;

        result.inspect_err(|e| {
            tracing::error!(
                "Error updating document {} in {}: {}",
                id,
                self.collection,
                e
            )
        })
    }

    /// Deletes a document. No existence check is made first; deleting a
    /// missing id succeeds.
    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let result: Result<(), StoreError> = async {
            check_id(id)?;
            self.store
                .commit(&self.collection, vec![Write::Delete { id: id.to_string() }])
                .await
        }
        .await;

        result.inspect_err(|e| {
            tracing::error!(
                "Error deleting document {} from {}: {}",
                id,
                self.collection,
                e
            )
        })
    }

    /// Returns every document matching the constraints, in the order
    /// they impose (by id when no ordering is given).
    pub async fn get_all(&self, constraints: &[Constraint]) -> Result<Vec<Document<T>>, StoreError> {
        let result: Result<Vec<Document<T>>, StoreError> = async {
            let query = Query::compile(constraints)?;
            let raws = self.store.query(&self.collection, &query).await?;
            to_documents(raws)
        }
        .await;

        result.inspect_err(|e| {
            tracing::error!("Error getting documents from {}: {}", self.collection, e)
        })
    }

    /// Returns up to `page_size` documents after `cursor`.
    ///
    /// One extra row is fetched to learn whether another page exists, so
    /// the returned cursor is `None` exactly on the last page.
    pub async fn get_paginated(
        &self,
        constraints: &[Constraint],
        page_size: usize,
        cursor: Option<Cursor>,
    ) -> Result<Page<T>, StoreError> {
        let result: Result<Page<T>, StoreError> = async {
            if page_size == 0 {
                return Err(StoreError::validation("Page size must be at least 1"));
            }

            let query = Query::compile(constraints)?
                .with_limit(page_size + 1)
                .with_start_after(cursor);
            let mut raws = self.store.query(&self.collection, &query).await?;

            let next = if raws.len() > page_size {
                raws.truncate(page_size);
                raws.last().map(|last| query.cursor_after(last))
            } else {
                None
            };

            Ok(Page {
                data: to_documents(raws)?,
                cursor: next,
            })
        }
        .await;

        result.inspect_err(|e| {
            tracing::error!(
                "Error getting paginated documents from {}: {}",
                self.collection,
                e
            )
        })
    }

    /// Opens a live feed over a query.
    ///
    /// `on_update` receives the full matching result set: once right
    /// away, then after every write that changes it. `on_error` is called
    /// at most once, after which the feed stops. Must be called from
    /// within a Tokio runtime.
    pub fn subscribe<U, E>(&self, constraints: &[Constraint], mut on_update: U, mut on_error: E) -> Subscription
    where
        T: Send + 'static,
        U: FnMut(Vec<Document<T>>) + Send + 'static,
        E: FnMut(StoreError) + Send + 'static,
    {
        // Listen before the first read so no write falls in between
        let mut changes = self.store.watch(&self.collection);
        let service = self.clone();
        let query = Query::compile(constraints);

        let task = tokio::spawn(async move {
            let query = match query {
                Ok(query) => query,
                Err(e) => return service.fail_feed(None, e, &mut on_error),
            };

            let mut last: Option<Vec<RawDocument>> = None;
            loop {
                let raws = match service.store.query(&service.collection, &query).await {
                    Ok(raws) => raws,
                    Err(e) => return service.fail_feed(None, e, &mut on_error),
                };

                if last.as_ref() != Some(&raws) {
                    match to_documents(raws.clone()) {
                        Ok(docs) => on_update(docs),
                        Err(e) => return service.fail_feed(None, e, &mut on_error),
                    }
                    last = Some(raws);
                }

                if !next_change(&mut changes, None).await {
                    return;
                }
            }
        });

        Subscription::new(task)
    }

    /// Opens a live feed on one document. `on_update(None)` means the
    /// document does not exist (or was deleted).
    pub fn subscribe_to_doc<U, E>(&self, id: &str, mut on_update: U, mut on_error: E) -> Subscription
    where
        T: Send + 'static,
        U: FnMut(Option<Document<T>>) + Send + 'static,
        E: FnMut(StoreError) + Send + 'static,
    {
        let mut changes = self.store.watch(&self.collection);
        let service = self.clone();
        let id = id.to_string();

        let task = tokio::spawn(async move {
            if let Err(e) = check_id(&id) {
                return service.fail_feed(Some(&id), e, &mut on_error);
            }

            let mut last: Option<Option<RawDocument>> = None;
            loop {
                let raw = match service.store.get(&service.collection, &id).await {
                    Ok(raw) => raw,
                    Err(e) => return service.fail_feed(Some(&id), e, &mut on_error),
                };

                if last.as_ref() != Some(&raw) {
                    match raw.clone().map(Document::from_raw).transpose() {
                        Ok(doc) => on_update(doc),
                        Err(e) => return service.fail_feed(Some(&id), e, &mut on_error),
                    }
                    last = Some(raw);
                }

                if !next_change(&mut changes, Some(&id)).await {
                    return;
                }
            }
        });

        Subscription::new(task)
    }

    fn fail_feed<E>(&self, id: Option<&str>, error: StoreError, on_error: &mut E)
    where
        E: FnMut(StoreError),
    {
        match id {
            Some(id) => tracing::error!(
                "Error in real-time subscription for document {} in {}: {}",
                id,
                self.collection,
                error
            ),
            None => tracing::error!(
                "Error in real-time subscription for {}: {}",
                self.collection,
                error
            ),
        }
        on_error(error);
    }

    /// Inserts all items in one atomic write. Returns ids in input order.
    pub async fn batch_create(&self, items: &[T]) -> Result<Vec<String>, StoreError> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let result: Result<Vec<String>, StoreError> = async {
            let mut ids = Vec::with_capacity(items.len());
            let mut writes = Vec::with_capacity(items.len());
            for item in items {
                let id = DocumentStore::new_id();
                writes.push(Write::Create {
                    id: id.clone(),
                    fields: to_fields(item)?,
                });
                ids.push(id);
            }

            self.store.commit(&self.collection, writes).await?;
            Ok(ids)
        }
        .await;

        result.inspect_err(|e| {
            tracing::error!(
                "Error batch creating documents in {}: {}",
                self.collection,
                e
            )
        })
    }

    /// Applies all patches in one atomic write; a missing id fails the
    /// whole batch.
    pub async fn batch_update(&self, updates: Vec<(String, Patch)>) -> Result<(), StoreError> {
        if updates.is_empty() {
            return Ok(());
        }

        let result: Result<(), StoreError> = async {
            let mut writes = Vec::with_capacity(updates.len());
            for (id, patch) in updates {
                check_id(&id)?;
                writes.push(Write::Update {
                    id,
                    fields: patch.into_fields()?,
                });
            }

            self.store.commit(&self.collection, writes).await
        }
        .await;

        result.inspect_err(|e| {
            tracing::error!(
                "Error batch updating documents in {}: {}",
                self.collection,
                e
            )
        })
    }

    /// Deletes all ids in one atomic write.
    pub async fn batch_delete(&self, ids: &[String]) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }

        let result: Result<(), StoreError> = async {
            let mut writes = Vec::with_capacity(ids.len());
            for id in ids {
                check_id(id)?;
                writes.push(Write::Delete { id: id.clone() });
            }

            self.store.commit(&self.collection, writes).await
        }
        .await;

        result.inspect_err(|e| {
            tracing::error!(
                "Error batch deleting documents from {}: {}",
                self.collection,
                e
            )
        })
    }
}

fn check_id(id: &str) -> Result<(), StoreError> {
    if id.is_empty() || id.contains('/') {
        return Err(StoreError::validation(format!(
            "Invalid document id: {:?}",
            id
        )));
    }
    Ok(())
}

/// Serializes a payload, dropping the store-owned id and timestamps.
fn to_fields<T: Serialize>(payload: &T) -> Result<Map<String, Value>, StoreError> {
    match serde_json::to_value(payload)? {
        Value::Object(mut fields) => {
            for key in ["id", CREATED_AT_FIELD, UPDATED_AT_FIELD] {
                fields.remove(key);
            }
            Ok(fields)
        }
        other => Err(StoreError::validation(format!(
            "A document payload must be an object, got {}",
            other
        ))),
    }
}

fn to_documents<T: DeserializeOwned>(raws: Vec<RawDocument>) -> Result<Vec<Document<T>>, StoreError> {
    raws.into_iter().map(Document::from_raw).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_db, Direction, FilterOp};
    use serde::Deserialize;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Task {
        title: String,
        done: bool,
        rank: i64,
    }

    fn task(title: &str, rank: i64) -> Task {
        Task {
            title: title.to_string(),
            done: false,
            rank,
        }
    }

    struct TestContext {
        tasks: DocumentService<Task>,
        _temp_dir: TempDir,
    }

    async fn setup_service() -> TestContext {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_db(&temp_dir.path().join("test.db")).await.unwrap();
        TestContext {
            tasks: DocumentService::new(DocumentStore::new(pool), "tasks"),
            _temp_dir: temp_dir,
        }
    }

    async fn recv<V>(rx: &mut mpsc::UnboundedReceiver<V>) -> V {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("feed did not deliver in time")
            .expect("feed closed")
    }

    #[tokio::test]
    async fn test_create_then_get_echoes_fields() {
        let ctx = setup_service().await;

        let id = ctx.tasks.create(&task("write tests", 1)).await.unwrap();
        let doc = ctx.tasks.get_by_id(&id).await.unwrap().unwrap();

        assert_eq!(doc.id, id);
        assert_eq!(doc.data, task("write tests", 1));
        assert_eq!(doc.created_at, doc.updated_at);
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let ctx = setup_service().await;
        assert!(ctx.tasks.get_by_id("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_id_is_validation_error() {
        let ctx = setup_service().await;
        let err = ctx.tasks.get_by_id("a/b").await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_reflects_field_and_advances_updated_at() {
        let ctx = setup_service().await;
        let id = ctx.tasks.create(&task("a", 1)).await.unwrap();
        let before = ctx.tasks.get_by_id(&id).await.unwrap().unwrap();

        ctx.tasks
            .update(&id, Patch::new().set("done", true))
            .await
            .unwrap();

        let after = ctx.tasks.get_by_id(&id).await.unwrap().unwrap();
        assert!(after.done);
        assert_eq!(after.title, "a");
        assert_eq!(after.created_at, before.created_at);
        assert!(after.updated_at > before.updated_at);
    }

    #[tokio::test]
    async fn test_empty_patch_still_restamps() {
        let ctx = setup_service().await;
        let id = ctx.tasks.create(&task("a", 1)).await.unwrap();
        let before = ctx.tasks.get_by_id(&id).await.unwrap().unwrap();

        ctx.tasks.update(&id, Patch::new()).await.unwrap();

        let after = ctx.tasks.get_by_id(&id).await.unwrap().unwrap();
        assert!(after.updated_at > before.updated_at);
    }

    #[tokio::test]
    async fn test_update_missing_surfaces_backend_error() {
        let ctx = setup_service().await;

        let err = ctx
            .tasks
            .update("ghost", Patch::new().set("done", true))
            .await
            .unwrap_err();

        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_then_get_is_none() {
        let ctx = setup_service().await;
        let id = ctx.tasks.create(&task("a", 1)).await.unwrap();

        ctx.tasks.delete(&id).await.unwrap();
        assert!(ctx.tasks.get_by_id(&id).await.unwrap().is_none());

        // Deleting again is accepted by the store
        ctx.tasks.delete(&id).await.unwrap();
    }

    #[tokio::test]
    async fn test_set_at_explicit_id() {
        let ctx = setup_service().await;

        ctx.tasks.set("anonymous", &task("counter", 0)).await.unwrap();
        ctx.tasks.set("anonymous", &task("counter", 5)).await.unwrap();

        let doc = ctx.tasks.get_by_id("anonymous").await.unwrap().unwrap();
        assert_eq!(doc.rank, 5);
    }

    #[tokio::test]
    async fn test_get_all_with_constraints() {
        let ctx = setup_service().await;
        ctx.tasks.create(&task("b", 2)).await.unwrap();
        ctx.tasks.create(&task("a", 1)).await.unwrap();
        ctx.tasks.create(&task("c", 3)).await.unwrap();

        let docs = ctx
            .tasks
            .get_all(&[
                Constraint::filter("rank", FilterOp::Gte, 2),
                Constraint::order_by("rank", Direction::Desc),
            ])
            .await
            .unwrap();

        let titles: Vec<&str> = docs.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["c", "b"]);
    }

    #[tokio::test]
    async fn test_get_all_invalid_field_is_validation_error() {
        let ctx = setup_service().await;
        let err = ctx
            .tasks
            .get_all(&[Constraint::eq("not a field", 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn test_paginate_two_pages() {
        let ctx = setup_service().await;
        for rank in 0..5 {
            ctx.tasks.create(&task(&format!("t{}", rank), rank)).await.unwrap();
        }
        let order = [Constraint::order_by("rank", Direction::Asc)];

        let first = ctx.tasks.get_paginated(&order, 3, None).await.unwrap();
        assert_eq!(first.data.len(), 3);
        assert!(first.has_more());

        let second = ctx
            .tasks
            .get_paginated(&order, 3, first.cursor.clone())
            .await
            .unwrap();
        let ranks: Vec<i64> = second.data.iter().map(|d| d.rank).collect();
        assert_eq!(ranks, vec![3, 4]);
        assert!(second.cursor.is_none());
    }

    #[tokio::test]
    async fn test_paginate_exact_multiple_ends_without_cursor() {
        let ctx = setup_service().await;
        for rank in 0..4 {
            ctx.tasks.create(&task("t", rank)).await.unwrap();
        }
        let order = [Constraint::order_by("rank", Direction::Desc)];

        let first = ctx.tasks.get_paginated(&order, 2, None).await.unwrap();
        let second = ctx
            .tasks
            .get_paginated(&order, 2, first.cursor)
            .await
            .unwrap();

        assert_eq!(second.data.len(), 2);
        assert_eq!(second.data[1].rank, 0);
        assert!(second.cursor.is_none());
    }

    #[tokio::test]
    async fn test_paginate_zero_page_size_rejected() {
        let ctx = setup_service().await;
        let err = ctx.tasks.get_paginated(&[], 0, None).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn test_subscribe_delivers_full_snapshots() {
        let ctx = setup_service().await;
        ctx.tasks.create(&task("existing", 1)).await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = ctx.tasks.subscribe(
            &[Constraint::order_by("rank", Direction::Asc)],
            move |docs| {
                let _ = tx.send(docs);
            },
            |e| panic!("unexpected feed error: {}", e),
        );

        let initial = recv(&mut rx).await;
        assert_eq!(initial.len(), 1);

        let id = ctx.tasks.create(&task("new", 2)).await.unwrap();

        let next = recv(&mut rx).await;
        assert_eq!(next.len(), 2);
        assert!(next.iter().any(|d| d.id == id && d.title == "new"));

        sub.unsubscribe();
    }

    #[tokio::test]
    async fn test_subscribe_ignores_unrelated_writes() {
        let ctx = setup_service().await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = ctx.tasks.subscribe(
            &[Constraint::eq("done", true)],
            move |docs| {
                let _ = tx.send(docs);
            },
            |_| {},
        );

        assert!(recv(&mut rx).await.is_empty());

        ctx.tasks.create(&task("open", 1)).await.unwrap();
        let quiet = timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(quiet.is_err());

        sub.unsubscribe();
    }

    #[tokio::test]
    async fn test_subscribe_reports_invalid_constraints() {
        let ctx = setup_service().await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = ctx.tasks.subscribe(
            &[Constraint::order_by("bad field", Direction::Asc)],
            |_| panic!("no snapshot expected"),
            move |e| {
                let _ = tx.send(e);
            },
        );

        let err = recv(&mut rx).await;
        assert!(matches!(err, StoreError::Validation(_)));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!sub.is_active());
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let ctx = setup_service().await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = ctx.tasks.subscribe(
            &[],
            move |docs| {
                let _ = tx.send(docs);
            },
            |_| {},
        );
        recv(&mut rx).await;

        sub.unsubscribe();
        ctx.tasks.create(&task("after", 1)).await.unwrap();

        // The sender was dropped with the aborted task
        let next = timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
        assert!(next.is_none());
    }

    #[tokio::test]
    async fn test_subscribe_to_doc_lifecycle() {
        let ctx = setup_service().await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = ctx.tasks.subscribe_to_doc(
            "solo",
            move |doc| {
                let _ = tx.send(doc);
            },
            |e| panic!("unexpected feed error: {}", e),
        );

        assert!(recv(&mut rx).await.is_none());

        ctx.tasks.set("solo", &task("here", 7)).await.unwrap();
        let present = recv(&mut rx).await.unwrap();
        assert_eq!(present.rank, 7);

        ctx.tasks.delete("solo").await.unwrap();
        assert!(recv(&mut rx).await.is_none());

        sub.unsubscribe();
    }

    #[tokio::test]
    async fn test_independent_feeds() {
        let ctx = setup_service().await;

        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let a = ctx.tasks.subscribe(&[], move |d| { let _ = tx_a.send(d.len()); }, |_| {});
        let b = ctx.tasks.subscribe(&[], move |d| { let _ = tx_b.send(d.len()); }, |_| {});
        assert_eq!(recv(&mut rx_a).await, 0);
        assert_eq!(recv(&mut rx_b).await, 0);

        a.unsubscribe();
        ctx.tasks.create(&task("x", 1)).await.unwrap();

        assert_eq!(recv(&mut rx_b).await, 1);
        b.unsubscribe();
    }

    #[tokio::test]
    async fn test_batch_create_returns_ids_in_order() {
        let ctx = setup_service().await;

        let ids = ctx
            .tasks
            .batch_create(&[task("a", 1), task("b", 2)])
            .await
            .unwrap();

        assert_eq!(ids.len(), 2);
        let second = ctx.tasks.get_by_id(&ids[1]).await.unwrap().unwrap();
        assert_eq!(second.title, "b");
    }

    #[tokio::test]
    async fn test_batch_update_is_all_or_nothing() {
        let ctx = setup_service().await;
        let id = ctx.tasks.create(&task("a", 1)).await.unwrap();

        let result = ctx
            .tasks
            .batch_update(vec![
                (id.clone(), Patch::new().set("done", true)),
                ("ghost".to_string(), Patch::new().set("done", true)),
            ])
            .await;
        assert!(result.is_err());

        let doc = ctx.tasks.get_by_id(&id).await.unwrap().unwrap();
        assert!(!doc.done);
    }

    #[tokio::test]
    async fn test_batch_delete() {
        let ctx = setup_service().await;
        let ids = ctx
            .tasks
            .batch_create(&[task("a", 1), task("b", 2), task("c", 3)])
            .await
            .unwrap();

        ctx.tasks.batch_delete(&ids[..2]).await.unwrap();

        let remaining = ctx.tasks.get_all(&[]).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, ids[2]);
    }

    #[tokio::test]
    async fn test_empty_batches_are_noops() {
        let ctx = setup_service().await;

        assert!(ctx.tasks.batch_create(&[]).await.unwrap().is_empty());
        ctx.tasks.batch_update(Vec::new()).await.unwrap();
        ctx.tasks.batch_delete(&[]).await.unwrap();
    }

    #[tokio::test]
    async fn test_payload_metadata_fields_are_ignored() {
        let ctx = setup_service().await;
        let service: DocumentService<serde_json::Value> =
            DocumentService::new(ctx.tasks.store.clone(), "raw");

        let id = service
            .create(&serde_json::json!({"id": "forged", "createdAt": 0, "title": "x"}))
            .await
            .unwrap();

        assert_ne!(id, "forged");
        let doc = service.get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(doc.data, serde_json::json!({"title": "x"}));
    }
}
