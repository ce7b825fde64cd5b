use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collection::{DocumentService, Patch};
use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Counter {
    pub user_id: String,
    pub count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl Counter {
    /// Counter id used for callers without a session.
    pub const ANONYMOUS: &'static str = "anonymous";

    /// The counter document id for a caller.
    pub fn id_for(user_id: Option<&str>) -> &str {
        user_id.unwrap_or(Self::ANONYMOUS)
    }

    /// Adds `delta` to the counter at `id`, creating it at `delta` when it
    /// does not exist yet. Returns the new count.
    ///
    /// Read-modify-write: concurrent adjustments may lose an update.
    pub async fn adjust(
        counters: &DocumentService<Counter>,
        id: &str,
        delta: i64,
    ) -> Result<i64, StoreError> {
        let now = Utc::now();
        match counters.get_by_id(id).await? {
            Some(current) => {
                let count = current.count + delta;
                let patch = Patch::new()
                    .set("count", count)
                    .set("lastUpdated", now.to_rfc3339());
                counters.update(id, patch).await?;
                Ok(count)
            }
            None => {
                let counter = Counter {
                    user_id: id.to_string(),
                    count: delta,
                    last_updated: Some(now),
                };
                counters.set(id, &counter).await?;
                Ok(delta)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_db, DocumentStore};
    use tempfile::TempDir;

    struct TestContext {
        counters: DocumentService<Counter>,
        _temp_dir: TempDir,
    }

    async fn setup_counters() -> TestContext {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_db(&temp_dir.path().join("test.db")).await.unwrap();
        TestContext {
            counters: DocumentService::new(DocumentStore::new(pool), "counters"),
            _temp_dir: temp_dir,
        }
    }

    #[test]
    fn test_id_for() {
        assert_eq!(Counter::id_for(Some("u1")), "u1");
        assert_eq!(Counter::id_for(None), "anonymous");
    }

    #[tokio::test]
    async fn test_adjust_creates_then_updates() {
        let ctx = setup_counters().await;

        assert_eq!(Counter::adjust(&ctx.counters, "u1", 1).await.unwrap(), 1);
        assert_eq!(Counter::adjust(&ctx.counters, "u1", 1).await.unwrap(), 2);
        assert_eq!(Counter::adjust(&ctx.counters, "u1", -1).await.unwrap(), 1);

        let doc = ctx.counters.get_by_id("u1").await.unwrap().unwrap();
        assert_eq!(doc.count, 1);
        assert_eq!(doc.user_id, "u1");
        assert!(doc.last_updated.is_some());
    }

    #[tokio::test]
    async fn test_decrement_missing_counter_goes_negative() {
        let ctx = setup_counters().await;

        let count = Counter::adjust(&ctx.counters, Counter::ANONYMOUS, -1)
            .await
            .unwrap();

        assert_eq!(count, -1);
    }
}
