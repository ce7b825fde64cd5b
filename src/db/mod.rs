//! Document store backend: SQLite pool setup, query translation and the
//! change hub that feeds live subscriptions.

mod hub;
mod query;
mod store;

pub use hub::{ChangeEvent, ChangeHub};
pub use query::{cursor_token, json_path, Constraint, Cursor, Direction, FilterOp, Query};
pub use query::{CREATED_AT_FIELD, ID_FIELD, UPDATED_AT_FIELD};
pub use store::{DocumentStore, RawDocument, Write, MAX_BATCH_WRITES};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and run migrations
pub async fn init_db(path: &Path) -> Result<SqlitePool, sqlx::Error> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite:{}?mode=rwc", path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    tracing::debug!("Opened document database at {}", path.display());

    Ok(pool)
}
