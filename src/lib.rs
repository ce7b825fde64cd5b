//! Firestarter Library
//!
//! Generic document access layer over a schema-flexible document store,
//! the demo collections built on it (todos, counters, user profiles) and
//! the HTTP server pieces: route guard, sessions and identity.

pub mod collection;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod server;

pub use collection::{Document, DocumentService, Page, Patch, Subscription};
pub use config::{Config, ConfigError, ConfigSource, ConfigValue};
pub use db::{init_db, Constraint, Cursor, Direction, DocumentStore, FilterOp};
pub use error::{BackendCode, BackendError, StoreError};
pub use models::{Collection, Counter, Post, Todo, UserProfile};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
