//! Generic document access layer.
//!
//! A [`DocumentService`] binds one collection to a document shape `T`
//! and exposes the full create / read / update / delete / query /
//! subscribe contract. Query semantics stay with the store: constraint
//! lists are forwarded as given.

mod document;
mod patch;
mod service;
mod subscription;

pub use document::{Document, Page};
pub use patch::Patch;
pub use service::DocumentService;
pub use subscription::Subscription;
