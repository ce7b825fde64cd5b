//! Error types for the document access layer.
//!
//! Two classes reach callers: [`BackendError`] (anything the document
//! store reports, message text passed through untouched) and
//! validation failures raised before a request reaches the store.

use serde::Serialize;
use thiserror::Error;

/// Failure class reported by the document store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendCode {
    /// The addressed document does not exist.
    NotFound,
    /// A document with the same id already exists.
    AlreadyExists,
    /// The store could not be reached or timed out.
    Unavailable,
    /// Anything else the store rejected.
    Internal,
}

impl std::fmt::Display for BackendCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendCode::NotFound => write!(f, "not-found"),
            BackendCode::AlreadyExists => write!(f, "already-exists"),
            BackendCode::Unavailable => write!(f, "unavailable"),
            BackendCode::Internal => write!(f, "internal"),
        }
    }
}

/// An error raised by the document store.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct BackendError {
    pub code: BackendCode,
    pub message: String,
}

impl BackendError {
    pub fn new(code: BackendCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(BackendCode::NotFound, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(BackendCode::Internal, message)
    }
}

impl From<sqlx::Error> for BackendError {
    fn from(e: sqlx::Error) -> Self {
        let code = match &e {
            sqlx::Error::RowNotFound => BackendCode::NotFound,
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                BackendCode::Unavailable
            }
            sqlx::Error::Database(db) if db.is_unique_violation() => BackendCode::AlreadyExists,
            _ => BackendCode::Internal,
        };
        Self::new(code, e.to_string())
    }
}

/// Errors surfaced by [`crate::DocumentService`] and [`crate::DocumentStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transport, permission or existence failure from the store.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Caller-side input rejected before any store call.
    #[error("{0}")]
    Validation(String),

    /// Stored fields do not fit the requested document shape.
    #[error("Document does not match the expected shape: {0}")]
    Shape(#[from] serde_json::Error),
}

impl StoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        StoreError::Validation(message.into())
    }

    /// Returns the backend failure class, if this came from the store.
    pub fn backend_code(&self) -> Option<BackendCode> {
        match self {
            StoreError::Backend(e) => Some(e.code),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.backend_code() == Some(BackendCode::NotFound)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Backend(e.into())
    }
}
