use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use super::identity::IdentityError;
use crate::error::{BackendCode, StoreError};

/// Error body shared by every JSON endpoint and live feed.
#[derive(Debug, Serialize, PartialEq)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("Sign in required")]
    Unauthorized,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Store(e) => store_status(e),
            ApiError::Identity(IdentityError::Validation(_)) => StatusCode::BAD_REQUEST,
            ApiError::Identity(IdentityError::EmailInUse(_)) => StatusCode::CONFLICT,
            ApiError::Identity(IdentityError::InvalidCredentials) => StatusCode::UNAUTHORIZED,
            ApiError::Identity(IdentityError::Store(e)) => store_status(e),
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn code(&self) -> String {
        match self {
            ApiError::Store(e) | ApiError::Identity(IdentityError::Store(e)) => store_code(e),
            ApiError::Identity(IdentityError::Validation(_)) => "validation".to_string(),
            ApiError::Identity(IdentityError::EmailInUse(_)) => "email-already-in-use".to_string(),
            ApiError::Identity(IdentityError::InvalidCredentials) => {
                "invalid-credentials".to_string()
            }
            ApiError::Unauthorized => "unauthenticated".to_string(),
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.code(),
            message: self.to_string(),
        }
    }
}

fn store_status(error: &StoreError) -> StatusCode {
    match error {
        StoreError::Validation(_) => StatusCode::BAD_REQUEST,
        _ if error.is_not_found() => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn store_code(error: &StoreError) -> String {
    match error {
        StoreError::Validation(_) => "validation".to_string(),
        StoreError::Backend(e) => e.code.to_string(),
        StoreError::Shape(_) => BackendCode::Internal.to_string(),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (status, Json(self.body())).into_response()
    }
}
