use axum::{extract::State, Extension, Json};
use serde::Serialize;

use super::auth::{AuthUser, CurrentUser};
use super::error::ApiError;
use super::AppState;
use crate::models::{Counter, Todo, UserProfile};

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Health check endpoint (no auth required)
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn landing(Extension(CurrentUser(user)): Extension<CurrentUser>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "firestarter",
        "version": env!("CARGO_PKG_VERSION"),
        "signedIn": user.is_some(),
        "links": ["/dashboard", "/auth/login", "/auth/register", "/api/counter"],
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoStats {
    total: usize,
    completed: usize,
}

#[derive(Serialize)]
pub struct Dashboard {
    user: UserProfile,
    todos: TodoStats,
    counter: i64,
}

pub async fn dashboard(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Dashboard>, ApiError> {
    let profile = load_profile(&state, &user).await?;
    let todos = state.todos.get_all(&Todo::owned_by(&user.user_id)).await?;
    let (completed, total) = Todo::stats(&todos);
    let counter = state
        .counters
        .get_by_id(Counter::id_for(Some(user.user_id.as_str())))
        .await?
        .map(|doc| doc.count)
        .unwrap_or(0);

    Ok(Json(Dashboard {
        user: profile,
        todos: TodoStats { total, completed },
        counter,
    }))
}

pub async fn profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserProfile>, ApiError> {
    Ok(Json(load_profile(&state, &user).await?))
}

pub async fn settings(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let profile = load_profile(&state, &user).await?;
    Ok(Json(serde_json::json!({
        "email": profile.email,
        "displayName": profile.display_name,
        "emailVerified": profile.email_verified,
        "sessionTtlMinutes": state.sessions.ttl().as_secs() / 60,
    })))
}

/// Falls back to a bare profile when `users/{uid}` is missing.
async fn load_profile(state: &AppState, user: &AuthUser) -> Result<UserProfile, ApiError> {
    Ok(state
        .identity
        .profile(&user.user_id)
        .await?
        .unwrap_or_else(|| UserProfile::new(&user.user_id, &user.email)))
}
