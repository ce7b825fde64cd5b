use axum::{
    extract::{Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::guard::cookie_value;
use super::sessions::{SessionData, SessionStore};
use super::AppState;
use crate::models::UserProfile;

/// Authenticated user info, added to request extensions by [`require_user`].
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
}

/// The session behind a request, if any. Always present in request
/// extensions once [`identify`] has run.
#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<AuthUser>);

/// Candidate session tokens: the cookie first, then a Bearer header.
fn session_tokens<'a>(
    headers: &'a HeaderMap,
    cookie_name: &str,
) -> impl Iterator<Item = &'a str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    cookie_value(headers, cookie_name).into_iter().chain(bearer)
}

/// The first candidate token that names a live session. A stale cookie
/// does not hide a valid Bearer token.
fn live_session(sessions: &SessionStore, headers: &HeaderMap, cookie_name: &str) -> Option<SessionData> {
    session_tokens(headers, cookie_name).find_map(|token| sessions.verify(token))
}

/// Resolves the request's session into a [`CurrentUser`] extension.
pub async fn identify(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let user = live_session(&state.sessions, request.headers(), &state.guard.cookie_name)
        .map(|session| AuthUser {
            user_id: session.user_id,
            email: session.email,
        });

    request.extensions_mut().insert(CurrentUser(user));
    next.run(request).await
}

/// Rejects requests without a live session.
pub async fn require_user(mut request: Request, next: Next) -> Response {
    let user = request
        .extensions()
        .get::<CurrentUser>()
        .and_then(|current| current.0.clone());

    match user {
        Some(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        None => ApiError::Unauthorized.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub redirect: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FormQuery {
    #[serde(default)]
    pub redirect: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FormDescriptor {
    form: &'static str,
    action: &'static str,
    fields: &'static [&'static str],
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SignedIn {
    user: UserProfile,
    redirect: String,
}

pub async fn login_form(Query(query): Query<FormQuery>) -> Json<FormDescriptor> {
    Json(FormDescriptor {
        form: "login",
        action: "/auth/login",
        fields: &["email", "password"],
        redirect: query.redirect,
    })
}

pub async fn register_form() -> Json<FormDescriptor> {
    Json(FormDescriptor {
        form: "register",
        action: "/auth/register",
        fields: &["email", "password", "displayName"],
        redirect: None,
    })
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let profile = state.identity.sign_in(&body.email, &body.password).await?;
    let target = safe_redirect(body.redirect.as_deref(), &state.guard.home_path);
    Ok(start_session(&state, profile, target, StatusCode::OK))
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<Response, ApiError> {
    let profile = state
        .identity
        .sign_up(&body.email, &body.password, body.display_name.as_deref())
        .await?;
    let target = state.guard.home_path.clone();
    Ok(start_session(&state, profile, target, StatusCode::CREATED))
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    for token in session_tokens(&headers, &state.guard.cookie_name) {
        if state.sessions.revoke(token) {
            tracing::info!("Session ended");
        }
    }

    let clear = format!(
        "{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0",
        state.guard.cookie_name
    );
    (
        [(header::SET_COOKIE, clear)],
        Json(serde_json::json!({ "success": true })),
    )
        .into_response()
}

fn start_session(state: &AppState, user: UserProfile, redirect: String, status: StatusCode) -> Response {
    let token = state.sessions.create_session(&user.uid, &user.email);
    tracing::info!("Session started for {}", user.uid);

    let cookie = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        state.guard.cookie_name,
        token,
        state.sessions.ttl().as_secs()
    );
    (
        status,
        [(header::SET_COOKIE, cookie)],
        Json(SignedIn { user, redirect }),
    )
        .into_response()
}

/// Only same-site absolute paths are followed after sign-in.
fn safe_redirect(requested: Option<&str>, home: &str) -> String {
    match requested {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path.to_string()
        }
        _ => home.to_string(),
    }
}

/// Current user info for API clients.
pub async fn me(Extension(user): Extension<AuthUser>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "uid": user.user_id, "email": user.email }))
}
