//! JSON API for todos and the counter, plus their live feeds.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::auth::{AuthUser, CurrentUser};
use super::error::ApiError;
use super::AppState;
use crate::collection::{Document, Patch, Subscription};
use crate::db::{Constraint, Cursor};
use crate::error::{BackendError, StoreError};
use crate::models::{Counter, Todo};

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub page_size: Option<usize>,
    pub cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewTodo {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Fields left out of the request body are left unchanged.
#[derive(Debug, Deserialize, Serialize)]
pub struct TodoChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct Created {
    id: String,
}

#[derive(Debug, Serialize)]
pub struct Cleared {
    deleted: usize,
}

#[derive(Debug, Serialize)]
pub struct CounterValue {
    count: i64,
}

pub async fn list_todos(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<ListParams>,
) -> Result<Response, ApiError> {
    let constraints = Todo::owned_by(&user.user_id);

    match params.page_size {
        Some(page_size) => {
            let cursor = match params.cursor.as_deref() {
                Some(token) if !token.is_empty() => Some(Cursor::parse(token)?),
                _ => None,
            };
            let page = state
                .todos
                .get_paginated(&constraints, page_size, cursor)
                .await?;
            Ok(Json(page).into_response())
        }
        None => {
            let todos = state.todos.get_all(&constraints).await?;
            Ok(Json(todos).into_response())
        }
    }
}

pub async fn create_todo(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<NewTodo>,
) -> Result<(StatusCode, Json<Created>), ApiError> {
    let mut todo = Todo::new(body.title, &user.user_id);
    todo.description = body.description.filter(|d| !d.trim().is_empty());
    todo.validate()?;

    let id = state.todos.create(&todo).await?;
    Ok((StatusCode::CREATED, Json(Created { id })))
}

pub async fn update_todo(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(mut changes): Json<TodoChanges>,
) -> Result<Json<Document<Todo>>, ApiError> {
    owned_todo(&state, &user, &id).await?;

    if let Some(title) = changes.title.take() {
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(StoreError::validation("Todo title must not be empty").into());
        }
        changes.title = Some(title);
    }
    let patch = Patch::from_partial(&changes)?;

    state.todos.update(&id, patch).await?;
    let updated = owned_todo(&state, &user, &id).await?;
    Ok(Json(updated))
}

pub async fn delete_todo(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    owned_todo(&state, &user, &id).await?;
    state.todos.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn clear_completed(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Cleared>, ApiError> {
    let done = state
        .todos
        .get_all(&[
            Constraint::eq("userId", user.user_id.as_str()),
            Constraint::eq("completed", true),
        ])
        .await?;
    let ids: Vec<String> = done.into_iter().map(|doc| doc.id).collect();

    state.todos.batch_delete(&ids).await?;
    Ok(Json(Cleared { deleted: ids.len() }))
}

/// Another user's todo is reported the same as a missing one.
async fn owned_todo(state: &AppState, user: &AuthUser, id: &str) -> Result<Document<Todo>, ApiError> {
    match state.todos.get_by_id(id).await? {
        Some(todo) if todo.user_id == user.user_id => Ok(todo),
        _ => Err(StoreError::from(BackendError::not_found(format!("No todo with id {}", id))).into()),
    }
}

pub async fn todos_live(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| {
        let constraints = Todo::owned_by(&user.user_id);
        stream_feed(socket, move |tx| {
            let errors = tx.clone();
            state.todos.subscribe(
                &constraints,
                move |docs| {
                    let _ = tx.send(FeedEvent::Snapshot(docs));
                },
                move |e| {
                    let _ = errors.send(FeedEvent::Failed(e));
                },
            )
        })
    })
}

pub async fn get_counter(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<Option<Document<Counter>>>, ApiError> {
    let id = Counter::id_for(user.as_ref().map(|u| u.user_id.as_str()));
    Ok(Json(state.counters.get_by_id(id).await?))
}

pub async fn increment_counter(
    state: State<AppState>,
    user: Extension<CurrentUser>,
) -> Result<Json<CounterValue>, ApiError> {
    adjust_counter(state, user, 1).await
}

pub async fn decrement_counter(
    state: State<AppState>,
    user: Extension<CurrentUser>,
) -> Result<Json<CounterValue>, ApiError> {
    adjust_counter(state, user, -1).await
}

async fn adjust_counter(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    delta: i64,
) -> Result<Json<CounterValue>, ApiError> {
    let id = Counter::id_for(user.as_ref().map(|u| u.user_id.as_str()));
    let count = Counter::adjust(&state.counters, id, delta).await?;
    Ok(Json(CounterValue { count }))
}

pub async fn counter_live(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ws: WebSocketUpgrade,
) -> Response {
    let id = Counter::id_for(user.as_ref().map(|u| u.user_id.as_str())).to_string();
    ws.on_upgrade(move |socket| {
        stream_feed(socket, move |tx| {
            let errors = tx.clone();
            state.counters.subscribe_to_doc(
                &id,
                move |doc| {
                    let _ = tx.send(FeedEvent::Snapshot(doc));
                },
                move |e| {
                    let _ = errors.send(FeedEvent::Failed(e));
                },
            )
        })
    })
}

enum FeedEvent<V> {
    Snapshot(V),
    Failed(StoreError),
}

/// Forwards a live feed to a socket as JSON text frames until either
/// side goes away. A feed failure is sent as an error body, then the
/// socket is closed.
async fn stream_feed<V, F>(socket: WebSocket, open: F)
where
    V: Serialize,
    F: FnOnce(mpsc::UnboundedSender<FeedEvent<V>>) -> Subscription,
{
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let subscription = open(tx);

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(FeedEvent::Snapshot(value)) => {
                    let text = match serde_json::to_string(&value) {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::error!("Failed to encode feed snapshot: {}", e);
                            break;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Some(FeedEvent::Failed(e)) => {
                    let body = ApiError::from(e).body();
                    if let Ok(text) = serde_json::to_string(&body) {
                        let _ = sender.send(Message::Text(text.into())).await;
                    }
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
                None => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    subscription.unsubscribe();
    tracing::debug!("Live feed closed");
}
