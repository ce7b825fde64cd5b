//! HTTP server: page routes behind the route guard, session auth and the
//! JSON/WebSocket API over the document services.

pub mod api;
pub mod auth;
pub mod error;
pub mod guard;
pub mod identity;
pub mod pages;
pub mod sessions;

pub use auth::{AuthUser, CurrentUser};
pub use error::{ApiError, ErrorBody};
pub use guard::{GuardConfig, GuardDecision, PathClass};
pub use identity::{IdentityError, IdentityProvider};
pub use sessions::{SessionData, SessionStore};

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::collection::DocumentService;
use crate::db::DocumentStore;
use crate::models::{Collection, Counter, Todo};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionStore>,
    pub identity: Arc<IdentityProvider>,
    pub todos: DocumentService<Todo>,
    pub counters: DocumentService<Counter>,
    pub guard: Arc<GuardConfig>,
    /// Whether the guard checks cookies against the session store
    pub verify_sessions: bool,
}

impl AppState {
    pub fn new(
        store: DocumentStore,
        sessions: SessionStore,
        guard: GuardConfig,
        verify_sessions: bool,
    ) -> Self {
        Self {
            sessions: Arc::new(sessions),
            identity: Arc::new(IdentityProvider::new(store.clone())),
            todos: DocumentService::new(store.clone(), Collection::Todos.as_str()),
            counters: DocumentService::new(store, Collection::Counters.as_str()),
            guard: Arc::new(guard),
            verify_sessions,
        }
    }
}

pub fn router(state: AppState) -> Router {
    // Reachable without a session
    let public_routes = Router::new()
        .route("/", get(pages::landing))
        .route("/health", get(pages::health))
        .route("/auth/login", get(auth::login_form).post(auth::login))
        .route("/auth/register", get(auth::register_form).post(auth::register))
        .route("/auth/logout", post(auth::logout))
        .route("/api/counter", get(api::get_counter))
        .route("/api/counter/increment", post(api::increment_counter))
        .route("/api/counter/decrement", post(api::decrement_counter))
        .route("/api/counter/live", get(api::counter_live));

    // Session required
    let protected_routes = Router::new()
        .route("/dashboard", get(pages::dashboard))
        .route("/profile", get(pages::profile))
        .route("/settings", get(pages::settings))
        .route("/api/me", get(auth::me))
        .route("/api/todos", get(api::list_todos).post(api::create_todo))
        .route("/api/todos/clear-completed", post(api::clear_completed))
        .route("/api/todos/live", get(api::todos_live))
        .route(
            "/api/todos/{id}",
            patch(api::update_todo).delete(api::delete_todo),
        )
        .route_layer(middleware::from_fn(auth::require_user));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            guard::route_guard,
        ))
        .layer(middleware::from_fn_with_state(state.clone(), auth::identify))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
