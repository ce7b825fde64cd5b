//! Firestarter Server
//!
//! Serves the todo and counter demo over HTTP: page routes behind the
//! route guard, email/password sessions, and a JSON API with WebSocket
//! live feeds.
//!
//! # Configuration
//!
//! Read from the YAML config file (`FIRESTARTER_CONFIG`, default
//! `~/.config/firestarter/config.yaml`) with `FIRESTARTER_*` environment
//! overrides:
//! - `FIRESTARTER_PORT`: Port to listen on (default: 8080)
//! - `FIRESTARTER_DATABASE_PATH`: SQLite database file
//! - `FIRESTARTER_SESSION_TTL_MINUTES`: Session lifetime (default: 10080)
//! - `FIRESTARTER_VERIFY_SESSIONS`: Verify cookies in the route guard (default: true)
//!
//! # Endpoints
//!
//! - `GET /health`: Health check endpoint (no auth required)
//! - `GET|POST /auth/login`, `GET|POST /auth/register`, `POST /auth/logout`
//! - `GET /dashboard`, `/profile`, `/settings` (session required)
//! - `/api/todos...` (session required), `/api/counter...` (anonymous allowed)

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use firestarter::server::{router, AppState, SessionStore};
use firestarter::{init_db, Config, DocumentStore};

/// How often expired sessions are swept.
const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "firestarter=info,firestarter_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::var("FIRESTARTER_CONFIG").ok().map(PathBuf::from);
    let config = Config::load(config_path)?;

    match &config.config_file {
        Some(path) => tracing::info!("Config file: {}", path.display()),
        None => tracing::info!("No config file found, using defaults"),
    }
    tracing::info!("Database: {}", config.database_path().display());

    let pool = init_db(config.database_path()).await?;
    let store = DocumentStore::new(pool);

    if !config.verify_sessions.value {
        tracing::warn!(
            "Session verification is off: the route guard trusts any {} cookie",
            config.routes.cookie_name
        );
    }

    let ttl_minutes = u64::try_from(config.session_ttl_minutes.value)?;
    let state = AppState::new(
        store,
        SessionStore::new(ttl_minutes),
        config.routes.clone(),
        config.verify_sessions.value,
    );
    spawn_session_cleanup(state.sessions.clone());

    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port.value));
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn spawn_session_cleanup(sessions: Arc<SessionStore>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            let removed = sessions.cleanup_expired();
            if removed > 0 {
                tracing::debug!("Removed {} expired session(s)", removed);
            }
        }
    });
}
