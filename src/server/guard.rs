//! Route guard: per-request redirect decisions for page routes.
//!
//! Paths are classified by prefix as protected (sign-in required),
//! auth-only (sign-in and register pages) or public. Asset and API paths
//! are excluded before any classification.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};

use super::auth::CurrentUser;
use super::AppState;

/// Prefixes never inspected by the guard.
const EXCLUDED_PREFIXES: [&str; 4] = ["/api", "/_next", "/static", "/favicon.ico"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Prefixes that require a session
    pub protected: Vec<String>,
    /// Prefixes only shown to visitors without a session
    pub auth_only: Vec<String>,
    pub login_path: String,
    pub home_path: String,
    pub cookie_name: String,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            protected: vec![
                "/dashboard".to_string(),
                "/profile".to_string(),
                "/settings".to_string(),
            ],
            auth_only: vec!["/auth/login".to_string(), "/auth/register".to_string()],
            login_path: "/auth/login".to_string(),
            home_path: "/dashboard".to_string(),
            cookie_name: "auth-token".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    Excluded,
    Protected,
    AuthOnly,
    Public,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(String),
}

impl GuardConfig {
    /// Rejects prefix lists that could classify one path both ways, and
    /// redirect targets that would loop.
    pub fn validate(&self) -> Result<(), String> {
        for prefix in self.protected.iter().chain(&self.auth_only) {
            if !prefix.starts_with('/') {
                return Err(format!("Route prefix '{}' must start with '/'", prefix));
            }
        }
        for protected in &self.protected {
            for auth_only in &self.auth_only {
                if protected.starts_with(auth_only.as_str())
                    || auth_only.starts_with(protected.as_str())
                {
                    return Err(format!(
                        "Protected prefix '{}' overlaps auth-only prefix '{}'",
                        protected, auth_only
                    ));
                }
            }
        }
        if self.classify(&self.login_path) == PathClass::Protected {
            return Err(format!("Login path '{}' is protected", self.login_path));
        }
        if self.classify(&self.home_path) == PathClass::AuthOnly {
            return Err(format!("Home path '{}' is auth-only", self.home_path));
        }
        if self.cookie_name.is_empty() {
            return Err("Cookie name must not be empty".to_string());
        }
        Ok(())
    }

    pub fn is_excluded(path: &str) -> bool {
        EXCLUDED_PREFIXES.iter().any(|prefix| path.starts_with(prefix)) || path.contains('.')
    }

    /// Protected is checked before auth-only.
    pub fn classify(&self, path: &str) -> PathClass {
        if Self::is_excluded(path) {
            PathClass::Excluded
        } else if self.protected.iter().any(|p| path.starts_with(p.as_str())) {
            PathClass::Protected
        } else if self.auth_only.iter().any(|p| path.starts_with(p.as_str())) {
            PathClass::AuthOnly
        } else {
            PathClass::Public
        }
    }

    pub fn decide(&self, path: &str, has_session: bool) -> GuardDecision {
        match (self.classify(path), has_session) {
            (PathClass::Protected, false) => GuardDecision::Redirect(self.login_redirect(path)),
            (PathClass::AuthOnly, true) => GuardDecision::Redirect(self.home_path.clone()),
            _ => GuardDecision::Allow,
        }
    }

    /// Login URL carrying `path` as the return target.
    pub fn login_redirect(&self, path: &str) -> String {
        let encoded: Vec<String> = path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}?redirect={}", self.login_path, encoded.join("/"))
    }
}

/// Reads one cookie from the request's `Cookie` headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value)
}

/// Redirects page requests according to [`GuardConfig::decide`].
///
/// With session verification on, a cookie only counts when it names a
/// live session. Otherwise its presence is enough.
pub async fn route_guard(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();

    let has_session = if state.verify_sessions {
        matches!(request.extensions().get::<CurrentUser>(), Some(CurrentUser(Some(_))))
    } else {
        cookie_value(request.headers(), &state.guard.cookie_name).is_some()
    };

    match state.guard.decide(&path, has_session) {
        GuardDecision::Allow => next.run(request).await,
        GuardDecision::Redirect(target) => {
            tracing::debug!("Guard redirecting {} to {}", path, target);
            Redirect::temporary(&target).into_response()
        }
    }
}
