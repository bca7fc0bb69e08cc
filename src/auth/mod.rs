//! Admin session handling.
//!
//! A single shared-secret password opens a bearer-token session held in
//! process memory with a TTL. Session mechanics are a boundary here, not part
//! of the verification core; the only contract is that every `/api/admin`
//! route sits behind [`require_admin`].

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::state::AppState;
use crate::utils::error::AppError;

/// In-memory session registry: token -> expiry.
#[derive(Clone, Default)]
pub struct AdminSessions {
    inner: Arc<RwLock<HashMap<String, DateTime<Utc>>>>,
}

impl AdminSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new session, pruning any that have lapsed.
    pub async fn open(&self, ttl: Duration) -> String {
        let token = Uuid::new_v4().simple().to_string();
        let now = Utc::now();

        let mut sessions = self.inner.write().await;
        sessions.retain(|_, expires| *expires > now);
        sessions.insert(token.clone(), now + ttl);

        token
    }

    pub async fn close(&self, token: &str) {
        self.inner.write().await.remove(token);
    }

    pub async fn is_open(&self, token: &str) -> bool {
        let sessions = self.inner.read().await;
        sessions
            .get(token)
            .is_some_and(|expires| *expires > Utc::now())
    }
}

/// Pull the bearer token out of an `Authorization` header, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Middleware guarding the admin surface.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| AppError::AuthError("Admin session required".to_string()))?;

    if !state.sessions.is_open(token).await {
        return Err(AppError::AuthError(
            "Invalid or expired admin session".to_string(),
        ));
    }

    Ok(next.run(request).await)
}
