//! Admin login and logout.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::auth::bearer_token;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{empty_success, success};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    token: String,
}

/// `POST /api/admin/login`: shared-secret password opens a session.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Response, AppError> {
    if body.password != state.config.admin_password {
        tracing::warn!("admin login rejected");
        return Err(AppError::AuthError("Incorrect password".to_string()));
    }

    let ttl = Duration::hours(state.config.session_ttl_hours);
    let token = state.sessions.open(ttl).await;
    tracing::info!("admin session opened");

    Ok(success(LoginResponse { token }, "Login successful").into_response())
}

/// `POST /api/admin/logout`: drop the presented session.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = bearer_token(&headers) {
        state.sessions.close(token).await;
    }

    empty_success("Logged out").into_response()
}
