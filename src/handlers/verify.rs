//! Gate verification endpoint.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::state::AppState;
use crate::utils::error::AppError;

#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    /// Ticket identifier embedded in the QR code.
    #[serde(default)]
    pub t: Option<String>,
}

/// `GET /api/verify?t=<id>`: decide one scan.
///
/// Always 200 with the bare `{valid, message, registration?}` outcome. A
/// denied ticket is the engine working, not an HTTP failure; only a store
/// breakdown surfaces as 500, which is how gate clients tell "entry denied"
/// from "please retry the scan".
pub async fn verify(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> Result<Response, AppError> {
    let ticket_id = params.t.unwrap_or_default();
    let outcome = state.verifier.scan(ticket_id.trim()).await?;

    Ok(Json(outcome).into_response())
}
