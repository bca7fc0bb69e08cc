//! Admin registration management: credential issue/revoke, edits, deletion,
//! and the scan audit log.

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::models::{Registration, RegistrationPatch};
use crate::qr;
use crate::state::AppState;
use crate::store::IssueOutcome;
use crate::utils::error::AppError;
use crate::utils::response::{empty_success, success};

fn registration_not_found(id: &str) -> AppError {
    AppError::NotFound(format!("Registration '{id}' not found"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    #[serde(default)]
    pub form_id: Option<i32>,
}

/// `GET /api/admin/registrations[?formId=]`
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Response, AppError> {
    let registrations = state.store.list_registrations(params.form_id).await?;
    Ok(success(registrations, "Registrations").into_response())
}

/// `GET /api/admin/registrations/:id`
pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let registration = state
        .store
        .registration(&id)
        .await?
        .ok_or_else(|| registration_not_found(&id))?;

    Ok(success(registration, "Registration").into_response())
}

/// `PUT /api/admin/registrations/:id`: partial, admin-trusted edit. The
/// submission rules are deliberately not re-run here.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<RegistrationPatch>,
) -> Result<Response, AppError> {
    if patch.is_empty() {
        return Err(AppError::ValidationError(
            "At least one field must be provided".to_string(),
        ));
    }

    let registration = state
        .store
        .update_registration(&id, &patch)
        .await?
        .ok_or_else(|| registration_not_found(&id))?;

    Ok(success(registration, "Registration updated").into_response())
}

/// `DELETE /api/admin/registrations/:id`: removes the scan history too.
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    if !state.verifier.delete(&id).await? {
        return Err(registration_not_found(&id));
    }
    tracing::info!(ticket_id = %id, "registration deleted");

    Ok(empty_success("Registration deleted").into_response())
}

/// `GET /api/admin/registrations/:id/history`
pub async fn history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    if state.store.registration(&id).await?.is_none() {
        return Err(registration_not_found(&id));
    }
    let entries = state.store.scan_history(&id).await?;

    Ok(success(entries, "Scan history").into_response())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IssuedCredential {
    registration: Registration,
    qr_code: String,
    verify_url: String,
}

/// `POST /api/admin/generate-qr/:id`: render and attach the credential.
///
/// The issue guard lives in the store mutation, so two concurrent requests
/// cannot both report success; the loser sees the conflict. The ticket email
/// is dispatched after the response is decided and never affects it.
pub async fn generate_qr(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let verify_url = qr::verification_url(&state.config.site_url, &id);
    let qr_code = qr::render_png_data_url(&verify_url)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    match state.verifier.issue(&id, &qr_code).await? {
        IssueOutcome::Issued(registration) => {
            tracing::info!(ticket_id = %id, "QR credential issued");

            let mailer = state.mailer.clone();
            let mailed = registration.clone();
            let mail_url = verify_url.clone();
            tokio::spawn(async move {
                mailer.send_ticket(&mailed, &mail_url).await;
            });

            Ok(success(
                IssuedCredential {
                    registration,
                    qr_code,
                    verify_url,
                },
                "QR code generated",
            )
            .into_response())
        }
        IssueOutcome::AlreadyIssued => Err(AppError::Conflict(
            "QR code already generated for this registration. Revoke it first to re-issue."
                .to_string(),
        )),
        IssueOutcome::NotFound => Err(registration_not_found(&id)),
    }
}

/// `POST /api/admin/revoke-qr/:id`: back to pre-issuance state.
pub async fn revoke_qr(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let registration = state
        .verifier
        .revoke(&id)
        .await?
        .ok_or_else(|| registration_not_found(&id))?;
    tracing::info!(ticket_id = %id, "QR credential revoked");

    Ok(success(registration, "QR code revoked").into_response())
}
