//! Public registration intake.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::models::NewRegistration;
use crate::schema::{RegistrationRules, RegistrationSubmission};
use crate::state::AppState;
use crate::ticket;
use crate::utils::error::AppError;
use crate::utils::response::success;

/// `POST /api/register`: validate a submission against the published form's
/// rules and create a pending registration.
pub async fn register(
    State(state): State<AppState>,
    Json(submission): Json<RegistrationSubmission>,
) -> Result<Response, AppError> {
    // One published-form read at the top of the request; a publish flip while
    // the submission is in flight is accepted best-effort.
    let form = state
        .store
        .published_form()
        .await?
        .ok_or_else(|| AppError::NotFound("No registration form is currently open".to_string()))?;

    let rules = RegistrationRules::build(&form.base_fields, &form.custom_fields);
    rules.validate(&submission)?;

    let group_size = submission.group_size.unwrap_or(1);
    let new = NewRegistration {
        id: String::new(), // assigned on insert
        form_id: Some(form.id),
        name: submission.name,
        email: submission.email,
        phone: submission.phone,
        organization: submission.organization,
        group_size,
        team_members: submission.team_members,
        custom_field_data: submission.custom_field_data,
        max_scans: form.scan_policy.max_scans_for(group_size),
        scan_policy: form.scan_policy,
    };

    let registration = ticket::insert_with_fresh_id(state.store.as_ref(), new).await?;
    tracing::info!(ticket_id = %registration.id, form_id = form.id, "registration created");

    let message = form
        .success_message
        .unwrap_or_else(|| "Registration received".to_string());
    Ok(success(registration, message).into_response())
}

/// `GET /api/form`: the form currently accepting submissions.
pub async fn published_form(State(state): State<AppState>) -> Result<Response, AppError> {
    let form = state
        .store
        .published_form()
        .await?
        .ok_or_else(|| AppError::NotFound("No registration form is currently open".to_string()))?;

    Ok(success(form, "Published form").into_response())
}
