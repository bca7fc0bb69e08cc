//! Admin form management: CRUD, the single-publish flip, aggregates, and
//! export downloads.

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::export::{self, ExportError, ExportFormat};
use crate::models::EventFormDraft;
use crate::schema::validate_field_definitions;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{download, empty_success, success};

fn form_not_found(id: i32) -> AppError {
    AppError::NotFound(format!("Form {id} not found"))
}

/// `POST /api/admin/forms`
pub async fn create(
    State(state): State<AppState>,
    Json(draft): Json<EventFormDraft>,
) -> Result<Response, AppError> {
    validate_field_definitions(&draft.custom_fields)?;

    let form = state.store.insert_form(&draft).await?;
    tracing::info!(form_id = form.id, title = %form.title, "form created");

    Ok(success(form, "Form created").into_response())
}

/// `PUT /api/admin/forms/:id`
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(draft): Json<EventFormDraft>,
) -> Result<Response, AppError> {
    validate_field_definitions(&draft.custom_fields)?;

    let form = state
        .store
        .update_form(id, &draft)
        .await?
        .ok_or_else(|| form_not_found(id))?;

    Ok(success(form, "Form updated").into_response())
}

/// `GET /api/admin/forms`
pub async fn list(State(state): State<AppState>) -> Result<Response, AppError> {
    let forms = state.store.list_forms().await?;
    Ok(success(forms, "Forms").into_response())
}

/// `GET /api/admin/forms/:id`
pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Response, AppError> {
    let form = state.store.form(id).await?.ok_or_else(|| form_not_found(id))?;
    Ok(success(form, "Form").into_response())
}

/// `POST /api/admin/forms/:id/publish`: every other form is unpublished in
/// the same store operation.
pub async fn publish(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Response, AppError> {
    if !state.store.publish_form(id).await? {
        return Err(form_not_found(id));
    }
    tracing::info!(form_id = id, "form published");

    Ok(empty_success("Form published").into_response())
}

/// `DELETE /api/admin/forms/:id`
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Response, AppError> {
    if !state.store.delete_form(id).await? {
        return Err(form_not_found(id));
    }
    tracing::info!(form_id = id, "form deleted");

    Ok(empty_success("Form deleted").into_response())
}

/// `GET /api/admin/forms/:id/stats`
pub async fn stats(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Response, AppError> {
    if state.store.form(id).await?.is_none() {
        return Err(form_not_found(id));
    }
    let stats = state.store.form_stats(id).await?;

    Ok(success(stats, "Form statistics").into_response())
}

#[derive(Debug, Deserialize)]
pub struct ExportParams {
    #[serde(default)]
    pub format: Option<String>,
}

/// `GET /api/admin/forms/:id/export?format=csv|json`: download projection.
pub async fn export(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Query(params): Query<ExportParams>,
) -> Result<Response, AppError> {
    let format: ExportFormat = params
        .format
        .as_deref()
        .unwrap_or("csv")
        .parse()
        .map_err(|e: ExportError| AppError::ValidationError(e.to_string()))?;

    if state.store.form(id).await?.is_none() {
        return Err(form_not_found(id));
    }
    let registrations = state.store.list_registrations(Some(id)).await?;

    let export = export::export(&registrations, format).map_err(|e| match e {
        ExportError::Serialize(err) => AppError::InternalServerError(err.to_string()),
        other => AppError::ValidationError(other.to_string()),
    })?;

    Ok(download(export.bytes, export.content_type, export.file_name))
}
