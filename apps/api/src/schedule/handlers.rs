use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::schedule::{DynamicEntryRow, ResultingEntryRow, StaticEntryRow};
use crate::schedule::interpreter::ScheduleRequest;
use crate::schedule::models::{NewEntry, ParsedEntryDescriptor};
use crate::schedule::validation::{
    parse_window, validate_dynamic_entry, validate_static_entry, CreateDynamicEntryRequest,
    CreateStaticEntryRequest, InterpretBody, ScheduleQuery,
};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpretResponse {
    pub entries: Vec<ParsedEntryDescriptor>,
    pub static_entries: Vec<StaticEntryRow>,
    pub dynamic_entries: Vec<DynamicEntryRow>,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub entries: Vec<ParsedEntryDescriptor>,
}

/// Live entries of one user, filtered by the listing window. Excluded kinds are empty.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleOverview {
    pub static_entries: Vec<StaticEntryRow>,
    pub dynamic_entries: Vec<DynamicEntryRow>,
    pub resulting_entries: Vec<ResultingEntryRow>,
}

/// Runs the interpreter under the configured deadline. On expiry the token is
/// cancelled so the in-flight completion call is abandoned.
async fn interpret_with_deadline(
    state: &AppState,
    body: InterpretBody,
) -> Result<(ScheduleRequest, Vec<ParsedEntryDescriptor>), AppError> {
    if body.text.trim().is_empty() {
        return Err(AppError::Validation("text cannot be empty".to_string()));
    }

    let request = ScheduleRequest {
        text: body.text,
        reference_instant: body.reference_instant.unwrap_or_else(|| Utc::now().into()),
    };
    let cancel = CancellationToken::new();
    let deadline = state.config.llm_timeout;

    match tokio::time::timeout(deadline, state.interpreter.interpret(&request, &cancel)).await {
        Ok(result) => Ok((request, result?)),
        Err(_) => {
            cancel.cancel();
            warn!(
                "Interpretation exceeded the {}s deadline",
                deadline.as_secs()
            );
            Err(AppError::ServiceUnavailable(
                "Interpretation timed out".to_string(),
            ))
        }
    }
}

/// Entries can only be written for a signed-up user; a missing profile shows up
/// as a foreign-key violation.
fn map_write_error(e: sqlx::Error, uid: &str) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_foreign_key_violation() {
            return AppError::NotFound(format!("User {uid} has no profile; sign up first"));
        }
    }
    AppError::Database(e)
}

/// POST /api/v1/schedule
pub async fn handle_interpret(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    payload: Result<Json<InterpretBody>, JsonRejection>,
) -> Result<(StatusCode, Json<InterpretResponse>), AppError> {
    let Json(body) = payload?;
    let (request, entries) = interpret_with_deadline(&state, body).await?;

    let offset = request.reference_instant.offset();
    let writes: Vec<NewEntry> = entries
        .iter()
        .map(|e| e.to_new_entry(&identity.uid, request.text.trim(), offset))
        .collect::<Option<_>>()
        .ok_or_else(|| {
            AppError::UnprocessableEntity(
                "Could not interpret schedule: an entry falls outside the storable range"
                    .to_string(),
            )
        })?;

    let inserted = if writes.is_empty() {
        Default::default()
    } else {
        state
            .schedule_store
            .insert_batch(&writes)
            .await
            .map_err(|e| map_write_error(e, &identity.uid))?
    };

    info!(
        "Stored {} interpreted entries for user {}",
        writes.len(),
        identity.uid
    );
    Ok((
        StatusCode::CREATED,
        Json(InterpretResponse {
            entries,
            static_entries: inserted.static_entries,
            dynamic_entries: inserted.dynamic_entries,
        }),
    ))
}

/// POST /api/v1/schedule/preview
pub async fn handle_preview(
    State(state): State<AppState>,
    AuthUser(_identity): AuthUser,
    payload: Result<Json<InterpretBody>, JsonRejection>,
) -> Result<Json<PreviewResponse>, AppError> {
    let Json(body) = payload?;
    let (_, entries) = interpret_with_deadline(&state, body).await?;
    Ok(Json(PreviewResponse { entries }))
}

/// GET /api/v1/schedule/entries
pub async fn handle_list_entries(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    query: Result<Query<ScheduleQuery>, QueryRejection>,
) -> Result<Json<ScheduleOverview>, AppError> {
    let Query(query) = query?;
    let window = parse_window(&query).map_err(AppError::validation)?;
    let store = &state.schedule_store;
    let uid = identity.uid.as_str();

    let static_entries = if query.include_static.unwrap_or(true) {
        store.list_static(uid, &window).await?
    } else {
        Vec::new()
    };
    let dynamic_entries = if query.include_dynamic.unwrap_or(true) {
        store.list_dynamic(uid, &window).await?
    } else {
        Vec::new()
    };
    let resulting_entries = if query.include_resulting.unwrap_or(true) {
        store.list_resulting(uid, &window).await?
    } else {
        Vec::new()
    };

    Ok(Json(ScheduleOverview {
        static_entries,
        dynamic_entries,
        resulting_entries,
    }))
}

/// POST /api/v1/schedule/static
pub async fn handle_create_static(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    payload: Result<Json<CreateStaticEntryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<StaticEntryRow>), AppError> {
    let Json(req) = payload?;
    let entry = validate_static_entry(&identity.uid, req).map_err(AppError::validation)?;
    let row = state
        .schedule_store
        .insert_static(&entry)
        .await
        .map_err(|e| map_write_error(e, &identity.uid))?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// POST /api/v1/schedule/dynamic
pub async fn handle_create_dynamic(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    payload: Result<Json<CreateDynamicEntryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DynamicEntryRow>), AppError> {
    let Json(req) = payload?;
    let entry = validate_dynamic_entry(&identity.uid, req).map_err(AppError::validation)?;
    let row = state
        .schedule_store
        .insert_dynamic(&entry)
        .await
        .map_err(|e| map_write_error(e, &identity.uid))?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// DELETE /api/v1/schedule/static/:id
pub async fn handle_delete_static(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    if !state
        .schedule_store
        .soft_delete_static(&identity.uid, id)
        .await?
    {
        return Err(AppError::NotFound(format!("Static entry {id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/schedule/dynamic/:id
pub async fn handle_delete_dynamic(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    if !state
        .schedule_store
        .soft_delete_dynamic(&identity.uid, id)
        .await?
    {
        return Err(AppError::NotFound(format!("Dynamic entry {id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}
