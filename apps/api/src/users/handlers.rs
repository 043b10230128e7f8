use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::auth::{AuthUser, VerifiedIdentity};
use crate::errors::AppError;
use crate::models::user::UserRow;
use crate::state::AppState;
use crate::users::validation::{validate_signup, validate_update, SignupRequest, UpdateUserRequest};

#[derive(Debug, Serialize)]
pub struct ServiceStatus {
    pub status: &'static str,
    pub connected: bool,
}

impl ServiceStatus {
    fn from_check<E: std::fmt::Display>(name: &str, result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Self {
                status: "healthy",
                connected: true,
            },
            Err(e) => {
                warn!("Health check: {name} unavailable: {e}");
                Self {
                    status: "unhealthy",
                    connected: false,
                }
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ServicesHealth {
    pub identity: ServiceStatus,
    pub database: ServiceStatus,
}

#[derive(Debug, Serialize)]
pub struct UsersHealthResponse {
    pub success: bool,
    pub timestamp: String,
    pub services: ServicesHealth,
    pub overall: &'static str,
}

/// Only the token's owner may read or change a profile.
fn ensure_owner(identity: &VerifiedIdentity, uid: &str) -> Result<(), AppError> {
    if identity.uid != uid {
        warn!(
            "User {} attempted to access profile {}",
            identity.uid, uid
        );
        return Err(AppError::Forbidden);
    }
    Ok(())
}

/// POST /api/v1/users/signup
///
/// The body is optional; an empty body signs up with token claims and defaults.
pub async fn handle_signup(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    body: Bytes,
) -> Result<(StatusCode, Json<UserRow>), AppError> {
    let req: SignupRequest = if body.iter().all(u8::is_ascii_whitespace) {
        SignupRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::Validation(format!("Invalid signup body: {e}")))?
    };

    let new_user = validate_signup(&identity, req).map_err(AppError::validation)?;
    let user = state.user_store.create(&new_user).await?;
    info!("Signed up user {}", user.uid);
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /api/v1/users/login
pub async fn handle_login(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> Result<Json<UserRow>, AppError> {
    let email = identity
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::Validation("Token carries no email address".to_string()))?;

    let user = state
        .user_store
        .upsert_on_login(&identity.uid, email, identity.name.as_deref())
        .await?;
    Ok(Json(user))
}

/// GET /api/v1/users/:uid
pub async fn handle_get_user(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(uid): Path<String>,
) -> Result<Json<UserRow>, AppError> {
    ensure_owner(&identity, &uid)?;
    let user = state
        .user_store
        .get(&uid)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {uid} not found")))?;
    Ok(Json(user))
}

/// PUT /api/v1/users/:uid
pub async fn handle_update_user(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(uid): Path<String>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<UserRow>, AppError> {
    ensure_owner(&identity, &uid)?;
    let Json(req) = payload?;
    let update = validate_update(req).map_err(AppError::validation)?;
    let user = state.user_store.update(&uid, &update).await?;
    Ok(Json(user))
}

/// DELETE /api/v1/users/:uid
pub async fn handle_delete_user(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(uid): Path<String>,
) -> Result<StatusCode, AppError> {
    ensure_owner(&identity, &uid)?;
    state.user_store.delete(&uid).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/users/health
pub async fn handle_users_health(
    State(state): State<AppState>,
) -> (StatusCode, Json<UsersHealthResponse>) {
    let (database, identity) = tokio::join!(state.user_store.ping(), state.identity.ping());

    let services = ServicesHealth {
        identity: ServiceStatus::from_check("identity", identity),
        database: ServiceStatus::from_check("database", database),
    };
    let healthy = services.identity.connected && services.database.connected;

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(UsersHealthResponse {
            success: healthy,
            timestamp: Utc::now().to_rfc3339(),
            services,
            overall: if healthy {
                "All systems operational"
            } else {
                "System degraded - some services unavailable"
            },
        }),
    )
}
