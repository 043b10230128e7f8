//! Caller identity. Every `/api/v1` route except the health probe takes an
//! `AuthUser`, which verifies the bearer ID token through `AppState::identity`.

pub mod firebase;

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use thiserror::Error;

use crate::errors::AppError;
use crate::state::AppState;

/// Claims we rely on from a verified ID token.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedIdentity {
    pub uid: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing or invalid authorization header")]
    MissingCredential,

    #[error("Invalid authentication token: {0}")]
    InvalidCredential(String),

    #[error("Could not fetch token signing keys: {0}")]
    KeyFetch(String),
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError>;

    /// Cheap reachability check for the health endpoint.
    async fn ping(&self) -> Result<(), AuthError>;
}

/// Extracts and verifies `Authorization: Bearer <id token>`.
#[derive(Debug, Clone)]
pub struct AuthUser(pub VerifiedIdentity);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        let identity = state.identity.verify(token).await?;
        Ok(AuthUser(identity))
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingCredential)
}
