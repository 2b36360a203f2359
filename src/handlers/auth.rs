// src/handlers/auth.rs
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};
use std::sync::Arc;

use crate::{
    errors::GrievanceError,
    models::account::Actor,
    services::directory_service::DirectoryOperations,
    state::AppState,
};

/// The caller behind `Authorization: Bearer <token>`.
pub struct AuthActor(pub Actor);

pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthActor {
    type Rejection = GrievanceError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| GrievanceError::unauthorized("Missing bearer token"))?;
        let actor = state.directory_service.resolve_session(&token).await?;
        Ok(AuthActor(actor))
    }
}
