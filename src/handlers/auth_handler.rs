// src/handlers/auth_handler.rs
use axum::{Json, extract::State, http::StatusCode};
use std::sync::Arc;

use crate::{
    errors::GrievanceResult,
    handlers::auth::AuthActor,
    models::account::{Actor, CitizenRegistration, CitizenResponse, LoginRequest, LoginResponse},
    services::directory_service::DirectoryOperations,
    state::AppState,
};

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(registration): Json<CitizenRegistration>,
) -> GrievanceResult<(StatusCode, Json<CitizenResponse>)> {
    let citizen = state.directory_service.register_citizen(registration).await?;
    Ok((StatusCode::CREATED, Json(citizen)))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(login): Json<LoginRequest>,
) -> GrievanceResult<Json<LoginResponse>> {
    Ok(Json(state.directory_service.login(login).await?))
}

pub async fn me(AuthActor(actor): AuthActor) -> Json<Actor> {
    Json(actor)
}
