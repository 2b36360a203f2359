// src/handlers/mod.rs
use axum::{Json, extract::State};
use serde::Serialize;
use std::sync::Arc;

use crate::{
    errors::{GrievanceError, GrievanceResult},
    state::AppState,
    utils::id_generator::{IdGenerator, IdType},
};

pub mod admin_handler;
pub mod auth;
pub mod auth_handler;
pub mod complaint_handler;
pub mod department_handler;
pub mod serviceman_handler;

/// Path ids that can't exist are reported as missing.
pub(crate) fn read_id(id: &str, id_type: IdType) -> GrievanceResult<()> {
    if IdGenerator::validate_id(id, Some(id_type)) {
        Ok(())
    } else {
        Err(GrievanceError::not_found(format!("No {} with id {}", id_type, id)))
    }
}

/// Writes against a malformed id are a caller error.
pub(crate) fn write_id(id: &str, id_type: IdType) -> GrievanceResult<()> {
    if IdGenerator::validate_id(id, Some(id_type)) {
        Ok(())
    } else {
        Err(GrievanceError::InvalidFieldValue {
            field: "id".to_string(),
            value: id.to_string(),
            reason: format!("expected a {} id", id_type),
        })
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub store: &'static str,
    pub version: &'static str,
}

pub async fn health(State(state): State<Arc<AppState>>) -> GrievanceResult<Json<HealthResponse>> {
    state.store_service.health_check().await?;
    Ok(Json(HealthResponse {
        status: "ok",
        store: state.store_service.backend_name(),
        version: env!("CARGO_PKG_VERSION"),
    }))
}
