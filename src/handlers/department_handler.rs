// src/handlers/department_handler.rs
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    errors::{GrievanceError, GrievanceResult},
    handlers::{auth::AuthActor, read_id, write_id},
    models::{
        account::{ServiceManRegistration, ServiceManResponse, ServiceManUpdate},
        complaint::{
            AssignRequest, Complaint, ComplaintResponse, DepartmentStats, FeedbackEntry, FeedbackRequest,
            ReleaseRequest,
        },
        report::{InterventionReport, ReviewRequest},
    },
    services::{
        assignment_service::AssignmentOperations, complaint_service::ComplaintOperations,
        directory_service::DirectoryOperations, report_service::ReportOperations,
    },
    state::AppState,
    utils::id_generator::IdType,
};

#[derive(Debug, Deserialize)]
pub struct ServicemenQuery {
    pub department: Option<String>,
}

pub async fn list_complaints(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
) -> GrievanceResult<Json<Vec<Complaint>>> {
    Ok(Json(state.complaint_service.list_for_department(&actor).await?))
}

pub async fn get_complaint(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
) -> GrievanceResult<Json<ComplaintResponse>> {
    read_id(&id, IdType::Complaint)?;
    let complaint = state.complaint_service.get_for_department(&actor, &id).await?;
    Ok(Json(state.complaint_service.respond(complaint).await?))
}

pub async fn assign_serviceman(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
    Json(request): Json<AssignRequest>,
) -> GrievanceResult<Json<Complaint>> {
    write_id(&id, IdType::Complaint)?;
    write_id(&request.service_man_id, IdType::ServiceMan)?;
    Ok(Json(
        state
            .assignment_service
            .assign_technician(&actor, &id, &request.service_man_id)
            .await?,
    ))
}

pub async fn release_serviceman(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
    Json(request): Json<ReleaseRequest>,
) -> GrievanceResult<Json<Complaint>> {
    write_id(&id, IdType::Complaint)?;
    Ok(Json(
        state
            .assignment_service
            .release_technician(&actor, &id, request.note)
            .await?,
    ))
}

pub async fn add_feedback(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
    Json(request): Json<FeedbackRequest>,
) -> GrievanceResult<(StatusCode, Json<FeedbackEntry>)> {
    write_id(&id, IdType::Complaint)?;
    let entry = state
        .complaint_service
        .add_feedback(&actor, &id, &request.feedback)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn stats(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
) -> GrievanceResult<Json<DepartmentStats>> {
    Ok(Json(state.complaint_service.department_stats(&actor).await?))
}

/// Officers see their own department; admins name one.
pub async fn list_servicemen(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Query(query): Query<ServicemenQuery>,
) -> GrievanceResult<Json<Vec<ServiceManResponse>>> {
    let department = match state.directory_service.department_scope(&actor).await? {
        Some(own) => own,
        None => query
            .department
            .ok_or_else(|| GrievanceError::MissingRequiredField("department".to_string()))?,
    };
    Ok(Json(state.directory_service.list_servicemen(&department).await?))
}

pub async fn add_serviceman(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Json(registration): Json<ServiceManRegistration>,
) -> GrievanceResult<(StatusCode, Json<ServiceManResponse>)> {
    let serviceman = state
        .directory_service
        .register_serviceman(registration, &actor)
        .await?;
    Ok((StatusCode::CREATED, Json(serviceman)))
}

pub async fn update_serviceman(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
    Json(update): Json<ServiceManUpdate>,
) -> GrievanceResult<Json<ServiceManResponse>> {
    write_id(&id, IdType::ServiceMan)?;
    Ok(Json(
        state.directory_service.update_serviceman(&actor, &id, update).await?,
    ))
}

pub async fn delete_serviceman(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
) -> GrievanceResult<StatusCode> {
    write_id(&id, IdType::ServiceMan)?;
    state.directory_service.delete_serviceman(&actor, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn validate_report(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
    Json(review): Json<ReviewRequest>,
) -> GrievanceResult<Json<InterventionReport>> {
    write_id(&id, IdType::Report)?;
    Ok(Json(state.report_service.validate(&actor, &id, review).await?))
}

pub async fn flag_followup(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
    Json(review): Json<ReviewRequest>,
) -> GrievanceResult<Json<InterventionReport>> {
    write_id(&id, IdType::Report)?;
    Ok(Json(state.report_service.flag_followup(&actor, &id, review).await?))
}
