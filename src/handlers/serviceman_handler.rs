// src/handlers/serviceman_handler.rs
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use std::sync::Arc;

use crate::{
    errors::GrievanceResult,
    handlers::{auth::AuthActor, read_id, write_id},
    models::{
        account::{LocationUpdate, ProfileUpdate, Role, ServiceManResponse, ServiceManStatusUpdate},
        complaint::{Complaint, ComplaintResponse, ProgressUpdate},
        report::{CompleteReportRequest, InterventionReport, MediaUpload, OpenReportRequest, ReportUpdate},
    },
    services::{
        complaint_service::ComplaintOperations, directory_service::DirectoryOperations,
        report_service::ReportOperations,
    },
    state::AppState,
    utils::id_generator::IdType,
};

pub async fn profile(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
) -> GrievanceResult<Json<ServiceManResponse>> {
    actor.require(Role::ServiceMan)?;
    let serviceman = state.directory_service.get_serviceman(&actor.id).await?;
    Ok(Json(serviceman.into()))
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Json(update): Json<ProfileUpdate>,
) -> GrievanceResult<Json<ServiceManResponse>> {
    actor.require(Role::ServiceMan)?;
    Ok(Json(state.directory_service.update_profile(&actor.id, update).await?))
}

pub async fn update_location(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Json(update): Json<LocationUpdate>,
) -> GrievanceResult<Json<ServiceManResponse>> {
    actor.require(Role::ServiceMan)?;
    Ok(Json(state.directory_service.update_location(&actor.id, update).await?))
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Json(update): Json<ServiceManStatusUpdate>,
) -> GrievanceResult<Json<ServiceManResponse>> {
    actor.require(Role::ServiceMan)?;
    Ok(Json(
        state
            .directory_service
            .set_serviceman_status(&actor.id, update.status)
            .await?,
    ))
}

pub async fn list_complaints(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
) -> GrievanceResult<Json<Vec<Complaint>>> {
    Ok(Json(state.complaint_service.list_for_serviceman(&actor).await?))
}

pub async fn get_complaint(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
) -> GrievanceResult<Json<ComplaintResponse>> {
    read_id(&id, IdType::Complaint)?;
    let complaint = state.complaint_service.get_for_serviceman(&actor, &id).await?;
    Ok(Json(state.complaint_service.respond(complaint).await?))
}

pub async fn record_progress(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
    Json(update): Json<ProgressUpdate>,
) -> GrievanceResult<Json<Complaint>> {
    write_id(&id, IdType::Complaint)?;
    Ok(Json(
        state.complaint_service.record_progress(&actor, &id, update).await?,
    ))
}

pub async fn open_report(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Json(request): Json<OpenReportRequest>,
) -> GrievanceResult<(StatusCode, Json<InterventionReport>)> {
    write_id(&request.complaint_id, IdType::Complaint)?;
    let report = state.report_service.open_report(&actor, request).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

pub async fn list_reports(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
) -> GrievanceResult<Json<Vec<InterventionReport>>> {
    Ok(Json(state.report_service.list_for_serviceman(&actor).await?))
}

pub async fn get_report(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
) -> GrievanceResult<Json<InterventionReport>> {
    read_id(&id, IdType::Report)?;
    Ok(Json(state.report_service.get_for_serviceman(&actor, &id).await?))
}

pub async fn update_report(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
    Json(update): Json<ReportUpdate>,
) -> GrievanceResult<Json<InterventionReport>> {
    write_id(&id, IdType::Report)?;
    Ok(Json(state.report_service.update_report(&actor, &id, update).await?))
}

pub async fn add_media(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
    Json(upload): Json<MediaUpload>,
) -> GrievanceResult<Json<InterventionReport>> {
    write_id(&id, IdType::Report)?;
    Ok(Json(state.report_service.add_media(&actor, &id, upload).await?))
}

pub async fn complete_report(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
    Json(request): Json<CompleteReportRequest>,
) -> GrievanceResult<Json<InterventionReport>> {
    write_id(&id, IdType::Report)?;
    Ok(Json(state.report_service.complete(&actor, &id, request).await?))
}
