// src/handlers/complaint_handler.rs
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use std::sync::Arc;

use crate::{
    errors::GrievanceResult,
    handlers::{auth::AuthActor, read_id, write_id},
    models::{
        complaint::{
            AiAnalysis, AnalyzeRequest, Complaint, ComplaintRequest, ComplaintResponse, HistoryPage, HistoryQuery,
            RatingRequest, ReopenRequest,
        },
        report::{CitizenFeedbackRequest, InterventionReport},
    },
    services::{complaint_service::ComplaintOperations, report_service::ReportOperations},
    state::AppState,
    utils::id_generator::IdType,
};

pub async fn create_complaint(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Json(request): Json<ComplaintRequest>,
) -> GrievanceResult<(StatusCode, Json<ComplaintResponse>)> {
    let complaint = state.complaint_service.create_complaint(&actor, request).await?;
    let response = state.complaint_service.respond(complaint).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn list_complaints(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
) -> GrievanceResult<Json<Vec<Complaint>>> {
    Ok(Json(state.complaint_service.list_for_citizen(&actor).await?))
}

pub async fn get_complaint(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
) -> GrievanceResult<Json<ComplaintResponse>> {
    read_id(&id, IdType::Complaint)?;
    let complaint = state.complaint_service.get_for_citizen(&actor, &id).await?;
    Ok(Json(state.complaint_service.respond(complaint).await?))
}

pub async fn reopen_complaint(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
    Json(request): Json<ReopenRequest>,
) -> GrievanceResult<Json<ComplaintResponse>> {
    write_id(&id, IdType::Complaint)?;
    let complaint = state.complaint_service.reopen(&actor, &id, request).await?;
    Ok(Json(state.complaint_service.respond(complaint).await?))
}

pub async fn delete_complaint(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
) -> GrievanceResult<StatusCode> {
    write_id(&id, IdType::Complaint)?;
    state.complaint_service.delete(&actor, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn send_reminder(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
) -> GrievanceResult<Json<Complaint>> {
    write_id(&id, IdType::Complaint)?;
    Ok(Json(state.complaint_service.send_reminder(&actor, &id).await?))
}

pub async fn rate_officer(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
    Json(request): Json<RatingRequest>,
) -> GrievanceResult<Json<Complaint>> {
    write_id(&id, IdType::Complaint)?;
    Ok(Json(
        state.complaint_service.rate_officer(&actor, &id, request.rating).await?,
    ))
}

pub async fn complaint_history(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> GrievanceResult<Json<HistoryPage>> {
    read_id(&id, IdType::Complaint)?;
    Ok(Json(
        state
            .complaint_service
            .history(&actor, &id, query.page, query.per_page)
            .await?,
    ))
}

pub async fn complaint_report(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
) -> GrievanceResult<Json<InterventionReport>> {
    read_id(&id, IdType::Complaint)?;
    Ok(Json(state.report_service.get_for_complaint(&actor, &id).await?))
}

pub async fn annotate_complaint(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
    Json(analysis): Json<AiAnalysis>,
) -> GrievanceResult<Json<Complaint>> {
    write_id(&id, IdType::Complaint)?;
    Ok(Json(state.complaint_service.annotate(&actor, &id, analysis).await?))
}

pub async fn report_feedback(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
    Json(request): Json<CitizenFeedbackRequest>,
) -> GrievanceResult<Json<InterventionReport>> {
    write_id(&id, IdType::Report)?;
    Ok(Json(state.report_service.citizen_feedback(&actor, &id, request).await?))
}

pub async fn analyze(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Json(request): Json<AnalyzeRequest>,
) -> GrievanceResult<Json<AiAnalysis>> {
    tracing::debug!("AI analysis requested by {}", actor.id);
    Ok(Json(
        state
            .complaint_service
            .analyze(&request.subject, &request.description)
            .await?,
    ))
}
