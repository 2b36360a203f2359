// src/handlers/admin_handler.rs
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
        account::{
            AccountProfile, ActivationRequest, AdminRegistration, CitizenDetail, CitizenPage, CitizenRegistration,
            CitizenResponse, CitizensQuery, OfficerRegistration, OfficerResponse, OfficerUpdate, Role,
        },
        complaint::DashboardStats,
        department::{
            Department, DepartmentRequest, DepartmentUpdate, InChargeRequest, Service, ServiceRequest, ServiceUpdate,
            ServicesQuery,
        },
    },
    services::{
        admin_service::AdminOperations, catalog_service::CatalogOperations, directory_service::DirectoryOperations,
    },
    state::AppState,
    utils::id_generator::IdType,
};

pub async fn dashboard_stats(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
) -> GrievanceResult<Json<DashboardStats>> {
    actor.require(Role::Admin)?;
    Ok(Json(state.admin_service.dashboard_stats().await?))
}

// Citizens

pub async fn list_citizens(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Query(query): Query<CitizensQuery>,
) -> GrievanceResult<Json<CitizenPage>> {
    actor.require(Role::Admin)?;
    Ok(Json(state.directory_service.list_citizens(query).await?))
}

pub async fn create_citizen(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Json(registration): Json<CitizenRegistration>,
) -> GrievanceResult<(StatusCode, Json<CitizenResponse>)> {
    actor.require(Role::Admin)?;
    let citizen = state.directory_service.register_citizen(registration).await?;
    tracing::info!("Citizen {} created by admin {}", citizen.id, actor.id);
    Ok((StatusCode::CREATED, Json(citizen)))
}

pub async fn get_citizen(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
) -> GrievanceResult<Json<CitizenDetail>> {
    actor.require(Role::Admin)?;
    read_id(&id, IdType::Citizen)?;
    Ok(Json(state.admin_service.citizen_detail(&id).await?))
}

pub async fn set_citizen_active(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
    Json(activation): Json<ActivationRequest>,
) -> GrievanceResult<Json<CitizenResponse>> {
    actor.require(Role::Admin)?;
    write_id(&id, IdType::Citizen)?;
    Ok(Json(
        state
            .directory_service
            .set_citizen_active(&id, activation.is_active)
            .await?,
    ))
}

// Departments

pub async fn create_department(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Json(request): Json<DepartmentRequest>,
) -> GrievanceResult<(StatusCode, Json<Department>)> {
    actor.require(Role::Admin)?;
    let department = state.catalog_service.create_department(request).await?;
    Ok((StatusCode::CREATED, Json(department)))
}

/// Any signed-in caller may browse the catalog.
pub async fn list_departments(
    State(state): State<Arc<AppState>>,
    AuthActor(_actor): AuthActor,
) -> GrievanceResult<Json<Vec<Department>>> {
    Ok(Json(state.catalog_service.list_departments().await?))
}

pub async fn get_department(
    State(state): State<Arc<AppState>>,
    AuthActor(_actor): AuthActor,
    Path(id): Path<String>,
) -> GrievanceResult<Json<Department>> {
    read_id(&id, IdType::Department)?;
    Ok(Json(state.catalog_service.get_department(&id).await?))
}

pub async fn update_department(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
    Json(update): Json<DepartmentUpdate>,
) -> GrievanceResult<Json<Department>> {
    actor.require(Role::Admin)?;
    write_id(&id, IdType::Department)?;
    Ok(Json(state.catalog_service.update_department(&id, update).await?))
}

pub async fn delete_department(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
) -> GrievanceResult<StatusCode> {
    actor.require(Role::Admin)?;
    write_id(&id, IdType::Department)?;
    state.catalog_service.delete_department(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn assign_in_charge(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
    Json(request): Json<InChargeRequest>,
) -> GrievanceResult<Json<Department>> {
    actor.require(Role::Admin)?;
    write_id(&id, IdType::Department)?;
    if let Some(officer_id) = &request.officer_id {
        write_id(officer_id, IdType::Officer)?;
    }
    Ok(Json(
        state.catalog_service.assign_in_charge(&id, request.officer_id).await?,
    ))
}

// Services

pub async fn create_service(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Json(request): Json<ServiceRequest>,
) -> GrievanceResult<(StatusCode, Json<Service>)> {
    actor.require(Role::Admin)?;
    write_id(&request.department_id, IdType::Department)?;
    let service = state.catalog_service.create_service(request).await?;
    Ok((StatusCode::CREATED, Json(service)))
}

pub async fn list_services(
    State(state): State<Arc<AppState>>,
    AuthActor(_actor): AuthActor,
    Query(query): Query<ServicesQuery>,
) -> GrievanceResult<Json<Vec<Service>>> {
    Ok(Json(
        state
            .catalog_service
            .list_services(query.department_id.as_deref())
            .await?,
    ))
}

pub async fn update_service(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
    Json(update): Json<ServiceUpdate>,
) -> GrievanceResult<Json<Service>> {
    actor.require(Role::Admin)?;
    write_id(&id, IdType::Service)?;
    Ok(Json(state.catalog_service.update_service(&id, update).await?))
}

pub async fn delete_service(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
) -> GrievanceResult<StatusCode> {
    actor.require(Role::Admin)?;
    write_id(&id, IdType::Service)?;
    state.catalog_service.delete_service(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Staff

pub async fn register_officer(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Json(registration): Json<OfficerRegistration>,
) -> GrievanceResult<(StatusCode, Json<OfficerResponse>)> {
    actor.require(Role::Admin)?;
    let officer = state.directory_service.register_officer(registration).await?;
    Ok((StatusCode::CREATED, Json(officer)))
}

pub async fn list_officers(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
) -> GrievanceResult<Json<Vec<OfficerResponse>>> {
    actor.require(Role::Admin)?;
    Ok(Json(state.directory_service.list_officers().await?))
}

pub async fn set_officer_active(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
    Json(activation): Json<ActivationRequest>,
) -> GrievanceResult<Json<OfficerResponse>> {
    actor.require(Role::Admin)?;
    write_id(&id, IdType::Officer)?;
    Ok(Json(
        state
            .directory_service
            .set_officer_active(&id, activation.is_active)
            .await?,
    ))
}

pub async fn update_officer(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
    Json(update): Json<OfficerUpdate>,
) -> GrievanceResult<Json<OfficerResponse>> {
    actor.require(Role::Admin)?;
    write_id(&id, IdType::Officer)?;
    Ok(Json(state.directory_service.update_officer(&id, update).await?))
}

pub async fn delete_officer(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
) -> GrievanceResult<StatusCode> {
    actor.require(Role::Admin)?;
    write_id(&id, IdType::Officer)?;
    state.directory_service.delete_officer(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn register_admin(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Json(registration): Json<AdminRegistration>,
) -> GrievanceResult<(StatusCode, Json<AccountProfile>)> {
    actor.require(Role::Admin)?;
    let admin = state.directory_service.register_admin(registration).await?;
    Ok((StatusCode::CREATED, Json(admin)))
}
