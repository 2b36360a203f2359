// src/routes.rs
use axum::{
    Router,
    routing::{get, patch, post, put},
};
use std::sync::Arc;

use crate::{
    handlers::{admin_handler, auth_handler, complaint_handler, department_handler, health, serviceman_handler},
    state::AppState,
};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api())
        .with_state(state)
}

fn api() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(auth_handler::register))
        .route("/auth/login", post(auth_handler::login))
        .route("/auth/me", get(auth_handler::me))
        .merge(citizen_routes())
        .merge(department_routes())
        .merge(serviceman_routes())
        .merge(admin_routes())
}

fn citizen_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/complaints",
            get(complaint_handler::list_complaints).post(complaint_handler::create_complaint),
        )
        .route(
            "/complaints/:id",
            get(complaint_handler::get_complaint)
                .patch(complaint_handler::reopen_complaint)
                .delete(complaint_handler::delete_complaint),
        )
        .route("/complaints/:id/history", get(complaint_handler::complaint_history))
        .route("/complaints/:id/report", get(complaint_handler::complaint_report))
        .route("/complaints/:id/analysis", put(complaint_handler::annotate_complaint))
        .route("/complaints/reminder/:id", patch(complaint_handler::send_reminder))
        .route("/complaints/rateOfficer/:id", patch(complaint_handler::rate_officer))
        .route("/complaints/reports/:id/feedback", post(complaint_handler::report_feedback))
        .route("/ai/analyze", post(complaint_handler::analyze))
}

fn department_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/department/complaints", get(department_handler::list_complaints))
        .route("/department/complaints/:id", get(department_handler::get_complaint))
        .route("/department/complaints/:id/assign", post(department_handler::assign_serviceman))
        .route("/department/complaints/:id/release", post(department_handler::release_serviceman))
        .route("/department/complaints/:id/feedback", post(department_handler::add_feedback))
        .route("/department/stats", get(department_handler::stats))
        .route(
            "/department/servicemen",
            get(department_handler::list_servicemen).post(department_handler::add_serviceman),
        )
        .route(
            "/department/servicemen/:id",
            patch(department_handler::update_serviceman).delete(department_handler::delete_serviceman),
        )
        .route("/department/reports/:id/validate", post(department_handler::validate_report))
        .route("/department/reports/:id/followup", post(department_handler::flag_followup))
}

fn serviceman_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/serviceman/profile",
            get(serviceman_handler::profile).patch(serviceman_handler::update_profile),
        )
        .route("/serviceman/location", patch(serviceman_handler::update_location))
        .route("/serviceman/status", patch(serviceman_handler::update_status))
        .route("/serviceman/complaints", get(serviceman_handler::list_complaints))
        .route("/serviceman/complaints/:id", get(serviceman_handler::get_complaint))
        .route("/serviceman/complaints/:id/status", patch(serviceman_handler::record_progress))
        .route(
            "/serviceman/reports",
            get(serviceman_handler::list_reports).post(serviceman_handler::open_report),
        )
        .route(
            "/serviceman/reports/:id",
            get(serviceman_handler::get_report).patch(serviceman_handler::update_report),
        )
        .route("/serviceman/reports/:id/media", post(serviceman_handler::add_media))
        .route("/serviceman/reports/:id/complete", post(serviceman_handler::complete_report))
}

fn admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/dashboard/stats", get(admin_handler::dashboard_stats))
        .route(
            "/admin/citizens",
            get(admin_handler::list_citizens).post(admin_handler::create_citizen),
        )
        .route("/admin/citizens/:id", get(admin_handler::get_citizen))
        .route("/admin/citizens/:id/status", put(admin_handler::set_citizen_active))
        .route(
            "/admin/departments",
            get(admin_handler::list_departments).post(admin_handler::create_department),
        )
        .route(
            "/admin/departments/:id",
            get(admin_handler::get_department)
                .patch(admin_handler::update_department)
                .delete(admin_handler::delete_department),
        )
        .route("/admin/departments/:id/in-charge", put(admin_handler::assign_in_charge))
        .route(
            "/admin/services",
            get(admin_handler::list_services).post(admin_handler::create_service),
        )
        .route(
            "/admin/services/:id",
            patch(admin_handler::update_service).delete(admin_handler::delete_service),
        )
        .route(
            "/admin/officers",
            get(admin_handler::list_officers).post(admin_handler::register_officer),
        )
        .route(
            "/admin/officers/:id",
            patch(admin_handler::update_officer).delete(admin_handler::delete_officer),
        )
        .route("/admin/officers/:id/activation", patch(admin_handler::set_officer_active))
        .route("/admin/servicemen", post(department_handler::add_serviceman))
        .route("/admin/admins", post(admin_handler::register_admin))
        .route("/admin/complaints/:id/assign", post(department_handler::assign_serviceman))
        .route("/admin/complaints/:id/release", post(department_handler::release_serviceman))
}
