use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::{Mock, MockServer, ResponseTemplate, matchers::method};

use grievance_realtime::{
    GrievanceError, GrievanceResult,
    config::AppConfig,
    models::{
        account::{
            Actor, CitizenRegistration, CitizensQuery, LocationUpdate, LoginRequest, OfficerLevel,
            OfficerRegistration, OfficerUpdate, ProfileUpdate, Role, ServiceManRegistration, ServiceManStatus,
            ServiceManUpdate,
        },
        complaint::{
            AiAnalysis, ComplaintMedia, ComplaintRequest, ComplaintStatus, ProgressUpdate, ReopenRequest,
            TimelineAction,
        },
        department::{DepartmentRequest, ServiceRequest},
        report::{CompleteReportRequest, OpenReportRequest, ReportStatus, ReviewRequest},
    },
    services::{
        admin_service::AdminOperations,
        assignment_service::AssignmentOperations,
        catalog_service::CatalogOperations,
        complaint_service::ComplaintOperations,
        directory_service::DirectoryOperations,
        messaging_service::{MockNotificationService, NotificationService},
        rating_service::RatingOperations,
        report_service::ReportOperations,
        store_service::StoreService,
        triage_service::{DisabledTriageAdvisor, GeminiConfig, GeminiTriageAdvisor, TriageAdvisor},
    },
    state::AppState,
};

struct FailingAdvisor;

#[async_trait]
impl TriageAdvisor for FailingAdvisor {
    async fn analyze(&self, _subject: &str, _description: &str) -> GrievanceResult<Option<AiAnalysis>> {
        Err(GrievanceError::TriageUnavailable("upstream returned 500".to_string()))
    }
}

struct World {
    state: AppState,
    notifier: Arc<MockNotificationService>,
    citizen: Actor,
    officer: Actor,
    technician: Actor,
}

async fn world() -> World {
    world_with(Arc::new(MockNotificationService::new()), Arc::new(DisabledTriageAdvisor)).await
}

async fn world_with(notifier: Arc<MockNotificationService>, triage: Arc<dyn TriageAdvisor>) -> World {
    let notification_service: Arc<dyn NotificationService> = notifier.clone();
    let state = AppState::with_services(
        AppConfig::default(),
        Arc::new(StoreService::memory()),
        notification_service,
        triage,
    );

    state
        .catalog_service
        .create_department(DepartmentRequest {
            name: "Voirie".to_string(),
            description: "Routes, trottoirs et caniveaux".to_string(),
        })
        .await
        .unwrap();

    let officer = state
        .directory_service
        .register_officer(OfficerRegistration {
            name: "Awa Ouédraogo".to_string(),
            email: "awa@mairie.bf".to_string(),
            password: "secret123".to_string(),
            level: OfficerLevel::FirstResponder,
            department: "Voirie".to_string(),
            district: "Baskuy".to_string(),
        })
        .await
        .unwrap();
    let officer = Actor::new(officer.id, Role::Officer, officer.name);

    let citizen = state
        .directory_service
        .register_citizen(CitizenRegistration {
            name: "Moussa Kaboré".to_string(),
            email: "moussa@mail.bf".to_string(),
            phone: "70112233".to_string(),
            district: "Baskuy".to_string(),
            password: "secret123".to_string(),
        })
        .await
        .unwrap();
    let citizen = Actor::new(citizen.id, Role::Citizen, citizen.name);

    let technician = add_technician(&state, &officer, "issa@mairie.bf").await;

    World {
        state,
        notifier,
        citizen,
        officer,
        technician,
    }
}

async fn add_technician(state: &AppState, officer: &Actor, email: &str) -> Actor {
    let serviceman = state
        .directory_service
        .register_serviceman(
            ServiceManRegistration {
                name: "Issa Sawadogo".to_string(),
                email: email.to_string(),
                phone: "76000001".to_string(),
                password: "secret123".to_string(),
                district: "Baskuy".to_string(),
                department: None,
                specialization: Some("Voirie".to_string()),
            },
            officer,
        )
        .await
        .unwrap();
    Actor::new(serviceman.id, Role::ServiceMan, serviceman.name)
}

fn pothole() -> ComplaintRequest {
    ComplaintRequest {
        subject: "Nid de poule avenue Kwame Nkrumah".to_string(),
        description: "Un trou profond au milieu de la chaussée provoque des accidents de moto.".to_string(),
        department: "Voirie".to_string(),
        location: None,
        media: ComplaintMedia::default(),
        ai_analysis: None,
    }
}

async fn file_complaint(w: &World) -> String {
    w.state
        .complaint_service
        .create_complaint(&w.citizen, pothole())
        .await
        .unwrap()
        .id
}

/// Assign, open a report and complete it. Returns the report id.
async fn resolve(w: &World, complaint_id: &str) -> String {
    w.state
        .assignment_service
        .assign_technician(&w.officer, complaint_id, &w.technician.id)
        .await
        .unwrap();
    let report = w
        .state
        .report_service
        .open_report(
            &w.technician,
            OpenReportRequest {
                complaint_id: complaint_id.to_string(),
                work_description: Some("Rebouchage du trou à l'enrobé à froid".to_string()),
                materials_used: Vec::new(),
                location: None,
            },
        )
        .await
        .unwrap();
    w.state
        .report_service
        .complete(&w.technician, &report.id, CompleteReportRequest::default())
        .await
        .unwrap();
    report.id
}

fn reopen_request() -> ReopenRequest {
    ReopenRequest {
        status: ComplaintStatus::Pending,
        feedback: Some("Le trou est revenu après la pluie".to_string()),
    }
}

#[tokio::test]
async fn scenario_a_creation_routes_to_first_responder() {
    let w = world().await;
    let complaint = w
        .state
        .complaint_service
        .create_complaint(&w.citizen, pothole())
        .await
        .unwrap();

    assert_eq!(complaint.status, ComplaintStatus::Pending);
    assert_eq!(complaint.officer_id, w.officer.id);
    assert_eq!(complaint.created_by, w.citizen.id);

    let response = w.state.complaint_service.respond(complaint).await.unwrap();
    assert_eq!(response.action_history.len(), 1);
    assert_eq!(response.action_history[0].feedback, "Complaint received");
    assert_eq!(response.action_history[0].officer_level, 1);
    assert_eq!(response.timeline.len(), 1);
    assert_eq!(response.timeline[0].action, TimelineAction::Created);
}

#[tokio::test]
async fn test_creation_without_matching_officer_fails() {
    let w = world().await;
    let mut request = pothole();
    request.department = "Santé".to_string();

    let err = w
        .state
        .complaint_service
        .create_complaint(&w.citizen, request)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(w.state.complaint_service.list_for_citizen(&w.citizen).await.unwrap().is_empty());
}

#[tokio::test]
async fn scenario_b_assignment_flips_complaint_and_technician() {
    let w = world().await;
    let complaint_id = file_complaint(&w).await;

    let complaint = w
        .state
        .assignment_service
        .assign_technician(&w.officer, &complaint_id, &w.technician.id)
        .await
        .unwrap();
    assert_eq!(complaint.status, ComplaintStatus::InProcess);
    assert_eq!(complaint.assigned_service_man.as_deref(), Some(w.technician.id.as_str()));

    let tech = w.state.directory_service.get_serviceman(&w.technician.id).await.unwrap();
    assert_eq!(tech.status, ServiceManStatus::Busy);
    assert_eq!(tech.current_complaint.as_deref(), Some(complaint_id.as_str()));

    let history = w
        .state
        .complaint_service
        .history(&w.citizen, &complaint_id, None, None)
        .await
        .unwrap();
    let assigned = history
        .timeline
        .iter()
        .filter(|e| e.action == TimelineAction::AssignedServiceman)
        .count();
    assert_eq!(assigned, 1);

    let sent = w.notifier.sent().await;
    assert!(sent.iter().any(|m| m.to == "issa@mairie.bf"));

    let listed = w.state.complaint_service.list_for_serviceman(&w.technician).await.unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn test_failed_assignment_leaves_both_sides_untouched() {
    let w = world().await;
    let complaint_id = file_complaint(&w).await;
    w.state
        .directory_service
        .set_serviceman_status(&w.technician.id, ServiceManStatus::Offline)
        .await
        .unwrap();

    let err = w
        .state
        .assignment_service
        .assign_technician(&w.officer, &complaint_id, &w.technician.id)
        .await
        .unwrap_err();
    assert!(err.is_bad_request());

    let complaint = w.state.complaint_service.get_for_citizen(&w.citizen, &complaint_id).await.unwrap();
    assert_eq!(complaint.status, ComplaintStatus::Pending);
    assert!(complaint.assigned_service_man.is_none());
    let tech = w.state.directory_service.get_serviceman(&w.technician.id).await.unwrap();
    assert_eq!(tech.status, ServiceManStatus::Offline);
}

#[tokio::test]
async fn test_racing_assignments_commit_exactly_one() {
    let w = world().await;
    let complaint_id = file_complaint(&w).await;
    let second = add_technician(&w.state, &w.officer, "salif@mairie.bf").await;

    let (first_result, second_result) = tokio::join!(
        w.state
            .assignment_service
            .assign_technician(&w.officer, &complaint_id, &w.technician.id),
        w.state
            .assignment_service
            .assign_technician(&w.officer, &complaint_id, &second.id),
    );
    assert_eq!(
        [first_result.is_ok(), second_result.is_ok()].iter().filter(|ok| **ok).count(),
        1
    );

    let complaint = w.state.complaint_service.get_for_citizen(&w.citizen, &complaint_id).await.unwrap();
    let winner = complaint.assigned_service_man.clone().unwrap();
    for tech_id in [&w.technician.id, &second.id] {
        let tech = w.state.directory_service.get_serviceman(tech_id).await.unwrap();
        if *tech_id == winner {
            assert_eq!(tech.status, ServiceManStatus::Busy);
        } else {
            assert_eq!(tech.status, ServiceManStatus::Available);
            assert!(tech.current_complaint.is_none());
        }
    }
}

#[tokio::test]
async fn test_reassignment_requires_release() {
    let w = world().await;
    let complaint_id = file_complaint(&w).await;
    let second = add_technician(&w.state, &w.officer, "salif@mairie.bf").await;

    w.state
        .assignment_service
        .assign_technician(&w.officer, &complaint_id, &w.technician.id)
        .await
        .unwrap();
    let err = w
        .state
        .assignment_service
        .assign_technician(&w.officer, &complaint_id, &second.id)
        .await
        .unwrap_err();
    assert!(err.is_bad_request());

    let released = w
        .state
        .assignment_service
        .release_technician(&w.officer, &complaint_id, None)
        .await
        .unwrap();
    assert_eq!(released.status, ComplaintStatus::Pending);
    let tech = w.state.directory_service.get_serviceman(&w.technician.id).await.unwrap();
    assert_eq!(tech.status, ServiceManStatus::Available);

    let complaint = w
        .state
        .assignment_service
        .assign_technician(&w.officer, &complaint_id, &second.id)
        .await
        .unwrap();
    assert_eq!(complaint.assigned_service_man.as_deref(), Some(second.id.as_str()));
}

#[tokio::test]
async fn test_release_abandons_open_report() {
    let w = world().await;
    let complaint_id = file_complaint(&w).await;
    w.state
        .assignment_service
        .assign_technician(&w.officer, &complaint_id, &w.technician.id)
        .await
        .unwrap();
    let report = w
        .state
        .report_service
        .open_report(
            &w.technician,
            OpenReportRequest {
                complaint_id: complaint_id.clone(),
                work_description: Some("Décapage de la zone endommagée".to_string()),
                materials_used: Vec::new(),
                location: None,
            },
        )
        .await
        .unwrap();

    w.state
        .assignment_service
        .release_technician(&w.officer, &complaint_id, Some("Technicien envoyé en urgence ailleurs".to_string()))
        .await
        .unwrap();

    let report = w.state.report_service.get_for_serviceman(&w.technician, &report.id).await.unwrap();
    assert_eq!(report.status, ReportStatus::Abandoned);
    assert_ne!(report.status, ReportStatus::RequiresFollowup);
    assert!(report.end_time.is_none());
    assert_eq!(report.abandon_note.as_deref(), Some("Technicien envoyé en urgence ailleurs"));

    // Nothing to review on an abandoned report
    let err = w
        .state
        .report_service
        .validate(&w.officer, &report.id, ReviewRequest::default())
        .await
        .unwrap_err();
    assert!(err.is_bad_request());
    let err = w
        .state
        .report_service
        .flag_followup(&w.officer, &report.id, ReviewRequest::default())
        .await
        .unwrap_err();
    assert!(err.is_bad_request());
}

#[tokio::test]
async fn scenario_c_short_work_description_blocks_completion() {
    let w = world().await;
    let complaint_id = file_complaint(&w).await;
    w.state
        .assignment_service
        .assign_technician(&w.officer, &complaint_id, &w.technician.id)
        .await
        .unwrap();
    let report = w
        .state
        .report_service
        .open_report(
            &w.technician,
            OpenReportRequest {
                complaint_id: complaint_id.clone(),
                work_description: None,
                materials_used: Vec::new(),
                location: None,
            },
        )
        .await
        .unwrap();

    let err = w
        .state
        .report_service
        .complete(
            &w.technician,
            &report.id,
            CompleteReportRequest {
                work_description: Some("123456789".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_bad_request());

    let complaint = w.state.complaint_service.get_for_citizen(&w.citizen, &complaint_id).await.unwrap();
    assert_eq!(complaint.status, ComplaintStatus::InProcess);
    let tech = w.state.directory_service.get_serviceman(&w.technician.id).await.unwrap();
    assert_eq!(tech.status, ServiceManStatus::Busy);
}

#[tokio::test]
async fn test_completion_cascades_to_complaint_and_technician() {
    let w = world().await;
    let complaint_id = file_complaint(&w).await;
    let report_id = resolve(&w, &complaint_id).await;

    let complaint = w.state.complaint_service.get_for_citizen(&w.citizen, &complaint_id).await.unwrap();
    assert_eq!(complaint.status, ComplaintStatus::Resolved);

    let tech = w.state.directory_service.get_serviceman(&w.technician.id).await.unwrap();
    assert_eq!(tech.status, ServiceManStatus::Available);
    assert!(tech.current_complaint.is_none());
    assert_eq!(tech.stats.completed_interventions, 1);

    let report = w.state.report_service.get_for_complaint(&w.citizen, &complaint_id).await.unwrap();
    assert_eq!(report.id, report_id);
    assert_eq!(report.status, ReportStatus::Completed);
    assert!(report.end_time.is_some());

    let validated = w
        .state
        .report_service
        .validate(&w.officer, &report_id, ReviewRequest::default())
        .await
        .unwrap();
    assert_eq!(validated.status, ReportStatus::Validated);
    let history = w
        .state
        .complaint_service
        .history(&w.officer, &complaint_id, None, None)
        .await
        .unwrap();
    assert_eq!(history.timeline.last().map(|e| e.action), Some(TimelineAction::Validated));
}

#[tokio::test]
async fn scenario_d_rating_is_one_way() {
    let w = world().await;
    let complaint_id = file_complaint(&w).await;

    let err = w
        .state
        .complaint_service
        .rate_officer(&w.citizen, &complaint_id, 4)
        .await
        .unwrap_err();
    assert!(err.is_bad_request());

    resolve(&w, &complaint_id).await;
    let rated = w
        .state
        .complaint_service
        .rate_officer(&w.citizen, &complaint_id, 5)
        .await
        .unwrap();
    assert!(rated.is_rated);
    assert_eq!(rated.rating, 5);

    let ledger = w.state.rating_service.get_ledger(&w.officer.id).await.unwrap();
    assert_eq!(ledger.entries.len(), 1);
    assert_eq!(ledger.avg_rating, 5.0);

    let err = w
        .state
        .complaint_service
        .rate_officer(&w.citizen, &complaint_id, 1)
        .await
        .unwrap_err();
    assert!(err.is_bad_request());
    let complaint = w.state.complaint_service.get_for_citizen(&w.citizen, &complaint_id).await.unwrap();
    assert_eq!(complaint.rating, 5);
    assert_eq!(w.state.rating_service.get_ledger(&w.officer.id).await.unwrap().entries.len(), 1);
}

#[tokio::test]
async fn scenario_e_fourth_reopen_is_refused() {
    let w = world().await;
    let complaint_id = file_complaint(&w).await;

    for round in 1..=3 {
        resolve(&w, &complaint_id).await;
        let reopened = w
            .state
            .complaint_service
            .reopen(&w.citizen, &complaint_id, reopen_request())
            .await
            .unwrap();
        assert_eq!(reopened.status, ComplaintStatus::Pending);
        assert_eq!(reopened.reopen_count, round);
        assert!(reopened.assigned_service_man.is_none());
    }

    resolve(&w, &complaint_id).await;
    let err = w
        .state
        .complaint_service
        .reopen(&w.citizen, &complaint_id, reopen_request())
        .await
        .unwrap_err();
    assert!(err.is_bad_request());

    let complaint = w.state.complaint_service.get_for_citizen(&w.citizen, &complaint_id).await.unwrap();
    assert_eq!(complaint.reopen_count, 3);
    assert_eq!(complaint.status, ComplaintStatus::Resolved);

    let reopen_mails = w
        .notifier
        .sent()
        .await
        .into_iter()
        .filter(|m| m.to == "awa@mairie.bf")
        .count();
    assert_eq!(reopen_mails, 3);
}

#[tokio::test]
async fn test_reopen_of_open_complaint_is_refused() {
    let w = world().await;
    let complaint_id = file_complaint(&w).await;

    let err = w
        .state
        .complaint_service
        .reopen(&w.citizen, &complaint_id, reopen_request())
        .await
        .unwrap_err();
    assert!(err.is_bad_request());
}

#[tokio::test]
async fn scenario_f_deletion_rules() {
    let w = world().await;

    let resolved_id = file_complaint(&w).await;
    resolve(&w, &resolved_id).await;
    let err = w.state.complaint_service.delete(&w.citizen, &resolved_id).await.unwrap_err();
    assert!(err.is_bad_request());
    assert!(w.state.complaint_service.get_for_citizen(&w.citizen, &resolved_id).await.is_ok());

    let pending_id = file_complaint(&w).await;
    let intruder = Actor::new("cit-250101-zzzzz", Role::Citizen, "Intrus");
    assert!(w.state.complaint_service.delete(&intruder, &pending_id).await.unwrap_err().is_forbidden());

    w.state.complaint_service.delete(&w.citizen, &pending_id).await.unwrap();
    let err = w
        .state
        .complaint_service
        .get_for_citizen(&w.citizen, &pending_id)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    let remaining = w.state.complaint_service.list_for_citizen(&w.citizen).await.unwrap();
    assert_eq!(remaining.len(), 1);
}

#[tokio::test]
async fn test_officer_feedback_is_never_deduplicated() {
    let w = world().await;
    let complaint_id = file_complaint(&w).await;

    for _ in 0..2 {
        w.state
            .complaint_service
            .add_feedback(&w.officer, &complaint_id, "Équipe programmée pour jeudi")
            .await
            .unwrap();
    }

    let history = w
        .state
        .complaint_service
        .history(&w.citizen, &complaint_id, Some(1), Some(10))
        .await
        .unwrap();
    assert_eq!(history.action_history_total, 3);
    let repeated = history
        .action_history
        .iter()
        .filter(|e| e.feedback == "Équipe programmée pour jeudi")
        .count();
    assert_eq!(repeated, 2);
}

#[tokio::test]
async fn test_history_is_paginated_in_insertion_order() {
    let w = world().await;
    let complaint_id = file_complaint(&w).await;
    w.state
        .assignment_service
        .assign_technician(&w.officer, &complaint_id, &w.technician.id)
        .await
        .unwrap();
    for note in ["Barrières posées", "Découpe de la chaussée"] {
        w.state
            .complaint_service
            .record_progress(
                &w.technician,
                &complaint_id,
                ProgressUpdate {
                    status: ComplaintStatus::InProcess,
                    note: Some(note.to_string()),
                },
            )
            .await
            .unwrap();
    }

    let first = w
        .state
        .complaint_service
        .history(&w.citizen, &complaint_id, Some(1), Some(2))
        .await
        .unwrap();
    assert_eq!(first.timeline_total, 4);
    let actions: Vec<_> = first.timeline.iter().map(|e| e.action).collect();
    assert_eq!(actions, vec![TimelineAction::Created, TimelineAction::AssignedServiceman]);

    let second = w
        .state
        .complaint_service
        .history(&w.citizen, &complaint_id, Some(2), Some(2))
        .await
        .unwrap();
    let notes: Vec<_> = second.timeline.iter().filter_map(|e| e.note.as_deref()).collect();
    assert_eq!(notes, vec!["Barrières posées", "Découpe de la chaussée"]);

    let stranger = Actor::new("cit-250101-zzzzz", Role::Citizen, "Intrus");
    let err = w
        .state
        .complaint_service
        .history(&stranger, &complaint_id, None, None)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_triage_failure_does_not_block_creation() {
    let w = world_with(Arc::new(MockNotificationService::new()), Arc::new(FailingAdvisor)).await;

    let complaint = w
        .state
        .complaint_service
        .create_complaint(&w.citizen, pothole())
        .await
        .unwrap();
    assert!(complaint.ai_analysis.is_none());
    assert_eq!(complaint.status, ComplaintStatus::Pending);

    let err = w
        .state
        .complaint_service
        .analyze("Nid de poule", "Trou sur la chaussée")
        .await
        .unwrap_err();
    assert!(matches!(err, GrievanceError::TriageUnavailable(_)));
}

#[tokio::test]
async fn test_slow_triage_does_not_block_creation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;
    let advisor = GeminiTriageAdvisor::new(GeminiConfig {
        api_key: "test-key".to_string(),
        model: "gemini-1.5-flash".to_string(),
        base_url: server.uri(),
        timeout: Duration::from_millis(300),
    })
    .unwrap();
    let w = world_with(Arc::new(MockNotificationService::new()), Arc::new(advisor)).await;

    let started = Instant::now();
    let complaint = w
        .state
        .complaint_service
        .create_complaint(&w.citizen, pothole())
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(complaint.ai_analysis.is_none());
    assert_eq!(complaint.status, ComplaintStatus::Pending);
}

#[tokio::test]
async fn test_notification_failure_does_not_block_reminder() {
    let w = world_with(Arc::new(MockNotificationService::failing()), Arc::new(DisabledTriageAdvisor)).await;
    let complaint_id = file_complaint(&w).await;

    let complaint = w
        .state
        .complaint_service
        .send_reminder(&w.citizen, &complaint_id)
        .await
        .unwrap();
    assert!(complaint.last_reminded_at.is_some());

    let response = w.state.complaint_service.respond(complaint).await.unwrap();
    assert_eq!(
        response.action_history.last().map(|e| e.feedback.as_str()),
        Some("Reminder mail received by assigned officer.")
    );
}

#[tokio::test]
async fn test_department_stats_and_scope() {
    let w = world().await;
    let first = file_complaint(&w).await;
    file_complaint(&w).await;
    w.state
        .assignment_service
        .assign_technician(&w.officer, &first, &w.technician.id)
        .await
        .unwrap();

    let stats = w.state.complaint_service.department_stats(&w.officer).await.unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.in_process, 1);
    assert_eq!(stats.servicemen_busy, 1);

    let err = w.state.complaint_service.department_stats(&w.citizen).await.unwrap_err();
    assert!(err.is_forbidden());
}

fn admin() -> Actor {
    Actor::new("adm-240101-a1b2c", Role::Admin, "Mairie")
}

fn officer_registration(email: &str, department: &str, district: &str) -> OfficerRegistration {
    OfficerRegistration {
        name: "Fatimata Zongo".to_string(),
        email: email.to_string(),
        password: "secret123".to_string(),
        level: OfficerLevel::FirstResponder,
        department: department.to_string(),
        district: district.to_string(),
    }
}

fn citizen_registration(email: &str) -> CitizenRegistration {
    CitizenRegistration {
        name: "Aminata Traoré".to_string(),
        email: email.to_string(),
        phone: "70445566".to_string(),
        district: "Baskuy".to_string(),
        password: "secret123".to_string(),
    }
}

#[tokio::test]
async fn test_moving_officer_moves_complaint_routing() {
    let w = world().await;

    let moved = w
        .state
        .directory_service
        .update_officer(
            &w.officer.id,
            OfficerUpdate {
                district: Some("Nongremassom".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(moved.district, "Nongremassom");

    let err = w
        .state
        .complaint_service
        .create_complaint(&w.citizen, pothole())
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let replacement = w
        .state
        .directory_service
        .register_officer(officer_registration("fatimata@mairie.bf", "Voirie", "Baskuy"))
        .await
        .unwrap();
    let complaint = w
        .state
        .complaint_service
        .create_complaint(&w.citizen, pothole())
        .await
        .unwrap();
    assert_eq!(complaint.officer_id, replacement.id);
}

#[tokio::test]
async fn test_officer_cannot_move_onto_taken_route() {
    let w = world().await;
    w.state
        .directory_service
        .register_officer(officer_registration("fatimata@mairie.bf", "Voirie", "Bogodogo"))
        .await
        .unwrap();

    let err = w
        .state
        .directory_service
        .update_officer(
            &w.officer.id,
            OfficerUpdate {
                district: Some("Bogodogo".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, GrievanceError::Conflict(_)));

    let officer = w.state.directory_service.get_officer(&w.officer.id).await.unwrap();
    assert_eq!(officer.district, "Baskuy");
    let complaint = w
        .state
        .complaint_service
        .create_complaint(&w.citizen, pothole())
        .await
        .unwrap();
    assert_eq!(complaint.officer_id, w.officer.id);
}

#[tokio::test]
async fn test_officer_deletion_waits_for_open_complaints() {
    let w = world().await;
    let department = w.state.catalog_service.list_departments().await.unwrap().remove(0);
    w.state
        .catalog_service
        .assign_in_charge(&department.id, Some(w.officer.id.clone()))
        .await
        .unwrap();
    let complaint_id = file_complaint(&w).await;

    let err = w.state.directory_service.delete_officer(&w.officer.id).await.unwrap_err();
    assert!(err.is_bad_request());

    resolve(&w, &complaint_id).await;
    w.state.directory_service.delete_officer(&w.officer.id).await.unwrap();

    assert!(w.state.directory_service.get_officer(&w.officer.id).await.unwrap_err().is_not_found());
    let department = w.state.catalog_service.get_department(&department.id).await.unwrap();
    assert!(department.in_charge.is_none());
    assert!(w
        .state
        .complaint_service
        .create_complaint(&w.citizen, pothole())
        .await
        .unwrap_err()
        .is_not_found());

    // The route and the address are both free again
    let successor = w
        .state
        .directory_service
        .register_officer(officer_registration("awa@mairie.bf", "Voirie", "Baskuy"))
        .await
        .unwrap();
    let complaint = w
        .state
        .complaint_service
        .create_complaint(&w.citizen, pothole())
        .await
        .unwrap();
    assert_eq!(complaint.officer_id, successor.id);
}

#[tokio::test]
async fn test_citizens_are_paginated_newest_first() {
    let w = world().await;
    w.state
        .directory_service
        .register_citizen(citizen_registration("aminata@mail.bf"))
        .await
        .unwrap();
    let newest = w
        .state
        .directory_service
        .register_citizen(citizen_registration("salif@mail.bf"))
        .await
        .unwrap();

    let first = w
        .state
        .directory_service
        .list_citizens(CitizensQuery {
            page: Some(1),
            limit: Some(2),
        })
        .await
        .unwrap();
    assert_eq!(first.total, 3);
    assert_eq!(first.pages, 2);
    assert_eq!(first.citizens.len(), 2);
    assert_eq!(first.citizens[0].id, newest.id);

    let second = w
        .state
        .directory_service
        .list_citizens(CitizensQuery {
            page: Some(2),
            limit: Some(2),
        })
        .await
        .unwrap();
    assert_eq!(second.citizens.len(), 1);
    assert_eq!(second.citizens[0].id, w.citizen.id);

    let clamped = w
        .state
        .directory_service
        .list_citizens(CitizensQuery {
            page: Some(0),
            limit: Some(0),
        })
        .await
        .unwrap();
    assert_eq!(clamped.page, 1);
    assert_eq!(clamped.limit, 1);
}

#[tokio::test]
async fn test_deactivated_citizen_cannot_sign_in() {
    let w = world().await;
    let login = || LoginRequest {
        email: "moussa@mail.bf".to_string(),
        password: "secret123".to_string(),
    };

    let citizen = w
        .state
        .directory_service
        .set_citizen_active(&w.citizen.id, false)
        .await
        .unwrap();
    assert!(!citizen.is_active);
    let err = w.state.directory_service.login(login()).await.unwrap_err();
    assert!(err.is_forbidden());

    w.state
        .directory_service
        .set_citizen_active(&w.citizen.id, true)
        .await
        .unwrap();
    let session = w.state.directory_service.login(login()).await.unwrap();
    assert_eq!(session.role, Role::Citizen);
}

#[tokio::test]
async fn test_dashboard_and_citizen_counts() {
    let w = world().await;
    let department = w.state.catalog_service.list_departments().await.unwrap().remove(0);
    w.state
        .catalog_service
        .create_service(ServiceRequest {
            name: "Éclairage public".to_string(),
            department_id: department.id.clone(),
            description: None,
            sub_in_charge: None,
        })
        .await
        .unwrap();

    let resolved = file_complaint(&w).await;
    file_complaint(&w).await;
    resolve(&w, &resolved).await;

    let stats = w.state.admin_service.dashboard_stats().await.unwrap();
    assert_eq!(stats.citizens, 1);
    assert_eq!(stats.departments, 1);
    assert_eq!(stats.services, 1);
    assert_eq!(stats.active_officers, 1);
    assert_eq!(stats.complaints.total, 2);
    assert_eq!(stats.complaints.pending, 1);
    assert_eq!(stats.complaints.resolved, 1);

    let detail = w.state.admin_service.citizen_detail(&w.citizen.id).await.unwrap();
    assert_eq!(detail.citizen.email, "moussa@mail.bf");
    assert_eq!(detail.stats, stats.complaints);

    let err = w
        .state
        .admin_service
        .citizen_detail("cit-240101-abc12")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_technician_edits_stay_in_department() {
    let w = world().await;
    w.state
        .catalog_service
        .create_department(DepartmentRequest {
            name: "Santé".to_string(),
            description: "Centres de santé".to_string(),
        })
        .await
        .unwrap();
    let other = w
        .state
        .directory_service
        .register_officer(officer_registration("fatimata@mairie.bf", "Santé", "Baskuy"))
        .await
        .unwrap();
    let other = Actor::new(other.id, Role::Officer, other.name);

    let update = || ServiceManUpdate {
        district: Some("Bogodogo".to_string()),
        ..Default::default()
    };
    let err = w
        .state
        .directory_service
        .update_serviceman(&other, &w.technician.id, update())
        .await
        .unwrap_err();
    assert!(err.is_forbidden());
    let err = w
        .state
        .directory_service
        .delete_serviceman(&other, &w.technician.id)
        .await
        .unwrap_err();
    assert!(err.is_forbidden());

    let updated = w
        .state
        .directory_service
        .update_serviceman(&w.officer, &w.technician.id, update())
        .await
        .unwrap();
    assert_eq!(updated.district, "Bogodogo");

    // Admins are not confined to a department
    let updated = w
        .state
        .directory_service
        .update_serviceman(
            &admin(),
            &w.technician.id,
            ServiceManUpdate {
                specialization: Some("Assainissement".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.specialization.as_deref(), Some("Assainissement"));
    assert_eq!(updated.district, "Bogodogo");
}

#[tokio::test]
async fn test_busy_technician_cannot_be_deleted() {
    let w = world().await;
    let complaint_id = file_complaint(&w).await;
    w.state
        .assignment_service
        .assign_technician(&w.officer, &complaint_id, &w.technician.id)
        .await
        .unwrap();

    let err = w
        .state
        .directory_service
        .delete_serviceman(&w.officer, &w.technician.id)
        .await
        .unwrap_err();
    assert!(err.is_bad_request());

    w.state
        .assignment_service
        .release_technician(&w.officer, &complaint_id, None)
        .await
        .unwrap();
    w.state
        .directory_service
        .delete_serviceman(&w.officer, &w.technician.id)
        .await
        .unwrap();

    assert!(w
        .state
        .directory_service
        .list_servicemen("Voirie")
        .await
        .unwrap()
        .is_empty());
    // Email is released with the account
    add_technician(&w.state, &w.officer, "issa@mairie.bf").await;
}

#[tokio::test]
async fn test_technician_profile_and_location() {
    let w = world().await;

    let profile = w
        .state
        .directory_service
        .update_profile(
            &w.technician.id,
            ProfileUpdate {
                phone: Some("76999999".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(profile.phone, "76999999");
    assert_eq!(profile.district, "Baskuy");
    assert_eq!(profile.name, "Issa Sawadogo");

    let err = w
        .state
        .directory_service
        .update_profile(
            &w.technician.id,
            ProfileUpdate {
                name: Some("  ".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_bad_request());

    let err = w
        .state
        .directory_service
        .update_location(
            &w.technician.id,
            LocationUpdate {
                latitude: 95.0,
                longitude: -1.52,
                address: None,
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_bad_request());

    w.state
        .directory_service
        .update_location(
            &w.technician.id,
            LocationUpdate {
                latitude: 12.37,
                longitude: -1.52,
                address: Some("Place de la Nation".to_string()),
            },
        )
        .await
        .unwrap();
    let tech = w.state.directory_service.get_serviceman(&w.technician.id).await.unwrap();
    let location = tech.current_location.unwrap();
    assert_eq!(location.latitude, 12.37);
    assert!(location.captured_at.is_some());
}
