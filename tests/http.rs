use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

use grievance_realtime::{
    config::AppConfig,
    models::{
        account::{
            AdminRegistration, CitizenRegistration, LoginRequest, OfficerLevel, OfficerRegistration,
            ServiceManRegistration, Session,
        },
        department::DepartmentRequest,
    },
    routes,
    services::{
        catalog_service::CatalogOperations,
        directory_service::DirectoryOperations,
        messaging_service::{MockNotificationService, NotificationService},
        store_service::{StoreKeys, StoreService, WriteBatch},
        triage_service::DisabledTriageAdvisor,
    },
    state::AppState,
};

struct Api {
    app: Router,
    state: Arc<AppState>,
    citizen: String,
    officer: String,
    technician: String,
    admin: String,
}

impl Api {
    async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn file_complaint(&self) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/v1/complaints",
                Some(&self.citizen),
                Some(json!({
                    "subject": "Caniveau bouché rue 12.34",
                    "description": "Les eaux stagnent devant l'école depuis trois jours.",
                    "department": "Voirie"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }
}

async fn sign_in(state: &AppState, email: &str) -> String {
    state
        .directory_service
        .login(LoginRequest {
            email: email.to_string(),
            password: "secret123".to_string(),
        })
        .await
        .unwrap()
        .token
}

async fn api() -> Api {
    let notification_service: Arc<dyn NotificationService> = Arc::new(MockNotificationService::new());
    let state = Arc::new(AppState::with_services(
        AppConfig::default(),
        Arc::new(StoreService::memory()),
        notification_service,
        Arc::new(DisabledTriageAdvisor),
    ));

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
    state
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
    state
        .directory_service
        .register_admin(AdminRegistration {
            name: "Mairie".to_string(),
            email: "admin@mairie.bf".to_string(),
            password: "secret123".to_string(),
        })
        .await
        .unwrap();

    let officer_actor = state.directory_service.get_officer(&officer.id).await.unwrap().actor();
    state
        .directory_service
        .register_serviceman(
            ServiceManRegistration {
                name: "Issa Sawadogo".to_string(),
                email: "issa@mairie.bf".to_string(),
                phone: "76000001".to_string(),
                password: "secret123".to_string(),
                district: "Baskuy".to_string(),
                department: None,
                specialization: None,
            },
            &officer_actor,
        )
        .await
        .unwrap();

    Api {
        app: routes::router(state.clone()),
        citizen: sign_in(&state, "moussa@mail.bf").await,
        officer: sign_in(&state, "awa@mairie.bf").await,
        technician: sign_in(&state, "issa@mairie.bf").await,
        admin: sign_in(&state, "admin@mairie.bf").await,
        state,
    }
}

#[tokio::test]
async fn test_health_reports_backend() {
    let api = api().await;
    let (status, body) = api.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], "memory");
}

#[tokio::test]
async fn test_register_then_login_over_http() {
    let api = api().await;
    let registration = json!({
        "name": "Aminata Traoré",
        "email": "aminata@mail.bf",
        "phone": "70445566",
        "district": "Baskuy",
        "password": "secret123"
    });

    let (status, body) = api
        .send(Method::POST, "/api/v1/auth/register", None, Some(registration.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["email"], "aminata@mail.bf");
    assert!(body.get("password_hash").is_none());

    let (status, body) = api
        .send(Method::POST, "/api/v1/auth/register", None, Some(registration))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
    assert!(body["message"].is_string());

    let (status, body) = api
        .send(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "aminata@mail.bf", "password": "secret123" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "citizen");
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = api.send(Method::GET, "/api/v1/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Aminata Traoré");

    let (status, body) = api
        .send(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "aminata@mail.bf", "password": "wrong-one" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_missing_or_expired_token_is_unauthorized() {
    let api = api().await;

    let (status, body) = api.send(Method::GET, "/api/v1/complaints", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = api
        .send(Method::GET, "/api/v1/complaints", Some("not-a-session"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let key = StoreKeys::session(&api.citizen);
    let mut session: Session = api.state.store_service.get(&key).await.unwrap().unwrap();
    session.expires_at = Utc::now() - Duration::minutes(1);
    let mut batch = WriteBatch::new();
    batch.set(&key, &session).unwrap();
    api.state.store_service.commit(batch).await.unwrap();

    let (status, body) = api.send(Method::GET, "/api/v1/auth/me", Some(&api.citizen), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "token_invalid");
}

#[tokio::test]
async fn test_wrong_role_is_forbidden() {
    let api = api().await;

    let (status, body) = api
        .send(Method::GET, "/api/v1/admin/dashboard/stats", Some(&api.citizen), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["message"].is_string());

    let (status, _) = api
        .send(Method::GET, "/api/v1/department/complaints", Some(&api.technician), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = api
        .send(
            Method::PATCH,
            "/api/v1/serviceman/location",
            Some(&api.officer),
            Some(json!({ "latitude": 12.37, "longitude": -1.52 })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_complaint_routes() {
    let api = api().await;
    let id = api.file_complaint().await;

    let (status, body) = api
        .send(Method::GET, &format!("/api/v1/complaints/{}", id), Some(&api.citizen), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["timeline"].as_array().unwrap().len(), 1);

    // Reminder has its own route next to /complaints/:id
    let (status, body) = api
        .send(
            Method::PATCH,
            &format!("/api/v1/complaints/reminder/{}", id),
            Some(&api.citizen),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["last_reminded_at"].is_string());

    let (status, body) = api
        .send(
            Method::PATCH,
            &format!("/api/v1/complaints/{}", id),
            Some(&api.citizen),
            Some(json!({ "status": "pending", "feedback": "Toujours bouché" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Complaint is already opened");

    let (status, body) = api
        .send(Method::GET, "/api/v1/department/complaints", Some(&api.officer), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_and_malformed_ids() {
    let api = api().await;

    let (status, body) = api
        .send(Method::GET, "/api/v1/complaints/cmp-240101-abc12", Some(&api.citizen), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());

    let (status, _) = api
        .send(Method::GET, "/api/v1/complaints/garbage", Some(&api.citizen), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = api
        .send(Method::PATCH, "/api/v1/complaints/reminder/garbage", Some(&api.citizen), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_field");
}

#[tokio::test]
async fn test_admin_console_routes() {
    let api = api().await;
    api.file_complaint().await;

    let (status, body) = api
        .send(Method::GET, "/api/v1/admin/dashboard/stats", Some(&api.admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["citizens"], 1);
    assert_eq!(body["complaints"]["pending"], 1);

    let (status, body) = api
        .send(Method::GET, "/api/v1/admin/citizens?page=1&limit=5", Some(&api.admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    let citizen_id = body["citizens"][0]["id"].as_str().unwrap().to_string();

    let (status, body) = api
        .send(
            Method::GET,
            &format!("/api/v1/admin/citizens/{}", citizen_id),
            Some(&api.admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"]["total"], 1);

    let (status, body) = api
        .send(
            Method::PUT,
            &format!("/api/v1/admin/citizens/{}/status", citizen_id),
            Some(&api.admin),
            Some(json!({ "is_active": false })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_active"], false);

    let (status, _) = api
        .send(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "moussa@mail.bf", "password": "secret123" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let officer = api.state.directory_service.find_by_email("awa@mairie.bf").await.unwrap().unwrap();
    let (status, body) = api
        .send(
            Method::DELETE,
            &format!("/api/v1/admin/officers/{}", officer.id()),
            Some(&api.admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn test_technician_self_service_routes() {
    let api = api().await;

    let (status, body) = api
        .send(
            Method::PATCH,
            "/api/v1/serviceman/profile",
            Some(&api.technician),
            Some(json!({ "phone": "76999999" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phone"], "76999999");

    let (status, body) = api
        .send(
            Method::PATCH,
            "/api/v1/serviceman/location",
            Some(&api.technician),
            Some(json!({ "latitude": 120.0, "longitude": -1.52 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_failed");
    assert!(body["details"].is_array());

    let (status, body) = api
        .send(
            Method::PATCH,
            "/api/v1/serviceman/location",
            Some(&api.technician),
            Some(json!({ "latitude": 12.37, "longitude": -1.52, "address": "Place de la Nation" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["current_location"]["address"], "Place de la Nation");

    let (status, body) = api
        .send(Method::GET, "/api/v1/serviceman/profile", Some(&api.technician), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["current_location"]["latitude"], 12.37);
}
