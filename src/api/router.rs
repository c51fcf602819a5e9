//! Hospital records API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//!
//! Middleware stack (outermost → innermost):
//! 1. CORS (when enabled) → 2. Auth validator → 3. Audit logger

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the API router.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

pub(crate) fn build_router(ctx: ApiContext) -> Router {
    // Layers are applied from bottom (innermost) to top (outermost):
    //   Extension (outermost) → Auth → Audit (innermost) → Handler
    //
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let protected = Router::new()
        .route("/me", get(endpoints::auth::me))
        .route(
            "/patients",
            get(endpoints::patients::list).post(endpoints::patients::create),
        )
        .route("/patients/qr_auth", post(endpoints::patients::qr_auth))
        .route(
            "/patients/fingerprint_auth",
            post(endpoints::patients::fingerprint_auth),
        )
        .route(
            "/patients/:id",
            get(endpoints::patients::get)
                .put(endpoints::patients::update)
                .patch(endpoints::patients::update)
                .delete(endpoints::patients::delete),
        )
        .route("/patients/:id/qr", get(endpoints::patients::qr))
        .route(
            "/services",
            get(endpoints::services::list).post(endpoints::services::create),
        )
        .route(
            "/services/:id",
            get(endpoints::services::get)
                .put(endpoints::services::update)
                .patch(endpoints::services::update)
                .delete(endpoints::services::delete),
        )
        .route(
            "/medical-records",
            get(endpoints::medical_records::list).post(endpoints::medical_records::create),
        )
        .route(
            "/medical-records/:id",
            get(endpoints::medical_records::get)
                .put(endpoints::medical_records::update)
                .patch(endpoints::medical_records::update)
                .delete(endpoints::medical_records::delete),
        )
        .route(
            "/test-results",
            get(endpoints::test_results::list).post(endpoints::test_results::create),
        )
        .route(
            "/test-results/:id",
            get(endpoints::test_results::get)
                .put(endpoints::test_results::update)
                .patch(endpoints::test_results::update)
                .delete(endpoints::test_results::delete),
        )
        .route(
            "/appointments",
            get(endpoints::appointments::list).post(endpoints::appointments::create),
        )
        .route(
            "/appointments/:id",
            get(endpoints::appointments::get)
                .put(endpoints::appointments::update)
                .patch(endpoints::appointments::update)
                .delete(endpoints::appointments::delete),
        )
        .route(
            "/patient-appointments/:patient_id",
            get(endpoints::appointments::for_patient),
        )
        .route("/staff", get(endpoints::staff::list))
        .route(
            "/staff/:id",
            get(endpoints::staff::get).patch(endpoints::staff::update),
        )
        .with_state(ctx.clone())
        // Middleware stack (innermost first, outermost last):
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        // Extension must be outermost so middleware can extract ApiContext
        .layer(axum::Extension(ctx.clone()));

    // Unprotected routes (no bearer token)
    let unprotected = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/register", post(endpoints::auth::register))
        .route("/token", post(endpoints::auth::token))
        .route("/token/refresh", post(endpoints::auth::refresh))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::map_response(middleware::auth::no_store))
        .layer(axum::Extension(ctx.clone()));

    let router = Router::new().merge(protected).merge(unprotected);

    if ctx.core.config.cors_permissive {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::AppConfig;

    /// Router over a temp data directory with cheap password hashing.
    /// The tempdir guard must be kept alive for the duration of the test.
    fn test_app() -> (Router, Arc<CoreState>, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = AppConfig::with_data_dir(tmp.path().to_path_buf());
        config.pbkdf2_iterations = 1_000;
        let core = Arc::new(CoreState::new(config));
        core.init_storage().unwrap();
        (api_router(core.clone()), core, tmp)
    }

    fn make_request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            builder = builder.header("Authorization", format!("Bearer {t}"));
        }
        match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, req: Request<Body>) -> Response {
        app.clone().oneshot(req).await.unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let body = to_bytes(response.into_body(), 1 << 20).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    /// Register `username` and return its access token.
    async fn register_and_login(app: &Router, username: &str, role: Option<&str>) -> String {
        let mut body = json!({
            "username": username,
            "password": "s3cret-pass",
            "email": format!("{username}@example.org"),
        });
        if let Some(role) = role {
            body["role"] = json!(role);
        }
        let response = send(app, make_request("POST", "/register", None, Some(body))).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = send(
            app,
            make_request(
                "POST",
                "/token",
                None,
                Some(json!({"username": username, "password": "s3cret-pass"})),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response).await["access"].as_str().unwrap().to_string()
    }

    fn patient_body(username: &str) -> Value {
        json!({
            "user": {
                "username": username,
                "password": "patient-pass",
                "email": format!("{username}@example.org"),
            },
            "first_name": "Ada",
            "last_name": "Lovelace",
            "date_of_birth": "1990-12-10",
            "gender": "F",
            "blood_type": "O+",
            "address": "1 Main St",
            "phone_number": "555-0100",
            "emergency_contact": "Charles",
            "emergency_phone": "555-0101",
            "fingerprint_hash": "fp-ada",
        })
    }

    async fn create_patient(app: &Router, token: &str, username: &str) -> Value {
        let response = send(
            app,
            make_request("POST", "/patients", Some(token), Some(patient_body(username))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await
    }

    #[tokio::test]
    async fn health_is_public() {
        let (app, _core, _tmp) = test_app();
        let response = send(&app, make_request("GET", "/health", None, None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("Cache-Control").unwrap(), "no-store");
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn protected_route_requires_token() {
        let (app, _core, _tmp) = test_app();
        let response = send(&app, make_request("GET", "/patients", None, None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers().get("Cache-Control").unwrap(), "no-store");
        assert_eq!(body_json(response).await["error"]["code"], "AUTH_REQUIRED");
    }

    #[tokio::test]
    async fn unknown_token_returns_401() {
        let (app, _core, _tmp) = test_app();
        let response = send(&app, make_request("GET", "/me", Some("not-a-token"), None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn register_login_and_me() {
        let (app, _core, _tmp) = test_app();
        let token = register_and_login(&app, "nurse", Some("nurse")).await;

        let response = send(&app, make_request("GET", "/me", Some(&token), None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("Cache-Control").unwrap(), "no-store");
        let me = body_json(response).await;
        assert_eq!(me["username"], "nurse");
        assert_eq!(me["role"], "staff");
    }

    #[tokio::test]
    async fn duplicate_register_returns_400() {
        let (app, _core, _tmp) = test_app();
        register_and_login(&app, "dup", None).await;

        let body = json!({"username": "dup", "password": "other", "email": "x@example.org"});
        let response = send(&app, make_request("POST", "/register", None, Some(body))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], "DUPLICATE_IDENTITY");
    }

    #[tokio::test]
    async fn wrong_password_returns_401() {
        let (app, _core, _tmp) = test_app();
        register_and_login(&app, "alice", None).await;

        let response = send(
            &app,
            make_request(
                "POST",
                "/token",
                None,
                Some(json!({"username": "alice", "password": "wrong"})),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"]["code"], "INVALID_CREDENTIALS");
    }

    #[tokio::test]
    async fn refresh_issues_working_access_token() {
        let (app, _core, _tmp) = test_app();
        register_and_login(&app, "bob", None).await;
        let response = send(
            &app,
            make_request(
                "POST",
                "/token",
                None,
                Some(json!({"username": "bob", "password": "s3cret-pass"})),
            ),
        )
        .await;
        let refresh = body_json(response).await["refresh"].as_str().unwrap().to_string();

        let response = send(
            &app,
            make_request("POST", "/token/refresh", None, Some(json!({"refresh": refresh}))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let access = body_json(response).await["access"].as_str().unwrap().to_string();

        let response = send(&app, make_request("GET", "/me", Some(&access), None)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let (app, _core, _tmp) = test_app();
        let req = Request::builder()
            .method("POST")
            .uri("/token")
            .header("Content-Type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = send(&app, req).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn patient_create_then_qr_and_fingerprint_lookup() {
        let (app, _core, _tmp) = test_app();
        let token = register_and_login(&app, "agent", Some("agent")).await;
        let patient = create_patient(&app, &token, "ada").await;
        let qr_token = patient["qr_token"].as_str().unwrap();
        assert!(patient.get("fingerprint_hash").is_none());
        assert_eq!(patient["user"]["username"], "ada");
        assert!(patient["user"].get("password_hash").is_none());

        let response = send(
            &app,
            make_request("POST", "/patients/qr_auth", Some(&token), Some(json!({"qr_data": qr_token}))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["id"], patient["id"]);

        let response = send(
            &app,
            make_request(
                "POST",
                "/patients/fingerprint_auth",
                Some(&token),
                Some(json!({"fingerprint_hash": "fp-ada"})),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["id"], patient["id"]);

        let response = send(
            &app,
            make_request("POST", "/patients/qr_auth", Some(&token), Some(json!({"qr_data": "nope"}))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn patient_qr_is_svg() {
        let (app, _core, _tmp) = test_app();
        let token = register_and_login(&app, "agent", Some("agent")).await;
        let patient = create_patient(&app, &token, "ada").await;
        let uri = format!("/patients/{}/qr", patient["id"].as_str().unwrap());

        let response = send(&app, make_request("GET", &uri, Some(&token), None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("content-type").unwrap(), "image/svg+xml");
        let body = to_bytes(response.into_body(), 1 << 20).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("<svg"));
    }

    #[tokio::test]
    async fn patient_create_reports_field_errors() {
        let (app, _core, _tmp) = test_app();
        let token = register_and_login(&app, "agent", Some("agent")).await;

        let mut body = patient_body("ada");
        body["date_of_birth"] = json!("not-a-date");
        body["first_name"] = json!("");
        let response = send(&app, make_request("POST", "/patients", Some(&token), Some(body))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
        assert!(json["error"]["fields"].get("date_of_birth").is_some());
        assert!(json["error"]["fields"].get("first_name").is_some());
    }

    #[tokio::test]
    async fn malformed_id_is_404() {
        let (app, _core, _tmp) = test_app();
        let token = register_and_login(&app, "agent", Some("agent")).await;
        let response = send(&app, make_request("GET", "/services/42", Some(&token), None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn patient_appointments_in_booking_order() {
        let (app, _core, _tmp) = test_app();
        let token = register_and_login(&app, "agent", Some("agent")).await;
        let patient = create_patient(&app, &token, "ada").await;

        let response = send(
            &app,
            make_request(
                "POST",
                "/services",
                Some(&token),
                Some(json!({"name": "Cardiology", "location": "Block A"})),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let service = body_json(response).await;

        let mut ids = Vec::new();
        for date in ["2030-03-01T09:00:00Z", "2030-01-01T09:00:00Z"] {
            let response = send(
                &app,
                make_request(
                    "POST",
                    "/appointments",
                    Some(&token),
                    Some(json!({
                        "patient_id": patient["id"],
                        "service_id": service["id"],
                        "appointment_date": date,
                    })),
                ),
            )
            .await;
            assert_eq!(response.status(), StatusCode::CREATED);
            let created = body_json(response).await;
            assert_eq!(created["service"]["name"], "Cardiology");
            assert_eq!(created["patient"]["id"], patient["id"]);
            ids.push(created["id"].clone());
        }

        let uri = format!("/patient-appointments/{}", patient["id"].as_str().unwrap());
        let response = send(&app, make_request("GET", &uri, Some(&token), None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let listed: Vec<Value> = body_json(response)
            .await
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["id"].clone())
            .collect();
        assert_eq!(listed, ids);

        let response = send(
            &app,
            make_request("GET", "/patient-appointments/unknown", Some(&token), None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let uri = format!("/patient-appointments/{}", uuid::Uuid::new_v4());
        let response = send(&app, make_request("GET", &uri, Some(&token), None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!([]));
    }

    #[tokio::test]
    async fn patient_only_sees_own_medical_records() {
        let (app, _core, _tmp) = test_app();
        let staff = register_and_login(&app, "doctor", Some("doctor")).await;
        let ada = create_patient(&app, &staff, "ada").await;
        let mut other = patient_body("grace");
        other["fingerprint_hash"] = json!("fp-grace");
        let response = send(&app, make_request("POST", "/patients", Some(&staff), Some(other))).await;
        let grace = body_json(response).await;

        for patient in [&ada, &grace] {
            let response = send(
                &app,
                make_request(
                    "POST",
                    "/medical-records",
                    Some(&staff),
                    Some(json!({
                        "patient_id": patient["id"],
                        "visit_type": "consultation",
                        "symptoms": "cough",
                        "diagnosis": "cold",
                        "treatment": "rest",
                        "doctor_name": "Dr. Who",
                    })),
                ),
            )
            .await;
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let response = send(
            &app,
            make_request(
                "POST",
                "/token",
                None,
                Some(json!({"username": "ada", "password": "patient-pass"})),
            ),
        )
        .await;
        let ada_token = body_json(response).await["access"].as_str().unwrap().to_string();

        let response = send(&app, make_request("GET", "/medical-records", Some(&ada_token), None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let records = body_json(response).await;
        let records = records.as_array().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["patient_id"], ada["id"]);
        assert_eq!(records[0]["patient"]["id"], ada["id"]);
        assert_eq!(records[0]["patient"]["user"]["username"], "ada");
        assert!(records[0]["service"].is_null());
    }

    #[tokio::test]
    async fn staff_patch_requires_full_access() {
        let (app, core, _tmp) = test_app();
        let token = register_and_login(&app, "nurse", Some("nurse")).await;

        let response = send(&app, make_request("GET", "/staff", Some(&token), None)).await;
        let staff = body_json(response).await;
        assert_eq!(staff[0]["user"]["username"], "nurse");
        assert_eq!(staff[0]["approved"], false);
        let uri = format!("/staff/{}", staff[0]["id"].as_str().unwrap());

        let response = send(
            &app,
            make_request("PATCH", &uri, Some(&token), Some(json!({"department": "ER"}))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        crate::seed::seed(&core.open_db().unwrap(), &core.config).unwrap();
        let response = send(
            &app,
            make_request(
                "POST",
                "/token",
                None,
                Some(json!({"username": "admin", "password": core.config.seed_admin_password})),
            ),
        )
        .await;
        let admin = body_json(response).await["access"].as_str().unwrap().to_string();

        let response = send(
            &app,
            make_request("PATCH", &uri, Some(&admin), Some(json!({"department": "ER"}))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["department"], "ER");

        let response = send(
            &app,
            make_request("PATCH", &uri, Some(&admin), Some(json!({"approved": true}))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let updated = body_json(response).await;
        assert_eq!(updated["approved"], true);
        assert_eq!(updated["user"]["username"], "nurse");
    }

    #[tokio::test]
    async fn requests_are_audited() {
        let (app, core, _tmp) = test_app();
        send(&app, make_request("GET", "/health", None, None)).await;
        send(&app, make_request("GET", "/patients", None, None)).await;
        // Rejected by auth before reaching the audit layer
        assert_eq!(core.audited_requests(), 1);
    }

    #[tokio::test]
    async fn cors_headers_when_permissive() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = AppConfig::with_data_dir(tmp.path().to_path_buf());
        config.cors_permissive = true;
        let core = Arc::new(CoreState::new(config));
        core.init_storage().unwrap();
        let app = api_router(core);

        let req = Request::builder()
            .method("GET")
            .uri("/health")
            .header("Origin", "http://localhost:3000")
            .body(Body::empty())
            .unwrap();
        let response = send(&app, req).await;
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
    }
}
