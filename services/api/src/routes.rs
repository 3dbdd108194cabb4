use crate::infra::AppState;
use axum::extract::{Path, Query};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::Local;
use serde::Deserialize;
use serde_json::json;
use staff_tracker::admin::{admin_router, StaffDirectory};
use staff_tracker::auth::{hash_password, AuthError, AuthenticatedUser, Role};
use staff_tracker::domain::StaffId;
use staff_tracker::error::AppError;
use staff_tracker::reporting::ReportRequest;
use staff_tracker::store::TrackerBackend;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LoginRequest {
    #[serde(default)]
    pub(crate) username: Option<String>,
    #[serde(default)]
    pub(crate) password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RegisterRequest {
    #[serde(default)]
    pub(crate) username: Option<String>,
    #[serde(default)]
    pub(crate) password: Option<String>,
    #[serde(default)]
    pub(crate) role: Option<String>,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

fn error_json(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

pub(crate) fn build_router(
    state: AppState,
    directory: Arc<StaffDirectory<TrackerBackend>>,
) -> Router {
    let mut router = Router::new()
        .route("/", get(root_endpoint))
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/login", post(login_endpoint))
        .route("/api/register", post(register_endpoint))
        .route("/api/reports/:staff_id", get(report_endpoint));

    if !state.environment.is_production() {
        router = router.route(
            "/generate-password-hash/:password",
            get(password_hash_endpoint),
        );
    }

    router
        .merge(admin_router(directory))
        .layer(Extension(state.tokens.clone()))
        .layer(Extension(state))
        .layer(CorsLayer::permissive())
}

pub(crate) async fn root_endpoint(
    Extension(state): Extension<AppState>,
) -> Json<serde_json::Value> {
    Json(json!({
        "message": "Staff Tracker API is running",
        "mode": state.source.mode_label(),
    }))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn login_endpoint(
    Extension(state): Extension<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, AppError> {
    let (Some(username), Some(password)) = (present(payload.username), present(payload.password))
    else {
        return Ok(error_json(
            StatusCode::BAD_REQUEST,
            "Username and password are required",
        ));
    };

    let user = state.users.authenticate(&username, &password).await?;
    let token = state.tokens.issue(&user)?;
    info!(user_id = %user.id, "login succeeded");

    Ok(Json(json!({
        "message": "Authentication successful",
        "token": token,
        "user": user,
    }))
    .into_response())
}

pub(crate) async fn register_endpoint(
    Extension(state): Extension<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(payload): Json<RegisterRequest>,
) -> Result<Response, AppError> {
    if !claims.role.is_admin() {
        return Ok(error_json(
            StatusCode::FORBIDDEN,
            "Forbidden: Only admins can register new users",
        ));
    }

    let (Some(username), Some(password), Some(role)) = (
        present(payload.username),
        present(payload.password),
        present(payload.role),
    ) else {
        return Ok(error_json(
            StatusCode::BAD_REQUEST,
            "Username, password, and role are required",
        ));
    };

    let Ok(role) = serde_json::from_value::<Role>(json!(role)) else {
        return Ok(error_json(
            StatusCode::BAD_REQUEST,
            "Role must be one of admin, user, staff",
        ));
    };

    let user = match state.users.register(&username, &password, role).await {
        Ok(user) => user,
        Err(AuthError::Conflict) => {
            return Ok(error_json(StatusCode::CONFLICT, "Username already exists"))
        }
        Err(other) => return Err(other.into()),
    };

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User registered successfully",
            "user": user,
        })),
    )
        .into_response())
}

pub(crate) async fn report_endpoint(
    Extension(state): Extension<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(staff_id): Path<String>,
    Query(request): Query<ReportRequest>,
) -> Result<Response, AppError> {
    let report = state
        .reports
        .generate(&StaffId(staff_id), &request, &Local::now())
        .await?;
    let workbook = report.to_xlsx()?;
    info!(
        requested_by = %claims.username,
        file_name = %report.file_name,
        bytes = workbook.len(),
        "report generated"
    );

    let content_type = mime_guess::from_path(&report.file_name).first_or_octet_stream();
    let disposition = format!("attachment; filename=\"{}\"", report.file_name.replace('"', ""));
    let disposition = HeaderValue::from_bytes(disposition.as_bytes())
        .unwrap_or_else(|_| HeaderValue::from_static("attachment; filename=\"report.xlsx\""));

    Ok((
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_str(content_type.as_ref())
                    .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        workbook,
    )
        .into_response())
}

pub(crate) async fn password_hash_endpoint(
    Extension(state): Extension<AppState>,
    Path(password): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let hash = hash_password(&password, state.bcrypt_cost).await?;
    Ok(Json(json!({ "hash": hash })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use serde_json::Value;
    use staff_tracker::auth::{TokenIssuer, UserDirectory};
    use staff_tracker::config::AppEnvironment;
    use staff_tracker::reporting::ReportService;
    use staff_tracker::store::{DataSource, InMemoryStore};
    use std::sync::atomic::AtomicBool;
    use tower::ServiceExt;

    const TEST_COST: u32 = 4;

    async fn app(environment: AppEnvironment) -> Router {
        let backend = Arc::new(TrackerBackend::Memory(InMemoryStore::demo()));
        let users = Arc::new(UserDirectory::seeded(TEST_COST).await.expect("users seed"));
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(true)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
            environment,
            source: DataSource::Demo,
            users: users.clone(),
            tokens: Arc::new(TokenIssuer::new("test-secret", chrono::Duration::hours(24))),
            reports: Arc::new(ReportService::new(backend.clone(), DataSource::Demo)),
            bcrypt_cost: TEST_COST,
        };
        build_router(state, Arc::new(StaffDirectory::new(backend, users)))
    }

    fn json_request(method: &str, uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder
            .body(Body::from(body.to_string()))
            .expect("request builds")
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body reads");
        serde_json::from_slice(&bytes).expect("json body")
    }

    async fn login(router: &Router, username: &str, password: &str) -> String {
        let response = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/login",
                json!({ "username": username, "password": password }),
                None,
            ))
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        body["token"].as_str().expect("token present").to_string()
    }

    #[tokio::test]
    async fn root_reports_demo_mode() {
        let router = app(AppEnvironment::Development).await;
        let response = router
            .oneshot(Request::get("/").body(Body::empty()).expect("request builds"))
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Staff Tracker API is running");
        assert_eq!(body["mode"], "DEMO");
    }

    #[tokio::test]
    async fn login_validates_input_and_credentials() {
        let router = app(AppEnvironment::Development).await;

        let missing = router
            .clone()
            .oneshot(json_request("POST", "/api/login", json!({ "username": "admin" }), None))
            .await
            .expect("router responds");
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(missing).await["error"],
            "Username and password are required"
        );

        let wrong = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/login",
                json!({ "username": "admin", "password": "nope" }),
                None,
            ))
            .await
            .expect("router responds");
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(wrong).await["error"], "Invalid username or password");

        let ok = router
            .oneshot(json_request(
                "POST",
                "/api/login",
                json!({ "username": "admin", "password": "admin123" }),
                None,
            ))
            .await
            .expect("router responds");
        assert_eq!(ok.status(), StatusCode::OK);
        let body = body_json(ok).await;
        assert_eq!(body["message"], "Authentication successful");
        assert_eq!(body["user"]["id"], "admin1");
        assert_eq!(body["user"]["role"], "admin");
    }

    #[tokio::test]
    async fn only_admins_register_accounts() {
        let router = app(AppEnvironment::Development).await;
        let user_token = login(&router, "user", "user123").await;
        let admin_token = login(&router, "admin", "admin123").await;
        let new_account = json!({ "username": "field1", "password": "pw", "role": "staff" });

        let forbidden = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/register",
                new_account.clone(),
                Some(&user_token),
            ))
            .await
            .expect("router responds");
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

        let unauthenticated = router
            .clone()
            .oneshot(json_request("POST", "/api/register", new_account.clone(), None))
            .await
            .expect("router responds");
        assert_eq!(unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            body_json(unauthenticated).await["error"],
            "Unauthorized: No token provided"
        );

        let created = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/register",
                new_account.clone(),
                Some(&admin_token),
            ))
            .await
            .expect("router responds");
        assert_eq!(created.status(), StatusCode::CREATED);
        let body = body_json(created).await;
        assert_eq!(body["user"]["id"], "user3");
        assert_eq!(body["user"]["role"], "staff");

        let duplicate = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/register",
                new_account,
                Some(&admin_token),
            ))
            .await
            .expect("router responds");
        assert_eq!(duplicate.status(), StatusCode::CONFLICT);

        let incomplete = router
            .oneshot(json_request(
                "POST",
                "/api/register",
                json!({ "username": "x", "password": "y" }),
                Some(&admin_token),
            ))
            .await
            .expect("router responds");
        assert_eq!(incomplete.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn report_downloads_as_workbook() {
        let router = app(AppEnvironment::Development).await;
        let token = login(&router, "user", "user123").await;

        let response = router
            .clone()
            .oneshot(
                Request::get("/api/reports/staff1?period=weekly")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .expect("disposition header")
            .to_string();
        assert!(disposition.starts_with("attachment; filename=\"John_Doe_weekly_"));
        assert!(disposition.ends_with(".xlsx\""));
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        );
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body reads");
        assert!(bytes.starts_with(b"PK"));

        let missing = router
            .clone()
            .oneshot(
                Request::get("/api/reports/ghost")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router responds");
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(missing).await["error"], "Staff not found");

        let forged = router
            .oneshot(
                Request::get("/api/reports/staff1")
                    .header(header::AUTHORIZATION, "Bearer forged.token.value")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router responds");
        assert_eq!(forged.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn password_hash_helper_is_hidden_in_production() {
        let development = app(AppEnvironment::Development).await;
        let response = development
            .oneshot(
                Request::get("/generate-password-hash/admin123")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["hash"].as_str().expect("hash").starts_with("$2"));

        let production = app(AppEnvironment::Production).await;
        let response = production
            .oneshot(
                Request::get("/generate-password-hash/admin123")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
