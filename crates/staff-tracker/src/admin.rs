//! Staff directory used by administrators, and the admin-only routes over it.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::auth::{AuthError, AuthenticatedUser, Role, UserDirectory};
use crate::domain::{Session, Staff, StaffId, StaffRole};
use crate::store::{StoreError, TrackerStore};

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("Staff not found")]
    NotFound,
    #[error("{0}")]
    InvalidStaff(&'static str),
    #[error(transparent)]
    Account(#[from] AuthError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Read and maintain staff profiles together with their login accounts.
pub struct StaffDirectory<S> {
    store: Arc<S>,
    users: Arc<UserDirectory>,
}

impl<S: TrackerStore> StaffDirectory<S> {
    pub fn new(store: Arc<S>, users: Arc<UserDirectory>) -> Self {
        Self { store, users }
    }

    pub async fn all_staff(&self) -> Result<Vec<Staff>, AdminError> {
        Ok(self.store.staff_by_role(StaffRole::Staff).await?)
    }

    pub async fn active_staff(&self) -> Result<Vec<Staff>, AdminError> {
        Ok(self.store.active_staff().await?)
    }

    pub async fn active_sessions(&self) -> Result<Vec<Session>, AdminError> {
        Ok(self.store.active_sessions().await?)
    }

    pub async fn staff(&self, id: &StaffId) -> Result<Staff, AdminError> {
        self.store.staff(id).await?.ok_or(AdminError::NotFound)
    }

    /// Create or update a profile.
    ///
    /// A profile without an id plus a password is a new hire: a login account is registered
    /// under the email and the profile is stored under the account id. Anything with an id is
    /// written in place.
    pub async fn save_staff(
        &self,
        mut staff: Staff,
        password: Option<&str>,
    ) -> Result<Staff, AdminError> {
        if staff.id.is_empty() {
            let password = password
                .filter(|password| !password.is_empty())
                .ok_or(AdminError::InvalidStaff("A password is required for new staff"))?;
            if staff.email.trim().is_empty() {
                return Err(AdminError::InvalidStaff("An email is required for new staff"));
            }

            let account = self
                .users
                .register(staff.email.trim(), password, Role::Staff)
                .await?;
            staff.id = StaffId(account.id);
            staff.role = StaffRole::Staff;
            info!(staff_id = %staff.id, "staff account created");
        }

        self.store.put_staff(&staff).await?;
        Ok(staff)
    }
}

#[derive(Debug, Deserialize)]
pub struct SaveStaffRequest {
    #[serde(flatten)]
    pub staff: Staff,
    #[serde(default)]
    pub password: Option<String>,
}

/// Admin-only staff routes; expects an `Extension<Arc<TokenIssuer>>` layer upstream.
pub fn admin_router<S>(directory: Arc<StaffDirectory<S>>) -> Router
where
    S: TrackerStore + 'static,
{
    Router::new()
        .route(
            "/api/staff",
            get(list_staff_handler::<S>).post(save_staff_handler::<S>),
        )
        .route("/api/staff/active", get(active_staff_handler::<S>))
        .route("/api/staff/:staff_id", get(staff_handler::<S>))
        .route("/api/sessions/active", get(active_sessions_handler::<S>))
        .with_state(directory)
}

fn require_admin(user: &AuthenticatedUser) -> Result<(), Response> {
    if user.claims().role.is_admin() {
        Ok(())
    } else {
        let payload = json!({ "error": "Forbidden: Admin access required" });
        Err((StatusCode::FORBIDDEN, Json(payload)).into_response())
    }
}

fn error_response(err: AdminError) -> Response {
    let status = match &err {
        AdminError::NotFound => StatusCode::NOT_FOUND,
        AdminError::InvalidStaff(_) => StatusCode::BAD_REQUEST,
        AdminError::Account(AuthError::Conflict) => StatusCode::CONFLICT,
        AdminError::Account(_) | AdminError::Store(_) => {
            error!(error = %err, "staff directory request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

fn respond<T: serde::Serialize>(status: StatusCode, result: Result<T, AdminError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn list_staff_handler<S: TrackerStore + 'static>(
    user: AuthenticatedUser,
    State(directory): State<Arc<StaffDirectory<S>>>,
) -> Response {
    if let Err(rejection) = require_admin(&user) {
        return rejection;
    }
    respond(StatusCode::OK, directory.all_staff().await)
}

pub(crate) async fn active_staff_handler<S: TrackerStore + 'static>(
    user: AuthenticatedUser,
    State(directory): State<Arc<StaffDirectory<S>>>,
) -> Response {
    if let Err(rejection) = require_admin(&user) {
        return rejection;
    }
    respond(StatusCode::OK, directory.active_staff().await)
}

pub(crate) async fn staff_handler<S: TrackerStore + 'static>(
    user: AuthenticatedUser,
    State(directory): State<Arc<StaffDirectory<S>>>,
    Path(staff_id): Path<String>,
) -> Response {
    if let Err(rejection) = require_admin(&user) {
        return rejection;
    }
    respond(StatusCode::OK, directory.staff(&StaffId(staff_id)).await)
}

pub(crate) async fn active_sessions_handler<S: TrackerStore + 'static>(
    user: AuthenticatedUser,
    State(directory): State<Arc<StaffDirectory<S>>>,
) -> Response {
    if let Err(rejection) = require_admin(&user) {
        return rejection;
    }
    respond(StatusCode::OK, directory.active_sessions().await)
}

pub(crate) async fn save_staff_handler<S: TrackerStore + 'static>(
    user: AuthenticatedUser,
    State(directory): State<Arc<StaffDirectory<S>>>,
    Json(request): Json<SaveStaffRequest>,
) -> Response {
    if let Err(rejection) = require_admin(&user) {
        return rejection;
    }
    let status = if request.staff.id.is_empty() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    respond(
        status,
        directory
            .save_staff(request.staff, request.password.as_deref())
            .await,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{TokenIssuer, UserProfile};
    use crate::store::InMemoryStore;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use axum::Extension;
    use chrono::Duration;
    use serde_json::Value;
    use tower::ServiceExt;

    async fn directory() -> Arc<StaffDirectory<InMemoryStore>> {
        let users = UserDirectory::seeded(4).await.expect("seeds");
        Arc::new(StaffDirectory::new(
            Arc::new(InMemoryStore::demo()),
            Arc::new(users),
        ))
    }

    fn token(issuer: &TokenIssuer, role: Role) -> String {
        issuer
            .issue(&UserProfile {
                id: "admin1".to_string(),
                username: "admin".to_string(),
                role,
            })
            .expect("token issues")
    }

    #[tokio::test]
    async fn new_staff_get_a_login_account() {
        let directory = directory().await;
        let staff = Staff {
            name: "Ana Ruiz".to_string(),
            email: "ana@example.com".to_string(),
            ..Staff::default()
        };

        let saved = directory
            .save_staff(staff, Some("welcome1"))
            .await
            .expect("staff saved");
        assert_eq!(saved.id, StaffId::from("user3"));
        assert_eq!(directory.staff(&saved.id).await.expect("stored").name, "Ana Ruiz");
        assert_eq!(directory.all_staff().await.expect("loads").len(), 3);

        let without_password = directory.save_staff(Staff::default(), None).await;
        assert!(matches!(without_password, Err(AdminError::InvalidStaff(_))));

        let duplicate = directory
            .save_staff(
                Staff {
                    email: "ana@example.com".to_string(),
                    ..Staff::default()
                },
                Some("again"),
            )
            .await;
        assert!(matches!(duplicate, Err(AdminError::Account(AuthError::Conflict))));
    }

    #[tokio::test]
    async fn routes_require_an_admin_token() {
        let issuer = Arc::new(TokenIssuer::new("secret", Duration::hours(1)));
        let router = admin_router(directory().await).layer(Extension(issuer.clone()));

        let as_user = router
            .clone()
            .oneshot(
                Request::get("/api/staff")
                    .header(
                        header::AUTHORIZATION,
                        format!("Bearer {}", token(&issuer, Role::User)),
                    )
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router responds");
        assert_eq!(as_user.status(), StatusCode::FORBIDDEN);

        let as_admin = router
            .clone()
            .oneshot(
                Request::get("/api/staff/staff2")
                    .header(
                        header::AUTHORIZATION,
                        format!("Bearer {}", token(&issuer, Role::Admin)),
                    )
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router responds");
        assert_eq!(as_admin.status(), StatusCode::OK);
        let body = to_bytes(as_admin.into_body(), usize::MAX)
            .await
            .expect("body reads");
        let staff: Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(staff["name"], "Jane Smith");
        assert_eq!(staff["contactNumber"], "987-654-3210");

        let missing = router
            .oneshot(
                Request::get("/api/staff/ghost")
                    .header(
                        header::AUTHORIZATION,
                        format!("Bearer {}", token(&issuer, Role::Admin)),
                    )
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router responds");
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }
}
