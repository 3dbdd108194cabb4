use crate::admin::AdminError;
use crate::auth::AuthError;
use crate::config::ConfigError;
use crate::keepalive::KeepAliveError;
use crate::reporting::ReportError;
use crate::store::StoreError;
use crate::telemetry::TelemetryError;
use crate::tracking::TrackingError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Auth(AuthError),
    Admin(AdminError),
    Store(StoreError),
    Report(ReportError),
    Tracking(TrackingError),
    KeepAlive(KeepAliveError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Auth(err) => write!(f, "{}", err),
            AppError::Admin(err) => write!(f, "{}", err),
            AppError::Store(err) => write!(f, "store error: {}", err),
            AppError::Report(err) => write!(f, "{}", err),
            AppError::Tracking(err) => write!(f, "tracking error: {}", err),
            AppError::KeepAlive(err) => write!(f, "keep-alive error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Auth(err) => Some(err),
            AppError::Admin(err) => Some(err),
            AppError::Store(err) => Some(err),
            AppError::Report(err) => Some(err),
            AppError::Tracking(err) => Some(err),
            AppError::KeepAlive(err) => Some(err),
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Auth(AuthError::InvalidCredentials | AuthError::MissingToken) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Auth(AuthError::InvalidToken) => StatusCode::FORBIDDEN,
            AppError::Auth(AuthError::Conflict)
            | AppError::Admin(AdminError::Account(AuthError::Conflict)) => StatusCode::CONFLICT,
            AppError::Admin(AdminError::NotFound)
            | AppError::Report(ReportError::StaffNotFound)
            | AppError::Store(StoreError::NotFound)
            | AppError::Tracking(TrackingError::StaffNotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Admin(AdminError::InvalidStaff(_))
            | AppError::Report(ReportError::InvalidDate(_)) => StatusCode::BAD_REQUEST,
            AppError::Tracking(
                TrackingError::AlreadyCheckedIn | TrackingError::NotCheckedIn,
            ) => StatusCode::CONFLICT,
            AppError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Auth(_)
            | AppError::Admin(_)
            | AppError::Store(_)
            | AppError::Report(_)
            | AppError::Tracking(_)
            | AppError::KeepAlive(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<AuthError> for AppError {
    fn from(value: AuthError) -> Self {
        Self::Auth(value)
    }
}

impl From<AdminError> for AppError {
    fn from(value: AdminError) -> Self {
        Self::Admin(value)
    }
}

impl From<StoreError> for AppError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<ReportError> for AppError {
    fn from(value: ReportError) -> Self {
        Self::Report(value)
    }
}

impl From<TrackingError> for AppError {
    fn from(value: TrackingError) -> Self {
        Self::Tracking(value)
    }
}

impl From<KeepAliveError> for AppError {
    fn from(value: KeepAliveError) -> Self {
        Self::KeepAlive(value)
    }
}
