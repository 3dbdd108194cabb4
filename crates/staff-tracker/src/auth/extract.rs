use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use super::{AuthError, Claims, TokenIssuer};

/// Claims of the caller's bearer token.
///
/// Requires an `Extension<Arc<TokenIssuer>>` layer on the router. A missing or malformed
/// `Authorization` header is answered with 401, a token that fails verification with 403.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Claims);

impl AuthenticatedUser {
    pub fn claims(&self) -> &Claims {
        &self.0
    }
}

pub struct AuthRejection(AuthError);

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let status = match self.0 {
            AuthError::MissingToken => StatusCode::UNAUTHORIZED,
            AuthError::InvalidToken => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.split_whitespace().nth(1)?;
    (!token.is_empty()).then_some(token)
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AuthRejection(AuthError::MissingToken))?;
        let issuer = parts
            .extensions
            .get::<Arc<TokenIssuer>>()
            .ok_or(AuthRejection(AuthError::NotConfigured))?;
        issuer.verify(token).map(Self).map_err(AuthRejection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Role, UserProfile};
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::get;
    use axum::{Extension, Router};
    use chrono::Duration;
    use tower::ServiceExt;

    fn router(issuer: Arc<TokenIssuer>) -> Router {
        Router::new()
            .route(
                "/whoami",
                get(|AuthenticatedUser(claims): AuthenticatedUser| async move {
                    claims.username
                }),
            )
            .layer(Extension(issuer))
    }

    async fn status_for(issuer: Arc<TokenIssuer>, authorization: Option<&str>) -> StatusCode {
        let mut request = Request::get("/whoami");
        if let Some(value) = authorization {
            request = request.header(header::AUTHORIZATION, value);
        }
        router(issuer)
            .oneshot(request.body(Body::empty()).expect("request builds"))
            .await
            .expect("router responds")
            .status()
    }

    #[tokio::test]
    async fn token_presence_and_validity_drive_status() {
        let issuer = Arc::new(TokenIssuer::new("secret", Duration::hours(1)));
        let token = issuer
            .issue(&UserProfile {
                id: "user1".to_string(),
                username: "user".to_string(),
                role: Role::User,
            })
            .expect("token issues");

        assert_eq!(status_for(issuer.clone(), None).await, StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_for(issuer.clone(), Some("Bearer")).await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_for(issuer.clone(), Some("Bearer garbage")).await,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_for(issuer, Some(&format!("Bearer {token}"))).await,
            StatusCode::OK
        );
    }
}
