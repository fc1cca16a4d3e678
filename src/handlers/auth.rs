//! Caller identity. Authentication happens upstream; the gateway forwards the
//! authenticated ids in headers.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "X-User-Id";
pub const ADMIN_ID_HEADER: &str = "X-Admin-Id";

/// The authenticated end user.
#[derive(Debug, Clone, Copy)]
pub struct CallerId(pub Uuid);

/// The authenticated administrator.
#[derive(Debug, Clone, Copy)]
pub struct AdminId(pub Uuid);

#[derive(Debug)]
pub enum AuthError {
    MissingHeader(&'static str),
    InvalidHeader(&'static str),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AuthError::MissingHeader(name) => format!("Missing {} header", name),
            AuthError::InvalidHeader(name) => format!("{} header is not a valid UUID", name),
        };

        let body = Json(json!({
            "error": message,
            "code": "UNAUTHORIZED",
            "status": StatusCode::UNAUTHORIZED.as_u16(),
        }));
        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}

fn header_uuid(parts: &Parts, name: &'static str) -> Result<Uuid, AuthError> {
    let raw = parts
        .headers
        .get(name)
        .ok_or(AuthError::MissingHeader(name))?
        .to_str()
        .map_err(|_| AuthError::InvalidHeader(name))?;
    Uuid::parse_str(raw.trim()).map_err(|_| AuthError::InvalidHeader(name))
}

#[async_trait]
impl<S> FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        header_uuid(parts, USER_ID_HEADER).map(CallerId)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminId
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        header_uuid(parts, ADMIN_ID_HEADER).map(AdminId)
    }
}
