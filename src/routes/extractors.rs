use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::sync::Arc;

use crate::auth::Principal;
use crate::context::AppContext;
use crate::error::AppError;

/// Extractor for the authenticated principal behind a bearer token.
///
/// Usage:
/// ```ignore
/// async fn handler(user: AuthenticatedUser, ...) -> Result<...> {
///     let caller = user.0.id;
///     // ...
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Principal);

#[async_trait]
impl FromRequestParts<Arc<AppContext>> for AuthenticatedUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppContext>,
    ) -> Result<Self, Self::Rejection> {
        let principal = principal_from_bearer(state, parts).map_err(|e| {
            tracing::warn!(error = %e, "Bearer authentication failed");
            let status = e.status_code();
            let body = json!({
                "error": e.user_message(),
                "error_code": e.error_code(),
                "status": status.as_u16(),
            });
            (status, axum::Json(body)).into_response()
        })?;

        Ok(AuthenticatedUser(principal))
    }
}

fn principal_from_bearer(ctx: &AppContext, parts: &Parts) -> Result<Principal, AppError> {
    let auth_header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::auth("Missing Authorization header"))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::auth("Invalid Authorization header format"))?;

    ctx.auth_manager.authenticate(token)
}
