//! API middleware

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::{info, warn};

use domain_settlement::ActorContext;

use crate::error::ApiError;
use crate::AppState;

/// Authentication middleware
///
/// Validates the bearer token and stores the caller's [`ActorContext`] in
/// the request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| {
            warn!("Missing or invalid Authorization header");
            ApiError::Unauthorized
        })?;

    let actor = crate::auth::validate_token(token, &state.config.jwt_secret)
        .and_then(|claims| claims.actor_context())
        .map_err(|e| {
            warn!(error = %e, "Token validation failed");
            ApiError::Unauthorized
        })?;

    request.extensions_mut().insert(actor);
    Ok(next.run(request).await)
}

/// Audit logging middleware
///
/// Logs every API request with the acting identity
pub async fn audit_middleware(
    State(_state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let actor_id = request
        .extensions()
        .get::<ActorContext>()
        .map(|a| a.actor_id.to_string())
        .unwrap_or_else(|| "anonymous".to_string());

    let start = Utc::now();

    let response = next.run(request).await;

    let duration = Utc::now() - start;
    let status = response.status();

    info!(
        method = %method,
        uri = %uri,
        actor = %actor_id,
        status = %status.as_u16(),
        duration_ms = duration.num_milliseconds(),
        "API request"
    );

    response
}
