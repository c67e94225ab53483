//! Audit log handlers

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use validator::Validate;

use domain_settlement::ActorContext;

use crate::dto::audit::{AuditEntryResponse, ListAuditParams};
use crate::{error::ApiError, AppState};

/// Lists audit entries, newest first
pub async fn list_audit_entries(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Query(params): Query<ListAuditParams>,
) -> Result<Json<Vec<AuditEntryResponse>>, ApiError> {
    params.validate()?;
    let entries = state.engine.list_audit_entries(&actor, params.into()).await?;

    Ok(Json(entries.into_iter().map(Into::into).collect()))
}
