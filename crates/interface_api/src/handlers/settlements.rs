//! Settlement handlers
//!
//! Confirm and reject are safe to retry: repeating a request against a
//! settlement already in the target state returns it unchanged.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use core_kernel::{ActorId, SettlementId};
use domain_settlement::ActorContext;

use crate::dto::settlement::{
    CreateSettlementRequest, ListSettlementsParams, RejectSettlementRequest, SettlementResponse,
};
use crate::dto::ValidatedJson;
use crate::{error::ApiError, AppState};

/// Batches an agent's outstanding records into a PENDING settlement
pub async fn create_settlement(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    ValidatedJson(request): ValidatedJson<CreateSettlementRequest>,
) -> Result<(StatusCode, Json<SettlementResponse>), ApiError> {
    let manager_id = request.manager_id.map(ActorId::from_uuid).unwrap_or(actor.actor_id);
    let settlement = state
        .engine
        .create_settlement(&actor, ActorId::from_uuid(request.agent_id), manager_id)
        .await?;

    Ok((StatusCode::CREATED, Json(settlement.into())))
}

pub async fn list_settlements(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Query(params): Query<ListSettlementsParams>,
) -> Result<Json<Vec<SettlementResponse>>, ApiError> {
    params.validate()?;
    let settlements = state.engine.list_settlements(&actor, params.into()).await?;

    Ok(Json(settlements.into_iter().map(Into::into).collect()))
}

pub async fn get_settlement(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<SettlementResponse>, ApiError> {
    let settlement = state
        .engine
        .get_settlement(&actor, SettlementId::from_uuid(id))
        .await?;

    Ok(Json(settlement.into()))
}

pub async fn confirm_settlement(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<SettlementResponse>, ApiError> {
    let settlement = state
        .engine
        .confirm_settlement(&actor, SettlementId::from_uuid(id))
        .await?;

    Ok(Json(settlement.into()))
}

pub async fn reject_settlement(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<RejectSettlementRequest>,
) -> Result<Json<SettlementResponse>, ApiError> {
    let settlement = state
        .engine
        .reject_settlement(&actor, SettlementId::from_uuid(id), &request.reason)
        .await?;

    Ok(Json(settlement.into()))
}
