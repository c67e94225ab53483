//! Commission handlers

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use uuid::Uuid;

use core_kernel::{ActorId, CommissionId, Money};
use domain_settlement::ActorContext;

use crate::dto::commission::{CancelCommissionRequest, CommissionResponse, QuoteCommissionRequest};
use crate::dto::ValidatedJson;
use crate::{error::ApiError, AppState};

/// Computes a commission without recording it
pub async fn quote_commission(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    ValidatedJson(request): ValidatedJson<QuoteCommissionRequest>,
) -> Result<Json<CommissionResponse>, ApiError> {
    let agent_id = request.agent_id.map(ActorId::from_uuid).unwrap_or(actor.actor_id);
    let base = Money::new(
        request.base_amount,
        request.currency.unwrap_or(state.engine.config().currency),
    );

    let commission = state
        .engine
        .quote_commission(&actor, agent_id, request.event_type, base)
        .await?;

    Ok(Json(commission.into()))
}

pub async fn approve_commission(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<CommissionResponse>, ApiError> {
    let commission = state
        .engine
        .approve_commission(&actor, CommissionId::from_uuid(id))
        .await?;

    Ok(Json(commission.into()))
}

pub async fn cancel_commission(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<CancelCommissionRequest>,
) -> Result<Json<CommissionResponse>, ApiError> {
    let commission = state
        .engine
        .cancel_commission(&actor, CommissionId::from_uuid(id), &request.reason)
        .await?;

    Ok(Json(commission.into()))
}
