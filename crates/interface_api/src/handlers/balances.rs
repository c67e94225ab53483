//! Balance handlers

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use uuid::Uuid;

use core_kernel::ActorId;
use domain_settlement::ActorContext;

use crate::dto::balance::BalanceResponse;
use crate::{error::ApiError, AppState};

pub async fn get_balance(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(actor_id): Path<Uuid>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = state
        .engine
        .get_balance(&actor, ActorId::from_uuid(actor_id))
        .await?;

    Ok(Json(balance.into()))
}
