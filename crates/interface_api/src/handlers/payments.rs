//! Payment submission handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;

use core_kernel::ActorId;
use domain_settlement::ActorContext;

use crate::dto::payment::{PaymentResponse, SubmitPaymentRequest};
use crate::dto::ValidatedJson;
use crate::{error::ApiError, AppState};

/// Records an agent-to-accountant cash hand-off
pub async fn submit_payment(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    ValidatedJson(request): ValidatedJson<SubmitPaymentRequest>,
) -> Result<(StatusCode, Json<PaymentResponse>), ApiError> {
    let request = request.into_domain(&actor, state.engine.config().currency);
    let payment = state.engine.submit_payment(&actor, request).await?;

    Ok((StatusCode::CREATED, Json(payment.into())))
}

/// Lists an agent's hand-offs, newest first
pub async fn list_payments(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(agent_id): Path<Uuid>,
) -> Result<Json<Vec<PaymentResponse>>, ApiError> {
    let payments = state
        .engine
        .list_payments(&actor, ActorId::from_uuid(agent_id))
        .await?;

    Ok(Json(payments.into_iter().map(Into::into).collect()))
}
