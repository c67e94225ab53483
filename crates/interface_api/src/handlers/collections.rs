//! Collection handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;

use core_kernel::ActorId;
use domain_settlement::ActorContext;

use crate::dto::collection::{CollectionResponse, RecordCollectionRequest, RecordCollectionResponse};
use crate::dto::ValidatedJson;
use crate::{error::ApiError, AppState};

/// Records a cash collection and its commission
pub async fn record_collection(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    ValidatedJson(request): ValidatedJson<RecordCollectionRequest>,
) -> Result<(StatusCode, Json<RecordCollectionResponse>), ApiError> {
    let request = request.into_domain(&actor, state.engine.config().currency);
    let (collection, commission) = state.engine.record_collection(&actor, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(RecordCollectionResponse {
            collection: collection.into(),
            commission: commission.into(),
        }),
    ))
}

/// Lists an agent's collections not yet in any settlement, oldest first
pub async fn list_outstanding(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(agent_id): Path<Uuid>,
) -> Result<Json<Vec<CollectionResponse>>, ApiError> {
    let collections = state
        .engine
        .list_outstanding(&actor, ActorId::from_uuid(agent_id))
        .await?;

    Ok(Json(collections.into_iter().map(Into::into).collect()))
}
