use axum::Json;
use axum::extract::{Query, State};
use uuid::Uuid;
use warden_core::AppError;
use warden_domain::{AttemptId, IpAddress};

use crate::dto::{BanHistoryParams, BanRecordResponse, RemoveBansRequest, RemoveBansResponse};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_bans_handler(
    State(state): State<AppState>,
    Query(params): Query<BanHistoryParams>,
) -> ApiResult<Json<Vec<BanRecordResponse>>> {
    let ip_address = params
        .ip_address
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .map(IpAddress::parse)
        .transpose()?;

    let bans = state
        .ban_service
        .ban_history(
            ip_address,
            params.active_only.unwrap_or(false),
            params.limit.unwrap_or(50),
            params.offset.unwrap_or(0),
        )
        .await?
        .into_iter()
        .map(BanRecordResponse::from)
        .collect();

    Ok(Json(bans))
}

pub async fn remove_bans_handler(
    State(state): State<AppState>,
    Json(payload): Json<RemoveBansRequest>,
) -> ApiResult<Json<RemoveBansResponse>> {
    let ban_ids = payload
        .ban_ids
        .iter()
        .map(|value| {
            Uuid::parse_str(value.as_str())
                .map(AttemptId::from_uuid)
                .map_err(|error| AppError::Validation(format!("invalid ban id '{value}': {error}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let cleared = state.ban_service.remove_ban(&ban_ids).await?;

    Ok(Json(RemoveBansResponse { cleared }))
}
