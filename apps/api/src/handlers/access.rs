use axum::Json;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use warden_application::AccessDecision;
use warden_domain::{AttemptKind, IpAddress};

use crate::dto::{
    AccessAllowedResponse, AccessCheckRequest, AccessDeniedResponse, RecordFailureRequest,
};
use crate::error::{ApiResult, ErrorResponse};
use crate::state::AppState;

pub async fn check_access_handler(
    State(state): State<AppState>,
    Json(payload): Json<AccessCheckRequest>,
) -> ApiResult<Response> {
    let ip_address = IpAddress::parse(payload.ip_address.as_str())?;
    let decision = state.ban_service.admit(&ip_address).await;

    Ok(decision_response(&state, decision))
}

pub async fn record_failure_handler(
    State(state): State<AppState>,
    Json(payload): Json<RecordFailureRequest>,
) -> ApiResult<Response> {
    let ip_address = IpAddress::parse(payload.ip_address.as_str())?;
    let kind = AttemptKind::parse(payload.attempt_type.as_str())?;
    let decision = state.ban_service.record_failure(&ip_address, kind).await;

    Ok(decision_response(&state, decision))
}

fn decision_response(state: &AppState, decision: AccessDecision) -> Response {
    match decision {
        AccessDecision::Allowed => Json(AccessAllowedResponse { allowed: true }).into_response(),
        AccessDecision::Banned(status) => {
            let now = state.clock.now();
            let retry_after = status
                .remaining(now)
                .map(|remaining| remaining.num_seconds().max(1));
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(AccessDeniedResponse::from_status(&status, now)),
            )
                .into_response();

            if let Some(seconds) = retry_after {
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
            }

            response
        }
        AccessDecision::Unavailable => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new(
                "access checks are temporarily unavailable".to_owned(),
            )),
        )
            .into_response(),
    }
}
