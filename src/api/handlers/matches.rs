//! Match handlers: listing, accept, decline, confirmation.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use uuid::Uuid;

use crate::api::dto::{AcceptMatchResponse, ConfirmationResponse, MatchSummaryDto};
use crate::api::extract::CallerId;
use crate::app_state::AppState;
use crate::domain::MatchId;
use crate::error::{ErrorResponse, MatchError};

/// `GET /matches`: Open matches of the caller.
///
/// # Errors
///
/// Returns [`MatchError`] if the caller header is missing or the store
/// fails.
#[utoipa::path(
    get,
    path = "/api/v1/matches",
    tag = "Matches",
    summary = "List open matches",
    description = "Returns the caller's pending and confirmed matches that have not expired, one per counterpart, hiding counterparts the caller already talks to.",
    params(("x-user-id" = Uuid, Header, description = "Caller")),
    responses(
        (status = 200, description = "Open matches", body = Vec<MatchSummaryDto>),
        (status = 400, description = "Missing caller", body = ErrorResponse),
        (status = 503, description = "Store unavailable", body = ErrorResponse),
    )
)]
pub async fn list_matches(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
) -> Result<impl IntoResponse, MatchError> {
    let matches = state.service.get_user_matches(caller).await?;
    Ok(Json(
        matches
            .into_iter()
            .map(MatchSummaryDto::from)
            .collect::<Vec<_>>(),
    ))
}

/// `GET /matches/expired`: Expired matches of the caller.
///
/// # Errors
///
/// Returns [`MatchError`] if the caller header is missing or the store
/// fails.
#[utoipa::path(
    get,
    path = "/api/v1/matches/expired",
    tag = "Matches",
    summary = "List expired matches",
    description = "Returns the caller's expired matches, most recent per counterpart.",
    params(("x-user-id" = Uuid, Header, description = "Caller")),
    responses(
        (status = 200, description = "Expired matches", body = Vec<MatchSummaryDto>),
        (status = 400, description = "Missing caller", body = ErrorResponse),
    )
)]
pub async fn list_expired_matches(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
) -> Result<impl IntoResponse, MatchError> {
    let matches = state.service.get_user_expired_matches(caller).await?;
    Ok(Json(
        matches
            .into_iter()
            .map(MatchSummaryDto::from)
            .collect::<Vec<_>>(),
    ))
}

/// `POST /matches/{id}/accept`: Accept a match.
///
/// # Errors
///
/// Returns [`MatchError::NotFound`], [`MatchError::NotAuthorized`] or
/// [`MatchError::InvalidState`] per the acceptance rules.
#[utoipa::path(
    post,
    path = "/api/v1/matches/{id}/accept",
    tag = "Matches",
    summary = "Accept a match",
    description = "Records the caller's acceptance. Once both parties accepted the match is confirmed and a relationship is returned.",
    params(
        ("id" = Uuid, Path, description = "Match UUID"),
        ("x-user-id" = Uuid, Header, description = "Caller"),
    ),
    responses(
        (status = 200, description = "Acceptance recorded", body = AcceptMatchResponse),
        (status = 403, description = "Caller is not a party", body = ErrorResponse),
        (status = 404, description = "Match not found", body = ErrorResponse),
        (status = 409, description = "Match is no longer open", body = ErrorResponse),
    )
)]
pub async fn accept_match(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, MatchError> {
    let outcome = state
        .service
        .accept_match(caller, MatchId::from_uuid(id))
        .await?;
    Ok(Json(AcceptMatchResponse::from(outcome)))
}

/// `POST /matches/{id}/decline`: Decline a match.
///
/// # Errors
///
/// Returns [`MatchError::NotFound`], [`MatchError::NotAuthorized`] or
/// [`MatchError::InvalidState`] for a confirmed match.
#[utoipa::path(
    post,
    path = "/api/v1/matches/{id}/decline",
    tag = "Matches",
    summary = "Decline a match",
    description = "Expires both rows of the match and keeps the pair from being matched again.",
    params(
        ("id" = Uuid, Path, description = "Match UUID"),
        ("x-user-id" = Uuid, Header, description = "Caller"),
    ),
    responses(
        (status = 204, description = "Match declined"),
        (status = 403, description = "Caller is not a party", body = ErrorResponse),
        (status = 404, description = "Match not found", body = ErrorResponse),
        (status = 409, description = "Match already confirmed", body = ErrorResponse),
    )
)]
pub async fn decline_match(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, MatchError> {
    state
        .service
        .decline_match(caller, MatchId::from_uuid(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /matches/{id}/confirmation`: Whether both parties accepted.
///
/// # Errors
///
/// Returns [`MatchError::TransientStoreFailure`] if the store fails.
#[utoipa::path(
    get,
    path = "/api/v1/matches/{id}/confirmation",
    tag = "Matches",
    summary = "Check confirmation",
    description = "Returns true when both acceptance flags are set. Unknown matches report false.",
    params(("id" = Uuid, Path, description = "Match UUID")),
    responses(
        (status = 200, description = "Confirmation state", body = ConfirmationResponse),
    )
)]
pub async fn match_confirmation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, MatchError> {
    let confirmed = state
        .service
        .check_match_confirmation(MatchId::from_uuid(id))
        .await?;
    Ok(Json(ConfirmationResponse {
        match_id: id,
        confirmed,
    }))
}

/// Match routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/matches", get(list_matches))
        .route("/matches/expired", get(list_expired_matches))
        .route("/matches/{id}/accept", post(accept_match))
        .route("/matches/{id}/decline", post(decline_match))
        .route("/matches/{id}/confirmation", get(match_confirmation))
}
