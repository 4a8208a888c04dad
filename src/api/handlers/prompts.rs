//! Prompt lifecycle handlers: synchronous discovery and the deploy/retire
//! hooks.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use uuid::Uuid;

use crate::api::dto::{DiscoveryQueuedResponse, MatchSummaryDto, PromptRetiredResponse};
use crate::api::extract::CallerId;
use crate::app_state::AppState;
use crate::domain::PromptId;
use crate::error::{ErrorResponse, MatchError};
use crate::service::DiscoveryRequest;

/// `POST /prompts/{id}/matches`: Run discovery now.
///
/// # Errors
///
/// Returns [`MatchError::NotFound`] for an unknown prompt and
/// [`MatchError::InvalidState`] if the caller does not own it.
#[utoipa::path(
    post,
    path = "/api/v1/prompts/{id}/matches",
    tag = "Prompts",
    summary = "Find matches for a prompt",
    description = "Runs candidate discovery for the caller's live prompt and returns the matches created by this run.",
    params(
        ("id" = Uuid, Path, description = "Deployed prompt UUID"),
        ("x-user-id" = Uuid, Header, description = "Prompt owner"),
    ),
    responses(
        (status = 200, description = "Matches created", body = Vec<MatchSummaryDto>),
        (status = 404, description = "Prompt not found", body = ErrorResponse),
        (status = 409, description = "Prompt owned by another user", body = ErrorResponse),
    )
)]
pub async fn find_matches(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, MatchError> {
    let created = state
        .service
        .find_matches(caller, PromptId::from_uuid(id))
        .await?;
    Ok(Json(
        created
            .into_iter()
            .map(MatchSummaryDto::from)
            .collect::<Vec<_>>(),
    ))
}

/// `POST /prompts/{id}/deployed`: Queue background discovery.
///
/// # Errors
///
/// Returns [`MatchError::InvalidRequest`] if the caller header is missing.
#[utoipa::path(
    post,
    path = "/api/v1/prompts/{id}/deployed",
    tag = "Prompts",
    summary = "Prompt deployed hook",
    description = "Queues a discovery run for a freshly deployed prompt and returns immediately.",
    params(
        ("id" = Uuid, Path, description = "Deployed prompt UUID"),
        ("x-user-id" = Uuid, Header, description = "Prompt owner"),
    ),
    responses(
        (status = 202, description = "Discovery queued", body = DiscoveryQueuedResponse),
        (status = 400, description = "Missing caller", body = ErrorResponse),
    )
)]
pub async fn prompt_deployed(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, MatchError> {
    let queued = state.discovery.enqueue(DiscoveryRequest {
        user_id: caller,
        prompt_id: PromptId::from_uuid(id),
    });
    Ok((
        StatusCode::ACCEPTED,
        Json(DiscoveryQueuedResponse {
            prompt_id: id,
            queued,
        }),
    ))
}

/// `POST /prompts/{id}/retired`: Expire pending matches of a retired
/// prompt.
///
/// # Errors
///
/// Returns [`MatchError::TransientStoreFailure`] if the store fails.
#[utoipa::path(
    post,
    path = "/api/v1/prompts/{id}/retired",
    tag = "Prompts",
    summary = "Prompt retired hook",
    description = "Called when a prompt is cancelled, superseded or expired. Pending matches discovered for or against it are expired; confirmed matches are kept.",
    params(("id" = Uuid, Path, description = "Retired prompt UUID")),
    responses(
        (status = 200, description = "Pending matches expired", body = PromptRetiredResponse),
        (status = 503, description = "Store unavailable", body = ErrorResponse),
    )
)]
pub async fn prompt_retired(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, MatchError> {
    let expired = state
        .service
        .expire_matches_for_prompt(PromptId::from_uuid(id))
        .await?;
    Ok(Json(PromptRetiredResponse {
        prompt_id: id,
        expired,
    }))
}

/// Prompt routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/prompts/{id}/matches", post(find_matches))
        .route("/prompts/{id}/deployed", post(prompt_deployed))
        .route("/prompts/{id}/retired", post(prompt_retired))
}
