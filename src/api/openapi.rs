//! OpenAPI document for the REST surface.

use utoipa::OpenApi;

use super::dto::{
    AcceptMatchResponse, CleanupResponse, ConfirmationResponse, DiscoveryQueuedResponse,
    MatchSummaryDto, PromptRetiredResponse, UserProfileDto,
};
use super::handlers::{matches, prompts, system};
use crate::error::{ErrorBody, ErrorResponse};

/// Generated OpenAPI description of every REST route.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "prompt-match",
        description = "Match lifecycle engine: discovery, acceptance, confirmation, decline and cleanup of prompt-based user matches.",
    ),
    paths(
        system::health_handler,
        system::cleanup_handler,
        matches::list_matches,
        matches::list_expired_matches,
        matches::accept_match,
        matches::decline_match,
        matches::match_confirmation,
        prompts::find_matches,
        prompts::prompt_deployed,
        prompts::prompt_retired,
    ),
    components(schemas(
        MatchSummaryDto,
        UserProfileDto,
        AcceptMatchResponse,
        ConfirmationResponse,
        DiscoveryQueuedResponse,
        PromptRetiredResponse,
        CleanupResponse,
        system::HealthResponse,
        ErrorResponse,
        ErrorBody,
    )),
    tags(
        (name = "Matches", description = "Match listing and the acceptance state machine"),
        (name = "Prompts", description = "Discovery and prompt lifecycle hooks"),
        (name = "Admin", description = "Maintenance"),
        (name = "System", description = "Health"),
    )
)]
pub struct ApiDoc;
