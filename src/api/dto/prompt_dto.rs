//! Prompt lifecycle and maintenance DTOs.

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::service::CleanupReport;

/// Response body for `POST /prompts/{id}/deployed` (202 Accepted).
#[derive(Debug, Serialize, ToSchema)]
pub struct DiscoveryQueuedResponse {
    /// Prompt discovery was requested for.
    pub prompt_id: Uuid,
    /// `false` if the queue was full and the run was dropped.
    pub queued: bool,
}

/// Response body for `POST /prompts/{id}/retired`.
#[derive(Debug, Serialize, ToSchema)]
pub struct PromptRetiredResponse {
    /// Retired prompt.
    pub prompt_id: Uuid,
    /// Pending match rows expired.
    pub expired: u64,
}

/// Response body for `POST /admin/cleanup`.
#[derive(Debug, Serialize, ToSchema)]
pub struct CleanupResponse {
    /// Pending rows past their expiration.
    pub expired_by_date: u64,
    /// Silent confirmations past the grace window.
    pub abandoned_confirmations: u64,
    /// Sum of both.
    pub total: u64,
}

impl From<CleanupReport> for CleanupResponse {
    fn from(r: CleanupReport) -> Self {
        Self {
            expired_by_date: r.expired_by_date,
            abandoned_confirmations: r.abandoned_confirmations,
            total: r.total(),
        }
    }
}
