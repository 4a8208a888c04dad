//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::ConnectionRegistry;
use crate::service::{DiscoveryQueue, MatchService};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Match Lifecycle Engine.
    pub service: Arc<MatchService>,
    /// Live push connections, shared with the engine's dispatcher.
    pub registry: Arc<ConnectionRegistry>,
    /// Background discovery queue fed by prompt deployments.
    pub discovery: DiscoveryQueue,
}

impl AppState {
    /// Builds the state around an engine and its discovery queue. The
    /// registry is the one the engine notifies through.
    #[must_use]
    pub fn new(service: Arc<MatchService>, discovery: DiscoveryQueue) -> Self {
        let registry = Arc::clone(service.notifier().registry());
        Self {
            service,
            registry,
            discovery,
        }
    }
}
