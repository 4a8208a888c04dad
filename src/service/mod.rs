//! Service layer: the Match Lifecycle Engine.
//!
//! [`MatchService`] runs discovery, the acceptance state machine,
//! confirmation, decline handling and the cleanup sweep against the
//! [`crate::persistence::Stores`] it is given, and pushes lifecycle events
//! through the [`crate::domain::NotificationDispatcher`]. [`tasks`] holds
//! the background discovery queue and the cleanup timer.

pub mod acceptance;
pub mod cleanup;
pub mod clock;
mod decline;
mod discovery;
pub mod match_service;
pub mod tasks;

#[cfg(test)]
pub(crate) mod testing;

pub use acceptance::AcceptanceOutcome;
pub use cleanup::CleanupReport;
pub use clock::{Clock, ManualClock, SystemClock};
pub use match_service::MatchService;
pub use tasks::{DiscoveryQueue, DiscoveryRequest};
