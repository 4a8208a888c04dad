//! # prompt-match
//!
//! Match lifecycle engine and REST/WebSocket service for prompt-based user
//! matching.
//!
//! Users deploy short-lived prompts. The engine discovers other users whose
//! live prompts share the same question or theme, creates a mirrored pair
//! of match rows for each compatible candidate, walks each pair through
//! mutual acceptance into a confirmed relationship (or through decline and
//! expiry), and pushes every transition to the parties' live connections.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Push Channel (ws/)
//!     │
//!     ├── MatchService (service/)
//!     │     ├── discovery, acceptance, decline, cleanup
//!     │     └── DiscoveryQueue + cleanup timer
//!     │
//!     ├── NotificationDispatcher + ConnectionRegistry (domain/)
//!     │
//!     └── Stores (persistence/): PostgreSQL or in-memory
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
pub mod ws;
