//! WebSocket layer: the per-user push channel.
//!
//! A client opens `/ws?user_id=...`; from then on every lifecycle event
//! addressed to that user is forwarded as an `event` envelope until the
//! socket closes or the user connects again elsewhere.

pub mod connection;
pub mod handler;
pub mod messages;
