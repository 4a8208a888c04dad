//! Data Transfer Objects for REST responses.
//!
//! Identifiers are plain UUIDs and statuses their upper-case wire names, so
//! the domain types stay free of schema concerns.

pub mod match_dto;
pub mod prompt_dto;

pub use match_dto::*;
pub use prompt_dto::*;
