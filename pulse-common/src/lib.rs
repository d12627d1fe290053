//! # Pulse Common Library
//!
//! Shared code for the Pulse health-tracking services including:
//! - Domain record models (metrics, workouts, meals, doses, goals, achievements)
//! - Event types (internal EventBus + client-facing notifications)
//! - Bootstrap configuration loading
//! - Database schema initialization
//! - Calendar-day helpers

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod time;

pub use error::{Error, Result};
pub use models::UserId;
