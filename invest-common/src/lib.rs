//! # Invest Common Library
//!
//! Shared code for the investment approval services:
//! - Database schema, migrations and runtime settings
//! - Event types (InvestEvent enum) and the EventBus
//! - Service API-key authentication helpers
//! - Configuration loading and logging setup
//! - SSE helpers

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod logging;
pub mod sse;
pub mod time;

pub use error::{Error, Result};
