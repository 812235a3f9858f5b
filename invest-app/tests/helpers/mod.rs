//! Test Helper Utilities
//!
//! Shared fixtures for the invest-app integration tests

#![allow(dead_code)]

pub mod db_utils;
pub mod intelligence;

pub use db_utils::{create_request, create_test_db, create_user, upload_document, TEST_PASSWORD};
pub use intelligence::ScriptedIntelligence;
