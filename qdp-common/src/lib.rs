//! # QDP Common Library
//!
//! Shared code for the survey data processor crates:
//! - Error type used by storage and configuration code
//! - Layered configuration loading (TOML file, environment)
//! - Field allow-list policies
//! - Database connection and schema helpers
//! - Timestamp helpers for export file naming

pub mod config;
pub mod db;
pub mod error;
pub mod fields;
pub mod time;

pub use error::{Error, Result};
pub use fields::FieldPolicy;
