//! qdp-etl library interface
//!
//! Survey export, transform and load pipeline. Exposed as a library for the
//! binary and for integration tests.

pub mod cli;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::error::{EtlError, Result};
