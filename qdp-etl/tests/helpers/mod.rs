//! Test helpers for qdp-etl integration tests
//!
//! - MockPlatform: in-process survey platform API on a random port
//! - fixtures: export CSVs, zip archives, survey definitions, stores

#![allow(dead_code)]

pub mod fixtures;
pub mod mock_platform;

pub use fixtures::*;
pub use mock_platform::MockPlatform;
