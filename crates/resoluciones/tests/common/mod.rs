//! Shared test utilities for resoluciones integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated runs with every configured directory in a temp dir
//! - Builders for configurations and PDF fixtures

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
