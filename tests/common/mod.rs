//! Shared test utilities for engine, chaos and integration tests.
//!
//! This module provides:
//! - MySQL and Redis testcontainer setup
//! - Failure-injecting source and target stores
//! - Record helpers

#![allow(dead_code)] // Each test binary uses a different subset

pub mod containers;
pub mod mock_stores;

pub use containers::*;
pub use mock_stores::*;
