//! Common test utilities for gradual-cfg
//!
//! This module provides shared fixtures and assertions for the integration
//! tests.

#![allow(dead_code)]

mod assertions;
mod fixtures;

// Re-export all utilities
pub use assertions::*;
pub use fixtures::*;
