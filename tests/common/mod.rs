//! Common test utilities and helpers
//!
//! This module provides shared utilities for all tests including:
//! - A seeded in-memory application (users, files, rows)
//! - Token and request helpers driving the router with `oneshot`
//! - Envelope assertions

#![allow(dead_code)]

pub mod assertions;
pub mod fixtures;

pub use assertions::*;
pub use fixtures::*;
