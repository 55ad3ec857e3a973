//! Common test utilities and helpers
//!
//! This module provides shared test infrastructure including:
//! - A scripted openssl runner
//! - Temporary certificate directories

#![allow(dead_code)]

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
