//! Cucumber feature support and step definitions

pub mod step_definitions;

pub use support::TestWorld;
