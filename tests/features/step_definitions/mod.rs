//! Step definitions for Cucumber scenarios

pub mod validation_steps;
