//! Test world for Cucumber scenarios

use cucumber::World;
use serde_json::{Map, Value};

use crate::common::CertFixture;
use openvox_x509::models::{CertificateRequest, Change};

/// Test world that maintains state across scenario steps
#[derive(Debug, Default, World)]
pub struct TestWorld {
    /// Temporary directory and scripted openssl
    pub fixture: CertFixture,

    /// Resource under test in validation scenarios
    pub request: Option<CertificateRequest>,

    /// Message of the last failed step action
    pub last_error: Option<String>,

    /// Changes reported by the last apply
    pub changes: Option<Vec<Change>>,
}

impl TestWorld {
    /// Record the outcome of an action, keeping only the error message
    pub fn record<T, E: std::fmt::Display>(&mut self, result: Result<T, E>) -> Option<T> {
        match result {
            Ok(value) => {
                self.last_error = None;
                Some(value)
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                None
            }
        }
    }

    /// The request built by a previous step
    pub fn request(&mut self) -> &mut CertificateRequest {
        self.request
            .as_mut()
            .expect("no certificate resource declared in this scenario")
    }
}

/// Parse a JSON docstring into declaration parameters
pub fn parse_params(docstring: Option<&String>) -> Map<String, Value> {
    match docstring.map(|s| s.trim()) {
        None | Some("") => Map::new(),
        Some(text) => match serde_json::from_str(text) {
            Ok(Value::Object(map)) => map,
            other => panic!("docstring must be a JSON object, got {:?}", other),
        },
    }
}
