//! Parameter validation step definitions

use cucumber::gherkin::Step;
use cucumber::{given, then, when};
use serde_json::Value;

use crate::features::support::{parse_params, TestWorld};
use openvox_x509::models::{CertificateRequest, Param};

fn parse_json(text: &str) -> Value {
    serde_json::from_str(text.trim())
        .unwrap_or_else(|e| panic!("invalid JSON literal {:?}: {}", text, e))
}

#[given(expr = "a certificate resource for {string}")]
async fn certificate_resource(world: &mut TestWorld, path: String) {
    let request = CertificateRequest::new(&path).expect("resource path should be valid");
    world.request = Some(request);
}

#[when(expr = "I declare a certificate titled {string} with:")]
async fn declare_certificate(world: &mut TestWorld, step: &Step, title: String) {
    let params = parse_params(step.docstring.as_ref());
    let result = CertificateRequest::from_params(Some(&title), &params);
    world.request = world.record(result);
}

#[when(regex = r#"^I set "([a-z_]+)" to (.+)$"#)]
async fn set_parameter(world: &mut TestWorld, param: String, value: String) {
    let param: Param = param.parse().expect("unknown parameter in scenario");
    let value = parse_json(&value);
    let result = world.request().set(param, &value);
    world.record(result);
}

#[then(regex = r#"^"([a-z_]+)" should read back as (.+)$"#)]
async fn read_back(world: &mut TestWorld, param: String, expected: String) {
    let param: Param = param.parse().expect("unknown parameter in scenario");
    let expected = parse_json(&expected);
    assert_eq!(world.request().get(param), Some(expected));
}

#[then(expr = "{string} should be unset")]
async fn parameter_unset(world: &mut TestWorld, param: String) {
    let param: Param = param.parse().expect("unknown parameter in scenario");
    assert_eq!(world.request().get(param), None);
}

#[then(expr = "the error should be {string}")]
async fn error_should_be(world: &mut TestWorld, message: String) {
    assert_eq!(world.last_error.as_deref(), Some(message.as_str()));
}

#[then(expr = "the error should contain {string}")]
async fn error_should_contain(world: &mut TestWorld, fragment: String) {
    let error = world.last_error.as_deref().unwrap_or_default();
    assert!(
        error.contains(&fragment),
        "expected error containing {:?}, got {:?}",
        fragment,
        world.last_error
    );
}

#[then("there should be no error")]
async fn no_error(world: &mut TestWorld) {
    assert_eq!(world.last_error, None);
}
