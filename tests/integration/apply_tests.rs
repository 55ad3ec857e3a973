//! Manifest application integration tests

use crate::common::CertFixture;
use openvox_x509::models::{Manifest, ResourceStatus};
use openvox_x509::ApplyService;

fn manifest(fixture: &CertFixture) -> Manifest {
    Manifest::from_yaml(&format!(
        r#"
x509_cert:
  {good}:
    days: 730
    mode: "0640"
  {bad}:
    mode: "700"
  relative.crt: {{}}
"#,
        good = fixture.path_str("web.crt"),
        bad = fixture.path_str("bad.crt"),
    ))
    .unwrap()
}

#[tokio::test]
async fn test_apply_continues_past_invalid_declarations() {
    let fixture = CertFixture::new().with_key_and_template("web");
    let service = ApplyService::new(fixture.provider());

    let report = service.apply(&manifest(&fixture), false).await;

    let statuses: Vec<_> = report.resources.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            ResourceStatus::Changed,
            ResourceStatus::Failed,
            ResourceStatus::Failed
        ]
    );
    assert!(fixture.path("web.crt").exists());
    assert!(!fixture.path("bad.crt").exists());
    assert!(!report.success());

    let summary = report.summary();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.changed, 1);
    assert_eq!(summary.failed, 2);
}

#[tokio::test]
async fn test_second_run_is_unchanged() {
    let fixture = CertFixture::new().with_key_and_template("web");
    let service = ApplyService::new(fixture.provider());
    let manifest = manifest(&fixture);

    service.apply(&manifest, false).await;
    let report = service.apply(&manifest, false).await;

    assert_eq!(report.resources[0].status, ResourceStatus::Unchanged);
    assert!(report.resources[0].changes.is_empty());
    assert_eq!(fixture.openssl.generation_count(), 1);
}

#[tokio::test]
async fn test_noop_run_reports_pending_changes() {
    let fixture = CertFixture::new().with_key_and_template("web");
    let service = ApplyService::new(fixture.provider());

    let report = service.apply(&manifest(&fixture), true).await;

    assert!(report.noop);
    assert_eq!(report.resources[0].status, ResourceStatus::Noop);
    assert!(!fixture.path("web.crt").exists());
}

#[tokio::test]
async fn test_json_report_carries_error_details() {
    let fixture = CertFixture::new().with_key_and_template("web");
    let service = ApplyService::new(fixture.provider());

    let report = service.apply(&manifest(&fixture), false).await;
    let json = serde_json::to_value(&report).unwrap();

    let resources = json["resources"].as_array().unwrap();
    assert_eq!(
        resources[0]["resource"],
        format!("X509_cert[{}]", fixture.path_str("web.crt"))
    );
    assert_eq!(resources[0]["status"], "changed");
    assert_eq!(resources[0]["changes"][0]["kind"], "created");

    let error = &resources[1]["error"];
    assert_eq!(error["error"], "validation_error");
    assert_eq!(error["message"], "700 is not a valid file mode");
    assert_eq!(error["details"]["param"], "mode");
    assert_eq!(error["details"]["value"], "700");

    assert_eq!(
        resources[2]["error"]["message"],
        "Path must be absolute: relative.crt"
    );
}

#[tokio::test]
async fn test_reconcile_error_is_reported_per_resource() {
    let fixture = CertFixture::new();
    let manifest = Manifest::from_yaml(&format!(
        "x509_cert:\n  {}: {{}}\n",
        fixture.path_str("orphan.crt")
    ))
    .unwrap();

    let report = ApplyService::new(fixture.provider())
        .apply(&manifest, false)
        .await;

    let resource = &report.resources[0];
    assert_eq!(resource.status, ResourceStatus::Failed);
    assert_eq!(resource.error.as_ref().unwrap().error, "not_found");
}

#[test]
fn test_validate_does_not_touch_filesystem() {
    let fixture = CertFixture::new().with_key_and_template("web");

    let report = ApplyService::validate(&manifest(&fixture));

    assert_eq!(report.resources[0].status, ResourceStatus::Validated);
    assert_eq!(report.summary().validated, 1);
    assert!(!fixture.path("web.crt").exists());
    assert!(fixture.openssl.calls().is_empty());
}
