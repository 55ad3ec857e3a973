//! Test fixtures
//!
//! A [`CertFixture`] is a temporary directory holding certificates, keys and
//! templates, plus a provider wired to a [`MockOpenssl`].

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tempfile::TempDir;

use openvox_x509::models::CertificateRequest;
use openvox_x509::services::{OpensslService, X509CertProvider};

use super::mocks::MockOpenssl;

#[derive(Debug)]
pub struct CertFixture {
    pub dir: TempDir,
    pub openssl: Arc<MockOpenssl>,
}

impl Default for CertFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl CertFixture {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create temp dir"),
            openssl: Arc::new(MockOpenssl::new()),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn path_str(&self, name: &str) -> String {
        self.path(name).to_string_lossy().into_owned()
    }

    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, contents).expect("failed to write fixture file");
        path
    }

    /// Write `<stem>.key` and `<stem>.cnf`, the defaults for `<stem>.crt`
    pub fn with_key_and_template(self, stem: &str) -> Self {
        self.write(&format!("{}.key", stem), &format!("key-for-{}-v1", stem));
        self.write(&format!("{}.cnf", stem), "[req]\ndistinguished_name = dn\n[dn]\n[req_ext]\n");
        self
    }

    /// Build a request for `name` inside the fixture directory
    ///
    /// `params` is a JSON object of extra parameters.
    pub fn request(&self, name: &str, params: Value) -> CertificateRequest {
        let params = params.as_object().cloned().unwrap_or_default();
        CertificateRequest::from_params(Some(&self.path_str(name)), &params)
            .expect("fixture request should be valid")
    }

    pub fn provider(&self) -> X509CertProvider {
        X509CertProvider::new(OpensslService::with_runner(
            "/usr/bin/openssl",
            self.openssl.clone(),
        ))
    }
}
