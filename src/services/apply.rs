//! Manifest application
//!
//! Every declaration is handled on its own: a declaration that fails
//! validation or reconciliation is reported as failed and the run moves on to
//! the next one. Declarations are processed in manifest order.

use std::time::Instant;

use chrono::Utc;
use tracing::{error, info, info_span, Instrument};

use crate::models::{ApplyReport, Declaration, Manifest, ResourceReport, ResourceStatus};
use crate::services::x509_cert::X509CertProvider;
use crate::utils::error::{AppError, ErrorResponse};

/// Applies manifests through an [`X509CertProvider`]
pub struct ApplyService {
    provider: X509CertProvider,
}

impl ApplyService {
    pub fn new(provider: X509CertProvider) -> Self {
        Self { provider }
    }

    /// Validate every declaration without touching the filesystem
    pub fn validate(manifest: &Manifest) -> ApplyReport {
        let started_at = Utc::now();

        let resources = manifest
            .declarations
            .iter()
            .map(|declaration| match declaration.to_request() {
                Ok(_) => ResourceReport {
                    resource: declaration.reference(),
                    status: ResourceStatus::Validated,
                    changes: vec![],
                    error: None,
                    duration_ms: 0,
                },
                Err(e) => {
                    let err = AppError::from(e);
                    error!("{}: {}", declaration.reference(), err);
                    ResourceReport::failed(declaration.reference(), ErrorResponse::from(&err))
                }
            })
            .collect();

        ApplyReport {
            started_at,
            finished_at: Utc::now(),
            noop: true,
            resources,
        }
    }

    /// Apply every declaration in the manifest
    pub async fn apply(&self, manifest: &Manifest, noop: bool) -> ApplyReport {
        let started_at = Utc::now();
        let mut resources = Vec::with_capacity(manifest.len());

        info!(
            resources = manifest.len(),
            noop, "Applying manifest"
        );

        for declaration in &manifest.declarations {
            let span = info_span!("x509_cert", resource = %declaration.reference());
            let report = self.apply_declaration(declaration, noop).instrument(span).await;
            resources.push(report);
        }

        let report = ApplyReport {
            started_at,
            finished_at: Utc::now(),
            noop,
            resources,
        };

        let summary = report.summary();
        info!(
            total = summary.total,
            changed = summary.changed,
            noop = summary.noop,
            failed = summary.failed,
            "Manifest applied"
        );

        report
    }

    async fn apply_declaration(&self, declaration: &Declaration, noop: bool) -> ResourceReport {
        let start = Instant::now();
        let reference = declaration.reference();

        let result = match declaration.to_request() {
            Ok(request) => self.provider.apply(&request, noop).await,
            Err(e) => Err(AppError::from(e)),
        };

        let mut report = match result {
            Ok(changes) => ResourceReport::with_changes(&reference, changes, noop),
            Err(e) => {
                if e.is_validation() {
                    error!("Parameter validation failed: {}", e);
                } else {
                    error!("Could not apply: {}", e);
                }
                ResourceReport::failed(&reference, ErrorResponse::from(&e))
            }
        };

        report.duration_ms = start.elapsed().as_millis() as u64;
        report
    }
}
