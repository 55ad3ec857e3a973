//! Apply reports

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::error::ErrorResponse;

/// Outcome of one resource
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    /// On-disk state already matched
    Unchanged,
    /// Changes were applied
    Changed,
    /// Changes would have been applied (noop run)
    Noop,
    /// Declaration passed validation (validate-only run)
    Validated,
    /// Validation or reconciliation failed
    Failed,
}

/// A single difference between desired and on-disk state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Change {
    /// Certificate generated where none existed
    Created,
    /// Existing certificate replaced
    Regenerated { reason: String },
    /// Certificate deleted
    Removed,
    Mode { from: String, to: String },
    Owner { from: String, to: String },
    Group { from: String, to: String },
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::Created => write!(f, "created"),
            Change::Regenerated { reason } => write!(f, "regenerated ({})", reason),
            Change::Removed => write!(f, "removed"),
            Change::Mode { from, to } => write!(f, "mode changed '{}' to '{}'", from, to),
            Change::Owner { from, to } => write!(f, "owner changed '{}' to '{}'", from, to),
            Change::Group { from, to } => write!(f, "group changed '{}' to '{}'", from, to),
        }
    }
}

/// Result of applying one declaration
#[derive(Debug, Clone, Serialize)]
pub struct ResourceReport {
    /// Resource reference, e.g. `X509_cert[/etc/ssl/certs/web.crt]`
    pub resource: String,
    pub status: ResourceStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<Change>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorResponse>,
    pub duration_ms: u64,
}

impl ResourceReport {
    pub fn failed(resource: impl Into<String>, error: ErrorResponse) -> Self {
        Self {
            resource: resource.into(),
            status: ResourceStatus::Failed,
            changes: vec![],
            error: Some(error),
            duration_ms: 0,
        }
    }

    /// Report for a resource whose changes were applied (or simulated)
    pub fn with_changes(resource: impl Into<String>, changes: Vec<Change>, noop: bool) -> Self {
        let status = match (changes.is_empty(), noop) {
            (true, _) => ResourceStatus::Unchanged,
            (false, true) => ResourceStatus::Noop,
            (false, false) => ResourceStatus::Changed,
        };

        Self {
            resource: resource.into(),
            status,
            changes,
            error: None,
            duration_ms: 0,
        }
    }
}

/// Counts per status
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ReportSummary {
    pub total: usize,
    pub changed: usize,
    pub unchanged: usize,
    pub noop: usize,
    pub validated: usize,
    pub failed: usize,
}

/// Result of a whole run
#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub noop: bool,
    pub resources: Vec<ResourceReport>,
}

impl ApplyReport {
    pub fn summary(&self) -> ReportSummary {
        let mut summary = ReportSummary {
            total: self.resources.len(),
            ..Default::default()
        };

        for resource in &self.resources {
            match resource.status {
                ResourceStatus::Changed => summary.changed += 1,
                ResourceStatus::Unchanged => summary.unchanged += 1,
                ResourceStatus::Noop => summary.noop += 1,
                ResourceStatus::Validated => summary.validated += 1,
                ResourceStatus::Failed => summary.failed += 1,
            }
        }

        summary
    }

    /// True when no resource failed
    pub fn success(&self) -> bool {
        self.resources
            .iter()
            .all(|r| r.status != ResourceStatus::Failed)
    }
}
