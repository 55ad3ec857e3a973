//! Reconciliation of `x509_cert` resources
//!
//! Compares a validated [`CertificateRequest`] with the filesystem and makes
//! the minimal set of changes: generate, regenerate, delete, then fix up
//! mode and ownership. Nothing is touched when the state already matches.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::models::{CertificateRequest, Change, Ensure};
use crate::services::file_attrs::{self, FileAttributes};
use crate::services::openssl::OpensslService;
use crate::utils::error::{AppError, AppResult};

/// Reason recorded when `force` replaces a certificate
pub const KEY_MISMATCH_REASON: &str = "certificate does not match private key";

/// Attribute updates to perform on an existing file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributePlan {
    pub mode: Option<u32>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
}

impl AttributePlan {
    pub fn is_empty(&self) -> bool {
        self.mode.is_none() && self.uid.is_none() && self.gid.is_none()
    }
}

/// Requested owner and group resolved to numeric ids
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ownership {
    pub uid: Option<u32>,
    pub gid: Option<u32>,
}

impl Ownership {
    /// Look up `owner` and `group` in the account database
    pub fn resolve(request: &CertificateRequest) -> AppResult<Self> {
        Ok(Self {
            uid: request.owner().map(file_attrs::resolve_user).transpose()?,
            gid: request.group().map(file_attrs::resolve_group).transpose()?,
        })
    }
}

/// Provider for `x509_cert` backed by the openssl CLI
pub struct X509CertProvider {
    openssl: OpensslService,
}

impl X509CertProvider {
    pub fn new(openssl: OpensslService) -> Self {
        Self { openssl }
    }

    /// Whether a usable certificate is already in place
    ///
    /// With `force`, a certificate that does not belong to the private key
    /// counts as missing.
    pub async fn exists(&self, request: &CertificateRequest) -> AppResult<bool> {
        if !request.path().exists() {
            return Ok(false);
        }
        if request.force().is_true() {
            return self.key_matches(request).await;
        }
        Ok(true)
    }

    /// Compare the certificate's public key with the private key's
    pub async fn key_matches(&self, request: &CertificateRequest) -> AppResult<bool> {
        let key = request.effective_private_key();
        require_file("Private key", &key)?;

        let cert_pub = self.openssl.certificate_public_key(request.path()).await?;
        let key_pub = self
            .openssl
            .private_key_public_key(&key, request.password())
            .await?;

        let matches = cert_pub == key_pub;
        debug!(path = ?request.path(), matches, "Compared certificate with private key");
        Ok(matches)
    }

    /// Generate the certificate
    ///
    /// Output goes to a sibling `.partial` file that is renamed into place on
    /// success and removed on failure.
    pub async fn create(&self, request: &CertificateRequest) -> AppResult<()> {
        self.check_inputs(request)?;

        let partial = partial_path(request.path());
        let result = match self.openssl.generate(request, &partial).await {
            Ok(()) if partial.exists() => {
                std::fs::rename(&partial, request.path()).map_err(AppError::from)
            }
            Ok(()) => Err(AppError::CommandFailed(format!(
                "openssl reported success but wrote no certificate to {:?}",
                partial
            ))),
            Err(e) => Err(e),
        };

        if result.is_err() && partial.exists() {
            if let Err(e) = std::fs::remove_file(&partial) {
                warn!("Failed to remove partial certificate {:?}: {}", partial, e);
            }
        }

        result
    }

    /// Delete the certificate
    pub fn destroy(&self, request: &CertificateRequest) -> AppResult<()> {
        std::fs::remove_file(request.path())?;
        Ok(())
    }

    /// Differences between requested and actual mode/owner/group
    pub fn attribute_changes(
        &self,
        request: &CertificateRequest,
        ownership: &Ownership,
    ) -> AppResult<(Vec<Change>, AttributePlan)> {
        let current = file_attrs::read_attributes(request.path())?;
        Ok(plan_attributes(request, ownership, &current))
    }

    /// Bring the on-disk state in line with `request`
    ///
    /// In noop mode the returned changes are only what would have happened.
    pub async fn apply(&self, request: &CertificateRequest, noop: bool) -> AppResult<Vec<Change>> {
        let path = request.path();
        let mut changes = Vec::new();

        if request.ensure() == Ensure::Absent {
            if path.exists() {
                if !noop {
                    self.destroy(request)?;
                    info!(path = ?path, "Removed certificate");
                }
                changes.push(Change::Removed);
            }
            return Ok(changes);
        }

        // Unknown accounts fail the resource before anything is written
        let ownership = Ownership::resolve(request)?;

        let generate = if self.exists(request).await? {
            None
        } else if path.exists() {
            Some(Change::Regenerated {
                reason: KEY_MISMATCH_REASON.to_string(),
            })
        } else {
            Some(Change::Created)
        };

        if let Some(change) = generate {
            if noop {
                // Attributes of a file that does not exist yet cannot be compared
                changes.push(change);
                return Ok(changes);
            }
            self.create(request).await?;
            info!(path = ?path, "Certificate {}", change);
            changes.push(change);
        }

        let (attribute_changes, plan) = self.attribute_changes(request, &ownership)?;
        if !noop && !plan.is_empty() {
            if let Some(mode) = plan.mode {
                file_attrs::set_mode(path, mode)?;
            }
            if plan.uid.is_some() || plan.gid.is_some() {
                file_attrs::set_ownership(path, plan.uid, plan.gid)?;
            }
            for change in &attribute_changes {
                info!(path = ?path, "{}", change);
            }
        }
        changes.extend(attribute_changes);

        Ok(changes)
    }

    /// Every file openssl will read must exist before it is invoked
    fn check_inputs(&self, request: &CertificateRequest) -> AppResult<()> {
        require_file("Template", &request.effective_template())?;

        match request.csr() {
            Some(csr) => {
                require_file("CSR", csr)?;
                match (request.ca(), request.cakey()) {
                    (Some(ca), Some(cakey)) => {
                        require_file("CA certificate", ca)?;
                        require_file("CA key", cakey)?;
                    }
                    _ => require_file("Private key", &request.effective_private_key())?,
                }
            }
            None => require_file("Private key", &request.effective_private_key())?,
        }

        Ok(())
    }
}

/// Compute attribute changes against known current attributes
pub fn plan_attributes(
    request: &CertificateRequest,
    ownership: &Ownership,
    current: &FileAttributes,
) -> (Vec<Change>, AttributePlan) {
    let mut changes = Vec::new();
    let mut plan = AttributePlan::default();

    if let Some(mode) = request.mode() {
        if mode.bits() != current.mode {
            changes.push(Change::Mode {
                from: current.mode_string(),
                to: mode.to_string(),
            });
            plan.mode = Some(mode.bits());
        }
    }

    if let (Some(owner), Some(uid)) = (request.owner(), ownership.uid) {
        if uid != current.uid {
            changes.push(Change::Owner {
                from: current.uid.to_string(),
                to: owner.to_string(),
            });
            plan.uid = Some(uid);
        }
    }

    if let (Some(group), Some(gid)) = (request.group(), ownership.gid) {
        if gid != current.gid {
            changes.push(Change::Group {
                from: current.gid.to_string(),
                to: group.to_string(),
            });
            plan.gid = Some(gid);
        }
    }

    (changes, plan)
}

/// Temporary output location next to the certificate
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

fn require_file(what: &str, path: &Path) -> AppResult<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(AppError::NotFound(format!("{} {:?} does not exist", what, path)))
    }
}
