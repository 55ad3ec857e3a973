//! OpenVox x509 library
//!
//! This crate provides the `x509_cert` resource type: strict validation of
//! declared parameters and idempotent reconciliation of certificate files
//! through the openssl CLI.

pub mod config;
pub mod models;
pub mod services;
pub mod utils;

pub use config::AppConfig;
pub use models::{CertificateRequest, Manifest, Param};
pub use services::{ApplyService, OpensslService, X509CertProvider};
pub use utils::{AppError, AppResult, ErrorResponse, ParamError};
