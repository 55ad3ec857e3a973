//! Business logic services

pub mod apply;
pub mod file_attrs;
pub mod openssl;
pub mod x509_cert;

pub use apply::ApplyService;
pub use openssl::{CommandOutput, CommandRunner, CommandSpec, OpensslService, ProcessRunner};
pub use x509_cert::X509CertProvider;
