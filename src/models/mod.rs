//! Data models

mod manifest;
mod report;
mod x509_cert;

pub use manifest::*;
pub use report::*;
pub use x509_cert::*;
