//! Integration tests for OpenVox x509
//!
//! These tests reconcile real files in temporary directories, with openssl
//! replaced by a scripted runner.

mod apply_tests;
