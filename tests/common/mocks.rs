//! Mock services for testing
//!
//! Provides a scripted openssl so reconciliation can be exercised without the
//! real binary. The mock keeps enough state to behave like openssl for the
//! commands the provider issues:
//! - certificate generation writes `-out`, embedding the signing key contents
//! - `x509 -pubkey` returns the key contents embedded in a certificate
//! - `pkey -pubout` returns a key file's contents

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use openvox_x509::services::{CommandOutput, CommandRunner, CommandSpec};
use openvox_x509::AppResult;

/// Prefix of the first line of every mock certificate
pub const PUBKEY_PREFIX: &str = "PUBKEY:";

/// Scripted openssl
#[derive(Debug, Default)]
pub struct MockOpenssl {
    calls: Mutex<Vec<CommandSpec>>,
    /// When set, generation writes garbage to `-out` and fails with this stderr
    failure: Mutex<Option<String>>,
}

impl MockOpenssl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following generation fail
    pub fn fail_generation(&self, stderr: &str) {
        *self.failure.lock().unwrap() = Some(stderr.to_string());
    }

    /// Every command executed so far
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of certificate generations attempted
    pub fn generation_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|spec| spec.args.iter().any(|a| a == "-out"))
            .count()
    }

    fn generate(&self, args: &[String]) -> CommandOutput {
        let out = match value_after(args, "-out") {
            Some(out) => out,
            None => return failure("missing -out"),
        };

        if let Some(stderr) = self.failure.lock().unwrap().clone() {
            // openssl may leave a truncated file behind
            let _ = std::fs::write(out, "truncated");
            return failure(&stderr);
        }

        let key_source = value_after(args, "-key")
            .or_else(|| value_after(args, "-signkey"))
            .or_else(|| value_after(args, "-in"));

        let key = match key_source.map(std::fs::read_to_string) {
            Some(Ok(key)) => key,
            _ => return failure("unable to load key"),
        };

        let body = format!(
            "{}{}\n-----BEGIN CERTIFICATE-----\nMOCK\n-----END CERTIFICATE-----\n",
            PUBKEY_PREFIX,
            key.trim()
        );
        match std::fs::write(out, body) {
            Ok(()) => success(""),
            Err(e) => failure(&e.to_string()),
        }
    }
}

#[async_trait]
impl CommandRunner for MockOpenssl {
    async fn run(&self, spec: &CommandSpec) -> AppResult<CommandOutput> {
        self.calls.lock().unwrap().push(spec.clone());

        let args = &spec.args;
        let output = match args.first().map(String::as_str) {
            Some("version") => success("OpenSSL 3.0.13 30 Jan 2024 (mock)"),
            Some("pkey") => match value_after(args, "-in").map(std::fs::read_to_string) {
                Some(Ok(key)) => success(key.trim()),
                _ => failure("Could not read key"),
            },
            Some("x509") if args.iter().any(|a| a == "-pubkey") => {
                match value_after(args, "-in").map(std::fs::read_to_string) {
                    Some(Ok(cert)) => cert
                        .lines()
                        .next()
                        .and_then(|line| line.strip_prefix(PUBKEY_PREFIX))
                        .map(success)
                        .unwrap_or_else(|| failure("unable to load certificate")),
                    _ => failure("Could not open file"),
                }
            }
            Some("req") | Some("x509") => self.generate(args),
            _ => failure("unsupported command"),
        };

        Ok(output)
    }
}

fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a Path> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(Path::new)
}

fn success(stdout: &str) -> CommandOutput {
    CommandOutput {
        success: true,
        stdout: stdout.to_string(),
        exit_code: Some(0),
        ..Default::default()
    }
}

fn failure(stderr: &str) -> CommandOutput {
    CommandOutput {
        success: false,
        stderr: stderr.to_string(),
        exit_code: Some(1),
        ..Default::default()
    }
}
