//! OpenVox x509 - apply `x509_cert` declarations
//!
//! Loads a YAML manifest of certificate declarations, validates every
//! declaration and reconciles the certificate files with openssl.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::info;

use openvox_x509::config::{self, LogFormat};
use openvox_x509::models::{ApplyReport, ResourceStatus};
use openvox_x509::{AppConfig, ApplyService, Manifest, OpensslService, X509CertProvider};

/// What to do with the manifest
#[derive(Debug, PartialEq)]
enum Command {
    Apply { noop: bool },
    Validate,
}

/// Command line invocation
#[derive(Debug, PartialEq)]
enum Invocation {
    Run {
        command: Command,
        manifest: PathBuf,
        json: bool,
    },
    Help,
    Version,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args: Vec<String> = env::args().skip(1).collect();

    let invocation = match parse_args(&args) {
        Ok(invocation) => invocation,
        Err(message) => {
            eprintln!("Error: {}\n", message);
            print_help();
            return Ok(ExitCode::from(2));
        }
    };

    let (command, manifest_path, json) = match invocation {
        Invocation::Help => {
            print_help();
            return Ok(ExitCode::SUCCESS);
        }
        Invocation::Version => {
            println!("openvox-x509 {}", env!("CARGO_PKG_VERSION"));
            return Ok(ExitCode::SUCCESS);
        }
        Invocation::Run {
            command,
            manifest,
            json,
        } => (command, manifest, json),
    };

    // Load configuration first (before logging, so we know log format)
    let config = AppConfig::load().context("Failed to load configuration")?;

    // The guard must be kept alive for the duration of the program
    // to ensure log messages are flushed to files
    let _log_guard = init_logging(&config);

    info!("openvox-x509 {} starting", env!("CARGO_PKG_VERSION"));

    let manifest = Manifest::load(&manifest_path)
        .with_context(|| format!("Failed to load manifest {:?}", manifest_path))?;

    let report = match command {
        Command::Validate => ApplyService::validate(&manifest),
        Command::Apply { noop } => {
            let openssl = OpensslService::new(&config.openssl);
            if !openssl.check_availability().await? {
                anyhow::bail!(
                    "openssl is not available at {:?}",
                    config.openssl.binary_path
                );
            }

            let service = ApplyService::new(X509CertProvider::new(openssl));
            service.apply(&manifest, noop || config.noop).await
        }
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?
        );
    } else {
        print_report(&report);
    }

    Ok(if report.success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn parse_args(args: &[String]) -> Result<Invocation, String> {
    if args.iter().any(|a| a == "--help" || a == "-h") {
        return Ok(Invocation::Help);
    }
    if args.iter().any(|a| a == "--version" || a == "-V") {
        return Ok(Invocation::Version);
    }

    let mut noop = false;
    let mut json = false;
    let mut positional = Vec::new();

    for arg in args {
        match arg.as_str() {
            "--noop" => noop = true,
            "--json" => json = true,
            flag if flag.starts_with('-') => return Err(format!("unknown option {}", flag)),
            other => positional.push(other),
        }
    }

    match positional.as_slice() {
        ["apply", manifest] => Ok(Invocation::Run {
            command: Command::Apply { noop },
            manifest: PathBuf::from(manifest),
            json,
        }),
        ["validate", manifest] if !noop => Ok(Invocation::Run {
            command: Command::Validate,
            manifest: PathBuf::from(manifest),
            json,
        }),
        ["validate", _] => Err("--noop has no effect on validate".to_string()),
        [] => Err("missing command".to_string()),
        [command, ..] => Err(format!("invalid use of command {}", command)),
    }
}

fn print_report(report: &ApplyReport) {
    for resource in &report.resources {
        match resource.status {
            ResourceStatus::Failed => {
                let message = resource
                    .error
                    .as_ref()
                    .map(|e| e.message.as_str())
                    .unwrap_or("unknown error");
                println!("Error: {}: {}", resource.resource, message);
            }
            ResourceStatus::Validated => println!("Valid: {}", resource.resource),
            _ => {
                let prefix = if report.noop { "Would change" } else { "Changed" };
                for change in &resource.changes {
                    println!("{}: {}: {}", prefix, resource.resource, change);
                }
            }
        }
    }

    let summary = report.summary();
    println!(
        "{} resources: {} changed, {} unchanged, {} noop, {} failed",
        summary.total,
        summary.changed,
        summary.unchanged,
        summary.noop,
        summary.failed
    );
}

fn print_help() {
    println!(
        "openvox-x509 {}

USAGE:
    openvox-x509 apply <MANIFEST> [--noop] [--json]
    openvox-x509 validate <MANIFEST> [--json]

COMMANDS:
    apply       Validate and reconcile every x509_cert declaration
    validate    Only validate the declarations; nothing is written

OPTIONS:
    --noop      Report changes without making them
    --json      Print the report as JSON
    -h, --help      Print help
    -V, --version   Print version

ENVIRONMENT:
    OPENVOX_X509_CONFIG       Configuration file path
    OPENVOX_X509_OPENSSL      openssl binary
    OPENVOX_X509_TIMEOUT      openssl timeout in seconds
    OPENVOX_X509_NOOP         Force noop mode (true/false)
    OPENVOX_X509_LOG_FORMAT   pretty, json or compact
    RUST_LOG                  Log filter",
        env!("CARGO_PKG_VERSION")
    );
}

type BoxedLayer = Box<dyn tracing_subscriber::Layer<tracing_subscriber::Registry> + Send + Sync>;

/// Initialize logging based on configuration
///
/// Console output goes to stderr so that stdout carries only the report.
fn init_logging(config: &AppConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use config::LogTarget;
    use tracing_subscriber::{prelude::*, EnvFilter};

    let log_config = &config.logging;
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_config.level));

    let mut layers: Vec<BoxedLayer> = Vec::new();

    if log_config.target != LogTarget::File {
        layers.push(fmt_layer(&log_config.format, std::io::stderr, true));
    }

    let guard = if log_config.target != LogTarget::Console {
        let (writer, guard) = create_file_writer(log_config);
        layers.push(fmt_layer(&log_config.format, writer, false));
        Some(guard)
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .init();

    guard
}

/// Formatting layer for one output
fn fmt_layer<W>(format: &LogFormat, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'a> tracing_subscriber::fmt::MakeWriter<'a> + Send + Sync + 'static,
{
    use tracing_subscriber::{fmt, Layer};

    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_writer(writer)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(false)
            .with_ansi(ansi)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_ansi(ansi)
            .with_writer(writer)
            .boxed(),
    }
}

/// Create a file writer with optional daily rotation
fn create_file_writer(
    log_config: &config::LoggingConfig,
) -> (
    tracing_appender::non_blocking::NonBlocking,
    tracing_appender::non_blocking::WorkerGuard,
) {
    if let Err(e) = std::fs::create_dir_all(&log_config.log_dir) {
        eprintln!(
            "Warning: Failed to create log directory {:?}: {}",
            log_config.log_dir, e
        );
    }

    let file_appender = if log_config.daily_rotation {
        tracing_appender::rolling::daily(&log_config.log_dir, &log_config.log_prefix)
    } else {
        tracing_appender::rolling::never(&log_config.log_dir, &log_config.log_prefix)
    };

    tracing_appender::non_blocking(file_appender)
}
