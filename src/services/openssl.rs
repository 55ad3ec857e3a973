//! OpenSSL command service
//!
//! Builds `openssl` invocations for certificate generation and public key
//! extraction, and executes them through a [`CommandRunner`]. The default
//! runner spawns a child process with a timeout; tests substitute their own.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

#[cfg(unix)]
use std::os::unix::process::ExitStatusExt;

use crate::config::OpensslConfig;
use crate::models::CertificateRequest;
use crate::utils::error::{AppError, AppResult};

/// Environment variable carrying the key passphrase to openssl
pub const PASSIN_ENV: &str = "OPENVOX_X509_PASSIN";

/// A command to execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Extra environment for the child; values are never logged
    pub envs: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy())
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Command line for logs
    pub fn display(&self) -> String {
        format!("{} {}", self.program.display(), self.args.join(" "))
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
}

/// Executes external commands
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> AppResult<CommandOutput>;
}

/// Runs commands as child processes with a timeout
pub struct ProcessRunner {
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> AppResult<CommandOutput> {
        let start = Instant::now();
        let command_str = spec.display();

        debug!("Executing: {}", command_str);

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .envs(spec.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            AppError::CommandFailed(format!("Failed to spawn '{}': {}", command_str, e))
        })?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::Internal("child stdout not captured".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| AppError::Internal("child stderr not captured".to_string()))?;

        let result = timeout(self.timeout, async {
            let mut stdout_buf = String::new();
            let mut stderr_buf = String::new();

            let stdout_task = async {
                stdout.read_to_string(&mut stdout_buf).await?;
                Ok::<_, std::io::Error>(stdout_buf)
            };

            let stderr_task = async {
                stderr.read_to_string(&mut stderr_buf).await?;
                Ok::<_, std::io::Error>(stderr_buf)
            };

            let (stdout_result, stderr_result, status) =
                tokio::join!(stdout_task, stderr_task, child.wait());

            Ok::<_, std::io::Error>((
                stdout_result.unwrap_or_default(),
                stderr_result.unwrap_or_default(),
                status?,
            ))
        })
        .await;

        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok((stdout_str, stderr_str, exit_status))) => {
                #[cfg(unix)]
                let signal = exit_status.signal();
                #[cfg(not(unix))]
                let signal: Option<i32> = None;

                if !exit_status.success() {
                    warn!(
                        "Command exited unsuccessfully: exit_code={:?}, signal={:?}, command='{}'",
                        exit_status.code(),
                        signal,
                        command_str
                    );
                }

                Ok(CommandOutput {
                    success: exit_status.success(),
                    stdout: stdout_str,
                    stderr: stderr_str,
                    exit_code: exit_status.code(),
                    duration_ms,
                })
            }
            Ok(Err(e)) => {
                error!("Command execution error: command='{}', error='{}'", command_str, e);
                Err(AppError::Io(e))
            }
            Err(_) => {
                error!(
                    "Command TIMEOUT after {}s: command='{}'",
                    self.timeout.as_secs(),
                    command_str
                );
                let _ = child.kill().await;
                Err(AppError::Timeout(format!(
                    "'{}' did not finish within {} seconds",
                    command_str,
                    self.timeout.as_secs()
                )))
            }
        }
    }
}

/// OpenSSL service for certificate operations
#[derive(Clone)]
pub struct OpensslService {
    binary_path: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl OpensslService {
    /// Create a service that spawns the configured openssl binary
    pub fn new(config: &OpensslConfig) -> Self {
        Self::with_runner(
            config.binary_path.clone(),
            Arc::new(ProcessRunner::new(Duration::from_secs(config.timeout_secs))),
        )
    }

    /// Create a service with a custom command runner
    pub fn with_runner(binary_path: impl Into<PathBuf>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            binary_path: binary_path.into(),
            runner,
        }
    }

    /// Check that openssl can be executed
    pub async fn check_availability(&self) -> AppResult<bool> {
        let spec = CommandSpec::new(&self.binary_path).arg("version");
        match self.runner.run(&spec).await {
            Ok(output) if output.success => {
                info!("openssl is available: {}", output.stdout.trim());
                Ok(true)
            }
            Ok(_) => {
                warn!("openssl version check failed");
                Ok(false)
            }
            Err(AppError::CommandFailed(msg)) => {
                warn!("openssl not executable: {}", msg);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Build the command that writes a certificate for `request` to `out`
    ///
    /// Without a CSR a self-signed certificate is created from the template and
    /// private key. With a CSR, the request is signed either by the configured
    /// CA or by the private key itself.
    pub fn generate_command(&self, request: &CertificateRequest, out: &Path) -> CommandSpec {
        let template = request.effective_template();
        let private_key = request.effective_private_key();
        let days = request.days().to_string();

        let mut spec = CommandSpec::new(&self.binary_path);

        match request.csr() {
            None => {
                spec = spec
                    .arg("req")
                    .arg("-config")
                    .path_arg(&template)
                    .arg("-new")
                    .arg("-x509")
                    .arg("-days")
                    .arg(days)
                    .arg("-key")
                    .path_arg(&private_key)
                    .arg("-out")
                    .path_arg(out);
                if request.req_ext() {
                    spec = spec.arg("-extensions").arg("req_ext");
                }
            }
            Some(csr) => {
                spec = spec
                    .arg("x509")
                    .arg("-req")
                    .arg("-days")
                    .arg(days)
                    .arg("-in")
                    .path_arg(csr)
                    .arg("-out")
                    .path_arg(out);
                spec = match (request.ca(), request.cakey()) {
                    (Some(ca), Some(cakey)) => spec
                        .arg("-CAcreateserial")
                        .arg("-CA")
                        .path_arg(ca)
                        .arg("-CAkey")
                        .path_arg(cakey),
                    _ => spec.arg("-signkey").path_arg(&private_key),
                };
                if request.req_ext() {
                    spec = spec.arg("-extensions").arg("req_ext");
                }
                spec = spec.arg("-extfile").path_arg(&template);
            }
        }

        self.with_passin(spec, request.password())
    }

    /// Generate the certificate for `request` at `out`
    pub async fn generate(&self, request: &CertificateRequest, out: &Path) -> AppResult<()> {
        let spec = self.generate_command(request, out);
        let output = self.run_checked(&spec).await?;
        info!(
            "Generated certificate {:?} in {}ms",
            out, output.duration_ms
        );
        Ok(())
    }

    /// Public key (PEM) embedded in a certificate
    pub async fn certificate_public_key(&self, cert: &Path) -> AppResult<String> {
        let spec = CommandSpec::new(&self.binary_path)
            .arg("x509")
            .arg("-noout")
            .arg("-pubkey")
            .arg("-in")
            .path_arg(cert);
        let output = self.run_checked(&spec).await?;
        Ok(output.stdout.trim().to_string())
    }

    /// Public key (PEM) derived from a private key
    pub async fn private_key_public_key(
        &self,
        key: &Path,
        password: Option<&str>,
    ) -> AppResult<String> {
        let spec = CommandSpec::new(&self.binary_path)
            .arg("pkey")
            .arg("-pubout")
            .arg("-in")
            .path_arg(key);
        let output = self.run_checked(&self.with_passin(spec, password)).await?;
        Ok(output.stdout.trim().to_string())
    }

    fn with_passin(&self, spec: CommandSpec, password: Option<&str>) -> CommandSpec {
        match password {
            Some(password) => spec
                .arg("-passin")
                .arg(format!("env:{}", PASSIN_ENV))
                .env(PASSIN_ENV, password),
            None => spec,
        }
    }

    async fn run_checked(&self, spec: &CommandSpec) -> AppResult<CommandOutput> {
        let output = self.runner.run(spec).await?;
        if output.success {
            Ok(output)
        } else {
            let detail = output.stderr.trim();
            Err(AppError::CommandFailed(format!(
                "'{}' exited with {:?}: {}",
                spec.display(),
                output.exit_code,
                if detail.is_empty() { "no output" } else { detail }
            )))
        }
    }
}
