use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::domain::entities::JobResult;

/// Command runner errors
#[derive(Debug, Error)]
pub enum CommandRunnerError {
    #[error("Command timed out after {timeout_seconds} seconds")]
    Timeout { timeout_seconds: u64 },

    #[error("Could not find '{program}' executable")]
    ExecutableNotFound { program: String },

    #[error("Failed to spawn '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Configuration for a single command invocation
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Working directory for command execution
    pub working_directory: PathBuf,

    /// Environment variables to set for the process
    pub environment_variables: HashMap<String, String>,

    /// Timeout for each attempt, overriding the runner default
    pub timeout: Option<Duration>,

    /// Additional attempts after a failed one
    pub retry: u32,
}

impl ExecutionConfig {
    /// Create a new execution config running in `dir`
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            working_directory: dir.as_ref().to_path_buf(),
            environment_variables: HashMap::new(),
            timeout: None,
            retry: 0,
        }
    }

    /// Add environment variable
    pub fn with_environment_variable(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.environment_variables.insert(key.into(), value.into());
        self
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Retry failed attempts `retry` more times
    pub fn with_retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }
}

/// Captured result of one finished process
#[derive(Debug, Clone)]
pub struct ExecutionOutput {
    /// Exit code of the process, -1 when killed by a signal
    pub exit_code: i32,

    /// Standard output followed by standard error
    pub output: String,

    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

/// Runs external VCS executables and turns their outcome into job results
#[derive(Debug, Clone, Default)]
pub struct CommandRunner {
    default_timeout: Option<Duration>,
}

impl CommandRunner {
    /// Create a runner without a default timeout
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a runner applying `timeout` to every command that doesn't set its own
    pub fn with_default_timeout(timeout: Option<Duration>) -> Self {
        Self {
            default_timeout: timeout,
        }
    }

    /// Render a command line the way it is reported in results
    pub fn format_command<S: AsRef<str>>(program: &str, args: &[S]) -> String {
        std::iter::once(program)
            .chain(args.iter().map(|a| a.as_ref()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Execute a command once
    pub async fn execute<S: AsRef<str> + Sync>(
        &self,
        program: &str,
        args: &[S],
        config: &ExecutionConfig,
    ) -> Result<ExecutionOutput, CommandRunnerError> {
        let start_time = Instant::now();
        let command_line = Self::format_command(program, args);

        let mut cmd = Command::new(program);
        cmd.args(args.iter().map(|a| a.as_ref()))
            .current_dir(&config.working_directory)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &config.environment_variables {
            cmd.env(key, value);
        }

        let child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound && config.working_directory.is_dir() {
                CommandRunnerError::ExecutableNotFound {
                    program: program.to_string(),
                }
            } else {
                CommandRunnerError::SpawnFailed {
                    command: command_line.clone(),
                    source: e,
                }
            }
        })?;

        let output = match config.timeout.or(self.default_timeout) {
            Some(limit) => timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| CommandRunnerError::Timeout {
                    timeout_seconds: limit.as_secs(),
                })??,
            None => child.wait_with_output().await?,
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let combined = match (stdout.trim_end(), stderr.trim_end()) {
            (out, "") => out.to_string(),
            ("", err) => err.to_string(),
            (out, err) => format!("{}\n{}", out, err),
        };

        Ok(ExecutionOutput {
            exit_code: output.status.code().unwrap_or(-1),
            output: combined,
            execution_time_ms: start_time.elapsed().as_millis() as u64,
        })
    }

    /// Execute a command, retrying on failure as configured, and report it as a job result
    pub async fn run<S: AsRef<str> + Sync>(
        &self,
        program: &str,
        args: &[S],
        config: &ExecutionConfig,
    ) -> JobResult {
        let command_line = Self::format_command(program, args);
        let mut attempt = 0;
        loop {
            let result = match self.execute(program, args, config).await {
                Ok(output) => {
                    debug!(
                        "'{}' exited with {} after {}ms",
                        command_line, output.exit_code, output.execution_time_ms
                    );
                    JobResult::new(
                        &command_line,
                        &config.working_directory,
                        output.output,
                        output.exit_code,
                    )
                }
                Err(CommandRunnerError::Timeout { timeout_seconds }) => JobResult::new(
                    &command_line,
                    &config.working_directory,
                    format!("Command timed out after {} seconds", timeout_seconds),
                    -1,
                ),
                Err(e) => JobResult::new(&command_line, &config.working_directory, e.to_string(), 1),
            };

            if result.is_success() || attempt >= config.retry {
                return result;
            }
            attempt += 1;
            debug!(
                "Retrying '{}' ({}/{}) after failure: {}",
                command_line, attempt, config.retry, result.output
            );
        }
    }
}
