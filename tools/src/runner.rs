//! External command execution with a bounded wait.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::{ProbeError, Result};

/// Captured result of a finished command. A non-zero exit is not an error here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stdout of a successful run, or `CommandFailed` carrying stderr.
    pub fn into_stdout(self, argv: &[String]) -> Result<String> {
        if self.success() {
            return Ok(self.stdout);
        }
        let stderr = self.stderr.trim();
        Err(ProbeError::CommandFailed {
            command: argv.join(" "),
            stderr: if stderr.is_empty() {
                format!("exited with status {}", self.exit_code)
            } else {
                stderr.to_string()
            },
        })
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `argv[0]` with the remaining arguments, waiting at most `timeout`.
    async fn run(&self, argv: &[String], timeout: Duration) -> Result<CommandOutput>;
}

/// Runs real binaries through `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, argv: &[String], timeout: Duration) -> Result<CommandOutput> {
        use tokio::process::Command;

        let (program, args) = argv
            .split_first()
            .ok_or_else(|| ProbeError::malformed("Empty command line"))?;

        let start = Instant::now();
        let mut cmd = Command::new(program);
        cmd.args(args)
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ProbeError::CommandNotFound {
                program: program.clone(),
            },
            _ => ProbeError::Io(e),
        })?;

        // Dropping the wait future on expiry drops the child, which kills it.
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                warn!("{} timed out after {:?}", argv.join(" "), timeout);
                ProbeError::Timeout {
                    command: argv.join(" "),
                    after: timeout,
                }
            })??;

        let exit_code = output.status.code().unwrap_or(-1);
        debug!(
            "{} exited with {} in {}ms",
            argv.join(" "),
            exit_code,
            start.elapsed().as_millis()
        );

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code,
        })
    }
}

/// Build an owned argv from string slices.
pub fn argv<I, S>(parts: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    parts.into_iter().map(Into::into).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_runner_captures_stdout() {
        let runner = SystemRunner::new();
        let out = runner
            .run(&argv(["echo", "hello"]), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(out.success());
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_runner_nonzero_exit_is_not_an_error() {
        let runner = SystemRunner::new();
        let out = runner
            .run(&argv(["false"]), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(!out.success());
        assert_eq!(out.exit_code, 1);
    }

    #[tokio::test]
    async fn test_runner_missing_binary() {
        let runner = SystemRunner::new();
        let err = runner
            .run(&argv(["perfdoc-no-such-binary"]), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::CommandNotFound { .. }));
    }

    #[tokio::test]
    async fn test_runner_timeout() {
        let runner = SystemRunner::new();
        let start = Instant::now();
        let err = runner
            .run(&argv(["sleep", "10"]), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Timeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_into_stdout_reports_stderr() {
        let out = CommandOutput {
            stdout: String::new(),
            stderr: "Cannot open netlink socket: Permission denied\n".into(),
            exit_code: 1,
        };
        let err = out.into_stdout(&argv(["ss", "-s"])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Command 'ss -s' failed with error: Cannot open netlink socket: Permission denied"
        );
    }

    #[test]
    fn test_into_stdout_without_stderr_reports_status() {
        let out = CommandOutput {
            exit_code: 2,
            ..Default::default()
        };
        let err = out.into_stdout(&argv(["iostat"])).unwrap_err();
        assert!(err.to_string().ends_with("exited with status 2"));
    }
}
