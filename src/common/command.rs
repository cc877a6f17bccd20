//! External command execution
//!
//! All subprocesses (`kinit`, `curl`, `pubtools-pulp-publish`,
//! `pubtools-quay-tag-image`) go through the [`CommandRunner`] trait so the
//! orchestration can be exercised in-process with a recording fake.

use crate::error::{IibPushError, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal
    pub status_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status_code == Some(0)
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Options for command execution.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CommandOptions {
    /// Additional environment variables, used for secrets so they stay off argv
    pub env: Vec<(String, String)>,
    /// Bytes written to the child's stdin
    pub stdin: Option<Vec<u8>>,
}

impl CommandOptions {
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_stdin(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(data.into());
        self
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command and capture stdout, stderr and exit status.
    async fn run_output(
        &self,
        program: &str,
        args: &[String],
        options: &CommandOptions,
    ) -> Result<CommandOutput>;

    /// Run a command and fail unless it exits zero.
    async fn run_checked(
        &self,
        program: &str,
        args: &[String],
        options: &CommandOptions,
    ) -> Result<CommandOutput> {
        let output = self.run_output(program, args, options).await?;
        if output.success() {
            Ok(output)
        } else {
            let status = output
                .status_code
                .map(|code| format!("exit status {}", code))
                .unwrap_or_else(|| "terminated by signal".to_string());
            Err(IibPushError::Command {
                program: program.to_string(),
                message: format!("{}: {}", status, output.stderr_lossy().trim()),
            })
        }
    }
}

/// Production implementation backed by [`tokio::process::Command`].
#[derive(Debug, Default, Clone, Copy)]
pub struct RealCommandRunner;

#[async_trait]
impl CommandRunner for RealCommandRunner {
    async fn run_output(
        &self,
        program: &str,
        args: &[String],
        options: &CommandOptions,
    ) -> Result<CommandOutput> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if options.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });
        for (k, v) in &options.env {
            cmd.env(k, v);
        }

        let spawn_error = |e: std::io::Error| IibPushError::Command {
            program: program.to_string(),
            message: e.to_string(),
        };
        let mut child = cmd.spawn().map_err(spawn_error)?;

        if let Some(data) = &options.stdin {
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(data).await.map_err(spawn_error)?;
                // dropping closes the pipe so the child sees EOF
                drop(stdin);
            }
        }

        let output = child.wait_with_output().await.map_err(spawn_error)?;
        Ok(CommandOutput {
            status_code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}
