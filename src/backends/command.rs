// src/backends/command.rs

//! Subprocess execution for backend tools
//!
//! Output is always captured. Full stdout/stderr goes to the debug log (and so
//! to the per-mode log file), never straight to the terminal. Credential
//! prompts issued by `sudo` still reach the user because sudo reads from the
//! controlling terminal directly.

use super::BackendError;
use std::process::{Command, Stdio};
use tracing::debug;

/// How privileged commands are launched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    /// Already root; run tools directly
    None,
    /// Prefix privileged commands with `sudo`
    Sudo,
}

/// Captured result of one subprocess run
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Last non-empty stderr line, falling back to stdout, for short error details
    pub fn summary(&self) -> String {
        let last_line = |text: &str| {
            text.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .last()
                .map(str::to_string)
        };
        last_line(&self.stderr)
            .or_else(|| last_line(&self.stdout))
            .unwrap_or_else(|| "no output".to_string())
    }

    /// Whether any captured line contains one of the given markers
    pub fn mentions(&self, markers: &[&str]) -> bool {
        markers
            .iter()
            .any(|m| self.stderr.contains(m) || self.stdout.contains(m))
    }
}

/// Run `program args...`, optionally through sudo, with extra environment
///
/// A missing executable is reported as `BackendError::Unavailable`.
pub fn run(
    program: &str,
    args: &[&str],
    env: &[(&str, &str)],
    escalation: Escalation,
) -> Result<CommandOutput, BackendError> {
    let mut cmd = match escalation {
        Escalation::None => {
            let mut cmd = Command::new(program);
            cmd.envs(env.iter().copied());
            cmd.args(args);
            cmd
        }
        Escalation::Sudo => {
            // sudo resets the environment, so pass variables through env(1)
            let mut cmd = Command::new("sudo");
            cmd.arg("env");
            for (key, value) in env {
                cmd.arg(format!("{}={}", key, value));
            }
            cmd.arg(program);
            cmd.args(args);
            cmd
        }
    };

    debug!("Running: {:?}", cmd);

    let output = cmd
        .stdin(Stdio::null())
        .output()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => BackendError::Unavailable {
                tool: match escalation {
                    Escalation::None => program.to_string(),
                    Escalation::Sudo => "sudo".to_string(),
                },
            },
            _ => BackendError::Failed {
                operation: format!("launch of {}", program),
                identifier: args.last().copied().unwrap_or_default().to_string(),
                code: None,
                detail: e.to_string(),
                transient: false,
            },
        })?;

    let result = CommandOutput {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    debug!("{} exited with {:?}", program, result.code);
    if !result.stdout.trim().is_empty() {
        debug!("{} stdout:\n{}", program, result.stdout.trim_end());
    }
    if !result.stderr.trim().is_empty() {
        debug!("{} stderr:\n{}", program, result.stderr.trim_end());
    }

    Ok(result)
}

/// Fail with `Unavailable` unless `tool` is on PATH
pub fn require_tool(tool: &str) -> Result<(), BackendError> {
    which::which(tool).map(|_| ()).map_err(|_| BackendError::Unavailable {
        tool: tool.to_string(),
    })
}
