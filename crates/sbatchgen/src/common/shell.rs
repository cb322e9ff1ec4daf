use std::borrow::Cow;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use bstr::ByteSlice;

use crate::common::error::{ProvisionStep, ProvisioningWarning, SbatchError};

pub const DEFAULT_SHELL: &str = "/bin/bash";

/// Captured result of a single shell invocation.
#[derive(Debug, Clone, Default)]
pub struct ShellOutput {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ShellOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Returns stdout, or stderr when stdout is blank.
    /// Lmod writes `module spider` output to stderr on most installations.
    pub fn listing(&self) -> &str {
        if self.stdout.trim().is_empty() {
            &self.stderr
        } else {
            &self.stdout
        }
    }
}

/// Executes a composite shell script in one process.
///
/// Module activation is per-process state, so every sequence that depends on
/// loaded modules has to be issued as a single script.
pub trait ShellRunner {
    fn run(&self, script: &str) -> crate::Result<ShellOutput>;
}

impl<T: ShellRunner + ?Sized> ShellRunner for &T {
    fn run(&self, script: &str) -> crate::Result<ShellOutput> {
        (**self).run(script)
    }
}

/// Pipes scripts into the standard input of a shell process.
pub struct BashShell {
    program: PathBuf,
}

impl BashShell {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Default for BashShell {
    fn default() -> Self {
        Self::new(PathBuf::from(DEFAULT_SHELL))
    }
}

impl ShellRunner for BashShell {
    fn run(&self, script: &str) -> crate::Result<ShellOutput> {
        log::debug!(
            "Running script with `{}`:\n{}",
            self.program.display(),
            script.trim()
        );
        let mut child = Command::new(&self.program)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|error| {
                SbatchError::GenericError(format!(
                    "Cannot start shell `{}`: {error}",
                    self.program.display()
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(script.as_bytes())?;
        }
        let output = child.wait_with_output()?;
        Ok(ShellOutput {
            code: output.status.code(),
            stdout: output.stdout.to_str_lossy().into_owned(),
            stderr: output.stderr.to_str_lossy().into_owned(),
        })
    }
}

/// Quotes `value` for a POSIX shell. Values made only of safe characters are kept as they are.
pub fn quote(value: &str) -> Cow<'_, str> {
    shell_escape::unix::escape(Cow::Borrowed(value))
}

pub fn quote_path(path: &Path) -> String {
    quote(&path.to_string_lossy()).into_owned()
}

/// Promotes a non-zero exit status into an error and a non-empty error stream
/// of a successful invocation into a warning.
pub fn check_shell_output(
    step: ProvisionStep,
    output: &ShellOutput,
) -> crate::Result<Option<ProvisioningWarning>> {
    let stderr = output.stderr.trim();
    if !output.success() {
        return Err(SbatchError::ProvisioningFailure {
            step,
            code: output.code.unwrap_or(-1),
            stderr: stderr.to_string(),
        });
    }
    if stderr.is_empty() {
        Ok(None)
    } else {
        log::warn!("Step `{step}` reported:\n{stderr}");
        Ok(Some(ProvisioningWarning {
            step,
            stderr: stderr.to_string(),
        }))
    }
}
