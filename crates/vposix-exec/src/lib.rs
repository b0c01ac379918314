//! # vposix-exec
//!
//! Fallback executor for POSIX operations without a native binding.
//!
//! One [`Invocation`] spawns exactly one child process, waits for it, and
//! returns its exit code together with everything it wrote to stdout.
//! Launch failure and termination by signal are reported as
//! [`ExecError`]; a non-zero exit is a normal [`Completed`] value and the
//! caller decides what it means.
//!
//! There is no timeout: a child that never exits blocks the caller.

pub mod testing;

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("failed to launch `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("`{program}` was terminated before exiting")]
    Terminated { program: String },
}

pub type Result<T> = std::result::Result<T, ExecError>;

/// One external-process execution request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<OsString>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arg_list(&self) -> &[OsString] {
        &self.args
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Result of a child that ran to completion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completed {
    pub code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl Completed {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Stdout with one trailing line terminator removed.
    pub fn stdout_line(&self) -> &[u8] {
        let out = self.stdout.as_slice();
        let out = out.strip_suffix(b"\n").unwrap_or(out);
        out.strip_suffix(b"\r").unwrap_or(out)
    }
}

/// Something that can execute an [`Invocation`] synchronously
pub trait Runner: Send + Sync {
    fn run(&self, invocation: &Invocation) -> Result<Completed>;

    /// Name of this runner (for logging/debugging)
    fn name(&self) -> &'static str;
}

/// Runner backed by [`std::process::Command`]
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    current_dir: Option<PathBuf>,
    env: Option<Vec<(String, String)>>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run children from `dir` instead of the caller's working directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Replace the child environment with exactly `vars`.
    pub fn env(mut self, vars: Vec<(String, String)>) -> Self {
        self.env = Some(vars);
        self
    }
}

impl Runner for ProcessRunner {
    fn run(&self, invocation: &Invocation) -> Result<Completed> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        if let Some(vars) = &self.env {
            cmd.env_clear();
            cmd.envs(vars.iter().map(|(k, v)| (k, v)));
        }

        let output = cmd.output().map_err(|source| ExecError::Launch {
            program: invocation.program.clone(),
            source,
        })?;

        let code = output.status.code().ok_or_else(|| ExecError::Terminated {
            program: invocation.program.clone(),
        })?;

        debug!(
            component = "EXEC",
            invocation = %invocation,
            code,
            stdout_len = output.stdout.len(),
            "child exited"
        );

        Ok(Completed {
            code,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    fn name(&self) -> &'static str {
        "process"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_display() {
        let inv = Invocation::new("ln").arg("-s").args(["a", "b c"]);
        assert_eq!(inv.to_string(), "ln -s a b c");
        assert_eq!(inv.arg_list().len(), 3);
        assert_eq!(inv.program(), "ln");
    }

    #[test]
    fn test_stdout_line_strips_one_terminator() {
        let done = Completed {
            code: 0,
            stdout: b"/tmp/target\n".to_vec(),
            stderr: Vec::new(),
        };
        assert_eq!(done.stdout_line(), b"/tmp/target");

        let crlf = Completed {
            stdout: b"x\r\n".to_vec(),
            ..Completed::default()
        };
        assert_eq!(crlf.stdout_line(), b"x");

        let two = Completed {
            stdout: b"x\n\n".to_vec(),
            ..Completed::default()
        };
        assert_eq!(two.stdout_line(), b"x\n");
    }

    #[test]
    fn test_launch_failure_is_distinct() {
        let runner = ProcessRunner::new();
        let err = runner
            .run(&Invocation::new("vposix-definitely-not-a-program"))
            .unwrap_err();
        assert!(matches!(err, ExecError::Launch { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_captures_stdout_and_exit_code() {
        let runner = ProcessRunner::new();
        let done = runner
            .run(&Invocation::new("sh").args(["-c", "echo hello; exit 3"]))
            .unwrap();
        assert_eq!(done.code, 3);
        assert!(!done.success());
        assert_eq!(done.stdout, b"hello\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_signal_is_terminated() {
        let runner = ProcessRunner::new();
        let err = runner
            .run(&Invocation::new("sh").args(["-c", "kill -9 $$"]))
            .unwrap_err();
        assert!(matches!(err, ExecError::Terminated { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_current_dir_and_env() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ProcessRunner::new()
            .current_dir(dir.path())
            .env(vec![("VPOSIX_PROBE".into(), "42".into()), ("PATH".into(), "/bin:/usr/bin".into())]);
        let done = runner
            .run(&Invocation::new("sh").args(["-c", "printf %s \"$VPOSIX_PROBE\"; pwd"]))
            .unwrap();
        let text = String::from_utf8(done.stdout).unwrap();
        assert!(text.starts_with("42"));
        let canonical = dir.path().canonicalize().unwrap();
        assert!(text.trim_end().ends_with(canonical.file_name().unwrap().to_str().unwrap()));
    }
}
