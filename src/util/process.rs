//! Subprocess execution utilities.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};

use crate::builder::toolchain::CommandSpec;

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    env: HashMap<String, String>,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            env: HashMap::new(),
        }
    }

    /// Create a process builder from a toolchain command.
    pub fn from_spec(spec: &CommandSpec) -> Self {
        let mut builder = ProcessBuilder::new(&spec.program).args(&spec.args);
        for (key, value) in &spec.env {
            builder = builder.env(key, value);
        }
        builder
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.env
            .insert(key.as_ref().to_string(), value.as_ref().to_string());
        self
    }

    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd
    }

    fn spawn_piped(&self) -> std::io::Result<Child> {
        let mut cmd = self.build_command();
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.spawn()
    }

    /// Execute the command, killing it if it runs longer than `timeout`.
    ///
    /// Output pipes are drained on helper threads so a chatty child cannot
    /// block on a full pipe while we poll for its exit.
    pub fn exec_with_timeout(&self, timeout: Duration) -> Result<Output> {
        let mut child = self
            .spawn_piped()
            .with_context(|| format!("failed to spawn `{}`", self.program.display()))?;

        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let deadline = Instant::now() + timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                // Already-exited races are fine; we only care that it stops.
                let _ = child.kill();
                let _ = child.wait();
                bail!(
                    "`{}` timed out after {}s",
                    self.display_command(),
                    timeout.as_secs()
                );
            }
            thread::sleep(Duration::from_millis(20));
        };

        Ok(Output {
            status,
            stdout: stdout.map(join_drain).unwrap_or_default(),
            stderr: stderr.map(join_drain).unwrap_or_default(),
        })
    }

    /// Display the command for error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn join_drain(handle: thread::JoinHandle<Vec<u8>>) -> Vec<u8> {
    handle.join().unwrap_or_default()
}

/// Captured result of a finished toolchain process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `None` if the process was terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Stdout followed by stderr, trimmed.
    pub fn combined_output(&self) -> String {
        let mut text = self.stdout.trim_end().to_string();
        let stderr = self.stderr.trim_end();
        if !stderr.is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(stderr);
        }
        text
    }
}

impl From<Output> for ProcessOutput {
    fn from(output: Output) -> Self {
        ProcessOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Executes toolchain commands.
///
/// Compilers hold a runner rather than spawning processes directly, so
/// builds can be exercised without a toolchain installed.
pub trait ProcessRunner: Send + Sync {
    /// Run `spec` to completion. `Err` means the process could not be spawned.
    fn run(&self, spec: &CommandSpec) -> std::io::Result<ProcessOutput>;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> std::io::Result<ProcessOutput> {
        let output = ProcessBuilder::from_spec(spec).spawn_piped()?.wait_with_output()?;
        Ok(output.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_exec_with_timeout_captures_output() {
        let output = ProcessBuilder::new("echo")
            .arg("hello")
            .exec_with_timeout(Duration::from_secs(10))
            .unwrap();

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("hello"));
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_with_timeout_kills_child() {
        let err = ProcessBuilder::new("sleep")
            .arg("5")
            .exec_with_timeout(Duration::from_millis(100))
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_reports_exit_code() {
        let spec = CommandSpec::new("sh").args(["-c", "echo oops >&2; exit 3"]);
        let output = SystemRunner.run(&spec).unwrap();
        assert_eq!(output.code, Some(3));
        assert!(!output.success());
        assert_eq!(output.combined_output(), "oops");
    }

    #[test]
    fn test_system_runner_spawn_failure() {
        let spec = CommandSpec::new("/definitely/not/a/compiler");
        assert!(SystemRunner.run(&spec).is_err());
    }

    #[test]
    fn test_display_command() {
        let pb = ProcessBuilder::new("gcc").args(["-Wall", "-o", "output", "input.c"]);

        assert_eq!(pb.display_command(), "gcc -Wall -o output input.c");
    }

    #[test]
    fn test_combined_output() {
        let output = ProcessOutput {
            code: Some(0),
            stdout: "main.c\n".to_string(),
            stderr: "warning: unused\n".to_string(),
        };
        assert_eq!(output.combined_output(), "main.c\nwarning: unused");
    }
}
