//! Test utilities and mocks for geno unit tests.
//!
//! Toolchain discovery and process execution are the two seams that touch the
//! machine. [`MockEnvironment`] fakes the former and [`MockRunner`] the latter,
//! so compilers can be exercised without Visual Studio or GCC installed.
//!
//! # Example
//!
//! ```rust,ignore
//! use geno::test_support::{MockEnvironment, MockRunner};
//!
//! let env = MockEnvironment::new().with_executable("gcc", "/usr/bin/gcc");
//! let runner = Arc::new(MockRunner::new().fail_when_arg_contains("broken.c", 1));
//! let compiler = GccCompiler::new(ToolchainPlatform::Gcc, "/out", Arc::new(env), runner.clone());
//! ```

use std::collections::{BTreeSet, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::builder::toolchain::{CommandSpec, ToolchainEnvironment};
use crate::util::process::{ProcessOutput, ProcessRunner};

/// In-memory machine for toolchain discovery.
#[derive(Debug, Clone, Default)]
pub struct MockEnvironment {
    vars: HashMap<String, String>,
    paths: BTreeSet<PathBuf>,
    executables: HashMap<String, PathBuf>,
    queries: HashMap<PathBuf, String>,
}

impl MockEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Register a file; its ancestors become directories.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.add_path(path.as_ref());
        self
    }

    /// Register a directory and its ancestors.
    pub fn with_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.add_path(path.as_ref());
        self
    }

    /// Make `name` resolvable through `which`.
    pub fn with_executable(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.add_path(&path);
        self.executables.insert(name.into(), path);
        self
    }

    /// Canned stdout for any query of `program`.
    pub fn with_query(mut self, program: impl Into<PathBuf>, stdout: impl Into<String>) -> Self {
        self.queries.insert(program.into(), stdout.into());
        self
    }

    fn add_path(&mut self, path: &Path) {
        let mut current = Some(path);
        while let Some(p) = current {
            if p.as_os_str().is_empty() {
                break;
            }
            self.paths.insert(p.to_path_buf());
            current = p.parent();
        }
    }
}

impl ToolchainEnvironment for MockEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }

    fn exists(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    fn read_dir(&self, path: &Path) -> Vec<PathBuf> {
        self.paths
            .iter()
            .filter(|p| p.parent() == Some(path))
            .cloned()
            .collect()
    }

    fn which(&self, program: &str) -> Option<PathBuf> {
        self.executables.get(program).cloned()
    }

    fn query(&self, program: &Path, _args: &[&str]) -> Option<String> {
        self.queries.get(program).cloned()
    }
}

/// How the mock answers a command.
#[derive(Debug, Clone)]
enum Response {
    Output(ProcessOutput),
    SpawnError,
}

/// Records every command and answers from a list of rules.
///
/// Commands that match no rule succeed with empty output.
#[derive(Debug, Default)]
pub struct MockRunner {
    rules: Vec<(String, Response)>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exit with `code` when any argument contains `needle`.
    pub fn fail_when_arg_contains(self, needle: impl Into<String>, code: i32) -> Self {
        self.respond_when_arg_contains(
            needle,
            ProcessOutput {
                code: Some(code),
                stdout: String::new(),
                stderr: "error: mock failure".to_string(),
            },
        )
    }

    /// Answer with `output` when any argument contains `needle`.
    pub fn respond_when_arg_contains(
        mut self,
        needle: impl Into<String>,
        output: ProcessOutput,
    ) -> Self {
        self.rules.push((needle.into(), Response::Output(output)));
        self
    }

    /// Fail to spawn when any argument contains `needle`.
    pub fn spawn_error_when_arg_contains(mut self, needle: impl Into<String>) -> Self {
        self.rules.push((needle.into(), Response::SpawnError));
        self
    }

    /// Number of commands run so far.
    pub fn invocations(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Every command run so far, in call order.
    pub fn commands(&self) -> Vec<CommandSpec> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl ProcessRunner for MockRunner {
    fn run(&self, spec: &CommandSpec) -> io::Result<ProcessOutput> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(spec.clone());
        }

        let matched = self
            .rules
            .iter()
            .find(|(needle, _)| spec.args.iter().any(|a| a.contains(needle.as_str())));

        match matched {
            Some((_, Response::Output(output))) => Ok(output.clone()),
            Some((_, Response::SpawnError)) => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} not found", spec.program.display()),
            )),
            None => Ok(ProcessOutput {
                code: Some(0),
                ..Default::default()
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_environment_listing() {
        let env = MockEnvironment::new()
            .with_file("/sdk/Lib/10.0.1/um/x64/kernel32.lib")
            .with_dir("/sdk/Lib/10.0.2");

        assert!(env.exists(Path::new("/sdk/Lib/10.0.1/um")));
        let mut children = env.read_dir(Path::new("/sdk/Lib"));
        children.sort();
        assert_eq!(
            children,
            vec![PathBuf::from("/sdk/Lib/10.0.1"), PathBuf::from("/sdk/Lib/10.0.2")]
        );
        assert!(env.read_dir(Path::new("/missing")).is_empty());
    }

    #[test]
    fn test_mock_runner_rules() {
        let runner = MockRunner::new()
            .fail_when_arg_contains("bad.c", 2)
            .spawn_error_when_arg_contains("ghost.c");

        let ok = runner.run(&CommandSpec::new("cc").arg("good.c")).unwrap();
        assert!(ok.success());

        let failed = runner.run(&CommandSpec::new("cc").arg("src/bad.c")).unwrap();
        assert_eq!(failed.code, Some(2));

        assert!(runner.run(&CommandSpec::new("cc").arg("ghost.c")).is_err());
        assert_eq!(runner.invocations(), 3);
    }
}
