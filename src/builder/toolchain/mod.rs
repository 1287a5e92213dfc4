//! Compiler abstraction over native toolchains.
//!
//! A [`Compiler`] turns a [`Configuration`] and a source path into concrete
//! toolchain invocations. Backends (MSVC, GCC/Clang) only describe how their
//! commands look and where their tools live; running the commands and
//! interpreting exit codes is shared by the provided trait methods.
//!
//! Toolchain discovery goes through [`ToolchainEnvironment`] so tests can
//! substitute a fake filesystem and process layer. Discovery results are
//! cached per compiler instance, which keeps command construction a pure
//! function of its inputs once the cache is populated.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

use crate::core::configuration::{Architecture, Configuration, OutputKind};
use crate::util::fs::ensure_dir;
use crate::util::hash::short_hash;
use crate::util::process::ProcessRunner;

mod detect;
mod gcc;
mod msvc;

pub use detect::{
    detect_compiler, SystemEnvironment, ToolchainEnvironment, DEFAULT_QUERY_TIMEOUT,
};
pub use gcc::GccCompiler;
pub use msvc::{MsvcCompiler, MsvcInstall};

/// Source language, decided by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    C,
    Cxx,
}

impl Language {
    /// Map a source path to its language.
    ///
    /// `.c` is C; `.cpp`, `.cxx` and `.cc` are C++. Anything else (headers
    /// included) is not compiled.
    pub fn from_path(path: &Path) -> Option<Language> {
        match path.extension()?.to_str()? {
            "c" => Some(Language::C),
            "cpp" | "cxx" | "cc" => Some(Language::Cxx),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cxx => "c++",
        }
    }
}

/// The family of a toolchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolchainPlatform {
    /// GCC (GNU Compiler Collection)
    Gcc,
    /// Clang/LLVM
    Clang,
    /// Microsoft Visual C++
    Msvc,
}

impl ToolchainPlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolchainPlatform::Gcc => "gcc",
            ToolchainPlatform::Clang => "clang",
            ToolchainPlatform::Msvc => "msvc",
        }
    }
}

impl fmt::Display for ToolchainPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolchainPlatform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gcc" => Ok(ToolchainPlatform::Gcc),
            "clang" => Ok(ToolchainPlatform::Clang),
            "msvc" | "cl" => Ok(ToolchainPlatform::Msvc),
            _ => Err(format!("unknown toolchain '{}', valid values: msvc, gcc, clang", s)),
        }
    }
}

/// A command to execute, with program, arguments, and environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// The program to run (e.g., "gcc", "cl.exe")
    pub program: PathBuf,
    /// Command arguments
    pub args: Vec<String>,
    /// Environment variables to set
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        CommandSpec {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(|a| a.into()));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Render the full command line as a single string.
    ///
    /// Tokens containing whitespace (or empty tokens) are double-quoted.
    pub fn command_line(&self) -> String {
        let mut line = quote(&self.program.display().to_string());
        for arg in &self.args {
            line.push(' ');
            line.push_str(&quote(arg));
        }
        line
    }

    /// Whether `token` appears as a whole argument.
    pub fn has_arg(&self, token: &str) -> bool {
        self.args.iter().any(|a| a == token)
    }
}

fn quote(token: &str) -> String {
    if token.is_empty() || token.chars().any(char::is_whitespace) {
        format!("\"{}\"", token)
    } else {
        token.to_string()
    }
}

/// Toolchain discovery or invocation error.
#[derive(Debug, Error)]
pub enum ToolchainError {
    #[error("{toolchain} toolchain not found: {reason}")]
    NotFound {
        toolchain: ToolchainPlatform,
        reason: String,
    },

    #[error("unsupported source file `{}` (expected .c, .cpp, .cxx or .cc)", path.display())]
    UnsupportedSource { path: PathBuf },

    #[error("failed to spawn `{}`", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why a compile or link step did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepFailure {
    /// No usable toolchain install was found
    ToolchainNotFound,
    /// The file has no compilable extension
    UnsupportedSource,
    /// The toolchain process could not be started
    Spawn,
    /// The toolchain exited unsuccessfully (`None` when killed by a signal)
    ExitCode(Option<i32>),
    /// Output directories could not be created
    Io,
    /// Skipped because the build was cancelled
    Cancelled,
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepFailure::ToolchainNotFound => write!(f, "toolchain not found"),
            StepFailure::UnsupportedSource => write!(f, "unsupported source"),
            StepFailure::Spawn => write!(f, "failed to start toolchain"),
            StepFailure::ExitCode(Some(code)) => write!(f, "exit code {}", code),
            StepFailure::ExitCode(None) => write!(f, "terminated by signal"),
            StepFailure::Io => write!(f, "I/O error"),
            StepFailure::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Result of one compile or link call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    /// File produced (object, library or executable)
    pub output: PathBuf,
    /// `None` on success
    pub failure: Option<StepFailure>,
    /// Toolchain output or the reason the step could not run
    pub diagnostics: String,
}

impl StepOutcome {
    pub fn succeeded(output: PathBuf, diagnostics: impl Into<String>) -> Self {
        StepOutcome {
            output,
            failure: None,
            diagnostics: diagnostics.into(),
        }
    }

    pub fn failed(output: PathBuf, failure: StepFailure, diagnostics: impl Into<String>) -> Self {
        StepOutcome {
            output,
            failure: Some(failure),
            diagnostics: diagnostics.into(),
        }
    }

    pub fn cancelled(output: PathBuf) -> Self {
        Self::failed(output, StepFailure::Cancelled, "")
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    fn from_error(output: PathBuf, err: ToolchainError) -> Self {
        let failure = match err {
            ToolchainError::NotFound { .. } => StepFailure::ToolchainNotFound,
            ToolchainError::UnsupportedSource { .. } => StepFailure::UnsupportedSource,
            ToolchainError::Spawn { .. } => StepFailure::Spawn,
        };
        Self::failed(output, failure, format!("{:#}", anyhow::Error::from(err)))
    }
}

/// Capability over a native toolchain.
///
/// Implementors provide command construction and naming conventions; the
/// provided methods turn those into output paths and executed steps.
pub trait Compiler: Send + Sync {
    /// The toolchain family.
    fn platform(&self) -> ToolchainPlatform;

    /// Root directory for objects and link outputs.
    fn output_root(&self) -> &Path;

    /// Runner used to execute toolchain commands.
    fn runner(&self) -> &dyn ProcessRunner;

    /// Build the command that compiles `file` under `configuration`.
    fn compile_command(
        &self,
        file: &Path,
        configuration: &Configuration,
    ) -> Result<CommandSpec, ToolchainError>;

    /// Build the command that links `objects` into `output_name`.
    fn link_command(
        &self,
        objects: &[PathBuf],
        output_name: &str,
        kind: OutputKind,
        configuration: &Configuration,
    ) -> Result<CommandSpec, ToolchainError>;

    /// Directory name for per-target outputs (e.g. `x64`, `x86_64-linux-gnu`).
    fn target_dir_name(&self, architecture: Architecture) -> String;

    fn object_extension(&self) -> &str;

    fn static_lib_extension(&self) -> &str;

    fn shared_lib_extension(&self) -> &str;

    fn exe_extension(&self) -> &str;

    /// Filename prefix for libraries (e.g. "lib" on Unix).
    fn lib_prefix(&self) -> &str;

    /// Deterministic object path for `file`.
    ///
    /// Objects live under `<root>/<target>/obj/<dir-hash>/`, where the hash
    /// is taken over the source's directory so equally named files from
    /// different directories never collide.
    fn compiler_output_path(&self, configuration: &Configuration, file: &Path) -> PathBuf {
        let dir_key = file
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.output_root()
            .join(self.target_dir_name(configuration.effective_architecture()))
            .join("obj")
            .join(short_hash(&dir_key))
            .join(format!("{}.{}", file_name, self.object_extension()))
    }

    /// Path of the linked artifact for `name`.
    fn linker_output_path(
        &self,
        configuration: &Configuration,
        name: &str,
        kind: OutputKind,
    ) -> PathBuf {
        let (prefix, ext) = match kind {
            OutputKind::Application => ("", self.exe_extension()),
            OutputKind::StaticLibrary => (self.lib_prefix(), self.static_lib_extension()),
            OutputKind::DynamicLibrary => (self.lib_prefix(), self.shared_lib_extension()),
        };
        let file_name = if ext.is_empty() {
            format!("{}{}", prefix, name)
        } else {
            format!("{}{}.{}", prefix, name, ext)
        };

        self.output_root()
            .join(self.target_dir_name(configuration.effective_architecture()))
            .join(file_name)
    }

    /// Compile one source file.
    fn compile(&self, file: &Path, configuration: &Configuration) -> StepOutcome {
        let output = self.compiler_output_path(configuration, file);
        let spec = match self.compile_command(file, configuration) {
            Ok(spec) => spec,
            Err(e) => {
                tracing::warn!("cannot compile {}: {}", file.display(), e);
                return StepOutcome::from_error(output, e);
            }
        };

        tracing::debug!("Compiling {} -> {}", file.display(), output.display());
        run_step(self.runner(), &spec, output)
    }

    /// Link object files into an executable or library.
    fn link(
        &self,
        objects: &[PathBuf],
        output_name: &str,
        kind: OutputKind,
        configuration: &Configuration,
    ) -> StepOutcome {
        let output = self.linker_output_path(configuration, output_name, kind);
        let spec = match self.link_command(objects, output_name, kind, configuration) {
            Ok(spec) => spec,
            Err(e) => {
                tracing::warn!("cannot link {}: {}", output_name, e);
                return StepOutcome::from_error(output, e);
            }
        };

        // Archivers add to an existing archive instead of replacing it.
        if kind == OutputKind::StaticLibrary && output.exists() {
            if let Err(e) = std::fs::remove_file(&output) {
                return StepOutcome::failed(
                    output,
                    StepFailure::Io,
                    format!("failed to remove old archive: {}", e),
                );
            }
        }

        tracing::debug!("Linking {} ({})", output.display(), kind);
        run_step(self.runner(), &spec, output)
    }
}

/// Run a toolchain command and interpret its exit status.
fn run_step(runner: &dyn ProcessRunner, spec: &CommandSpec, output: PathBuf) -> StepOutcome {
    if let Some(parent) = output.parent() {
        if let Err(e) = ensure_dir(parent) {
            return StepOutcome::failed(output, StepFailure::Io, format!("{:#}", e));
        }
    }

    tracing::debug!("{}", spec.command_line());

    match runner.run(spec) {
        Ok(result) => {
            let diagnostics = result.combined_output();
            if result.success() {
                StepOutcome::succeeded(output, diagnostics)
            } else {
                StepOutcome::failed(output, StepFailure::ExitCode(result.code), diagnostics)
            }
        }
        Err(source) => StepOutcome::from_error(
            output,
            ToolchainError::Spawn {
                program: spec.program.clone(),
                source,
            },
        ),
    }
}
