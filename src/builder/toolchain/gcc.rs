//! GCC/Clang toolchain implementation.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use crate::core::configuration::{Architecture, Configuration, OutputKind};
use crate::util::process::ProcessRunner;

use super::{
    CommandSpec, Compiler, Language, ToolchainEnvironment, ToolchainError, ToolchainPlatform,
};

/// Resolved driver and archiver paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GccTools {
    pub cc: PathBuf,
    pub cxx: PathBuf,
    pub ar: PathBuf,
}

/// GCC-style toolchain (GCC or Clang on Unix-like systems and MinGW).
pub struct GccCompiler {
    family: ToolchainPlatform,
    output_root: PathBuf,
    env: Arc<dyn ToolchainEnvironment>,
    runner: Arc<dyn ProcessRunner>,
    cc: Option<PathBuf>,
    cxx: Option<PathBuf>,
    ar: Option<PathBuf>,
    tools: OnceLock<Option<GccTools>>,
}

impl GccCompiler {
    pub fn new(
        family: ToolchainPlatform,
        output_root: impl Into<PathBuf>,
        env: Arc<dyn ToolchainEnvironment>,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        GccCompiler {
            family,
            output_root: output_root.into(),
            env,
            runner,
            cc: None,
            cxx: None,
            ar: None,
            tools: OnceLock::new(),
        }
    }

    pub fn with_cc(mut self, cc: PathBuf) -> Self {
        self.cc = Some(cc);
        self
    }

    pub fn with_cxx(mut self, cxx: PathBuf) -> Self {
        self.cxx = Some(cxx);
        self
    }

    pub fn with_ar(mut self, ar: PathBuf) -> Self {
        self.ar = Some(ar);
        self
    }

    /// Cached tool discovery: explicit override, then `CC`/`CXX`/`AR`, then PATH.
    pub fn tools(&self) -> Result<&GccTools, ToolchainError> {
        self.tools
            .get_or_init(|| self.discover_tools())
            .as_ref()
            .ok_or_else(|| ToolchainError::NotFound {
                toolchain: self.family,
                reason: "no C compiler found (set CC or install one on PATH)".to_string(),
            })
    }

    fn discover_tools(&self) -> Option<GccTools> {
        let env = self.env.as_ref();
        let default_cc = match self.family {
            ToolchainPlatform::Clang => "clang",
            _ => "gcc",
        };

        let cc = self
            .cc
            .clone()
            .or_else(|| env.var("CC").map(PathBuf::from))
            .or_else(|| env.which(default_cc))
            .or_else(|| env.which("cc"))?;

        let cxx = self
            .cxx
            .clone()
            .or_else(|| env.var("CXX").map(PathBuf::from))
            .unwrap_or_else(|| infer_cxx(&cc));

        let ar = self
            .ar
            .clone()
            .or_else(|| env.var("AR").map(PathBuf::from))
            .or_else(|| env.which("ar"))
            .unwrap_or_else(|| PathBuf::from("ar"));

        tracing::debug!("Found {} at {}", self.family, cc.display());
        Some(GccTools { cc, cxx, ar })
    }

    /// Compile command from resolved tools.
    pub fn make_compile_command(
        &self,
        tools: &GccTools,
        configuration: &Configuration,
        file: &Path,
    ) -> Result<CommandSpec, ToolchainError> {
        let lang = Language::from_path(file).ok_or_else(|| ToolchainError::UnsupportedSource {
            path: file.to_path_buf(),
        })?;

        let mut cmd = match lang {
            Language::C => CommandSpec::new(&tools.cc).arg("-c").arg("-std=c11"),
            Language::Cxx => CommandSpec::new(&tools.cxx)
                .arg("-c")
                .arg("-std=c++20")
                .arg("-fno-exceptions"),
        };

        if let Some(flag) = machine_flag(configuration) {
            cmd = cmd.arg(flag);
        }

        for define in &configuration.defines {
            cmd = cmd.arg(format!("-D{}", define));
        }
        for dir in &configuration.include_dirs {
            cmd = cmd.arg(format!("-I{}", dir.display()));
        }

        cmd = cmd.arg(file.display().to_string());
        cmd = cmd
            .arg("-o")
            .arg(self.compiler_output_path(configuration, file).display().to_string());

        Ok(cmd)
    }

    /// Link or archive command from resolved tools.
    pub fn make_link_command(
        &self,
        tools: &GccTools,
        configuration: &Configuration,
        objects: &[PathBuf],
        output_name: &str,
        kind: OutputKind,
    ) -> CommandSpec {
        let output = self.linker_output_path(configuration, output_name, kind);

        if kind == OutputKind::StaticLibrary {
            // ar rcs <output> <objects...>
            let mut cmd = CommandSpec::new(&tools.ar)
                .arg("rcs")
                .arg(output.display().to_string());
            for object in objects {
                cmd = cmd.arg(object.display().to_string());
            }
            return cmd;
        }

        let mut cmd = CommandSpec::new(&tools.cxx);
        if kind == OutputKind::DynamicLibrary {
            cmd = cmd.arg("-shared");
        }
        if let Some(flag) = machine_flag(configuration) {
            cmd = cmd.arg(flag);
        }
        cmd = cmd.arg("-o").arg(output.display().to_string());

        for object in objects {
            cmd = cmd.arg(object.display().to_string());
        }
        for dir in &configuration.library_dirs {
            cmd = cmd.arg(format!("-L{}", dir.display()));
        }
        for library in &configuration.libraries {
            cmd = cmd.arg(library_arg(library, self.static_lib_extension()));
        }

        cmd
    }

    fn os_suffix(&self) -> &'static str {
        if cfg!(target_os = "macos") {
            "apple-darwin"
        } else if cfg!(target_os = "windows") {
            "w64-mingw32"
        } else {
            "linux-gnu"
        }
    }
}

impl Compiler for GccCompiler {
    fn platform(&self) -> ToolchainPlatform {
        self.family
    }

    fn output_root(&self) -> &Path {
        &self.output_root
    }

    fn runner(&self) -> &dyn ProcessRunner {
        self.runner.as_ref()
    }

    fn compile_command(
        &self,
        file: &Path,
        configuration: &Configuration,
    ) -> Result<CommandSpec, ToolchainError> {
        let tools = self.tools()?;
        self.make_compile_command(tools, configuration, file)
    }

    fn link_command(
        &self,
        objects: &[PathBuf],
        output_name: &str,
        kind: OutputKind,
        configuration: &Configuration,
    ) -> Result<CommandSpec, ToolchainError> {
        let tools = self.tools()?;
        Ok(self.make_link_command(tools, configuration, objects, output_name, kind))
    }

    fn target_dir_name(&self, architecture: Architecture) -> String {
        let arch = match architecture {
            Architecture::X86 => "i686",
            Architecture::X86_64 => "x86_64",
        };
        format!("{}-{}", arch, self.os_suffix())
    }

    fn object_extension(&self) -> &str {
        "o"
    }

    fn static_lib_extension(&self) -> &str {
        "a"
    }

    fn shared_lib_extension(&self) -> &str {
        if cfg!(target_os = "macos") {
            "dylib"
        } else if cfg!(target_os = "windows") {
            "dll"
        } else {
            "so"
        }
    }

    fn exe_extension(&self) -> &str {
        if cfg!(target_os = "windows") {
            "exe"
        } else {
            ""
        }
    }

    fn lib_prefix(&self) -> &str {
        "lib"
    }
}

fn machine_flag(configuration: &Configuration) -> Option<&'static str> {
    configuration.architecture.map(|arch| match arch {
        Architecture::X86 => "-m32",
        Architecture::X86_64 => "-m64",
    })
}

/// `m` -> `-lm`; `deps/z` -> `deps/z.a`; anything with an extension is passed as-is.
fn library_arg(library: &Path, static_ext: &str) -> String {
    if library.components().count() == 1 && library.extension().is_none() {
        return format!("-l{}", library.display());
    }
    if library.extension().is_none() {
        return library.with_extension(static_ext).display().to_string();
    }
    library.display().to_string()
}

/// Infer the C++ driver from the C driver.
///
/// - gcc, x86_64-linux-gnu-gcc -> g++, x86_64-linux-gnu-g++
/// - clang -> clang++
/// - cc, /usr/bin/cc -> c++, /usr/bin/c++
pub fn infer_cxx(cc: &Path) -> PathBuf {
    let cc_str = cc.to_string_lossy();

    if let Some(prefix) = cc_str.strip_suffix("gcc") {
        return PathBuf::from(format!("{}g++", prefix));
    }

    if cc_str.ends_with("clang") {
        return PathBuf::from(format!("{}++", cc_str));
    }

    // "cc" only as a whole basename, never "mycc"
    let is_standalone_cc = cc_str == "cc"
        || cc_str.ends_with("/cc")
        || cc_str.ends_with("\\cc")
        || cc_str.ends_with("-cc");
    if is_standalone_cc {
        return PathBuf::from(format!("{}++", &cc_str[..cc_str.len() - 1]));
    }

    PathBuf::from(format!("{}++", cc_str))
}
