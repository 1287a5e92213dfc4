//! MSVC toolchain implementation.
//!
//! Discovery follows the Visual Studio installer layout:
//!
//! 1. `%ProgramFiles(x86)%` locates the installer and the Windows Kits.
//! 2. `vswhere.exe -latest -property installationPath` finds Visual Studio.
//! 3. The newest `VC/Tools/MSVC/<version>` directory holds `cl.exe`/`link.exe`.
//! 4. The newest `Windows Kits/10/Lib/<version>` containing
//!    `um/<target>/kernel32.lib` is the SDK for that target.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use crate::core::configuration::{Architecture, Configuration, OutputKind};
use crate::util::process::ProcessRunner;

use super::{
    CommandSpec, Compiler, Language, ToolchainEnvironment, ToolchainError, ToolchainPlatform,
};

/// Resolved install locations shared by every command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsvcInstall {
    /// `VC/Tools/MSVC/<version>`
    pub msvc_dir: PathBuf,
    /// `Windows Kits/10` root, if the Program Files directory is known
    pub windows_kits_dir: Option<PathBuf>,
}

/// MSVC toolchain (Windows).
pub struct MsvcCompiler {
    output_root: PathBuf,
    env: Arc<dyn ToolchainEnvironment>,
    runner: Arc<dyn ProcessRunner>,
    pinned_msvc_dir: Option<PathBuf>,
    install: OnceLock<Option<MsvcInstall>>,
    /// SDK version per target architecture, indexed by `Architecture::index`
    sdk_versions: [OnceLock<Option<String>>; 2],
}

impl MsvcCompiler {
    pub fn new(
        output_root: impl Into<PathBuf>,
        env: Arc<dyn ToolchainEnvironment>,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        MsvcCompiler {
            output_root: output_root.into(),
            env,
            runner,
            pinned_msvc_dir: None,
            install: OnceLock::new(),
            sdk_versions: [OnceLock::new(), OnceLock::new()],
        }
    }

    /// Use a specific `VC/Tools/MSVC/<version>` directory instead of vswhere.
    pub fn with_msvc_dir(mut self, dir: PathBuf) -> Self {
        self.pinned_msvc_dir = Some(dir);
        self
    }

    /// Cached install discovery.
    pub fn install(&self) -> Result<&MsvcInstall, ToolchainError> {
        self.install
            .get_or_init(|| self.discover_install())
            .as_ref()
            .ok_or_else(|| ToolchainError::NotFound {
                toolchain: ToolchainPlatform::Msvc,
                reason: "no Visual Studio installation with C++ tools was found".to_string(),
            })
    }

    /// Cached Windows SDK version for the given target.
    pub fn sdk_version(&self, architecture: Architecture) -> Option<&str> {
        self.sdk_versions[architecture.index()]
            .get_or_init(|| {
                let kits = self.install().ok()?.windows_kits_dir.as_deref()?;
                let version = find_windows_sdk_version(self.env.as_ref(), kits, architecture);
                if version.is_none() {
                    tracing::warn!(
                        "no Windows SDK found for target {}; SDK paths will be omitted",
                        target_string(architecture)
                    );
                }
                version
            })
            .as_deref()
    }

    fn discover_install(&self) -> Option<MsvcInstall> {
        let program_files = find_program_files_x86(self.env.as_ref());
        let windows_kits_dir = program_files
            .as_ref()
            .map(|pf| pf.join("Windows Kits").join("10"));

        let msvc_dir = match &self.pinned_msvc_dir {
            Some(dir) => Some(dir.clone()),
            None => program_files
                .as_deref()
                .and_then(|pf| find_msvc_dir(self.env.as_ref(), pf)),
        }?;

        tracing::debug!("Found MSVC at {}", msvc_dir.display());
        Some(MsvcInstall {
            msvc_dir,
            windows_kits_dir,
        })
    }

    fn tool_path(install: &MsvcInstall, architecture: Architecture, tool: &str) -> PathBuf {
        install
            .msvc_dir
            .join("bin")
            .join(host_string())
            .join(target_string(architecture))
            .join(tool)
    }

    /// `Windows Kits/10/<section>/<version>`, when both parts are known.
    fn sdk_dir(
        install: &MsvcInstall,
        sdk_version: Option<&str>,
        section: &str,
    ) -> Option<PathBuf> {
        Some(
            install
                .windows_kits_dir
                .as_ref()?
                .join(section)
                .join(sdk_version?),
        )
    }

    /// Compile command from already-resolved discovery results.
    pub fn make_compile_command(
        &self,
        install: &MsvcInstall,
        sdk_version: Option<&str>,
        configuration: &Configuration,
        file: &Path,
    ) -> Result<CommandSpec, ToolchainError> {
        let lang = Language::from_path(file).ok_or_else(|| ToolchainError::UnsupportedSource {
            path: file.to_path_buf(),
        })?;
        let architecture = configuration.effective_architecture();

        let mut cmd = CommandSpec::new(Self::tool_path(install, architecture, "cl.exe"));

        // Quiet logo, compile only
        cmd = cmd.arg("/nologo").arg("/c");

        cmd = cmd.arg(match lang {
            Language::C => "/std:c11",
            Language::Cxx => "/std:c++latest",
        });

        for define in &configuration.defines {
            cmd = cmd.arg("/D").arg(define);
        }
        if lang == Language::Cxx {
            cmd = cmd.arg("/D").arg("_HAS_EXCEPTIONS=0");
        }

        // Standard include directories come before user ones
        cmd = cmd.arg(format!("/I{}", install.msvc_dir.join("include").display()));
        if let Some(sdk_include) = Self::sdk_dir(install, sdk_version, "Include") {
            for section in ["ucrt", "um", "shared"] {
                cmd = cmd.arg(format!("/I{}", sdk_include.join(section).display()));
            }
        }
        for dir in &configuration.include_dirs {
            cmd = cmd.arg(format!("/I{}", dir.display()));
        }

        cmd = cmd.arg(format!(
            "/Fo{}",
            self.compiler_output_path(configuration, file).display()
        ));

        cmd = cmd.arg(match lang {
            Language::C => "/Tc",
            Language::Cxx => "/Tp",
        });
        cmd = cmd.arg(file.display().to_string());

        Ok(cmd)
    }

    /// Link command from already-resolved discovery results.
    pub fn make_link_command(
        &self,
        install: &MsvcInstall,
        sdk_version: Option<&str>,
        configuration: &Configuration,
        objects: &[PathBuf],
        output_name: &str,
        kind: OutputKind,
    ) -> CommandSpec {
        let architecture = configuration.effective_architecture();
        let target = target_string(architecture);
        let output = self.linker_output_path(configuration, output_name, kind);

        let mut cmd = CommandSpec::new(Self::tool_path(install, architecture, "link.exe"));

        cmd = cmd.arg(match kind {
            OutputKind::Application => "/SUBSYSTEM:CONSOLE",
            OutputKind::StaticLibrary => "/LIB",
            OutputKind::DynamicLibrary => "/DLL",
        });
        cmd = cmd.arg(format!("/OUT:{}", output.display()));

        // Standard library paths
        cmd = cmd.arg(format!(
            "/LIBPATH:{}",
            install.msvc_dir.join("lib").join(target).display()
        ));
        if let Some(sdk_lib) = Self::sdk_dir(install, sdk_version, "Lib") {
            for section in ["um", "ucrt"] {
                cmd = cmd.arg(format!(
                    "/LIBPATH:{}",
                    sdk_lib.join(section).join(target).display()
                ));
            }
        }

        // link.exe rejects trailing separators
        for dir in &configuration.library_dirs {
            cmd = cmd.arg(format!("/LIBPATH:{}", trim_trailing_separators(dir)));
        }

        for library in &configuration.libraries {
            let library = if library.extension().is_none() {
                library.with_extension(self.static_lib_extension())
            } else {
                library.clone()
            };
            cmd = cmd.arg(library.display().to_string());
        }

        for object in objects {
            cmd = cmd.arg(object.display().to_string());
        }

        cmd = cmd.arg("/NOLOGO");

        if let Some(architecture) = configuration.architecture {
            cmd = cmd.arg(match architecture {
                Architecture::X86_64 => "/MACHINE:x64",
                Architecture::X86 => "/MACHINE:X86",
            });
        }

        cmd
    }
}

impl Compiler for MsvcCompiler {
    fn platform(&self) -> ToolchainPlatform {
        ToolchainPlatform::Msvc
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
        let install = self.install()?;
        let sdk_version = self.sdk_version(configuration.effective_architecture());
        self.make_compile_command(install, sdk_version, configuration, file)
    }

    fn link_command(
        &self,
        objects: &[PathBuf],
        output_name: &str,
        kind: OutputKind,
        configuration: &Configuration,
    ) -> Result<CommandSpec, ToolchainError> {
        let install = self.install()?;
        let sdk_version = self.sdk_version(configuration.effective_architecture());
        Ok(self.make_link_command(install, sdk_version, configuration, objects, output_name, kind))
    }

    fn target_dir_name(&self, architecture: Architecture) -> String {
        target_string(architecture).to_string()
    }

    fn object_extension(&self) -> &str {
        "obj"
    }

    fn static_lib_extension(&self) -> &str {
        "lib"
    }

    fn shared_lib_extension(&self) -> &str {
        "dll"
    }

    fn exe_extension(&self) -> &str {
        "exe"
    }

    fn lib_prefix(&self) -> &str {
        ""
    }
}

/// `bin/Host*` directory for the running machine.
pub fn host_string() -> &'static str {
    match Architecture::host() {
        Architecture::X86 => "Hostx86",
        Architecture::X86_64 => "Hostx64",
    }
}

/// MSVC name for a target architecture.
pub fn target_string(architecture: Architecture) -> &'static str {
    match architecture {
        Architecture::X86 => "x86",
        Architecture::X86_64 => "x64",
    }
}

/// `%ProgramFiles(x86)%`, if set.
pub fn find_program_files_x86(env: &dyn ToolchainEnvironment) -> Option<PathBuf> {
    env.var("ProgramFiles(x86)").map(PathBuf::from)
}

/// Locate the newest `VC/Tools/MSVC/<version>` via vswhere.
pub fn find_msvc_dir(env: &dyn ToolchainEnvironment, program_files_x86: &Path) -> Option<PathBuf> {
    let vswhere = program_files_x86
        .join("Microsoft Visual Studio")
        .join("Installer")
        .join("vswhere.exe");
    if !env.exists(&vswhere) {
        tracing::debug!("vswhere.exe not found at {}", vswhere.display());
        return None;
    }

    let output = env.query(&vswhere, &["-latest", "-property", "installationPath"])?;
    let vs_path = PathBuf::from(output.trim());
    if vs_path.as_os_str().is_empty() || !env.exists(&vs_path) {
        tracing::debug!("vswhere returned no usable installation path");
        return None;
    }

    let tools = vs_path.join("VC").join("Tools").join("MSVC");
    newest_version_dir(env.read_dir(&tools))
}

/// Pick the newest SDK under `Windows Kits/10/Lib` that ships `kernel32.lib`
/// for `architecture`.
pub fn find_windows_sdk_version(
    env: &dyn ToolchainEnvironment,
    windows_kits_dir: &Path,
    architecture: Architecture,
) -> Option<String> {
    let target = target_string(architecture);
    let mut candidates = env.read_dir(&windows_kits_dir.join("Lib"));
    candidates.sort_by(|a, b| version_key(b).cmp(&version_key(a)));

    candidates
        .into_iter()
        .find(|dir| env.exists(&dir.join("um").join(target).join("kernel32.lib")))
        .and_then(|dir| dir.file_name().map(|n| n.to_string_lossy().into_owned()))
}

/// Newest directory by its version-number name.
fn newest_version_dir(dirs: Vec<PathBuf>) -> Option<PathBuf> {
    dirs.into_iter().max_by(|a, b| {
        let (va, vb) = (semver_of(a), semver_of(b));
        match (va, vb) {
            (Some(va), Some(vb)) => va.cmp(&vb),
            _ => version_key(a).cmp(&version_key(b)),
        }
    })
}

fn semver_of(path: &Path) -> Option<semver::Version> {
    semver::Version::parse(&path.file_name()?.to_string_lossy()).ok()
}

/// Numeric components of a dotted directory name (`10.0.22621.0`).
fn version_key(path: &Path) -> Vec<u64> {
    path.file_name()
        .map(|n| {
            n.to_string_lossy()
                .split('.')
                .map(|part| part.parse().unwrap_or(0))
                .collect()
        })
        .unwrap_or_default()
}

fn trim_trailing_separators(path: &Path) -> String {
    let s = path.display().to_string();
    let trimmed = s.trim_end_matches(['/', '\\']);
    if trimmed.is_empty() {
        s
    } else {
        trimmed.to_string()
    }
}
