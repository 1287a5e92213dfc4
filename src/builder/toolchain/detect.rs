//! Toolchain discovery.
//!
//! Everything that inspects the machine goes through [`ToolchainEnvironment`].
//! [`SystemEnvironment`] talks to the real environment; tests supply a mock.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::util::config::{ToolchainKind, ToolchainSettings};
use crate::util::process::{ProcessBuilder, ProcessRunner};

use super::{Compiler, GccCompiler, MsvcCompiler, ToolchainPlatform};

/// Upper bound for installer queries such as `vswhere.exe`.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Read-only view of the machine used for toolchain discovery.
pub trait ToolchainEnvironment: Send + Sync {
    /// Environment variable lookup.
    fn var(&self, key: &str) -> Option<String>;

    /// Whether a file or directory exists.
    fn exists(&self, path: &Path) -> bool;

    /// Immediate children of a directory (any order; empty if unreadable).
    fn read_dir(&self, path: &Path) -> Vec<PathBuf>;

    /// Locate an executable on PATH.
    fn which(&self, program: &str) -> Option<PathBuf>;

    /// Run a query tool and return its stdout if it exits successfully.
    fn query(&self, program: &Path, args: &[&str]) -> Option<String>;
}

/// The live machine.
#[derive(Debug, Clone)]
pub struct SystemEnvironment {
    query_timeout: Duration,
}

impl SystemEnvironment {
    pub fn new() -> Self {
        SystemEnvironment {
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }
}

impl Default for SystemEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolchainEnvironment for SystemEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read_dir(&self, path: &Path) -> Vec<PathBuf> {
        match std::fs::read_dir(path) {
            Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
            Err(e) => {
                tracing::debug!("cannot read {}: {}", path.display(), e);
                Vec::new()
            }
        }
    }

    fn which(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }

    fn query(&self, program: &Path, args: &[&str]) -> Option<String> {
        let output = ProcessBuilder::new(program)
            .args(args)
            .exec_with_timeout(self.query_timeout);

        match output {
            Ok(out) if out.status.success() => {
                Some(String::from_utf8_lossy(&out.stdout).into_owned())
            }
            Ok(out) => {
                tracing::debug!(
                    "{} failed: {}",
                    program.display(),
                    String::from_utf8_lossy(&out.stderr)
                );
                None
            }
            Err(e) => {
                tracing::debug!("{:#}", e);
                None
            }
        }
    }
}

/// Construct the compiler selected by `settings`.
///
/// Never fails: when no toolchain can be found, a compiler is still
/// returned and every compile or link it attempts reports
/// `ToolchainNotFound`.
pub fn detect_compiler(
    settings: &ToolchainSettings,
    output_root: &Path,
    env: Arc<dyn ToolchainEnvironment>,
    runner: Arc<dyn ProcessRunner>,
) -> Arc<dyn Compiler> {
    let platform = match settings.kind {
        ToolchainKind::Msvc => ToolchainPlatform::Msvc,
        ToolchainKind::Gcc => ToolchainPlatform::Gcc,
        ToolchainKind::Clang => ToolchainPlatform::Clang,
        ToolchainKind::Auto => auto_platform(settings, env.as_ref()),
    };

    tracing::debug!("Using {} toolchain", platform);

    match platform {
        ToolchainPlatform::Msvc => {
            let mut msvc = MsvcCompiler::new(output_root, env, runner);
            if let Some(dir) = &settings.msvc_dir {
                msvc = msvc.with_msvc_dir(dir.clone());
            }
            Arc::new(msvc)
        }
        family => {
            let mut gcc = GccCompiler::new(family, output_root, env, runner);
            if let Some(cc) = &settings.cc {
                gcc = gcc.with_cc(cc.clone());
            }
            if let Some(cxx) = &settings.cxx {
                gcc = gcc.with_cxx(cxx.clone());
            }
            if let Some(ar) = &settings.ar {
                gcc = gcc.with_ar(ar.clone());
            }
            Arc::new(gcc)
        }
    }
}

/// Pick a toolchain family when none is configured.
///
/// Windows prefers MSVC; elsewhere the family of the configured or
/// discovered C compiler wins, defaulting to GCC.
fn auto_platform(settings: &ToolchainSettings, env: &dyn ToolchainEnvironment) -> ToolchainPlatform {
    if settings.msvc_dir.is_some() {
        return ToolchainPlatform::Msvc;
    }

    if cfg!(target_os = "windows") && settings.cc.is_none() && env.var("CC").is_none() {
        return ToolchainPlatform::Msvc;
    }

    let cc = settings
        .cc
        .clone()
        .or_else(|| env.var("CC").map(PathBuf::from))
        .or_else(|| env.which("gcc"))
        .or_else(|| env.which("clang"))
        .or_else(|| env.which("cc"));

    match cc {
        Some(cc) => detect_compiler_family(&cc, env),
        None => {
            tracing::warn!("no C compiler found on PATH");
            ToolchainPlatform::Gcc
        }
    }
}

/// Identify GCC vs Clang from a compiler path and its `--version` banner.
pub(crate) fn detect_compiler_family(cc: &Path, env: &dyn ToolchainEnvironment) -> ToolchainPlatform {
    let name = cc
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if name.contains("clang") {
        return ToolchainPlatform::Clang;
    }
    if name.contains("gcc") || name.contains("g++") {
        return ToolchainPlatform::Gcc;
    }

    // `cc` and friends: ask the driver.
    match env.query(cc, &["--version"]) {
        Some(banner) if banner.to_lowercase().contains("clang") => ToolchainPlatform::Clang,
        _ => ToolchainPlatform::Gcc,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockEnvironment, MockRunner};

    fn detect(settings: &ToolchainSettings, env: MockEnvironment) -> Arc<dyn Compiler> {
        detect_compiler(
            settings,
            Path::new("/out"),
            Arc::new(env),
            Arc::new(MockRunner::new()),
        )
    }

    #[test]
    fn test_explicit_kind_wins() {
        let settings = ToolchainSettings {
            kind: ToolchainKind::Msvc,
            ..Default::default()
        };
        assert_eq!(
            detect(&settings, MockEnvironment::new()).platform(),
            ToolchainPlatform::Msvc
        );
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn test_auto_detects_clang_from_cc() {
        let env = MockEnvironment::new().with_var("CC", "/usr/bin/clang-17");
        assert_eq!(
            detect(&ToolchainSettings::default(), env).platform(),
            ToolchainPlatform::Clang
        );
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn test_auto_queries_cc_banner() {
        let env = MockEnvironment::new()
            .with_executable("cc", "/usr/bin/cc")
            .with_query("/usr/bin/cc", "Apple clang version 15.0.0\n");
        assert_eq!(
            detect(&ToolchainSettings::default(), env).platform(),
            ToolchainPlatform::Clang
        );
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn test_auto_without_compiler_falls_back_to_gcc() {
        assert_eq!(
            detect(&ToolchainSettings::default(), MockEnvironment::new()).platform(),
            ToolchainPlatform::Gcc
        );
    }

    #[test]
    fn test_configured_msvc_dir_selects_msvc() {
        let settings = ToolchainSettings {
            msvc_dir: Some(PathBuf::from("C:/VS/VC/Tools/MSVC/14.38.33130")),
            ..Default::default()
        };
        assert_eq!(
            detect(&settings, MockEnvironment::new()).platform(),
            ToolchainPlatform::Msvc
        );
    }
}
