//! Configuration file support for geno.
//!
//! Two configuration file locations are read:
//! - Global: `~/.geno/config.toml` - User-wide defaults
//! - Workspace: `<workspace>/.geno/config.toml` - Workspace-specific overrides
//!
//! Workspace config takes precedence over global config.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use toml_edit::{value, DocumentMut, Item, Table};

use crate::util::fs::ensure_dir;

/// geno configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Build settings
    pub build: BuildConfig,

    /// Toolchain selection and overrides
    pub toolchain: ToolchainSettings,
}

/// Build-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Default number of parallel compile jobs (None = auto-detect)
    pub jobs: Option<usize>,

    /// Output root, relative to the workspace (default `build`)
    pub output_dir: Option<PathBuf>,
}

/// Which toolchain family to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolchainKind {
    /// MSVC on Windows, GCC/Clang elsewhere
    #[default]
    Auto,
    Msvc,
    Gcc,
    Clang,
}

impl ToolchainKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolchainKind::Auto => "auto",
            ToolchainKind::Msvc => "msvc",
            ToolchainKind::Gcc => "gcc",
            ToolchainKind::Clang => "clang",
        }
    }
}

impl fmt::Display for ToolchainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolchainKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(ToolchainKind::Auto),
            "msvc" | "cl" => Ok(ToolchainKind::Msvc),
            "gcc" => Ok(ToolchainKind::Gcc),
            "clang" => Ok(ToolchainKind::Clang),
            _ => bail!("unknown toolchain `{}` (expected auto, msvc, gcc or clang)", s),
        }
    }
}

/// Toolchain settings for C/C++ compilation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainSettings {
    /// Toolchain family
    pub kind: ToolchainKind,

    /// Path to the C compiler (e.g., /usr/bin/clang)
    pub cc: Option<PathBuf>,

    /// Path to the C++ compiler (e.g., /usr/bin/clang++)
    pub cxx: Option<PathBuf>,

    /// Path to the archiver (e.g., /usr/bin/llvm-ar)
    pub ar: Option<PathBuf>,

    /// Pinned `VC/Tools/MSVC/<version>` directory, bypassing vswhere
    pub msvc_dir: Option<PathBuf>,
}

impl ToolchainSettings {
    /// Check if any toolchain setting differs from auto-detection.
    pub fn has_overrides(&self) -> bool {
        self.kind != ToolchainKind::Auto
            || self.cc.is_some()
            || self.cxx.is_some()
            || self.ar.is_some()
            || self.msvc_dir.is_some()
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.build.jobs.is_some() {
            self.build.jobs = other.build.jobs;
        }
        if other.build.output_dir.is_some() {
            self.build.output_dir = other.build.output_dir;
        }

        if other.toolchain.kind != ToolchainKind::Auto {
            self.toolchain.kind = other.toolchain.kind;
        }
        if other.toolchain.cc.is_some() {
            self.toolchain.cc = other.toolchain.cc;
        }
        if other.toolchain.cxx.is_some() {
            self.toolchain.cxx = other.toolchain.cxx;
        }
        if other.toolchain.ar.is_some() {
            self.toolchain.ar = other.toolchain.ar;
        }
        if other.toolchain.msvc_dir.is_some() {
            self.toolchain.msvc_dir = other.toolchain.msvc_dir;
        }
    }
}

/// Load merged configuration from global and workspace locations.
///
/// Order of precedence (highest to lowest):
/// 1. Workspace config (.geno/config.toml)
/// 2. Global config (~/.geno/config.toml)
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, workspace_path: &Path) -> Config {
    let mut config = Config::default();

    if let Some(global_path) = global_path {
        config.merge(Config::load_or_default(global_path));
    }
    config.merge(Config::load_or_default(workspace_path));

    config
}

/// Load the configuration that applies to a workspace directory.
pub fn load_workspace_config(workspace_root: &Path) -> Config {
    let global = global_config_path();
    load_config(global.as_deref(), &workspace_config_path(workspace_root))
}

/// Get the global geno config directory (~/.geno).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".geno"))
}

/// Get the global config path (~/.geno/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the workspace config path (.geno/config.toml).
pub fn workspace_config_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join(".geno").join("config.toml")
}

/// A single `[toolchain]` key edit.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolchainOverride {
    Kind(ToolchainKind),
    Cc(PathBuf),
    Cxx(PathBuf),
    Ar(PathBuf),
    MsvcDir(PathBuf),
}

impl ToolchainOverride {
    fn key(&self) -> &'static str {
        match self {
            ToolchainOverride::Kind(_) => "kind",
            ToolchainOverride::Cc(_) => "cc",
            ToolchainOverride::Cxx(_) => "cxx",
            ToolchainOverride::Ar(_) => "ar",
            ToolchainOverride::MsvcDir(_) => "msvc_dir",
        }
    }

    fn value(&self) -> Item {
        match self {
            ToolchainOverride::Kind(kind) => value(kind.as_str()),
            ToolchainOverride::Cc(p)
            | ToolchainOverride::Cxx(p)
            | ToolchainOverride::Ar(p)
            | ToolchainOverride::MsvcDir(p) => value(p.display().to_string()),
        }
    }
}

/// Apply toolchain overrides to a config file in place.
///
/// Comments and formatting of the rest of the file are preserved. Missing
/// files and the `[toolchain]` table are created.
pub fn set_toolchain_overrides(path: &Path, overrides: &[ToolchainOverride]) -> Result<()> {
    let content = if path.exists() {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?
    } else {
        String::new()
    };

    let mut doc: DocumentMut = content
        .parse()
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;

    if !doc.contains_key("toolchain") {
        doc["toolchain"] = Item::Table(Table::new());
    }
    for o in overrides {
        doc["toolchain"][o.key()] = o.value();
    }

    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    std::fs::write(path, doc.to_string())
        .with_context(|| format!("failed to write config file: {}", path.display()))
}

/// Remove every `[toolchain]` override from a config file.
pub fn clear_toolchain_overrides(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    let mut doc: DocumentMut = content
        .parse()
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;

    let removed = doc.remove("toolchain").is_some();
    if removed {
        std::fs::write(path, doc.to_string())
            .with_context(|| format!("failed to write config file: {}", path.display()))?;
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.build.jobs.is_none());
        assert_eq!(config.toolchain.kind, ToolchainKind::Auto);
        assert!(!config.toolchain.has_overrides());
    }

    #[test]
    fn test_config_load() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");

        std::fs::write(
            &config_path,
            r#"
[build]
jobs = 8
output_dir = "out"

[toolchain]
kind = "clang"
cc = "/usr/bin/clang"
"#,
        )
        .unwrap();

        let config = Config::load(&config_path).unwrap();
        assert_eq!(config.build.jobs, Some(8));
        assert_eq!(config.build.output_dir, Some(PathBuf::from("out")));
        assert_eq!(config.toolchain.kind, ToolchainKind::Clang);
        assert_eq!(config.toolchain.cc, Some(PathBuf::from("/usr/bin/clang")));
    }

    #[test]
    fn test_invalid_config_falls_back_to_default() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(&config_path, "[toolchain]\nkind = \"borland\"\n").unwrap();

        assert!(Config::load(&config_path).is_err());
        assert_eq!(Config::load_or_default(&config_path), Config::default());
    }

    #[test]
    fn test_workspace_overrides_global() {
        let tmp = TempDir::new().unwrap();
        let global_path = tmp.path().join("global.toml");
        let workspace_path = tmp.path().join("workspace.toml");

        std::fs::write(
            &global_path,
            "[build]\njobs = 4\n\n[toolchain]\nkind = \"gcc\"\nar = \"/usr/bin/ar\"\n",
        )
        .unwrap();
        std::fs::write(&workspace_path, "[toolchain]\nkind = \"clang\"\n").unwrap();

        let config = load_config(Some(&global_path), &workspace_path);
        assert_eq!(config.build.jobs, Some(4));
        assert_eq!(config.toolchain.kind, ToolchainKind::Clang);
        assert_eq!(config.toolchain.ar, Some(PathBuf::from("/usr/bin/ar")));
    }

    #[test]
    fn test_set_toolchain_overrides_preserves_comments() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".geno/config.toml");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "# team defaults\n[build]\njobs = 2 # keep low\n").unwrap();

        set_toolchain_overrides(
            &path,
            &[
                ToolchainOverride::Kind(ToolchainKind::Msvc),
                ToolchainOverride::MsvcDir(PathBuf::from("C:/VS/VC/Tools/MSVC/14.38.33130")),
            ],
        )
        .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("# team defaults"));
        assert!(text.contains("jobs = 2 # keep low"));

        let config = Config::load(&path).unwrap();
        assert_eq!(config.toolchain.kind, ToolchainKind::Msvc);
        assert!(config.toolchain.msvc_dir.is_some());

        assert!(clear_toolchain_overrides(&path).unwrap());
        assert!(!Config::load(&path).unwrap().toolchain.has_overrides());
    }

    #[test]
    fn test_set_toolchain_overrides_creates_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".geno/config.toml");

        set_toolchain_overrides(&path, &[ToolchainOverride::Cc(PathBuf::from("/opt/cc"))])
            .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.toolchain.cc, Some(PathBuf::from("/opt/cc")));
    }

    #[test]
    fn test_toolchain_kind_parse() {
        assert_eq!("MSVC".parse::<ToolchainKind>().unwrap(), ToolchainKind::Msvc);
        assert!("icc".parse::<ToolchainKind>().is_err());
    }
}
