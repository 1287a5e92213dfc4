//! Build configuration - the options of one resolved build variant.
//!
//! A [`Configuration`] is a pure value: it carries no identity and performs
//! no validation beyond what its types enforce. Consumers that need the
//! target architecture go through [`Configuration::effective_architecture`],
//! so an unset architecture always means "the host architecture".

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Target CPU architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Architecture {
    X86,
    X86_64,
}

impl Architecture {
    /// The architecture of the machine running this process.
    ///
    /// Anything that is not 32-bit x86 maps to x86_64, matching the host
    /// tools a Windows SDK installation ships with.
    pub fn host() -> Self {
        if cfg!(target_arch = "x86") {
            Architecture::X86
        } else {
            Architecture::X86_64
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::X86 => "x86",
            Architecture::X86_64 => "x86_64",
        }
    }

    /// Index into per-architecture tables (discovery caches).
    pub(crate) fn index(&self) -> usize {
        match self {
            Architecture::X86 => 0,
            Architecture::X86_64 => 1,
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Architecture {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "x86" | "i686" | "i386" => Ok(Architecture::X86),
            "x86_64" | "x64" | "amd64" => Ok(Architecture::X86_64),
            _ => Err(ParseEnumError::new("architecture", s, "x86, x86_64")),
        }
    }
}

/// What a project produces when linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputKind {
    /// Console executable
    #[default]
    Application,
    /// Static library (.lib / .a)
    StaticLibrary,
    /// Dynamic library (.dll / .so / .dylib)
    DynamicLibrary,
}

impl OutputKind {
    /// The name used in project documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputKind::Application => "Application",
            OutputKind::StaticLibrary => "StaticLibrary",
            OutputKind::DynamicLibrary => "DynamicLibrary",
        }
    }

    pub fn is_library(&self) -> bool {
        matches!(self, OutputKind::StaticLibrary | OutputKind::DynamicLibrary)
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Application" => Ok(OutputKind::Application),
            "StaticLibrary" => Ok(OutputKind::StaticLibrary),
            "DynamicLibrary" => Ok(OutputKind::DynamicLibrary),
            _ => Err(ParseEnumError::new(
                "output kind",
                s,
                "Application, StaticLibrary, DynamicLibrary",
            )),
        }
    }
}

/// Error returned when a document or CLI string names an unknown enum value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub what: &'static str,
    pub value: String,
    pub expected: &'static str,
}

impl ParseEnumError {
    fn new(what: &'static str, value: &str, expected: &'static str) -> Self {
        ParseEnumError {
            what,
            value: value.to_string(),
            expected,
        }
    }
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid {} '{}', valid values: {}",
            self.what, self.value, self.expected
        )
    }
}

impl std::error::Error for ParseEnumError {}

/// Options for one build variant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Configuration {
    /// Target architecture; `None` means the host architecture
    pub architecture: Option<Architecture>,
    /// Preprocessor defines, `NAME` or `NAME=VALUE`
    pub defines: Vec<String>,
    /// Additional include directories
    pub include_dirs: Vec<PathBuf>,
    /// Additional library search directories
    pub library_dirs: Vec<PathBuf>,
    /// Libraries to link, by name or path
    pub libraries: Vec<PathBuf>,
    /// Link output kind
    pub kind: OutputKind,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// The architecture to build for, falling back to the host.
    pub fn effective_architecture(&self) -> Architecture {
        self.architecture.unwrap_or_else(Architecture::host)
    }

    pub fn with_architecture(mut self, architecture: Architecture) -> Self {
        self.architecture = Some(architecture);
        self
    }

    pub fn with_kind(mut self, kind: OutputKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_define(mut self, define: impl Into<String>) -> Self {
        self.defines.push(define.into());
        self
    }

    pub fn with_include_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.include_dirs.push(dir.into());
        self
    }

    pub fn with_library_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.library_dirs.push(dir.into());
        self
    }

    pub fn with_library(mut self, library: impl Into<PathBuf>) -> Self {
        self.libraries.push(library.into());
        self
    }

    /// Overlay `other` onto this configuration.
    ///
    /// List fields are appended (entries already present are kept once),
    /// an explicit architecture in `other` wins, and `other.kind` replaces
    /// the kind.
    pub fn merge(&mut self, other: &Configuration) {
        if other.architecture.is_some() {
            self.architecture = other.architecture;
        }
        extend_unique(&mut self.defines, &other.defines);
        extend_unique(&mut self.include_dirs, &other.include_dirs);
        extend_unique(&mut self.library_dirs, &other.library_dirs);
        extend_unique(&mut self.libraries, &other.libraries);
        self.kind = other.kind;
    }
}

fn extend_unique<T: PartialEq + Clone>(target: &mut Vec<T>, items: &[T]) {
    for item in items {
        if !target.contains(item) {
            target.push(item.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_architecture_means_host() {
        let config = Configuration::new();
        assert_eq!(config.effective_architecture(), Architecture::host());

        let pinned = Configuration::new().with_architecture(Architecture::X86);
        assert_eq!(pinned.effective_architecture(), Architecture::X86);
    }

    #[test]
    fn test_output_kind_strings() {
        for kind in [
            OutputKind::Application,
            OutputKind::StaticLibrary,
            OutputKind::DynamicLibrary,
        ] {
            assert_eq!(kind.as_str().parse::<OutputKind>().unwrap(), kind);
        }

        let err = "Executable".parse::<OutputKind>().unwrap_err();
        assert_eq!(err.value, "Executable");
        assert!(err.to_string().contains("StaticLibrary"));
    }

    #[test]
    fn test_architecture_aliases() {
        assert_eq!("x64".parse::<Architecture>().unwrap(), Architecture::X86_64);
        assert_eq!("i686".parse::<Architecture>().unwrap(), Architecture::X86);
        assert!("arm64".parse::<Architecture>().is_err());
    }

    #[test]
    fn test_merge_appends_and_overrides() {
        let mut base = Configuration::new()
            .with_define("COMMON")
            .with_include_dir("/inc");
        let overlay = Configuration::new()
            .with_architecture(Architecture::X86)
            .with_define("COMMON")
            .with_define("DEBUG")
            .with_kind(OutputKind::DynamicLibrary);

        base.merge(&overlay);

        assert_eq!(base.defines, vec!["COMMON", "DEBUG"]);
        assert_eq!(base.include_dirs, vec![PathBuf::from("/inc")]);
        assert_eq!(base.architecture, Some(Architecture::X86));
        assert_eq!(base.kind, OutputKind::DynamicLibrary);
    }

    #[test]
    fn test_merge_keeps_architecture_when_unset() {
        let mut base = Configuration::new().with_architecture(Architecture::X86);
        base.merge(&Configuration::new());
        assert_eq!(base.architecture, Some(Architecture::X86));
    }
}
