//! Projects: one compilation target with its own sources and includes.
//!
//! A project lives in `<location>/<name>.gprj`. Paths held in memory are
//! absolute and lexically normalized; on disk they are written relative to
//! the project location.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::builder::executor::{BuildExecutor, BuildOptions, ProjectBuild};
use crate::builder::toolchain::Compiler;
use crate::core::configuration::{Configuration, OutputKind};
use crate::core::errors::{ConfigurationError, PersistenceError};
use crate::document::{DocumentReader, DocumentWriter, Object};
use crate::util::fs::{absolute_from_cwd, absolute_path, glob_files, relative_path};

/// File extension of project documents.
pub const PROJECT_EXTENSION: &str = "gprj";

/// Name given to projects created without one.
pub const DEFAULT_PROJECT_NAME: &str = "MyProject";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    location: PathBuf,
    name: String,
    kind: OutputKind,
    files: Vec<PathBuf>,
    includes: Vec<PathBuf>,
}

impl Default for Project {
    fn default() -> Self {
        Project {
            location: PathBuf::new(),
            name: DEFAULT_PROJECT_NAME.to_string(),
            kind: OutputKind::Application,
            files: Vec::new(),
            includes: Vec::new(),
        }
    }
}

impl Project {
    /// Create an empty project at `location`.
    ///
    /// A relative location is taken against the current directory.
    pub fn new(location: impl AsRef<Path>, name: impl Into<String>) -> Self {
        let mut project = Project {
            name: name.into(),
            ..Default::default()
        };
        project.set_location(location);
        project
    }

    /// Load the project document at `path` (`<location>/<name>.gprj`).
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref();
        let location = path.parent().unwrap_or_else(|| Path::new(""));
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_PROJECT_NAME.to_string());

        let mut project = Project::new(location, name);
        project.deserialize()?;
        Ok(project)
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Move the project. Existing file paths are left untouched.
    pub fn set_location(&mut self, location: impl AsRef<Path>) {
        let location = location.as_ref();
        self.location = if location.as_os_str().is_empty() {
            PathBuf::new()
        } else {
            absolute_from_cwd(location).unwrap_or_else(|_| location.to_path_buf())
        };
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn kind(&self) -> OutputKind {
        self.kind
    }

    pub fn set_kind(&mut self, kind: OutputKind) {
        self.kind = kind;
    }

    /// Source files, in build order.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Include directories.
    pub fn includes(&self) -> &[PathBuf] {
        &self.includes
    }

    /// `<location>/<name>.gprj`, or `None` without a location.
    pub fn document_path(&self) -> Option<PathBuf> {
        if self.location.as_os_str().is_empty() {
            return None;
        }
        Some(
            self.location
                .join(format!("{}.{}", self.name, PROJECT_EXTENSION)),
        )
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        absolute_path(&self.location, path)
    }

    /// Add a source file; relative paths are taken against the location.
    ///
    /// Returns false if the file is already in the project.
    pub fn add_file(&mut self, path: impl AsRef<Path>) -> bool {
        let path = self.resolve(path.as_ref());
        if self.files.contains(&path) {
            return false;
        }
        self.files.push(path);
        true
    }

    /// Add an include directory; relative paths are taken against the location.
    pub fn add_include(&mut self, path: impl AsRef<Path>) -> bool {
        let path = self.resolve(path.as_ref());
        if self.includes.contains(&path) {
            return false;
        }
        self.includes.push(path);
        true
    }

    /// Add every file matching `patterns` (relative to the location).
    ///
    /// Returns how many new files were added.
    pub fn add_files_glob(&mut self, patterns: &[String]) -> Result<usize> {
        let matches = glob_files(&self.location, patterns)?;
        Ok(matches.into_iter().filter(|f| self.add_file(f)).count())
    }

    /// Remove a source file. Returns false if it was not in the project.
    pub fn remove_file(&mut self, path: impl AsRef<Path>) -> bool {
        let path = self.resolve(path.as_ref());
        let before = self.files.len();
        self.files.retain(|f| *f != path);
        self.files.len() != before
    }

    /// `default` with this project's kind and include directories applied.
    pub fn configuration(&self, default: &Configuration) -> Configuration {
        let mut configuration = default.clone();
        configuration.merge(&Configuration {
            include_dirs: self.includes.clone(),
            kind: self.kind,
            ..Default::default()
        });
        configuration
    }

    /// Compile every file, then link.
    pub fn build(
        &self,
        compiler: &dyn Compiler,
        default: &Configuration,
        options: &BuildOptions,
    ) -> ProjectBuild {
        let configuration = self.configuration(default);
        tracing::info!("Building {} ({})", self.name, self.kind);
        BuildExecutor::new(compiler, options).execute(
            &self.name,
            &self.files,
            &configuration,
            self.kind,
        )
    }

    fn require_location(&self) -> Result<PathBuf, ConfigurationError> {
        self.document_path()
            .ok_or_else(|| ConfigurationError::LocationMissing {
                subject: format!("project `{}`", self.name),
            })
    }

    fn relative_list(&self, name: &str, paths: &[PathBuf]) -> Object {
        let mut list = Object::table(name);
        for path in paths {
            let relative = relative_path(&self.location, path);
            list.add_child(Object::new(relative.display().to_string()));
        }
        list
    }

    /// Write `<location>/<name>.gprj`.
    pub fn serialize(&self) -> Result<(), PersistenceError> {
        let path = self.require_location()?;

        let mut writer = DocumentWriter::create(&path)?;
        writer.write_object(&Object::string("Name", &self.name))?;
        writer.write_object(&Object::string("Kind", self.kind.as_str()))?;
        writer.write_object(&self.relative_list("Files", &self.files))?;
        writer.write_object(&self.relative_list("Includes", &self.includes))?;
        writer.finish()?;

        tracing::debug!("Saved project {}", path.display());
        Ok(())
    }

    /// Replace this project's contents with `<location>/<name>.gprj`.
    ///
    /// Unknown keys are ignored. On error the project is left unchanged.
    pub fn deserialize(&mut self) -> Result<(), PersistenceError> {
        let path = self.require_location()?;
        let reader = DocumentReader::open(&path)?;

        let mut name = self.name.clone();
        let mut kind = self.kind;
        let mut files: Vec<PathBuf> = Vec::new();
        let mut includes: Vec<PathBuf> = Vec::new();

        reader
            .objects(|object| -> Result<(), PersistenceError> {
                match object.name() {
                    "Name" => {
                        if let Some(n) = object.as_str() {
                            name = n.to_string();
                        }
                    }
                    "Kind" => {
                        let text = object.as_str().unwrap_or_default();
                        kind = text.parse().map_err(|source| PersistenceError::InvalidValue {
                            path: path.clone(),
                            source,
                        })?;
                    }
                    "Files" => push_unique(&mut files, object, |p| self.resolve(p)),
                    "Includes" => push_unique(&mut includes, object, |p| self.resolve(p)),
                    other => tracing::debug!("ignoring `{}` in {}", other, path.display()),
                }
                Ok(())
            })
            .inspect_err(|e| tracing::error!("failed to load project: {}", e))?;

        self.name = name;
        self.kind = kind;
        self.files = files;
        self.includes = includes;
        Ok(())
    }
}

/// Append each child of a path table, resolved, skipping repeats.
fn push_unique(list: &mut Vec<PathBuf>, table: &Object, resolve: impl Fn(&Path) -> PathBuf) {
    for entry in table.children() {
        let path = resolve(Path::new(entry.name()));
        if !list.contains(&path) {
            list.push(path);
        }
    }
}
