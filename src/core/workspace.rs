//! Workspaces: a set of projects built in queue order with one compiler.
//!
//! The workspace owns its projects, a FIFO queue of project names still to
//! build, the build matrix and the default configuration. A single compiler
//! is detected on first build and reused for every project.
//!
//! # Failure policy
//!
//! Projects are built one at a time from the front of the queue and only
//! dequeued once they build successfully. When a project fails it stays at
//! the front, the projects behind it are left untouched, the build stops and
//! subscribers receive `build-finished` with `success: false`. Calling
//! [`Workspace::build`] again retries from the failed project.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::builder::diagnostics::parse_messages;
use crate::builder::events::{BuildEvent, EventBus, SubscriptionId};
use crate::builder::executor::{BuildExecutor, BuildOptions, CancellationToken, ProjectBuild};
use crate::builder::toolchain::{
    detect_compiler, Compiler, StepFailure, StepOutcome, SystemEnvironment,
};
use crate::core::build_matrix::{BuildMatrix, Selection};
use crate::core::configuration::Configuration;
use crate::core::errors::{ConfigurationError, PersistenceError, WorkspaceError};
use crate::core::project::Project;
use crate::document::{DocumentReader, DocumentWriter, Object};
use crate::util::config::{Config, ToolchainSettings};
use crate::util::fs::{absolute_from_cwd, absolute_path, relative_path};
use crate::util::process::SystemRunner;

/// File extension of workspace documents.
pub const WORKSPACE_EXTENSION: &str = "gwks";

/// Output directory used when none is configured.
pub const DEFAULT_OUTPUT_DIR: &str = "build";

/// Where a workspace build stands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BuildState {
    #[default]
    Idle,
    Building { project: String },
    Done,
    Aborted { project: String },
    Cancelled,
}

/// Result of [`Workspace::build`].
#[derive(Debug, Clone, Default)]
pub struct WorkspaceBuild {
    pub success: bool,
    pub cancelled: bool,
    /// Output of the last project linked in this run
    pub output: Option<PathBuf>,
    /// Every project attempted in this run, in order
    pub projects: Vec<ProjectBuild>,
}

impl WorkspaceBuild {
    /// The project that stopped the build, if any.
    pub fn failed_project(&self) -> Option<&ProjectBuild> {
        self.projects.last().filter(|p| !p.success)
    }
}

pub struct Workspace {
    location: PathBuf,
    name: String,
    projects: Vec<Project>,
    pending: VecDeque<String>,
    build_matrix: BuildMatrix,
    default_configuration: Configuration,
    toolchain: ToolchainSettings,
    output_dir: Option<PathBuf>,
    compiler: Option<Arc<dyn Compiler>>,
    options: BuildOptions,
    events: EventBus,
    state: BuildState,
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("location", &self.location)
            .field("name", &self.name)
            .field("projects", &self.projects.len())
            .field("pending", &self.pending)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Workspace {
    /// Create an empty workspace at `location`.
    pub fn new(location: impl AsRef<Path>, name: impl Into<String>) -> Self {
        let location = location.as_ref();
        let location = if location.as_os_str().is_empty() {
            PathBuf::new()
        } else {
            absolute_from_cwd(location).unwrap_or_else(|_| location.to_path_buf())
        };

        Workspace {
            location,
            name: name.into(),
            projects: Vec::new(),
            pending: VecDeque::new(),
            build_matrix: BuildMatrix::new(),
            default_configuration: Configuration::new(),
            toolchain: ToolchainSettings::default(),
            output_dir: None,
            compiler: None,
            options: BuildOptions::default(),
            events: EventBus::new(),
            state: BuildState::Idle,
        }
    }

    /// Load `<location>/<name>.gwks` and every project it lists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref();
        let location = path.parent().unwrap_or_else(|| Path::new(""));
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut workspace = Workspace::new(location, name);
        workspace.deserialize()?;
        Ok(workspace)
    }

    /// Find the single `.gwks` document in `dir`.
    pub fn find_document(dir: &Path) -> Option<PathBuf> {
        let entries = std::fs::read_dir(dir).ok()?;
        let mut found: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == WORKSPACE_EXTENSION))
            .collect();
        found.sort();
        if found.len() > 1 {
            tracing::warn!(
                "several workspaces in {}, using {}",
                dir.display(),
                found[0].display()
            );
        }
        found.into_iter().next()
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `<location>/<name>.gwks`, or `None` without a location.
    pub fn document_path(&self) -> Option<PathBuf> {
        if self.location.as_os_str().is_empty() {
            return None;
        }
        Some(
            self.location
                .join(format!("{}.{}", self.name, WORKSPACE_EXTENSION)),
        )
    }

    /// Root for objects and link outputs.
    pub fn output_root(&self) -> PathBuf {
        let dir = self
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
        absolute_path(&self.location, &dir)
    }

    /// Apply loaded configuration files.
    ///
    /// Drops a detected compiler so the next build picks up the settings.
    pub fn configure(&mut self, config: &Config) {
        self.toolchain = config.toolchain.clone();
        self.output_dir = config.build.output_dir.clone();
        self.options.jobs = config.build.jobs;
        self.compiler = None;
    }

    pub fn toolchain_settings(&self) -> &ToolchainSettings {
        &self.toolchain
    }

    /// Use `compiler` instead of detecting one.
    pub fn with_compiler(mut self, compiler: Arc<dyn Compiler>) -> Self {
        self.compiler = Some(compiler);
        self
    }

    /// The workspace compiler, detected on first use.
    pub fn compiler(&mut self) -> Arc<dyn Compiler> {
        if let Some(compiler) = &self.compiler {
            return Arc::clone(compiler);
        }
        let compiler = detect_compiler(
            &self.toolchain,
            &self.output_root(),
            Arc::new(SystemEnvironment::new()),
            Arc::new(SystemRunner),
        );
        self.compiler = Some(Arc::clone(&compiler));
        compiler
    }

    pub fn set_jobs(&mut self, jobs: Option<usize>) {
        self.options.jobs = jobs;
    }

    /// Token that cancels the current or next build.
    ///
    /// The token is cleared once a build stops on it.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.options.cancel.clone()
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    /// First project with exactly this name.
    pub fn project_by_name(&self, name: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.name() == name)
    }

    pub fn project_by_name_mut(&mut self, name: &str) -> Option<&mut Project> {
        self.projects.iter_mut().find(|p| p.name() == name)
    }

    /// Create a project, append it to the project list and the build queue.
    pub fn new_project(
        &mut self,
        location: impl AsRef<Path>,
        name: impl Into<String>,
    ) -> Result<&mut Project, ConfigurationError> {
        let project = Project::new(location, name);
        self.add_project(project)
    }

    /// Adopt an existing project.
    pub fn add_project(&mut self, project: Project) -> Result<&mut Project, ConfigurationError> {
        if self.project_by_name(project.name()).is_some() {
            return Err(ConfigurationError::DuplicateProject {
                name: project.name().to_string(),
            });
        }
        self.pending.push_back(project.name().to_string());
        self.projects.push(project);
        let index = self.projects.len() - 1;
        Ok(&mut self.projects[index])
    }

    /// Rename a project, keeping its place in the build queue.
    pub fn rename_project(&mut self, old: &str, new: &str) -> Result<(), WorkspaceError> {
        if old == new {
            return self
                .project_by_name(old)
                .map(|_| ())
                .ok_or_else(|| WorkspaceError::ProjectNotFound {
                    name: old.to_string(),
                });
        }
        if self.project_by_name(new).is_some() {
            return Err(ConfigurationError::DuplicateProject {
                name: new.to_string(),
            }
            .into());
        }
        let project = self
            .projects
            .iter_mut()
            .find(|p| p.name() == old)
            .ok_or_else(|| WorkspaceError::ProjectNotFound {
                name: old.to_string(),
            })?;
        project.set_name(new);

        for entry in self.pending.iter_mut().filter(|n| n.as_str() == old) {
            *entry = new.to_string();
        }
        tracing::debug!("Renamed project {} to {}", old, new);
        Ok(())
    }

    /// Remove a project and its queue entries.
    pub fn remove_project(&mut self, name: &str) -> Result<Project, WorkspaceError> {
        let index = self
            .projects
            .iter()
            .position(|p| p.name() == name)
            .ok_or_else(|| WorkspaceError::ProjectNotFound {
                name: name.to_string(),
            })?;
        self.pending.retain(|n| n != name);
        Ok(self.projects.remove(index))
    }

    /// Project names still to build, front first.
    pub fn pending(&self) -> impl Iterator<Item = &str> {
        self.pending.iter().map(String::as_str)
    }

    /// Refill the queue with every project, in list order.
    pub fn reset_queue(&mut self) {
        self.pending = self.projects.iter().map(|p| p.name().to_string()).collect();
        self.state = BuildState::Idle;
    }

    pub fn state(&self) -> &BuildState {
        &self.state
    }

    pub fn build_matrix(&self) -> &BuildMatrix {
        &self.build_matrix
    }

    pub fn build_matrix_mut(&mut self) -> &mut BuildMatrix {
        &mut self.build_matrix
    }

    pub fn default_configuration(&self) -> &Configuration {
        &self.default_configuration
    }

    pub fn set_default_configuration(&mut self, configuration: Configuration) {
        self.default_configuration = configuration;
    }

    /// Resolve a matrix selection into the default configuration.
    ///
    /// Relative include and library directories are taken against the
    /// workspace location.
    pub fn apply_selection(&mut self, selection: &Selection) -> Result<(), WorkspaceError> {
        let mut configuration = self.build_matrix.resolve(selection)?;
        for dir in configuration
            .include_dirs
            .iter_mut()
            .chain(configuration.library_dirs.iter_mut())
        {
            *dir = absolute_path(&self.location, dir);
        }
        self.default_configuration = configuration;
        Ok(())
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&BuildEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Build every queued project in order.
    pub fn build(&mut self) -> WorkspaceBuild {
        let mut result = WorkspaceBuild::default();

        if self.pending.is_empty() {
            tracing::info!("Nothing to build in {}", self.name);
            self.state = BuildState::Done;
            result.success = true;
            self.finish(&result);
            return result;
        }

        let compiler = self.compiler();

        while let Some(name) = self.pending.front().cloned() {
            if self.options.cancel.is_cancelled() {
                tracing::info!("Build cancelled before {}", name);
                self.state = BuildState::Cancelled;
                result.cancelled = true;
                self.options.cancel.reset();
                self.finish(&result);
                return result;
            }

            self.state = BuildState::Building {
                project: name.clone(),
            };

            let Some(project) = self.project_by_name(&name) else {
                tracing::error!("queued project `{}` does not exist", name);
                self.state = BuildState::Aborted { project: name };
                self.finish(&result);
                return result;
            };

            let build = self.build_project(compiler.as_ref(), project);
            let success = build.success;
            let cancelled = build.cancelled;
            let output = build.output.clone();
            result.projects.push(build);

            if success {
                self.pending.pop_front();
                if output.is_some() {
                    result.output = output;
                }
                continue;
            }

            if cancelled {
                tracing::info!("Build cancelled during {}", name);
                self.state = BuildState::Cancelled;
                result.cancelled = true;
                self.options.cancel.reset();
            } else {
                tracing::info!("{} failed; {} project(s) left in queue", name, self.pending.len());
                self.state = BuildState::Aborted { project: name };
            }
            self.finish(&result);
            return result;
        }

        self.state = BuildState::Done;
        result.success = true;
        self.finish(&result);
        result
    }

    /// Build just the front project; returns `None` when the queue is empty.
    ///
    /// The project is dequeued only if it succeeds.
    pub fn build_next_project(&mut self) -> Option<ProjectBuild> {
        let name = self.pending.front()?.clone();
        let compiler = self.compiler();
        let project = self.project_by_name(&name)?;
        let build = self.build_project(compiler.as_ref(), project);
        if build.success {
            self.pending.pop_front();
        }
        Some(build)
    }

    fn build_project(&self, compiler: &dyn Compiler, project: &Project) -> ProjectBuild {
        let events = &self.events;
        let name = project.name();
        let total = project.files().len() as u64;

        events.publish(&BuildEvent::project_started(
            &self.name,
            name,
            project.files().len(),
        ));

        let configuration = project.configuration(&self.default_configuration);
        tracing::info!("Building {} ({})", name, project.kind());

        let build = BuildExecutor::new(compiler, &self.options)
            .on_compiled(|file, outcome, current| {
                publish_diagnostics(events, name, file, outcome);
                events.publish(&BuildEvent::progress(name, current as u64, total));
            })
            .execute(name, project.files(), &configuration, project.kind());

        if let Some(link) = &build.link {
            publish_diagnostics(events, name, &link.output, link);
        }

        events.publish(&BuildEvent::ProjectFinished {
            workspace: self.name.clone(),
            project: name.to_string(),
            output: build.output.clone(),
            success: build.success,
            compiled: build.compiled(),
            duration_ms: build.duration.as_millis() as u64,
        });
        build
    }

    fn finish(&self, result: &WorkspaceBuild) {
        self.events.publish(&BuildEvent::workspace_finished(
            &self.name,
            &self.location,
            result.output.clone(),
            result.success,
        ));
    }

    fn require_location(&self) -> Result<PathBuf, ConfigurationError> {
        self.document_path()
            .ok_or_else(|| ConfigurationError::LocationMissing {
                subject: format!("workspace `{}`", self.name),
            })
    }

    /// Write `<location>/<name>.gwks` and every project document.
    pub fn serialize(&self) -> Result<(), PersistenceError> {
        let path = self.require_location()?;

        let mut projects = Object::table("Projects");
        for project in &self.projects {
            let document = project.document_path().ok_or_else(|| {
                ConfigurationError::LocationMissing {
                    subject: format!("project `{}`", project.name()),
                }
            })?;
            let relative = relative_path(&self.location, &document);
            projects.add_child(Object::new(relative.display().to_string()));
        }

        let mut writer = DocumentWriter::create(&path)?;
        writer.write_object(&Object::string("Name", &self.name))?;
        writer.write_object(&projects)?;
        writer.write_object(&self.build_matrix.to_object())?;
        writer.finish()?;

        for project in &self.projects {
            project.serialize()?;
        }

        tracing::debug!("Saved workspace {}", path.display());
        Ok(())
    }

    /// Replace projects and matrix with `<location>/<name>.gwks`.
    ///
    /// The build queue is refilled from the loaded project list.
    pub fn deserialize(&mut self) -> Result<(), PersistenceError> {
        let path = self.require_location()?;
        let reader = DocumentReader::open(&path)?;

        let mut projects: Vec<Project> = Vec::new();
        let mut name = self.name.clone();
        let mut matrix = BuildMatrix::new();

        reader
            .objects(|object| -> Result<(), PersistenceError> {
                match object.name() {
                    "Name" => {
                        if let Some(n) = object.as_str() {
                            name = n.to_string();
                        }
                    }
                    "Projects" => {
                        for entry in object.children() {
                            let document = absolute_path(&self.location, Path::new(entry.name()));
                            let project = Project::open(&document)?;
                            if projects.iter().any(|p| p.name() == project.name()) {
                                return Err(ConfigurationError::DuplicateProject {
                                    name: project.name().to_string(),
                                }
                                .into());
                            }
                            projects.push(project);
                        }
                    }
                    "Matrix" => {
                        matrix = BuildMatrix::from_object(object).map_err(|source| {
                            PersistenceError::Matrix {
                                path: path.clone(),
                                source,
                            }
                        })?;
                    }
                    other => tracing::debug!("ignoring `{}` in {}", other, path.display()),
                }
                Ok(())
            })
            .inspect_err(|e| tracing::error!("failed to load workspace: {}", e))?;

        self.name = name;
        self.projects = projects;
        self.build_matrix = matrix;
        self.reset_queue();
        Ok(())
    }
}

/// Forward compiler messages from one step to subscribers.
fn publish_diagnostics(events: &EventBus, project: &str, file: &Path, outcome: &StepOutcome) {
    let messages = parse_messages(&outcome.diagnostics);
    let has_error = messages.iter().any(|m| m.is_error);
    for message in messages {
        events.publish(&message.into_event(project));
    }

    // Failures without a parseable error still need to reach the user.
    match &outcome.failure {
        None | Some(StepFailure::Cancelled) => {}
        Some(failure) if !has_error => {
            let mut text = format!("{}: {}", file.display(), failure);
            let detail = outcome.diagnostics.trim();
            if !detail.is_empty() {
                text.push('\n');
                text.push_str(detail);
            }
            events.publish(&BuildEvent::CompilerError {
                project: project.to_string(),
                message: text,
                file: Some(file.to_path_buf()),
                line: None,
                column: None,
            });
        }
        Some(_) => {}
    }
}
