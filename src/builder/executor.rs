//! Per-project build execution.
//!
//! Compiles run on a bounded rayon pool; the link step is a barrier after
//! every compile has finished and is skipped when any compile failed.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::builder::toolchain::{Compiler, StepOutcome};
use crate::core::configuration::{Configuration, OutputKind};

/// Cooperative cancellation flag shared between a build and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear a previous cancellation so the token can be reused.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Knobs for a build.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Parallel compile jobs; `None` uses available parallelism
    pub jobs: Option<usize>,
    pub cancel: CancellationToken,
}

impl BuildOptions {
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = Some(jobs);
        self
    }

    fn job_count(&self) -> usize {
        self.jobs.filter(|&j| j > 0).unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

/// Result of building one project.
#[derive(Debug, Clone)]
pub struct ProjectBuild {
    pub project: String,
    /// Linked artifact, present when linking ran
    pub output: Option<PathBuf>,
    pub success: bool,
    pub cancelled: bool,
    /// Compile outcomes in source-list order
    pub files: Vec<(PathBuf, StepOutcome)>,
    pub link: Option<StepOutcome>,
    pub duration: Duration,
}

impl ProjectBuild {
    /// Number of files that compiled successfully.
    pub fn compiled(&self) -> usize {
        self.files.iter().filter(|(_, o)| o.is_success()).count()
    }

    /// Outcomes that failed for a reason other than cancellation.
    pub fn failures(&self) -> impl Iterator<Item = (&Path, &StepOutcome)> {
        self.files
            .iter()
            .map(|(p, o)| (p.as_path(), o))
            .chain(self.link.iter().map(|o| (o.output.as_path(), o)))
            .filter(|(_, o)| {
                !o.is_success()
                    && o.failure != Some(crate::builder::toolchain::StepFailure::Cancelled)
            })
    }
}

type CompileCallback<'a> = Box<dyn Fn(&Path, &StepOutcome, usize) + Send + Sync + 'a>;

/// Builds one project's files against a compiler.
pub struct BuildExecutor<'a> {
    compiler: &'a dyn Compiler,
    options: &'a BuildOptions,
    on_compiled: Option<CompileCallback<'a>>,
}

impl<'a> BuildExecutor<'a> {
    pub fn new(compiler: &'a dyn Compiler, options: &'a BuildOptions) -> Self {
        BuildExecutor {
            compiler,
            options,
            on_compiled: None,
        }
    }

    /// Invoke `callback` after every compile, from the worker thread.
    ///
    /// The last argument counts the compiles finished so far, this one
    /// included.
    pub fn on_compiled<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Path, &StepOutcome, usize) + Send + Sync + 'a,
    {
        self.on_compiled = Some(Box::new(callback));
        self
    }

    /// Compile `files` and link them into `name`.
    pub fn execute(
        &self,
        name: &str,
        files: &[PathBuf],
        configuration: &Configuration,
        kind: OutputKind,
    ) -> ProjectBuild {
        let start = Instant::now();
        let cancel = &self.options.cancel;

        if files.is_empty() {
            tracing::info!("{} has no source files", name);
            return ProjectBuild {
                project: name.to_string(),
                output: None,
                success: !cancel.is_cancelled(),
                cancelled: cancel.is_cancelled(),
                files: Vec::new(),
                link: None,
                duration: start.elapsed(),
            };
        }

        let outcomes = self.compile_all(files, configuration);

        let compile_ok = outcomes.iter().all(|(_, o)| o.is_success());
        let mut cancelled = cancel.is_cancelled();

        let link = if compile_ok && !cancelled {
            let objects: Vec<PathBuf> = outcomes.iter().map(|(_, o)| o.output.clone()).collect();
            Some(self.compiler.link(&objects, name, kind, configuration))
        } else {
            if !compile_ok && !cancelled {
                tracing::info!("skipping link of {}: compilation failed", name);
            }
            // A cancel that raced the last compile still counts.
            cancelled = cancelled
                || outcomes
                    .iter()
                    .any(|(_, o)| o.failure == Some(crate::builder::toolchain::StepFailure::Cancelled));
            None
        };

        let success = compile_ok && link.as_ref().is_some_and(|l| l.is_success());
        let output = link.as_ref().map(|l| l.output.clone());

        ProjectBuild {
            project: name.to_string(),
            output,
            success,
            cancelled,
            files: outcomes,
            link,
            duration: start.elapsed(),
        }
    }

    fn compile_all(
        &self,
        files: &[PathBuf],
        configuration: &Configuration,
    ) -> Vec<(PathBuf, StepOutcome)> {
        let finished = AtomicUsize::new(0);
        let compile_one = |file: &PathBuf| {
            let outcome = if self.options.cancel.is_cancelled() {
                StepOutcome::cancelled(self.compiler.compiler_output_path(configuration, file))
            } else {
                self.compiler.compile(file, configuration)
            };
            let count = finished.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(callback) = &self.on_compiled {
                callback(file, &outcome, count);
            }
            (file.clone(), outcome)
        };

        let jobs = self.options.job_count();
        let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build();

        match pool {
            // collect() on an indexed parallel iterator preserves input order
            Ok(pool) => pool.install(|| files.par_iter().map(compile_one).collect()),
            Err(e) => {
                tracing::warn!("failed to start compile pool, building serially: {}", e);
                files.iter().map(compile_one).collect()
            }
        }
    }
}
