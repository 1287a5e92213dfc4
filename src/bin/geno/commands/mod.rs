//! Command implementations

pub mod build;
pub mod completions;
pub mod flags;
pub mod matrix;
pub mod new;
pub mod project;
pub mod toolchain;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use thiserror::Error;

use geno::builder::StepFailure;
use geno::core::{PersistenceError, Selection, Workspace, WorkspaceBuild, WorkspaceError};
use geno::util::config::load_workspace_config;
use geno::util::diagnostic::{emit, suggestions, Diagnostic};

/// An error already rendered as a diagnostic.
#[derive(Debug, Error)]
#[error("{}", .0.message)]
pub struct Failed(pub Diagnostic);

/// Print `error` the way the user should see it.
pub fn report(error: &anyhow::Error, color: bool) {
    if let Some(Failed(diag)) = error.downcast_ref::<Failed>() {
        emit(diag, color);
    } else if let Some(e) = error.downcast_ref::<WorkspaceError>() {
        emit(&e.to_diagnostic(), color);
    } else if let Some(e) = error.downcast_ref::<PersistenceError>() {
        emit(&e.to_diagnostic(), color);
    } else {
        eprintln!("error: {:#}", error);
    }
}

/// The workspace directory: `--workspace` or the current directory.
pub fn workspace_dir(dir: Option<PathBuf>) -> Result<PathBuf> {
    match dir {
        Some(dir) => Ok(dir),
        None => std::env::current_dir().context("failed to read current directory"),
    }
}

/// Open the workspace in `dir` with its configuration applied.
pub fn open_workspace(dir: Option<PathBuf>) -> Result<Workspace> {
    let dir = workspace_dir(dir)?;
    let Some(path) = Workspace::find_document(&dir) else {
        return Err(Failed(
            Diagnostic::error(format!("no workspace found in {}", dir.display()))
                .with_suggestion("Create one with `geno new <name>` or pass --workspace <dir>"),
        )
        .into());
    };

    let mut workspace = Workspace::open(&path)?;
    workspace.configure(&load_workspace_config(workspace.location()));
    Ok(workspace)
}

/// Parse repeated `Column=Value` arguments.
pub fn parse_selection(args: &[String]) -> Result<Selection> {
    let mut selection = Selection::new();
    for arg in args {
        let Some((column, value)) = arg.split_once('=') else {
            bail!("invalid selection `{}`, expected COLUMN=VALUE", arg);
        };
        let (column, value) = (column.trim(), value.trim());
        if column.is_empty() || value.is_empty() {
            bail!("invalid selection `{}`, expected COLUMN=VALUE", arg);
        }
        selection.insert(column.to_string(), value.to_string());
    }
    Ok(selection)
}

/// Apply the matrix default selection overridden by `args`.
///
/// A workspace without a matrix ignores an empty selection.
pub fn select(workspace: &mut Workspace, args: &[String]) -> Result<()> {
    let explicit = parse_selection(args)?;
    if workspace.build_matrix().is_empty() && explicit.is_empty() {
        return Ok(());
    }
    let mut selection = workspace.build_matrix().default_selection();
    selection.extend(explicit);
    workspace.apply_selection(&selection)?;
    Ok(())
}

pub fn project_not_found(name: &str) -> anyhow::Error {
    WorkspaceError::ProjectNotFound {
        name: name.to_string(),
    }
    .into()
}

/// Failure for a build that did not complete.
pub fn build_failed(result: &WorkspaceBuild, location: &Path) -> anyhow::Error {
    let failed = result.failed_project();
    let message = match failed {
        Some(build) => format!("could not build project `{}`", build.project),
        None if result.cancelled => "build was cancelled".to_string(),
        None => "build did not complete".to_string(),
    };

    let mut diag = Diagnostic::error(message).with_location(location);
    let missing_toolchain = failed.is_some_and(|build| {
        build
            .failures()
            .any(|(_, outcome)| outcome.failure == Some(StepFailure::ToolchainNotFound))
    });
    if missing_toolchain {
        diag = diag.with_suggestion(suggestions::INSTALL_TOOLCHAIN);
    }
    if let Some(build) = failed {
        let count = build.failures().count();
        diag = diag.with_context(format!("{} step(s) failed", count));
    }
    Failed(diag.with_suggestion(suggestions::BUILD_FAILED)).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selection() {
        let selection =
            parse_selection(&["Platform=x86".to_string(), "Config = Debug".to_string()]).unwrap();
        assert_eq!(selection["Platform"], "x86");
        assert_eq!(selection["Config"], "Debug");

        assert!(parse_selection(&["Platform".to_string()]).is_err());
        assert!(parse_selection(&["=x86".to_string()]).is_err());
    }
}
