//! `geno project` command

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};

use super::{open_workspace, project_not_found};
use crate::cli::{ProjectAddArgs, ProjectArgs, ProjectCommands, ProjectFilesArgs};
use geno::core::{OutputKind, Workspace};
use geno::util::fs::{absolute_path, ensure_dir, relative_path};

pub fn execute(args: ProjectArgs, dir: Option<PathBuf>) -> Result<()> {
    let mut workspace = open_workspace(dir)?;
    match args.command {
        ProjectCommands::Add(args) => add(&mut workspace, args),
        ProjectCommands::List => {
            list(&workspace);
            Ok(())
        }
        ProjectCommands::Files(args) => files(&mut workspace, args),
    }
}

fn add(workspace: &mut Workspace, args: ProjectAddArgs) -> Result<()> {
    let kind: OutputKind = args.kind.parse().map_err(|e| anyhow!("{}", e))?;
    let dir = args.path.unwrap_or_else(|| PathBuf::from(&args.name));
    let location = absolute_path(workspace.location(), &dir);
    ensure_dir(&location)?;

    workspace.new_project(&location, &args.name)?.set_kind(kind);
    workspace
        .serialize()
        .with_context(|| format!("failed to save workspace `{}`", workspace.name()))?;

    eprintln!("       Added {} `{}`", kind, args.name);
    Ok(())
}

fn list(workspace: &Workspace) {
    for project in workspace.projects() {
        println!(
            "{} ({}, {} file(s)) {}",
            project.name(),
            project.kind(),
            project.files().len(),
            relative_path(workspace.location(), project.location()).display()
        );
    }
}

fn files(workspace: &mut Workspace, args: ProjectFilesArgs) -> Result<()> {
    let project = workspace
        .project_by_name_mut(&args.project)
        .ok_or_else(|| project_not_found(&args.project))?;

    let mut added = project.add_files_glob(&args.patterns)?;
    // Patterns that match nothing on disk are taken as literal file names.
    for pattern in &args.patterns {
        let is_glob = pattern.contains(['*', '?', '[']);
        if !is_glob && project.add_file(pattern) {
            added += 1;
        }
    }

    workspace.serialize()?;
    eprintln!("       Added {} file(s) to `{}`", added, args.project);
    Ok(())
}
