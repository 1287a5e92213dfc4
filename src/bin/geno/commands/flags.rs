//! `geno flags` command

use std::path::PathBuf;

use anyhow::Result;

use super::{open_workspace, project_not_found, select};
use crate::cli::FlagsArgs;
use geno::util::fs::absolute_path;

pub fn execute(args: FlagsArgs, dir: Option<PathBuf>) -> Result<()> {
    let mut workspace = open_workspace(dir)?;
    select(&mut workspace, &args.select)?;
    let compiler = workspace.compiler();

    let project = workspace
        .project_by_name(&args.project)
        .ok_or_else(|| project_not_found(&args.project))?;
    let configuration = project.configuration(workspace.default_configuration());
    let file = absolute_path(project.location(), &args.file);

    let compile = compiler.compile_command(&file, &configuration)?;
    println!("# Compile `{}` ({}):", args.file.display(), compiler.platform());
    println!("{}", compile.command_line());

    if args.link {
        let objects: Vec<PathBuf> = project
            .files()
            .iter()
            .map(|f| compiler.compiler_output_path(&configuration, f))
            .collect();
        let link =
            compiler.link_command(&objects, project.name(), project.kind(), &configuration)?;
        println!();
        println!("# Link `{}`:", project.name());
        println!("{}", link.command_line());
    }
    Ok(())
}
