//! `geno toolchain` command

use std::path::PathBuf;

use anyhow::{anyhow, Result};

use super::{open_workspace, workspace_dir};
use crate::cli::{ToolchainArgs, ToolchainCommands, ToolchainOverrideArgs};
use geno::util::config::{
    clear_toolchain_overrides, global_config_path, set_toolchain_overrides,
    workspace_config_path, ToolchainKind, ToolchainOverride,
};

pub fn execute(args: ToolchainArgs, dir: Option<PathBuf>) -> Result<()> {
    match args.command {
        ToolchainCommands::Show => show_toolchain(dir),
        ToolchainCommands::Override(args) => override_toolchain(args, dir),
    }
}

fn show_toolchain(dir: Option<PathBuf>) -> Result<()> {
    let mut workspace = open_workspace(dir)?;
    let settings = workspace.toolchain_settings().clone();
    let compiler = workspace.compiler();

    println!("Toolchain:");
    println!();
    println!("  Kind:     {}", settings.kind);
    println!("  Platform: {}", compiler.platform());
    println!("  Output:   {}", compiler.output_root().display());

    let overrides = [
        ("CC", &settings.cc),
        ("CXX", &settings.cxx),
        ("AR", &settings.ar),
        ("MSVC", &settings.msvc_dir),
    ];
    for (label, path) in overrides {
        if let Some(path) = path {
            println!("  {:<8}  {}", format!("{}:", label), path.display());
        }
    }

    println!();
    println!("Configuration:");
    if let Some(global) = global_config_path() {
        println!("  global:    {}", global.display());
    }
    println!(
        "  workspace: {}",
        workspace_config_path(workspace.location()).display()
    );

    Ok(())
}

fn override_toolchain(args: ToolchainOverrideArgs, dir: Option<PathBuf>) -> Result<()> {
    let root = workspace_dir(dir)?;
    let path = workspace_config_path(&root);

    if args.clear {
        if clear_toolchain_overrides(&path)? {
            eprintln!("     Cleared toolchain overrides in {}", path.display());
        } else {
            eprintln!("No toolchain overrides to clear");
        }
        return Ok(());
    }

    let overrides = collect_overrides(args)?;
    if overrides.is_empty() {
        return Err(anyhow!(
            "nothing to override\nhelp: pass --kind, --cc, --cxx, --ar or --msvc-dir"
        ));
    }

    set_toolchain_overrides(&path, &overrides)?;
    eprintln!("     Updated {}", path.display());
    Ok(())
}

fn collect_overrides(args: ToolchainOverrideArgs) -> Result<Vec<ToolchainOverride>> {
    let mut overrides = Vec::new();
    if let Some(kind) = args.kind {
        overrides.push(ToolchainOverride::Kind(kind.parse::<ToolchainKind>()?));
    }
    overrides.extend(args.cc.map(ToolchainOverride::Cc));
    overrides.extend(args.cxx.map(ToolchainOverride::Cxx));
    overrides.extend(args.ar.map(ToolchainOverride::Ar));
    overrides.extend(args.msvc_dir.map(ToolchainOverride::MsvcDir));
    Ok(overrides)
}
