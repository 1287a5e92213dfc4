//! `geno new` command

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::cli::NewArgs;
use geno::core::Workspace;
use geno::util::fs::ensure_dir;

/// Check that `path` is missing or an empty directory.
pub fn validate_workspace_path(path: &Path) -> Result<(), String> {
    if path.is_file() {
        return Err(format!(
            "destination `{}` already exists and is a file",
            path.display()
        ));
    }
    if let Ok(mut entries) = std::fs::read_dir(path) {
        if entries.next().is_some() {
            return Err(format!(
                "destination `{}` already exists and is not empty",
                path.display()
            ));
        }
    }
    Ok(())
}

pub fn execute(args: NewArgs) -> Result<()> {
    let path = args.path.unwrap_or_else(|| PathBuf::from(&args.name));

    if let Err(message) = validate_workspace_path(&path) {
        bail!(message);
    }
    ensure_dir(&path)?;

    let workspace = Workspace::new(&path, &args.name);
    workspace
        .serialize()
        .with_context(|| format!("failed to create workspace `{}`", args.name))?;

    eprintln!("     Created workspace `{}`", args.name);
    Ok(())
}
