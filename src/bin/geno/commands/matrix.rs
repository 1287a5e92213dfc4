//! `geno matrix` command

use std::path::PathBuf;

use anyhow::Result;

use super::open_workspace;
use geno::core::{BuildMatrix, Selection};
use geno::util::diagnostic::{emit, Diagnostic};

pub fn execute(dir: Option<PathBuf>) -> Result<()> {
    let workspace = open_workspace(dir)?;
    let matrix = workspace.build_matrix();

    if matrix.is_empty() {
        println!("No build matrix in `{}`", workspace.name());
        return Ok(());
    }

    print!("{}", describe(matrix));
    if let Some(conflict) = matrix.conflict() {
        let diag = Diagnostic::warning(conflict.to_string())
            .with_context("selections cannot be resolved until the overlap is removed");
        emit(&diag, false);
    }
    Ok(())
}

/// Columns with their options, then every combination.
fn describe(matrix: &BuildMatrix) -> String {
    let mut out = String::new();
    for column in matrix.columns() {
        let values: Vec<&str> = column.options.iter().map(|o| o.value.as_str()).collect();
        out.push_str(&format!("{}: {}\n", column.name, values.join(", ")));
    }

    out.push_str("\nCombinations:\n");
    for selection in matrix.combinations() {
        out.push_str(&format!("  {}\n", format_selection(matrix, &selection)));
    }
    out
}

/// `Col=Value` pairs in column order.
fn format_selection(matrix: &BuildMatrix, selection: &Selection) -> String {
    matrix
        .columns()
        .iter()
        .filter_map(|c| selection.get(&c.name).map(|v| format!("{}={}", c.name, v)))
        .collect::<Vec<_>>()
        .join(" ")
}
