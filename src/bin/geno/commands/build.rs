//! `geno build` command

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};

use super::{build_failed, open_workspace, select};
use crate::cli::{BuildArgs, MessageFormat};
use geno::builder::BuildEvent;

pub fn execute(args: BuildArgs, dir: Option<PathBuf>, verbose: bool) -> Result<()> {
    let mut workspace = open_workspace(dir)?;
    select(&mut workspace, &args.select)?;
    if args.jobs.is_some() {
        workspace.set_jobs(args.jobs);
    }

    let start = Instant::now();
    match args.message_format {
        MessageFormat::Json => {
            workspace.subscribe(|event| println!("{}", event.to_json()));
        }
        MessageFormat::Human => {
            let total: usize = workspace
                .pending()
                .filter_map(|name| workspace.project_by_name(name))
                .map(|p| p.files().len())
                .sum();
            let pb = progress_bar(total, verbose)?;
            workspace.subscribe(move |event| report_event(event, pb.as_ref()));
        }
    }

    let result = workspace.build();

    if !result.success {
        return Err(build_failed(&result, workspace.location()));
    }

    if args.message_format == MessageFormat::Human {
        eprintln!(
            "    Finished {} project(s) in {:.2}s",
            result.projects.len(),
            start.elapsed().as_secs_f64()
        );
    }
    Ok(())
}

fn progress_bar(total: usize, verbose: bool) -> Result<Option<ProgressBar>> {
    if verbose || total <= 1 {
        return Ok(None);
    }
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    Ok(Some(pb))
}

fn report_event(event: &BuildEvent, pb: Option<&ProgressBar>) {
    let print = |line: String| match pb {
        Some(pb) => pb.println(line),
        None => eprintln!("{}", line),
    };

    match event {
        BuildEvent::ProjectStarted { project, files, .. } => {
            print(format!("   Compiling {} ({} file(s))", project, files));
            if let Some(pb) = pb {
                pb.set_message(project.clone());
            }
        }
        BuildEvent::ProjectFinished {
            project,
            output: Some(output),
            success: true,
            ..
        } => print(format!("      Linked {} -> {}", project, output.display())),
        BuildEvent::CompilerWarning { message, file, line, .. } => {
            print(format!("warning: {}", located(message, file.as_ref(), *line)))
        }
        BuildEvent::CompilerError { message, file, line, .. } => {
            print(format!("error: {}", located(message, file.as_ref(), *line)))
        }
        BuildEvent::Progress { .. } => {
            if let Some(pb) = pb {
                pb.inc(1);
            }
        }
        BuildEvent::WorkspaceFinished { .. } => {
            if let Some(pb) = pb {
                pb.finish_and_clear();
            }
        }
        _ => {}
    }
}

fn located(message: &str, file: Option<&PathBuf>, line: Option<u32>) -> String {
    match (file, line) {
        (Some(file), Some(line)) => format!("{}:{}: {}", file.display(), line, message),
        _ => message.to_string(),
    }
}
