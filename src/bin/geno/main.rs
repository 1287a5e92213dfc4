//! Geno CLI - build orchestration for C and C++ workspaces

use std::io::IsTerminal;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    let color = !cli.no_color && std::io::stderr().is_terminal();

    if let Err(e) = run(cli) {
        commands::report(&e, color);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let filter = if cli.verbose {
        EnvFilter::new("geno=debug")
    } else {
        EnvFilter::new("geno=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let dir = cli.workspace.clone();
    match cli.command {
        Commands::New(args) => commands::new::execute(args),
        Commands::Project(args) => commands::project::execute(args, dir),
        Commands::Build(args) => commands::build::execute(args, dir, cli.verbose),
        Commands::Matrix => commands::matrix::execute(dir),
        Commands::Flags(args) => commands::flags::execute(args, dir),
        Commands::Toolchain(args) => commands::toolchain::execute(args, dir),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
