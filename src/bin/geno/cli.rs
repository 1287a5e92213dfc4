//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

/// Geno - build orchestration for C and C++ workspaces
#[derive(Parser)]
#[command(name = "geno")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Workspace directory (defaults to the current directory)
    #[arg(short = 'C', long, global = true, env = "GENO_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new workspace
    New(NewArgs),

    /// Manage the projects of a workspace
    Project(ProjectArgs),

    /// Build every project in the workspace queue
    Build(BuildArgs),

    /// List the build matrix and its combinations
    Matrix,

    /// Show the toolchain commands for a source file
    Flags(FlagsArgs),

    /// Toolchain management
    Toolchain(ToolchainArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct NewArgs {
    /// Workspace name
    pub name: String,

    /// Directory to create the workspace in (defaults to name)
    #[arg(long)]
    pub path: Option<PathBuf>,
}

#[derive(Args)]
pub struct ProjectArgs {
    #[command(subcommand)]
    pub command: ProjectCommands,
}

#[derive(Subcommand)]
pub enum ProjectCommands {
    /// Add a new project to the workspace
    Add(ProjectAddArgs),

    /// List the projects of the workspace
    List,

    /// Add source files to a project
    Files(ProjectFilesArgs),
}

#[derive(Args)]
pub struct ProjectAddArgs {
    /// Project name
    pub name: String,

    /// Output kind: Application, StaticLibrary or DynamicLibrary
    #[arg(long, default_value = "Application")]
    pub kind: String,

    /// Project directory, relative to the workspace (defaults to name)
    #[arg(long)]
    pub path: Option<PathBuf>,
}

#[derive(Args)]
pub struct ProjectFilesArgs {
    /// Project name
    pub project: String,

    /// Files or glob patterns, relative to the project directory
    #[arg(required = true)]
    pub patterns: Vec<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum MessageFormat {
    #[default]
    Human,
    Json,
}

#[derive(Args)]
pub struct BuildArgs {
    /// Number of parallel compile jobs
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Output format for build messages
    #[arg(long, value_enum, default_value_t = MessageFormat::Human)]
    pub message_format: MessageFormat,

    /// Matrix selection, as Column=Value (repeatable)
    #[arg(long = "select", value_name = "COLUMN=VALUE")]
    pub select: Vec<String>,
}

#[derive(Args)]
pub struct FlagsArgs {
    /// Project the file belongs to
    pub project: String,

    /// Source file, relative to the project directory
    pub file: PathBuf,

    /// Also show the link command for the project
    #[arg(long)]
    pub link: bool,

    /// Matrix selection, as Column=Value (repeatable)
    #[arg(long = "select", value_name = "COLUMN=VALUE")]
    pub select: Vec<String>,
}

#[derive(Args)]
pub struct ToolchainArgs {
    #[command(subcommand)]
    pub command: ToolchainCommands,
}

#[derive(Subcommand)]
pub enum ToolchainCommands {
    /// Show current toolchain configuration
    Show,

    /// Override the toolchain for this workspace
    Override(ToolchainOverrideArgs),
}

#[derive(Args)]
pub struct ToolchainOverrideArgs {
    /// Toolchain family: auto, msvc, gcc or clang
    #[arg(long)]
    pub kind: Option<String>,

    /// C compiler path
    #[arg(long)]
    pub cc: Option<PathBuf>,

    /// C++ compiler path
    #[arg(long)]
    pub cxx: Option<PathBuf>,

    /// Archiver path
    #[arg(long)]
    pub ar: Option<PathBuf>,

    /// MSVC tools directory (VC/Tools/MSVC/<version>)
    #[arg(long)]
    pub msvc_dir: Option<PathBuf>,

    /// Remove every toolchain override
    #[arg(long, conflicts_with_all = ["kind", "cc", "cxx", "ar", "msvc_dir"])]
    pub clear: bool,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}
