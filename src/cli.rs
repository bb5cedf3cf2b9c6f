use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "recompile",
    about = "Incremental C/C++ compilation driven by the include graph"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(help = "Project root (default: auto-detect from cwd)")]
    pub path: Option<PathBuf>,

    #[arg(long, short, global = true, action = clap::ArgAction::Count, help = "More logging (-v debug, -vv trace)")]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Compile sources that changed since the last build")]
    Build {
        #[arg(long, help = "Delete all outputs and compile everything")]
        clean: bool,
        #[command(flatten)]
        overrides: Overrides,
    },
    #[command(about = "Show what the next build would compile, without compiling")]
    Status {
        #[arg(long, help = "Print the classification as JSON")]
        json: bool,
        #[command(flatten)]
        overrides: Overrides,
    },
    #[command(about = "Delete all outputs and forget recorded state")]
    Clean {
        #[command(flatten)]
        overrides: Overrides,
    },
}

/// Flags that take precedence over `recompile.toml`.
#[derive(Args, Clone, Debug, Default)]
pub struct Overrides {
    #[arg(long = "include", short = 'I', help = "Include root, searched in the given order")]
    pub include_roots: Vec<PathBuf>,
    #[arg(long = "source", short = 's', help = "Source directory to scan")]
    pub sources: Vec<PathBuf>,
    #[arg(long, help = "Object file directory")]
    pub object_dir: Option<PathBuf>,
    #[arg(long, help = "Compiler executable")]
    pub compiler: Option<String>,
    #[arg(long, help = "Task identity the build state is stored under")]
    pub task: Option<String>,
    #[arg(long, short, help = "Parallel compile jobs")]
    pub jobs: Option<usize>,
    #[arg(help = "Project root (default: auto-detect from cwd)")]
    pub path: Option<PathBuf>,
}
