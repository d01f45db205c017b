//! clasp - bootstrap classpath assembler CLI

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cmd;

#[derive(Parser)]
#[command(name = "clasp")]
#[command(author, version, about = "clasp - bootstrap classpath assembler")]
pub struct Cli {
    /// Repo directory the image is assembled into
    #[arg(long, global = true, env = "CLASP_REPO_DIR", default_value = ".clasp")]
    repo: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble the image described by a bundle
    Assemble {
        /// Bundle directory or zip archive
        #[arg(long, default_value = "bundle")]
        bundle: PathBuf,
        /// Reassemble even if the previous install is intact
        #[arg(long)]
        force: bool,
    },
    /// Report whether the previous install can be reused
    Status,
    /// Drop cached origin archives
    Clean,
    /// Compute SHA256 hashes of files (for bundle authoring)
    #[command(hide = true)]
    Hash {
        /// Files to hash
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Generate a patch payload and its patches.list line (for bundle authoring)
    #[command(hide = true)]
    Diff {
        /// Target category of the patched entry
        category: String,
        /// Entry name within the category
        name: String,
        /// Patched (output) file
        target: PathBuf,
        /// Base file; omit for a create-new patch
        #[arg(long)]
        base: Option<PathBuf>,
        /// Where to write the patch payload
        #[arg(long)]
        out: PathBuf,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr: stdout carries the assembled file set.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let layout = clasp::RepoLayout::new(&cli.repo);

    match cli.command {
        Commands::Assemble { bundle, force } => {
            cmd::assemble::assemble(&bundle, &layout, force).await
        }
        Commands::Status => cmd::status::status(&layout),
        Commands::Clean => cmd::clean::clean(&layout),
        Commands::Hash { files } => cmd::hash::hash(&files),
        Commands::Diff {
            category,
            name,
            target,
            base,
            out,
        } => cmd::diff::diff(&category, &name, &target, base.as_deref(), &out),
        Commands::Completions { shell } => {
            cmd::completions::completions(shell);
            Ok(())
        }
    }
}
