//! Argument definitions for the `loam` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "loam", about = "An autonomous gardener for org-style note corpora")]
pub struct Cli {
    /// Path to the configuration file (TOML). Defaults apply when the
    /// file does not exist.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the notes root from the configuration.
    #[arg(long, global = true)]
    pub garden: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Scan the corpus and report its health
    Scan,
    /// Show what a tending cycle would do, without doing it
    Plan,
    /// Run a full tending cycle: scan, plan, execute
    Tend {
        /// Apply safe actions only; skip everything that would emit a
        /// proposal
        #[arg(long)]
        safe_only: bool,
    },
    /// Inspect and resolve pending proposals
    #[command(subcommand)]
    Proposals(ProposalsCommand),
}

#[derive(Subcommand)]
pub enum ProposalsCommand {
    /// List proposals (pending by default)
    List {
        /// Include applied and rejected proposals
        #[arg(long)]
        all: bool,
    },
    /// Print one proposal with its diff
    Show { id: String },
    /// Apply a proposal's diff to the note file
    Apply { id: String },
    /// Reject a proposal, leaving files untouched
    Reject { id: String },
}
