use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use draftsync_core::TaskDomain;

#[derive(Parser)]
#[command(name = "draftsync")]
#[command(about = "Inspect and edit autosaved task drafts")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Task domain of the draft (tech, design, management)
    #[arg(long, global = true, default_value = "tech")]
    pub domain: TaskDomain,

    /// Owner (user) id; falls back to DRAFTSYNC_OWNER
    #[arg(long, global = true, value_name = "ID")]
    pub owner: Option<String>,

    /// Optional path to the local draft database
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to a JSON config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Work offline: save locally and skip the backend
    #[arg(long, global = true)]
    pub offline: bool,

    /// Bearer token for the task API; falls back to DRAFTSYNC_TOKEN
    #[arg(long, global = true, value_name = "TOKEN")]
    pub token: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the stored draft
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set the answer of a form field
    Answer {
        /// Field name, e.g. question1
        field: String,
        /// Answer text
        #[arg(required = true)]
        text: Vec<String>,
        /// Prompt shown for the field (kept from the stored draft when omitted)
        #[arg(long)]
        prompt: Option<String>,
    },
    /// Select or deselect a category
    Toggle {
        /// Category name
        category: String,
    },
    /// Discard the stored draft
    Discard,
    /// Push the draft to the backend now
    Sync,
    /// Submit the draft as final and clear it
    Submit,
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
