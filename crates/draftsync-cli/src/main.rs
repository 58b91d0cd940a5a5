//! draftsync CLI - inspect and edit autosaved task drafts
//!
//! Every command opens the same draft session a form would, so edits made
//! here are stored, versioned and pushed exactly like edits from a browser tab.

mod cli;
mod commands;
mod error;
#[cfg(test)]
mod tests;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::answer::run_answer;
use crate::commands::common::SessionContext;
use crate::commands::completions::run_completions;
use crate::commands::discard::run_discard;
use crate::commands::show::run_show;
use crate::commands::submit::run_submit;
use crate::commands::sync::run_sync;
use crate::commands::toggle::run_toggle;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("draftsync=info".parse().expect("valid directive")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Commands::Completions { shell, output } = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let context = SessionContext::resolve(
        cli.domain,
        cli.owner,
        cli.db_path,
        cli.config,
        cli.offline,
        cli.token,
    )?;

    match cli.command {
        Commands::Show { json } => run_show(&context, json).await?,
        Commands::Answer {
            field,
            text,
            prompt,
        } => run_answer(&context, &field, &text, prompt.as_deref()).await?,
        Commands::Toggle { category } => run_toggle(&context, &category).await?,
        Commands::Discard => run_discard(&context).await?,
        Commands::Sync => run_sync(&context).await?,
        Commands::Submit => run_submit(&context).await?,
        Commands::Completions { .. } => {}
    }

    Ok(())
}
