use std::path::PathBuf;

use clap::Parser;
use draftsync_core::{Draft, DraftSyncConfig, LoadPhase, OwnerId, TaskDomain};

use crate::cli::{Cli, Commands, CompletionShell};
use crate::commands::answer::run_answer;
use crate::commands::common::{
    answer_preview, format_draft_lines, format_relative_time, open_session, resolve_db_path,
    resolve_owner, SessionContext,
};
use crate::commands::completions::render_completions;
use crate::commands::discard::run_discard;
use crate::commands::submit::run_submit;
use crate::commands::sync::run_sync;
use crate::commands::toggle::run_toggle;
use crate::error::CliError;

fn local_context(db_path: PathBuf) -> SessionContext {
    SessionContext {
        domain: TaskDomain::Tech,
        owner: OwnerId::new("u1").unwrap(),
        db_path,
        config: DraftSyncConfig::default(),
        offline: false,
        token: None,
    }
}

#[test]
fn parse_answer_collects_text_and_prompt() {
    let cli = Cli::try_parse_from([
        "draftsync",
        "--owner",
        "u1",
        "answer",
        "question1",
        "draft",
        "answer",
        "--prompt",
        "Describe it",
    ])
    .unwrap();

    assert_eq!(cli.owner.as_deref(), Some("u1"));
    assert_eq!(cli.domain, TaskDomain::Tech);
    match cli.command {
        Commands::Answer {
            field,
            text,
            prompt,
        } => {
            assert_eq!(field, "question1");
            assert_eq!(text, vec!["draft".to_string(), "answer".to_string()]);
            assert_eq!(prompt.as_deref(), Some("Describe it"));
        }
        _ => panic!("expected answer command"),
    }
}

#[test]
fn global_flags_follow_subcommand() {
    let cli = Cli::try_parse_from(["draftsync", "show", "--json", "--domain", "Design", "--offline"])
        .unwrap();
    assert_eq!(cli.domain, TaskDomain::Design);
    assert!(cli.offline);
    assert!(matches!(cli.command, Commands::Show { json: true }));
}

#[test]
fn parse_rejects_unknown_domain_and_empty_answer() {
    assert!(Cli::try_parse_from(["draftsync", "--domain", "finance", "show"]).is_err());
    assert!(Cli::try_parse_from(["draftsync", "answer", "question1"]).is_err());
}

#[test]
fn parse_completions_shell() {
    let cli = Cli::try_parse_from(["draftsync", "completions", "zsh"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Completions {
            shell: CompletionShell::Zsh,
            output: None
        }
    ));
}

#[test]
fn completions_mention_binary_name() {
    let script = String::from_utf8(render_completions(CompletionShell::Bash)).unwrap();
    assert!(script.contains("draftsync"));
}

#[test]
fn resolve_owner_rejects_blank() {
    assert!(matches!(
        resolve_owner(Some("  ".to_string())),
        Err(CliError::MissingOwner)
    ));
    assert_eq!(resolve_owner(Some(" u7 ".to_string())).unwrap().as_str(), "u7");
}

#[test]
fn resolve_db_path_prefers_explicit_path() {
    let explicit = PathBuf::from("/tmp/explicit.db");
    assert_eq!(resolve_db_path(Some(explicit.clone())).unwrap(), explicit);
}

#[test]
fn answer_preview_truncates_with_ellipsis() {
    assert_eq!(answer_preview("short\nanswer", 20), "short answer");
    assert_eq!(
        answer_preview("This is a very long answer that should be shortened", 20),
        "This is a very lo..."
    );
}

#[test]
fn format_relative_time_units() {
    let now = 10_000_000_000;
    assert_eq!(format_relative_time(0, now), "never");
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 120_000, now), "2m ago");
    assert_eq!(format_relative_time(now - 2 * 60 * 60_000, now), "2h ago");
    assert_eq!(format_relative_time(now - 3 * 24 * 60 * 60_000, now), "3d ago");
}

#[test]
fn format_draft_lines_lists_categories_and_fields() {
    let mut draft = Draft::new(OwnerId::new("u1").unwrap());
    draft.version = 3;
    draft.selected_categories.insert("frontend");
    draft.set_answer("question1", "Describe it", "an answer");
    draft.set_answer("question2", "", "another");

    let lines = format_draft_lines(&draft, draft.updated_at);
    assert_eq!(lines[0], "version 3  updated just now");
    assert_eq!(lines[1], "categories: frontend");
    assert!(lines[2].starts_with("question1"));
    assert!(lines[2].ends_with("an answer  [Describe it]"));
    assert!(lines[3].ends_with("another"));
}

#[tokio::test(flavor = "current_thread")]
async fn answers_survive_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let context = local_context(dir.path().join("drafts.db"));

    run_answer(&context, "question1", &["first".to_string()], Some("Prompt"))
        .await
        .unwrap();
    run_toggle(&context, "backend").await.unwrap();
    run_answer(&context, "question1", &["second".to_string()], None)
        .await
        .unwrap();

    let session = open_session(&context, true).await.unwrap();
    assert_eq!(session.phase(), LoadPhase::Resuming);
    let draft = session.snapshot();
    assert_eq!(draft.version, 3);
    assert_eq!(draft.answer("question1"), Some("second"));
    assert_eq!(draft.form_fields["question1"].prompt, "Prompt");
    assert_eq!(draft.selected_categories.as_slice(), ["backend"]);
}

#[tokio::test(flavor = "current_thread")]
async fn discard_clears_stored_draft() {
    let dir = tempfile::tempdir().unwrap();
    let context = local_context(dir.path().join("drafts.db"));

    run_answer(&context, "question1", &["throwaway".to_string()], None)
        .await
        .unwrap();
    run_discard(&context).await.unwrap();

    let session = open_session(&context, false).await.unwrap();
    assert_eq!(session.phase(), LoadPhase::Empty);
    assert!(!session.snapshot().has_content());
}

#[tokio::test(flavor = "current_thread")]
async fn remote_commands_require_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let context = local_context(dir.path().join("drafts.db"));

    assert!(matches!(
        run_sync(&context).await,
        Err(CliError::RemoteNotConfigured)
    ));
    assert!(matches!(
        run_submit(&context).await,
        Err(CliError::RemoteNotConfigured)
    ));
}

#[tokio::test(flavor = "current_thread")]
async fn submit_requires_a_category() {
    let dir = tempfile::tempdir().unwrap();
    let mut context = local_context(dir.path().join("drafts.db"));
    context.config.api_base_url = Some("http://127.0.0.1:9".to_string());

    run_answer(&context, "question1", &["answer".to_string()], None)
        .await
        .unwrap();
    let error = run_submit(&context).await.unwrap_err();
    assert!(matches!(error, CliError::Config(message) if message.contains("category")));

    let session = open_session(&context, true).await.unwrap();
    assert_eq!(session.snapshot().answer("question1"), Some("answer"));
}
