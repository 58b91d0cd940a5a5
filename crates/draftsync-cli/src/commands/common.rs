use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use draftsync_core::store::SqliteKeyValueStore;
use draftsync_core::{Draft, DraftSession, DraftSyncConfig, OwnerId, SharedToken, TaskDomain};

use crate::error::CliError;

pub const OWNER_ENV: &str = "DRAFTSYNC_OWNER";
pub const TOKEN_ENV: &str = "DRAFTSYNC_TOKEN";
pub const DB_PATH_ENV: &str = "DRAFTSYNC_DB_PATH";

/// Resolved flags and environment for one command run.
pub struct SessionContext {
    pub domain: TaskDomain,
    pub owner: OwnerId,
    pub db_path: PathBuf,
    pub config: DraftSyncConfig,
    pub offline: bool,
    pub token: Option<String>,
}

impl SessionContext {
    pub fn resolve(
        domain: TaskDomain,
        owner: Option<String>,
        db_path: Option<PathBuf>,
        config_path: Option<PathBuf>,
        offline: bool,
        token: Option<String>,
    ) -> Result<Self, CliError> {
        let config_path = config_path.or_else(default_config_path);
        Ok(Self {
            domain,
            owner: resolve_owner(owner.or_else(|| env::var(OWNER_ENV).ok()))?,
            db_path: resolve_db_path(db_path)?,
            config: DraftSyncConfig::load_with_env(config_path.as_deref())?,
            offline,
            token: normalize_text(token.or_else(|| env::var(TOKEN_ENV).ok())),
        })
    }

    pub const fn has_remote(&self) -> bool {
        self.config.api_base_url.is_some()
    }
}

pub fn resolve_owner(raw: Option<String>) -> Result<OwnerId, CliError> {
    normalize_text(raw)
        .and_then(|owner| OwnerId::new(owner).ok())
        .ok_or(CliError::MissingOwner)
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os(DB_PATH_ENV).map(PathBuf::from)) {
        return Ok(path);
    }
    default_db_path()
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("draftsync").join("drafts.db"))
        .ok_or_else(|| CliError::Config("failed to resolve CLI data directory".to_string()))
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("draftsync").join("config.json"))
}

fn normalize_text(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Open the draft session for this run. With `auto_resume` a stored draft is
/// resumed without asking, which is what every editing command wants.
pub async fn open_session(
    context: &SessionContext,
    auto_resume: bool,
) -> Result<DraftSession, CliError> {
    tracing::debug!(
        db_path = %context.db_path.display(),
        offline = context.offline,
        remote = context.has_remote(),
        "Opening draft session"
    );
    let storage = Arc::new(open_store(&context.db_path)?);
    let tokens = Arc::new(SharedToken::new(context.token.clone()));

    let mut builder = DraftSession::builder(context.domain, context.owner.clone(), storage)
        .sync_delay(context.config.sync_delay())
        .online(!context.offline);
    if let Some(remote) =
        context
            .config
            .remote_client(context.domain, context.owner.clone(), tokens)?
    {
        builder = builder.remote(remote);
    }
    if auto_resume {
        builder = builder.on_resume(|_| true);
    }

    Ok(builder.open().await)
}

fn open_store(path: &Path) -> Result<SqliteKeyValueStore, CliError> {
    Ok(SqliteKeyValueStore::open(path)?)
}

/// Push right away after an edit; the process will not outlive a debounce timer
pub async fn push_after_edit(session: &DraftSession) -> Result<(), CliError> {
    let state = session.sync_now().await?;
    let draft = session.snapshot();
    println!("Saved version {} ({})", draft.version, state.label());
    Ok(())
}

pub fn format_draft_lines(draft: &Draft, now_ms: i64) -> Vec<String> {
    let mut lines = vec![format!(
        "version {}  updated {}",
        draft.version,
        format_relative_time(draft.updated_at, now_ms)
    )];

    let categories = draft
        .selected_categories
        .iter()
        .collect::<Vec<_>>()
        .join(", ");
    if categories.is_empty() {
        lines.push("categories: (none)".to_string());
    } else {
        lines.push(format!("categories: {categories}"));
    }

    for (field, entry) in &draft.form_fields {
        let answer = answer_preview(&entry.answer, 60);
        if entry.prompt.is_empty() {
            lines.push(format!("{field:<12}  {answer}"));
        } else {
            lines.push(format!("{field:<12}  {answer}  [{}]", entry.prompt));
        }
    }
    lines
}

pub fn current_time_ms() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn answer_preview(answer: &str, max_chars: usize) -> String {
    let single_line = answer.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() <= max_chars {
        return single_line;
    }
    let truncated = single_line
        .chars()
        .take(max_chars.saturating_sub(3))
        .collect::<String>();
    format!("{truncated}...")
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    if timestamp_ms <= 0 {
        return "never".to_string();
    }

    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else {
        format!("{}d ago", diff / day)
    }
}
