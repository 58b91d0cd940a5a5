use crate::commands::common::{open_session, push_after_edit, SessionContext};
use crate::error::CliError;

pub async fn run_toggle(context: &SessionContext, category: &str) -> Result<(), CliError> {
    let session = open_session(context, true).await?;
    let selected = session.toggle_category(category)?;
    println!(
        "{} {}",
        if selected { "Selected" } else { "Deselected" },
        category.trim()
    );
    push_after_edit(&session).await
}
