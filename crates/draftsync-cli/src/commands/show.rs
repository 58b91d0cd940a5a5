use crate::commands::common::{current_time_ms, format_draft_lines, open_session, SessionContext};
use crate::error::CliError;

pub async fn run_show(context: &SessionContext, as_json: bool) -> Result<(), CliError> {
    let session = open_session(context, true).await?;
    let draft = session.snapshot();

    if as_json {
        println!("{}", serde_json::to_string_pretty(&draft)?);
        return Ok(());
    }

    if !draft.has_content() {
        println!("No draft for {}", session.draft_key());
        return Ok(());
    }
    println!("{} ({})", session.draft_key(), session.phase().as_str());
    for line in format_draft_lines(&draft, current_time_ms()) {
        println!("{line}");
    }
    Ok(())
}
