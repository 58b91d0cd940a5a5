use crate::commands::common::{open_session, SessionContext};
use crate::error::CliError;

pub async fn run_submit(context: &SessionContext) -> Result<(), CliError> {
    if !context.has_remote() {
        return Err(CliError::RemoteNotConfigured);
    }

    let session = open_session(context, true).await?;
    if !session.snapshot().has_content() {
        return Err(CliError::Config(format!(
            "nothing to submit for {}",
            session.draft_key()
        )));
    }
    if session.snapshot().selected_categories.is_empty() {
        return Err(CliError::Config(
            "select at least one category before submitting (draftsync toggle <category>)"
                .to_string(),
        ));
    }
    session.submit().await?;
    println!("Submitted {}", session.draft_key());
    Ok(())
}
