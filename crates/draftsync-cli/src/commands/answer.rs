use crate::commands::common::{open_session, push_after_edit, SessionContext};
use crate::error::CliError;

pub async fn run_answer(
    context: &SessionContext,
    field: &str,
    text_parts: &[String],
    prompt: Option<&str>,
) -> Result<(), CliError> {
    let answer = text_parts.join(" ");
    let session = open_session(context, true).await?;
    session.set_answer(field, prompt.unwrap_or_default(), answer.trim())?;
    push_after_edit(&session).await
}
