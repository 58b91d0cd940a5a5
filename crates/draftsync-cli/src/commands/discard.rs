use draftsync_core::LoadPhase;

use crate::commands::common::{open_session, SessionContext};
use crate::error::CliError;

pub async fn run_discard(context: &SessionContext) -> Result<(), CliError> {
    let session = open_session(context, false).await?;
    if session.phase() != LoadPhase::AwaitingDecision {
        println!("No stored draft for {}", session.draft_key());
        return Ok(());
    }

    match session.discard().await? {
        LoadPhase::HydratedRemote => {
            println!("Draft discarded; the backend still holds an unfinished submission");
        }
        _ => println!("Draft discarded"),
    }
    Ok(())
}
