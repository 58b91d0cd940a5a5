use draftsync_core::SyncState;

use crate::commands::common::{open_session, SessionContext};
use crate::error::CliError;

pub async fn run_sync(context: &SessionContext) -> Result<(), CliError> {
    if !context.has_remote() {
        return Err(CliError::RemoteNotConfigured);
    }

    let session = open_session(context, true).await?;
    let version = session.force_save().await?;
    match session.sync_state() {
        SyncState::Synced => println!("Synced version {version}"),
        SyncState::Offline => println!("Offline: version {version} saved locally"),
        state => println!("Version {version} saved locally ({})", state.label()),
    }
    Ok(())
}
