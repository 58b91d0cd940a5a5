//! Resume/discard arbitration when a form is opened.

use std::sync::Arc;

use crate::models::{Draft, OwnerId};
use crate::remote::RemoteSyncClient;
use crate::store::DraftStore;

/// Synchronous "resume this draft?" callback; `true` resumes.
pub type ResumeDecider = Arc<dyn Fn(&Draft) -> bool + Send + Sync>;

/// Where the controller stands for the current form mount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadPhase {
    #[default]
    Uninitialized,
    Checking,
    /// A local draft is waiting for the user's resume/discard answer
    AwaitingDecision,
    Resuming,
    Discarded,
    HydratedRemote,
    Empty,
}

impl LoadPhase {
    /// Editing is allowed once one of the terminal phases is reached
    pub const fn is_ready(self) -> bool {
        matches!(
            self,
            Self::Resuming | Self::Discarded | Self::HydratedRemote | Self::Empty
        )
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Checking => "checking",
            Self::AwaitingDecision => "awaiting-decision",
            Self::Resuming => "resuming",
            Self::Discarded => "discarded",
            Self::HydratedRemote => "hydrated-remote",
            Self::Empty => "empty",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeDecision {
    Resume,
    Discard,
}

/// Decides, once per mount, which draft the form starts from.
pub struct ResumeController {
    store: DraftStore,
    remote: Option<RemoteSyncClient>,
    owner: OwnerId,
    decider: Option<ResumeDecider>,
    phase: LoadPhase,
    pending: Option<Draft>,
}

impl ResumeController {
    pub fn new(
        store: DraftStore,
        remote: Option<RemoteSyncClient>,
        owner: OwnerId,
        decider: Option<ResumeDecider>,
    ) -> Self {
        Self {
            store,
            remote,
            owner,
            decider,
            phase: LoadPhase::Uninitialized,
            pending: None,
        }
    }

    pub const fn phase(&self) -> LoadPhase {
        self.phase
    }

    /// Local draft awaiting the user's answer
    pub const fn pending(&self) -> Option<&Draft> {
        self.pending.as_ref()
    }

    /// Run the check. Returns the draft to start editing from, or `None` to
    /// start blank (or to wait for [`answer`](Self::answer) when the phase is
    /// `AwaitingDecision`).
    pub async fn run(&mut self) -> Option<Draft> {
        if self.phase != LoadPhase::Uninitialized {
            tracing::warn!(phase = self.phase.as_str(), "Draft check already ran");
            return None;
        }
        self.phase = LoadPhase::Checking;

        let mut local_present = false;
        match self.store.load() {
            Some(local) if !local.belongs_to(&self.owner) => {
                tracing::debug!("Ignoring stored draft of another owner");
            }
            Some(local) if local.has_content() => {
                local_present = true;
                match &self.decider {
                    Some(decide) => {
                        if decide(&local) {
                            tracing::debug!(version = local.version, "Resuming local draft");
                            self.phase = LoadPhase::Resuming;
                            return Some(local);
                        }
                        tracing::debug!("Local draft declined");
                    }
                    None => {
                        self.phase = LoadPhase::AwaitingDecision;
                        self.pending = Some(local);
                        return None;
                    }
                }
            }
            Some(_) | None => {}
        }

        self.hydrate(local_present, LoadPhase::Empty).await
    }

    /// Settle an `AwaitingDecision` phase
    pub async fn answer(&mut self, decision: ResumeDecision) -> Option<Draft> {
        if self.phase != LoadPhase::AwaitingDecision {
            tracing::warn!(phase = self.phase.as_str(), "No resume decision pending");
            return None;
        }

        let pending = self.pending.take();
        match decision {
            ResumeDecision::Resume => {
                self.phase = LoadPhase::Resuming;
                pending
            }
            ResumeDecision::Discard => {
                self.store.clear();
                self.hydrate(false, LoadPhase::Discarded).await
            }
        }
    }

    async fn hydrate(&mut self, local_present: bool, fallback: LoadPhase) -> Option<Draft> {
        let remote = match &self.remote {
            Some(remote) => remote.fetch_initial().await,
            None => None,
        };

        match remote {
            Some(remote) if remote.has_content() && !local_present => {
                tracing::debug!("Hydrated draft from backend");
                self.phase = LoadPhase::HydratedRemote;
                Some(remote)
            }
            _ => {
                self.phase = fallback;
                None
            }
        }
    }
}
