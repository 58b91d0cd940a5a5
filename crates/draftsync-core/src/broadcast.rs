//! Cross-tab draft broadcast.
//!
//! A [`BroadcastHub`] plays the role of the browser's broadcast primitive:
//! every tab of one profile shares it. Frames are JSON text; anything that
//! does not parse as an [`Envelope`] is dropped.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::models::{Draft, TabId};

/// Called instead of automatic adoption when a newer peer draft arrives:
/// `(local, incoming)`.
pub type ConflictHandler = Arc<dyn Fn(&Draft, &Draft) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    DraftUpdate,
}

/// Typed envelope carried on the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub kind: MessageKind,
    pub draft_key: String,
    pub sender_id: TabId,
    pub payload: Draft,
}

/// Channel shared by all tabs of one browser profile.
#[derive(Debug, Clone)]
pub struct BroadcastHub {
    tx: broadcast::Sender<Arc<str>>,
}

impl BroadcastHub {
    /// `capacity` frames are buffered per subscriber before it starts lagging
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Post a raw frame to every subscriber
    pub fn post(&self, frame: impl Into<Arc<str>>) {
        if self.tx.send(frame.into()).is_err() {
            tracing::trace!("Broadcast frame dropped: no subscribers");
        }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// One tab's view of the hub, bound to a single draft key.
pub struct TabChannel {
    hub: Option<BroadcastHub>,
    tab_id: TabId,
    draft_key: Option<String>,
}

impl TabChannel {
    /// Bind to `hub`; without one the tab runs single-tab with a warning
    pub fn connect(hub: Option<&BroadcastHub>, tab_id: TabId, draft_key: Option<String>) -> Self {
        if hub.is_none() {
            tracing::warn!("Broadcast channel unavailable; cross-tab sync disabled");
        }
        Self {
            hub: hub.cloned(),
            tab_id,
            draft_key,
        }
    }

    pub const fn is_connected(&self) -> bool {
        self.hub.is_some()
    }

    pub const fn tab_id(&self) -> &TabId {
        &self.tab_id
    }

    /// Announce a locally saved draft; returns whether a frame was posted
    pub fn publish(&self, draft: &Draft) -> bool {
        let (Some(hub), Some(draft_key)) = (&self.hub, &self.draft_key) else {
            return false;
        };

        let envelope = Envelope {
            kind: MessageKind::DraftUpdate,
            draft_key: draft_key.clone(),
            sender_id: self.tab_id.clone(),
            payload: draft.clone(),
        };
        match serde_json::to_string(&envelope) {
            Ok(frame) => {
                hub.post(frame);
                true
            }
            Err(error) => {
                tracing::error!("Failed to encode draft broadcast: {}", error);
                false
            }
        }
    }

    /// Receiver of peer drafts for this key; `None` in single-tab mode
    pub fn subscribe(&self) -> Option<Subscription> {
        let hub = self.hub.as_ref()?;
        let draft_key = self.draft_key.clone()?;
        Some(Subscription {
            rx: hub.tx.subscribe(),
            tab_id: self.tab_id.clone(),
            draft_key,
        })
    }
}

/// Stream of peer drafts. Own frames, other keys and malformed frames never
/// come out of it.
pub struct Subscription {
    rx: broadcast::Receiver<Arc<str>>,
    tab_id: TabId,
    draft_key: String,
}

impl Subscription {
    /// Next accepted peer draft; `None` once the hub is gone
    pub async fn recv(&mut self) -> Option<Draft> {
        loop {
            match self.rx.recv().await {
                Ok(frame) => {
                    if let Some(draft) = self.accept(&frame) {
                        return Some(draft);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Draft broadcast subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next already-delivered peer draft without waiting
    pub fn try_recv(&mut self) -> Option<Draft> {
        loop {
            match self.rx.try_recv() {
                Ok(frame) => {
                    if let Some(draft) = self.accept(&frame) {
                        return Some(draft);
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Draft broadcast subscriber lagged");
                }
                Err(_) => return None,
            }
        }
    }

    fn accept(&self, frame: &str) -> Option<Draft> {
        let envelope = match serde_json::from_str::<Envelope>(frame) {
            Ok(envelope) => envelope,
            Err(error) => {
                tracing::debug!("Ignoring malformed draft broadcast: {}", error);
                return None;
            }
        };
        if envelope.sender_id == self.tab_id || envelope.draft_key != self.draft_key {
            return None;
        }
        Some(envelope.payload)
    }
}

/// What happened to an incoming peer draft
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Newer; local state replaced wholesale
    Adopted,
    /// Not newer than local; dropped
    Stale,
    /// Newer, handed to the conflict handler; local state untouched
    Deferred,
    /// Belongs to another owner; dropped
    Foreign,
}

/// Classify `incoming` against `local` without touching either: `Adopted`
/// here means "newer, would be adopted".
#[must_use]
pub fn classify_incoming(local: &Draft, incoming: &Draft) -> MergeOutcome {
    if !incoming.belongs_to(&local.owner_id) {
        MergeOutcome::Foreign
    } else if incoming.version <= local.version {
        MergeOutcome::Stale
    } else {
        MergeOutcome::Adopted
    }
}

/// Last-writer-wins by version, at whole-draft granularity.
pub fn resolve_incoming(
    local: &mut Draft,
    incoming: &Draft,
    on_conflict: Option<&ConflictHandler>,
) -> MergeOutcome {
    let outcome = classify_incoming(local, incoming);
    if outcome != MergeOutcome::Adopted {
        return outcome;
    }
    if let Some(handler) = on_conflict {
        handler(local, incoming);
        return MergeOutcome::Deferred;
    }
    local.adopt(incoming);
    MergeOutcome::Adopted
}
