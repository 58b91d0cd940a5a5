//! Draft session: one open form for one owner in one tab.
//!
//! Every edit is saved locally and announced to peer tabs right away, then
//! pushed to the backend after a quiet period. Offline or failed pushes wait
//! in a FIFO queue until connectivity returns.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

use crate::broadcast::{
    classify_incoming, resolve_incoming, BroadcastHub, ConflictHandler, MergeOutcome, Subscription,
    TabChannel,
};
use crate::debounce::Debouncer;
use crate::models::{draft_key, CategorySet, Draft, OwnerId, TabId, TaskDomain};
use crate::queue::SyncQueue;
use crate::remote::{RemoteError, RemoteSyncClient};
use crate::resume::{LoadPhase, ResumeController, ResumeDecider, ResumeDecision};
use crate::state::SyncState;
use crate::store::{session_tab_id, DraftStore, KeyValueStore, MemoryKeyValueStore};
use crate::{Error, Result};

/// Quiet period before an edit is pushed to the backend
pub const DEFAULT_SYNC_DELAY: Duration = Duration::from_millis(2000);

/// Configures and opens a [`DraftSession`].
#[must_use]
pub struct DraftSessionBuilder {
    domain: TaskDomain,
    owner: OwnerId,
    storage: Arc<dyn KeyValueStore>,
    session_storage: Option<Arc<dyn KeyValueStore>>,
    remote: Option<RemoteSyncClient>,
    hub: Option<BroadcastHub>,
    sync_delay: Duration,
    online: bool,
    on_conflict: Option<ConflictHandler>,
    on_resume: Option<ResumeDecider>,
}

impl DraftSessionBuilder {
    /// Backend to hydrate from and push to; without one the session is local-only
    pub fn remote(mut self, remote: RemoteSyncClient) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Hub shared with the other tabs of this profile
    pub fn hub(mut self, hub: &BroadcastHub) -> Self {
        self.hub = Some(hub.clone());
        self
    }

    /// Per-tab storage holding the tab id; a fresh in-memory store by default
    pub fn session_storage(mut self, storage: Arc<dyn KeyValueStore>) -> Self {
        self.session_storage = Some(storage);
        self
    }

    pub const fn sync_delay(mut self, delay: Duration) -> Self {
        self.sync_delay = delay;
        self
    }

    /// Initial connectivity (online by default)
    pub const fn online(mut self, online: bool) -> Self {
        self.online = online;
        self
    }

    /// Replace automatic adoption of newer peer drafts with `handler(local, incoming)`
    pub fn on_conflict(mut self, handler: impl Fn(&Draft, &Draft) + Send + Sync + 'static) -> Self {
        self.on_conflict = Some(Arc::new(handler));
        self
    }

    /// Answer the resume prompt synchronously instead of waiting for
    /// [`DraftSession::resume`] or [`DraftSession::discard`]
    pub fn on_resume(mut self, decider: impl Fn(&Draft) -> bool + Send + Sync + 'static) -> Self {
        self.on_resume = Some(Arc::new(decider));
        self
    }

    /// Run the resume check and start listening to peer tabs
    pub async fn open(self) -> DraftSession {
        let draft_key = draft_key(self.domain, &self.owner);
        let store = DraftStore::new(self.storage, self.domain, Some(&self.owner));
        let session_storage = self
            .session_storage
            .unwrap_or_else(|| Arc::new(MemoryKeyValueStore::new()));
        let tab_id = session_tab_id(&*session_storage);
        let channel = TabChannel::connect(self.hub.as_ref(), tab_id, Some(draft_key.clone()));
        let subscription = channel.subscribe();

        let mut controller = ResumeController::new(
            store.clone(),
            self.remote.clone(),
            self.owner.clone(),
            self.on_resume,
        );
        let loaded = controller.run().await;
        let phase = controller.phase();
        let pending = controller.pending().cloned();

        tracing::info!(
            draft_key = %draft_key,
            tab_id = %channel.tab_id(),
            phase = phase.as_str(),
            "Draft session opened"
        );

        let (status, _) = watch::channel(if self.online {
            SyncState::Idle
        } else {
            SyncState::Offline
        });
        let shared = Arc::new(Shared {
            draft_key,
            store,
            remote: self.remote,
            channel,
            debouncer: Debouncer::new(self.sync_delay),
            on_conflict: self.on_conflict,
            status,
            controller: AsyncMutex::new(controller),
            drain_lock: AsyncMutex::new(()),
            state: Mutex::new(SessionState {
                draft: loaded.unwrap_or_else(|| Draft::new(self.owner)),
                phase,
                pending,
                queue: SyncQueue::new(),
                online: self.online,
                last_saved: None,
                submissions: 0,
            }),
        });
        let listener = subscription.map(|subscription| spawn_listener(&shared, subscription));

        DraftSession { shared, listener }
    }
}

struct SessionState {
    draft: Draft,
    phase: LoadPhase,
    pending: Option<Draft>,
    queue: SyncQueue,
    online: bool,
    last_saved: Option<i64>,
    /// Bumped by every final submission; pushes started before one are void
    submissions: u64,
}

struct Shared {
    draft_key: String,
    store: DraftStore,
    remote: Option<RemoteSyncClient>,
    channel: TabChannel,
    debouncer: Debouncer,
    on_conflict: Option<ConflictHandler>,
    status: watch::Sender<SyncState>,
    controller: AsyncMutex<ResumeController>,
    drain_lock: AsyncMutex<()>,
    state: Mutex<SessionState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_status(&self, status: SyncState) {
        self.status.send_replace(status);
    }

    fn persist(&self, state: &mut SessionState) {
        if self.store.save(&state.draft) {
            state.last_saved = Some(state.draft.updated_at);
        }
    }

    /// Bump, save and announce the current draft. Runs under the state lock
    /// so local writes land in version order.
    fn commit(&self, state: &mut SessionState) -> Draft {
        state.draft.record_mutation();
        self.persist(state);
        self.channel.publish(&state.draft);
        state.draft.clone()
    }

    async fn push_latest(&self) {
        let (draft, online, epoch) = {
            let state = self.lock();
            (state.draft.clone(), state.online, state.submissions)
        };
        self.push_or_enqueue(draft, online, epoch).await;
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.lock().submissions == epoch
    }

    /// Queue `draft` unless a submission happened since `epoch`
    fn requeue(&self, draft: Draft, epoch: u64) -> Option<usize> {
        let mut state = self.lock();
        if state.submissions != epoch {
            tracing::debug!(version = draft.version, "Dropping snapshot from before submission");
            return None;
        }
        state.queue.enqueue(draft);
        Some(state.queue.len())
    }

    async fn push_or_enqueue(&self, draft: Draft, online: bool, epoch: u64) {
        let Some(remote) = &self.remote else {
            return;
        };

        if !online {
            if let Some(queued) = self.requeue(draft, epoch) {
                tracing::debug!(queued, "Offline; draft queued for sync");
                self.set_status(SyncState::Offline);
            }
            return;
        }
        if !remote.has_token() {
            tracing::debug!("Skipping draft push without auth token");
            return;
        }

        self.set_status(SyncState::Syncing);
        let result = remote.push_partial(&draft).await;
        if !self.is_current(epoch) {
            tracing::debug!(version = draft.version, "Draft submitted during push; result ignored");
            return;
        }
        match result {
            Ok(()) => {
                let pending = !self.lock().queue.is_empty();
                self.set_status(if pending {
                    SyncState::Pending
                } else {
                    SyncState::Synced
                });
            }
            Err(RemoteError::MissingToken) => {
                tracing::debug!("Auth token vanished before draft push");
                self.set_status(SyncState::Idle);
            }
            Err(error) => {
                tracing::warn!(
                    version = draft.version,
                    "Draft push failed; queued for retry: {}",
                    error
                );
                if self.requeue(draft, epoch).is_some() {
                    self.set_status(SyncState::Pending);
                }
            }
        }
    }

    /// Push every queued snapshot in arrival order; failures go to the back
    async fn drain_queue(&self) -> usize {
        let _drain = self.drain_lock.lock().await;
        let Some(remote) = &self.remote else {
            return 0;
        };
        let (entries, epoch) = {
            let mut state = self.lock();
            (state.queue.take_all(), state.submissions)
        };
        if entries.is_empty() {
            return 0;
        }

        self.set_status(SyncState::Syncing);
        let mut sent = 0;
        for entry in entries {
            let (online, current) = {
                let state = self.lock();
                (state.online, state.submissions == epoch)
            };
            if !current {
                break;
            }
            if !online {
                self.requeue(entry, epoch);
                continue;
            }
            match remote.push_partial(&entry).await {
                Ok(()) => sent += 1,
                Err(error) => {
                    tracing::warn!(version = entry.version, "Queued draft push failed: {}", error);
                    self.requeue(entry, epoch);
                }
            }
        }
        if !self.is_current(epoch) {
            tracing::debug!(sent, "Draft submitted during queue drain; remaining snapshots dropped");
            return sent;
        }

        let (remaining, online) = {
            let state = self.lock();
            (state.queue.len(), state.online)
        };
        tracing::info!(sent, remaining, "Offline queue drained");
        self.set_status(if !online {
            SyncState::Offline
        } else if remaining > 0 {
            SyncState::Pending
        } else {
            SyncState::Synced
        });
        sent
    }

    fn apply_broadcast(&self, incoming: &Draft) -> Option<MergeOutcome> {
        let mut state = self.lock();
        if !state.phase.is_ready() {
            tracing::debug!(phase = state.phase.as_str(), "Ignoring peer draft before load");
            return None;
        }
        let Some(handler) = self.on_conflict.clone() else {
            return Some(resolve_incoming(&mut state.draft, incoming, None));
        };

        let outcome = classify_incoming(&state.draft, incoming);
        if outcome != MergeOutcome::Adopted {
            return Some(outcome);
        }
        let local = state.draft.clone();
        drop(state);

        // outside the lock: the handler may call back into the session
        handler(&local, incoming);
        Some(MergeOutcome::Deferred)
    }
}

fn spawn_listener(shared: &Arc<Shared>, mut subscription: Subscription) -> JoinHandle<()> {
    let shared = Arc::downgrade(shared);
    tokio::spawn(async move {
        while let Some(incoming) = subscription.recv().await {
            let Some(shared) = shared.upgrade() else {
                break;
            };
            let outcome = shared.apply_broadcast(&incoming);
            tracing::debug!(?outcome, version = incoming.version, "Peer draft received");
        }
    })
}

/// Form-facing handle. Dropping it stops the peer listener and any pending
/// debounced push; call [`flush_on_unload`](Self::flush_on_unload) first to
/// keep the latest edit.
pub struct DraftSession {
    shared: Arc<Shared>,
    listener: Option<JoinHandle<()>>,
}

impl DraftSession {
    pub fn builder(
        domain: TaskDomain,
        owner: OwnerId,
        storage: Arc<dyn KeyValueStore>,
    ) -> DraftSessionBuilder {
        DraftSessionBuilder {
            domain,
            owner,
            storage,
            session_storage: None,
            remote: None,
            hub: None,
            sync_delay: DEFAULT_SYNC_DELAY,
            online: true,
            on_conflict: None,
            on_resume: None,
        }
    }

    pub fn draft_key(&self) -> &str {
        &self.shared.draft_key
    }

    pub fn tab_id(&self) -> &TabId {
        self.shared.channel.tab_id()
    }

    pub fn phase(&self) -> LoadPhase {
        self.shared.lock().phase
    }

    /// Stored draft waiting for [`resume`](Self::resume) or [`discard`](Self::discard)
    pub fn pending_resume(&self) -> Option<Draft> {
        self.shared.lock().pending.clone()
    }

    pub async fn resume(&self) -> Result<LoadPhase> {
        self.decide(ResumeDecision::Resume).await
    }

    /// Drop the stored draft and fall back to the backend's copy, if any
    pub async fn discard(&self) -> Result<LoadPhase> {
        self.decide(ResumeDecision::Discard).await
    }

    async fn decide(&self, decision: ResumeDecision) -> Result<LoadPhase> {
        let mut controller = self.shared.controller.lock().await;
        if controller.phase() != LoadPhase::AwaitingDecision {
            return Err(Error::InvalidInput(format!(
                "no resume decision pending (phase: {})",
                controller.phase().as_str()
            )));
        }

        let loaded = controller.answer(decision).await;
        let phase = controller.phase();
        let mut state = self.shared.lock();
        if let Some(draft) = loaded {
            state.draft = draft;
        }
        state.phase = phase;
        state.pending = None;
        tracing::info!(phase = phase.as_str(), "Resume decision applied");
        Ok(phase)
    }

    /// Current in-memory draft
    pub fn snapshot(&self) -> Draft {
        self.shared.lock().draft.clone()
    }

    /// Record an answer; an empty `prompt` keeps the stored prompt. Returns
    /// the new version.
    pub fn set_answer(&self, field: &str, prompt: &str, answer: &str) -> Result<u64> {
        let field = field.trim();
        if field.is_empty() {
            return Err(Error::InvalidInput("field name must not be empty".to_string()));
        }
        self.mutate(|draft| draft.set_answer(field, prompt, answer))
    }

    pub fn remove_field(&self, field: &str) -> Result<u64> {
        self.mutate(|draft| {
            draft.form_fields.remove(field.trim());
        })
    }

    /// Flip a category; returns whether it is now selected
    pub fn toggle_category(&self, tag: &str) -> Result<bool> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(Error::InvalidInput("category must not be empty".to_string()));
        }
        let mut selected = false;
        self.mutate(|draft| selected = draft.selected_categories.toggle(tag))?;
        Ok(selected)
    }

    pub fn set_categories(&self, tags: impl IntoIterator<Item = String>) -> Result<u64> {
        let categories: CategorySet = tags
            .into_iter()
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect();
        self.mutate(|draft| draft.selected_categories = categories)
    }

    fn mutate(&self, apply: impl FnOnce(&mut Draft)) -> Result<u64> {
        let version = {
            let mut state = self.shared.lock();
            if !state.phase.is_ready() {
                return Err(Error::NotReady(state.phase.as_str()));
            }
            apply(&mut state.draft);
            self.shared.commit(&mut state).version
        };
        self.schedule_push();
        Ok(version)
    }

    fn schedule_push(&self) {
        if self.shared.remote.is_none() {
            return;
        }
        let shared = Arc::downgrade(&self.shared);
        self.shared.debouncer.schedule(async move {
            if let Some(shared) = shared.upgrade() {
                shared.push_latest().await;
            }
        });
    }

    /// Save and push now, skipping the quiet period
    pub async fn force_save(&self) -> Result<u64> {
        self.shared.debouncer.cancel();
        let (draft, online, epoch) = {
            let mut state = self.shared.lock();
            if !state.phase.is_ready() {
                return Err(Error::NotReady(state.phase.as_str()));
            }
            let draft = self.shared.commit(&mut state);
            (draft, state.online, state.submissions)
        };
        let version = draft.version;
        self.shared.push_or_enqueue(draft, online, epoch).await;
        Ok(version)
    }

    /// Push the current draft now instead of waiting for the quiet period.
    /// Queued snapshots go first when online. The version is not bumped.
    pub async fn sync_now(&self) -> Result<SyncState> {
        let online = {
            let state = self.shared.lock();
            if !state.phase.is_ready() {
                return Err(Error::NotReady(state.phase.as_str()));
            }
            state.online
        };
        self.shared.debouncer.cancel();
        if online {
            self.shared.drain_queue().await;
        }
        self.shared.push_latest().await;
        Ok(self.sync_state())
    }

    /// Last-chance save while the page goes away: bump and write locally,
    /// then fire a beacon when online. Returns the beacon task, if one was sent.
    pub fn flush_on_unload(&self) -> Option<JoinHandle<()>> {
        self.shared.debouncer.cancel();
        let (draft, online) = {
            let mut state = self.shared.lock();
            if !state.phase.is_ready() {
                return None;
            }
            state.draft.record_mutation();
            self.shared.persist(&mut state);
            (state.draft.clone(), state.online)
        };
        if !online {
            return None;
        }
        self.shared.remote.as_ref()?.send_beacon(&draft)
    }

    /// Report a connectivity change; coming back online drains the queue.
    /// Returns how many queued snapshots were pushed.
    pub async fn set_online(&self, online: bool) -> usize {
        let was_online = std::mem::replace(&mut self.shared.lock().online, online);
        if !online {
            if was_online {
                tracing::info!("Connectivity lost; saving locally");
            }
            self.shared.set_status(SyncState::Offline);
            return 0;
        }

        if !was_online {
            tracing::info!("Connectivity restored");
        }
        let sent = self.shared.drain_queue().await;
        if *self.shared.status.borrow() == SyncState::Offline {
            self.shared.set_status(SyncState::Idle);
        }
        sent
    }

    pub fn is_online(&self) -> bool {
        self.shared.lock().online
    }

    /// Forget the draft after a successful final submission: the stored copy,
    /// the queue and any pending push go away, and a push already in flight
    /// can no longer queue its snapshot. The version counter stays.
    pub fn mark_submitted(&self) {
        self.shared.debouncer.cancel();
        {
            let mut state = self.shared.lock();
            state.submissions += 1;
            state.queue.clear();
            state.draft.clear_content();
            state.pending = None;
        }
        self.shared.store.clear();
        self.shared.set_status(SyncState::Idle);
        tracing::info!(draft_key = %self.shared.draft_key, "Draft cleared after submission");
    }

    /// Final POST; on success the draft is cleared, on failure it is kept.
    /// At least one category must be selected.
    pub async fn submit(&self) -> Result<()> {
        let remote = self
            .shared
            .remote
            .as_ref()
            .ok_or_else(|| Error::InvalidInput("no task backend configured".to_string()))?;
        let draft = {
            let state = self.shared.lock();
            if !state.phase.is_ready() {
                return Err(Error::NotReady(state.phase.as_str()));
            }
            if state.draft.selected_categories.is_empty() {
                return Err(Error::InvalidInput(
                    "select at least one category before submitting".to_string(),
                ));
            }
            state.draft.clone()
        };

        self.shared.debouncer.cancel();
        if let Err(error) = remote.submit_final(&draft).await {
            self.schedule_push();
            return Err(error.into());
        }
        self.mark_submitted();
        Ok(())
    }

    /// Merge a peer draft; `None` while the load check is unresolved
    pub fn apply_broadcast(&self, incoming: &Draft) -> Option<MergeOutcome> {
        self.shared.apply_broadcast(incoming)
    }

    /// Observe sync status changes
    pub fn status(&self) -> watch::Receiver<SyncState> {
        self.shared.status.subscribe()
    }

    pub fn sync_state(&self) -> SyncState {
        *self.shared.status.borrow()
    }

    /// Time (Unix ms) of the last successful local save
    pub fn last_saved(&self) -> Option<i64> {
        self.shared.lock().last_saved
    }

    /// Snapshots waiting in the offline queue
    pub fn queued(&self) -> usize {
        self.shared.lock().queue.len()
    }

    /// Whether a debounced push is still waiting
    pub fn sync_pending(&self) -> bool {
        self.shared.debouncer.is_pending()
    }
}

impl Drop for DraftSession {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}
