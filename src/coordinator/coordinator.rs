use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::config::Settings;
use crate::context::context::DocumentContext;
use crate::context::handle::ContextHandle;
use crate::context::messages::{
    ContextEvent, ContextReply, ContextRequest, FrameEnvelope, FrameId, FrameMessage, TabId,
};
use crate::coordinator::notify::Notifier;
use crate::coordinator::store::HintStackStore;
use crate::coordinator::tabs::TabApi;
use crate::dom::document::Document;
use crate::error::ChannelError;
use crate::hints::alphabet::HintAlphabet;
use crate::hints::label::HintLabel;
use crate::hints::pool::{HintPool, HintPoolSnapshot};

/// Per-tab record. Every read-modify-write of it happens under the tab's
/// async mutex, end to end.
#[derive(Debug)]
pub struct TabState {
    pub pool: HintPool,
}

pub(crate) struct Shared {
    pub(crate) settings: RwLock<Settings>,
    pub(crate) alphabet: RwLock<HintAlphabet>,
    tabs: Mutex<HashMap<TabId, Arc<tokio::sync::Mutex<TabState>>>>,
    frames: Mutex<BTreeMap<(TabId, FrameId), ContextHandle>>,
    store: Arc<dyn HintStackStore>,
    pub(crate) tab_api: Arc<dyn TabApi>,
    pub(crate) notifier: Arc<dyn Notifier>,
    frame_tx: mpsc::UnboundedSender<FrameEnvelope>,
}

/// The coordinating process: owns every tab's hint stack, relays claims and
/// reclaims between frames, and routes controller requests.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Coordinator {
    pub(crate) shared: Arc<Shared>,
}

fn read<T: Clone>(lock: &RwLock<T>) -> T {
    match lock.read() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

impl Coordinator {
    /// Build a coordinator. Frame messages arrive on the returned receiver;
    /// hand it to [`Coordinator::run`].
    pub fn new(
        settings: Settings,
        store: Arc<dyn HintStackStore>,
        tab_api: Arc<dyn TabApi>,
        notifier: Arc<dyn Notifier>,
    ) -> (Self, mpsc::UnboundedReceiver<FrameEnvelope>) {
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let alphabet = HintAlphabet::from_settings(&settings);
        let shared = Shared {
            settings: RwLock::new(settings),
            alphabet: RwLock::new(alphabet),
            tabs: Mutex::new(HashMap::new()),
            frames: Mutex::new(BTreeMap::new()),
            store,
            tab_api,
            notifier,
            frame_tx,
        };
        (
            Coordinator {
                shared: Arc::new(shared),
            },
            frame_rx,
        )
    }

    /// Build a coordinator and spawn its frame-message loop.
    pub fn spawn(
        settings: Settings,
        store: Arc<dyn HintStackStore>,
        tab_api: Arc<dyn TabApi>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (coordinator, frame_rx) = Coordinator::new(settings, store, tab_api, notifier);
        let runner = coordinator.clone();
        tokio::spawn(async move { runner.run(frame_rx).await });
        coordinator
    }

    /// Serve frame messages in arrival order until every sender is gone.
    pub async fn run(&self, mut frame_rx: mpsc::UnboundedReceiver<FrameEnvelope>) {
        while let Some(envelope) = frame_rx.recv().await {
            self.handle_frame_message(envelope).await;
        }
        debug!("frame channel closed, coordinator stopping");
    }

    pub fn settings(&self) -> Settings {
        read(&self.shared.settings)
    }

    pub fn update_settings<F>(&self, change: F)
    where
        F: FnOnce(&mut Settings),
    {
        match self.shared.settings.write() {
            Ok(mut guard) => change(&mut guard),
            Err(poisoned) => change(&mut poisoned.into_inner()),
        }
    }

    pub fn alphabet(&self) -> HintAlphabet {
        read(&self.shared.alphabet)
    }

    fn set_alphabet(&self, alphabet: HintAlphabet) {
        match self.shared.alphabet.write() {
            Ok(mut guard) => *guard = alphabet,
            Err(poisoned) => *poisoned.into_inner() = alphabet,
        }
    }

    pub(crate) fn reply_timeout(&self) -> Duration {
        self.settings().reply_timeout()
    }

    /// Sender a hand-built `DocumentContext` can use to talk to this
    /// coordinator.
    pub fn frame_sender(&self) -> mpsc::UnboundedSender<FrameEnvelope> {
        self.shared.frame_tx.clone()
    }

    // ------------------------------------------------------------------
    // Frames
    // ------------------------------------------------------------------

    /// Create the document context for a frame, register it and start its
    /// event loop.
    ///
    /// The frame must not be open already: close it and wait for it to
    /// unload first.
    pub fn open_frame(&self, tab: TabId, frame: FrameId, doc: Document) -> ContextHandle {
        if self.frame(tab, frame).is_some() {
            warn!(tab, frame, "opening a frame that is still registered");
        }
        let settings = self.settings();
        let host = doc.host().to_string();
        let context = DocumentContext::new(tab, frame, doc, &settings, self.frame_sender());
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = ContextHandle::new(tab, frame, &host, tx);
        self.register_frame(handle.clone());
        tokio::spawn(context.run(rx));
        info!(tab, frame, host = %host, "frame opened");
        handle
    }

    pub fn register_frame(&self, handle: ContextHandle) {
        if let Ok(mut frames) = self.shared.frames.lock() {
            frames.insert((handle.tab, handle.frame), handle);
        }
    }

    pub fn unregister_frame(&self, tab: TabId, frame: FrameId) -> Option<ContextHandle> {
        self.shared.frames.lock().ok()?.remove(&(tab, frame))
    }

    pub fn frame(&self, tab: TabId, frame: FrameId) -> Option<ContextHandle> {
        self.shared.frames.lock().ok()?.get(&(tab, frame)).cloned()
    }

    /// Registered frames of a tab, in frame order.
    pub fn frames_of(&self, tab: TabId) -> Vec<ContextHandle> {
        match self.shared.frames.lock() {
            Ok(frames) => frames.range((tab, 0)..=(tab, FrameId::MAX)).map(|(_, h)| h.clone()).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn all_frames(&self) -> Vec<ContextHandle> {
        match self.shared.frames.lock() {
            Ok(frames) => frames.values().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    fn send_to(&self, tab: TabId, frame: FrameId, event: ContextEvent) {
        match self.frame(tab, frame) {
            Some(handle) => {
                if let Err(e) = handle.send(event) {
                    debug!(error = %e, "dropping event for closed frame");
                }
            }
            None => warn!(tab, frame, "event for unregistered frame dropped"),
        }
    }

    // ------------------------------------------------------------------
    // Tab stacks
    // ------------------------------------------------------------------

    /// The tab's record, created from the persisted snapshot (or fresh) on
    /// first use.
    fn tab_state(&self, tab: TabId) -> Arc<tokio::sync::Mutex<TabState>> {
        let mut tabs = match self.shared.tabs.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        tabs.entry(tab)
            .or_insert_with(|| {
                let alphabet = self.alphabet();
                let pool = match self.shared.store.load(tab) {
                    Ok(Some(snapshot)) => HintPool::from_snapshot(snapshot, &alphabet),
                    Ok(None) => HintPool::new(&alphabet),
                    Err(e) => {
                        warn!(tab, error = %e, "could not load hint stack, starting fresh");
                        HintPool::new(&alphabet)
                    }
                };
                Arc::new(tokio::sync::Mutex::new(TabState { pool }))
            })
            .clone()
    }

    fn tab_ids(&self) -> Vec<TabId> {
        match self.shared.tabs.lock() {
            Ok(tabs) => tabs.keys().copied().collect(),
            Err(_) => Vec::new(),
        }
    }

    fn persist(&self, tab: TabId, pool: &HintPool) {
        if let Err(e) = self.shared.store.save(tab, &pool.snapshot()) {
            warn!(tab, error = %e, "could not persist hint stack");
        }
    }

    pub async fn snapshot(&self, tab: TabId) -> HintPoolSnapshot {
        let state = self.tab_state(tab);
        let state = state.lock().await;
        state.pool.snapshot()
    }

    /// Make sure the tab has a stack; labels an earlier document in this
    /// frame still held go back to it.
    pub async fn init_stack(&self, tab: TabId, frame: FrameId) {
        let state = self.tab_state(tab);
        let mut state = state.lock().await;
        let stale = state.pool.release_frame(frame);
        if !stale.is_empty() {
            debug!(tab, frame, released = stale.len(), "released labels of previous document");
        }
        self.persist(tab, &state.pool);
    }

    pub async fn claim(&self, tab: TabId, frame: FrameId, amount: usize) -> Vec<HintLabel> {
        let state = self.tab_state(tab);
        let mut state = state.lock().await;
        let labels = state.pool.claim(frame, amount);
        debug!(tab, frame, requested = amount, granted = labels.len(), "claim");
        self.persist(tab, &state.pool);
        labels
    }

    pub async fn release(&self, tab: TabId, frame: FrameId, labels: &[HintLabel]) -> usize {
        let Some(state) = self.existing_tab_state(tab) else {
            debug!(tab, frame, "release for a tab without a stack ignored");
            return 0;
        };
        let mut state = state.lock().await;
        let released = state.pool.release(frame, labels);
        if released < labels.len() {
            debug!(tab, frame, ignored = labels.len() - released, "stale release ignored");
        }
        self.persist(tab, &state.pool);
        released
    }

    /// Ask the tab's other frames, one at a time, for off-screen labels and
    /// move whatever they give up to `requester`. The tab stays locked for
    /// the whole exchange.
    pub async fn reclaim_from_others(&self, tab: TabId, requester: FrameId, amount: usize) -> Vec<HintLabel> {
        let state = self.tab_state(tab);
        let mut state = state.lock().await;
        let timeout = self.reply_timeout();
        let mut gathered = Vec::new();

        for sibling in self.frames_of(tab).into_iter().filter(|h| h.frame != requester) {
            if gathered.len() >= amount {
                break;
            }
            let wanted = amount - gathered.len();
            match sibling.request(ContextRequest::ReclaimHints { amount: wanted }, timeout).await {
                Ok(ContextReply::Labels(labels)) => {
                    let moved = state.pool.transfer(sibling.frame, requester, &labels);
                    if moved.len() < labels.len() {
                        warn!(tab, frame = sibling.frame, "sibling gave up labels it did not own");
                    }
                    gathered.extend(moved);
                }
                Ok(other) => warn!(tab, frame = sibling.frame, reply = ?other, "unexpected reclaim reply"),
                Err(e) => {
                    debug!(tab, frame = sibling.frame, error = %e, "sibling reclaim failed");
                    // The sibling may have given labels up before the reply was lost.
                    let recovered = self.recover_stray_labels(&mut state.pool, &sibling, requester, wanted).await;
                    gathered.extend(recovered);
                }
            }
        }

        info!(tab, frame = requester, requested = amount, reclaimed = gathered.len(), "reclaim from siblings");
        self.persist(tab, &state.pool);
        gathered
    }

    /// Compare what `sibling` shows with what the pool has on record for it.
    /// Labels it no longer shows go to `requester` (up to `wanted`) and the
    /// rest back to the stack.
    async fn recover_stray_labels(
        &self,
        pool: &mut HintPool,
        sibling: &ContextHandle,
        requester: FrameId,
        wanted: usize,
    ) -> Vec<HintLabel> {
        let shown = match sibling.request(ContextRequest::GetLabelsInUse, self.reply_timeout()).await {
            Ok(ContextReply::Labels(labels)) => labels,
            _ => return Vec::new(),
        };
        let stray = pool.stray_labels(sibling.frame, &shown);
        if stray.is_empty() {
            return Vec::new();
        }

        let split = wanted.min(stray.len());
        let moved = pool.transfer(sibling.frame, requester, &stray[..split]);
        let released = pool.release(sibling.frame, &stray[split..]);
        info!(tab = sibling.tab, frame = sibling.frame, moved = moved.len(), released, "recovered stray labels");
        moved
    }

    /// Replace every tab's stack with a fresh one over the current alphabet.
    pub async fn reset_stacks(&self) {
        let alphabet = HintAlphabet::from_settings(&self.settings());
        self.set_alphabet(alphabet.clone());
        for tab in self.tab_ids() {
            let state = self.tab_state(tab);
            let mut state = state.lock().await;
            state.pool = HintPool::new(&alphabet);
            self.persist(tab, &state.pool);
        }
        info!(labels = alphabet.len(), "hint stacks reset");
    }

    fn existing_tab_state(&self, tab: TabId) -> Option<Arc<tokio::sync::Mutex<TabState>>> {
        self.shared.tabs.lock().ok()?.get(&tab).cloned()
    }

    async fn frame_unloaded(&self, tab: TabId, frame: FrameId) {
        self.unregister_frame(tab, frame);
        // A closed tab's stack is already gone.
        let Some(state) = self.existing_tab_state(tab) else {
            debug!(tab, frame, "frame of a forgotten tab unloaded");
            return;
        };
        let mut state = state.lock().await;
        let released = state.pool.release_frame(frame);
        self.persist(tab, &state.pool);
        info!(tab, frame, released = released.len(), "frame unloaded");
    }

    /// Drop the stacks and frames of tabs that were closed.
    pub fn forget_tabs(&self, closed: &[TabId]) {
        for tab in closed {
            for handle in self.frames_of(*tab) {
                self.unregister_frame(handle.tab, handle.frame);
                if let Err(e) = handle.shutdown() {
                    debug!(tab, frame = handle.frame, error = %e, "frame already closed");
                }
            }
            if let Ok(mut tabs) = self.shared.tabs.lock() {
                tabs.remove(tab);
            }
            if let Err(e) = self.shared.store.remove(*tab) {
                warn!(tab, error = %e, "could not remove persisted hint stack");
            }
        }
        if !closed.is_empty() {
            info!(closed = closed.len(), "forgot closed tabs");
        }
    }

    // ------------------------------------------------------------------
    // Frame messages
    // ------------------------------------------------------------------

    pub async fn handle_frame_message(&self, envelope: FrameEnvelope) {
        let FrameEnvelope { tab, frame, message } = envelope;
        trace!(tab, frame, ?message, "frame message");

        match message {
            FrameMessage::InitStack => self.init_stack(tab, frame).await,
            FrameMessage::ClaimHints { correlation, amount } => {
                let labels = self.claim(tab, frame, amount).await;
                self.send_to(tab, frame, ContextEvent::ClaimReply { correlation, labels });
            }
            FrameMessage::ReclaimFromOthers { correlation, amount } => {
                let labels = self.reclaim_from_others(tab, frame, amount).await;
                self.send_to(tab, frame, ContextEvent::ClaimReply { correlation, labels });
            }
            FrameMessage::ReleaseHints { labels } => {
                self.release(tab, frame, &labels).await;
            }
            FrameMessage::GetPoolSnapshot { correlation } => {
                let snapshot = self.snapshot(tab).await;
                self.send_to(tab, frame, ContextEvent::PoolSnapshot { correlation, snapshot });
            }
            FrameMessage::OpenTabs { urls, active } => {
                for (i, url) in urls.iter().enumerate() {
                    if let Err(e) = self.shared.tab_api.create(url, active && i == 0) {
                        warn!(url = %url, error = %e, "could not open tab");
                    }
                }
            }
            FrameMessage::Notify { text, level } => self.shared.notifier.notify(&text, level),
            FrameMessage::StoreCustomSelectors { host, selectors } => {
                self.update_settings(|s| {
                    s.custom_selectors.insert(host.clone(), selectors.clone());
                });
                self.refresh_host(&host, tab, frame).await;
            }
            FrameMessage::Unloaded => self.frame_unloaded(tab, frame).await,
        }
    }

    // ------------------------------------------------------------------
    // Broadcasts
    // ------------------------------------------------------------------

    async fn full_refresh(&self, handle: &ContextHandle) -> Result<(), ChannelError> {
        let settings = self.settings();
        let request = ContextRequest::FullHintsRefresh {
            enabled: settings.hints_enabled_for(handle.tab),
            selectors: settings.selectors_for(&handle.host),
        };
        handle.request(request, settings.reply_timeout()).await.map(|_| ())
    }

    /// Full refresh of every frame in every tab, e.g. after a settings change.
    pub async fn refresh_all(&self) {
        for handle in self.all_frames() {
            if let Err(e) = self.full_refresh(&handle).await {
                debug!(tab = handle.tab, frame = handle.frame, error = %e, "refresh skipped");
            }
        }
    }

    /// Refresh the other frames showing `host` after its selectors changed.
    async fn refresh_host(&self, host: &str, origin_tab: TabId, origin_frame: FrameId) {
        for handle in self.all_frames() {
            if handle.host != host || (handle.tab == origin_tab && handle.frame == origin_frame) {
                continue;
            }
            if let Err(e) = self.full_refresh(&handle).await {
                debug!(tab = handle.tab, frame = handle.frame, error = %e, "refresh skipped");
            }
        }
    }

    /// Send `request` to every frame of `tab`; frames that fail are skipped.
    pub async fn broadcast(&self, tab: TabId, request: ContextRequest) -> Vec<(FrameId, ContextReply)> {
        let timeout = self.reply_timeout();
        let mut replies = Vec::new();
        for handle in self.frames_of(tab) {
            match handle.request(request.clone(), timeout).await {
                Ok(reply) => replies.push((handle.frame, reply)),
                Err(e) => debug!(tab, frame = handle.frame, error = %e, "broadcast request failed"),
            }
        }
        replies
    }

    pub async fn mark_hints_keyboard_reachable(&self, tab: TabId, letter: char) {
        self.broadcast(tab, ContextRequest::MarkKeyboardReachable { letter }).await;
    }

    pub async fn restore_keyboard_reachable(&self, tab: TabId) {
        self.broadcast(tab, ContextRequest::RestoreKeyboardReachable).await;
    }

    /// Have every frame of `tab` fetch a fresh copy of the tab stack.
    pub async fn refresh_pool_snapshots(&self, tab: TabId) {
        self.broadcast(tab, ContextRequest::RefreshPoolSnapshot).await;
    }

    /// Labels displayed in each frame of the tab.
    pub async fn labels_in_use(&self, tab: TabId) -> BTreeMap<FrameId, Vec<HintLabel>> {
        self.broadcast(tab, ContextRequest::GetLabelsInUse)
            .await
            .into_iter()
            .filter_map(|(frame, reply)| match reply {
                ContextReply::Labels(labels) => Some((frame, labels)),
                _ => None,
            })
            .collect()
    }

    /// Wait until every frame is idle: no claim in flight and the tab stack
    /// agrees with what each frame displays. False if that does not happen
    /// within `timeout`.
    pub async fn settle(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.is_settled().await {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                warn!("frames did not settle in time");
                return false;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    async fn is_settled(&self) -> bool {
        let timeout = self.reply_timeout();
        for handle in self.all_frames() {
            let status = match handle.request(ContextRequest::GetStatus, timeout).await {
                Ok(ContextReply::Status(status)) => status,
                // A closed frame stays registered until its unload message
                // has returned its labels.
                _ => return false,
            };
            if status.pending_claims > 0 || status.snapshot_pending {
                return false;
            }
            let state = self.tab_state(handle.tab);
            let owned = state.lock().await.pool.assigned_to(handle.frame);
            if owned != status.labels {
                return false;
            }
        }
        true
    }

    /// Close and forget one frame; its labels return to the tab stack once
    /// the frame reports it has unloaded.
    pub fn close_frame(&self, tab: TabId, frame: FrameId) -> Result<(), ChannelError> {
        let handle = self.frame(tab, frame).ok_or(ChannelError::NoFrames(tab))?;
        handle.shutdown()
    }
}
