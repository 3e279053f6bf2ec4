use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::config::{CustomSelectors, Settings};
use crate::context::messages::{
    ContextEvent, ContextReply, ContextRequest, ContextStatus, CorrelationId, FrameEnvelope, FrameId,
    FrameMessage, NotifyLevel, TabId,
};
use crate::dispatch::action::{ActionRequest, ActionResult};
use crate::dispatch::effects::{self, EffectEnv, SideEffect};
use crate::dispatch::resolve::{resolve_targets, select_targets, unresolved_result};
use crate::dispatch::scroll::ScrollContainerCache;
use crate::dom::document::{Document, NodeId};
use crate::dom::selector::SelectorFilter;
use crate::hints::allocator::{ClaimPhase, HintAllocator};
use crate::hints::label::HintLabel;
use crate::hints::pool::HintPoolSnapshot;
use crate::registry::registry::{Removal, WrapperRegistry};
use crate::tracker::events::TrackerEvent;
use crate::tracker::tracker::VisibilityTracker;

/// One frame's execution environment.
///
/// Owns the document and every per-document component. All work happens in
/// discrete turns on the context's own queue, so nothing here is shared or
/// locked. The only way out is the coordinator channel, and every reply
/// comes back in as another event.
pub struct DocumentContext {
    tab: TabId,
    frame: FrameId,
    doc: Document,
    tracker: VisibilityTracker,
    registry: WrapperRegistry,
    allocator: HintAllocator,
    selectors: CustomSelectors,
    filter: SelectorFilter,
    scroll_cache: ScrollContainerCache,
    hints_enabled: bool,
    scroll_factor: f64,
    reply_timeout: Duration,
    coordinator: mpsc::UnboundedSender<FrameEnvelope>,
    snapshot_request: Option<CorrelationId>,
    next_snapshot: u64,
    last_pool_snapshot: Option<HintPoolSnapshot>,
}

impl DocumentContext {
    pub fn new(
        tab: TabId,
        frame: FrameId,
        doc: Document,
        settings: &Settings,
        coordinator: mpsc::UnboundedSender<FrameEnvelope>,
    ) -> Self {
        let selectors = settings.selectors_for(doc.host());
        let filter = SelectorFilter::compile(&selectors);
        DocumentContext {
            tab,
            frame,
            doc,
            tracker: VisibilityTracker::new(),
            registry: WrapperRegistry::new(),
            allocator: HintAllocator::new(),
            selectors,
            filter,
            scroll_cache: ScrollContainerCache::new(),
            hints_enabled: settings.hints_enabled_for(tab),
            scroll_factor: settings.scroll_factor,
            reply_timeout: settings.reply_timeout(),
            coordinator,
            snapshot_request: None,
            next_snapshot: 0,
            last_pool_snapshot: None,
        }
    }

    pub fn tab(&self) -> TabId {
        self.tab
    }

    pub fn frame(&self) -> FrameId {
        self.frame
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn registry(&self) -> &WrapperRegistry {
        &self.registry
    }

    pub fn allocator(&self) -> &HintAllocator {
        &self.allocator
    }

    pub fn hints_enabled(&self) -> bool {
        self.hints_enabled
    }

    pub fn selectors(&self) -> &CustomSelectors {
        &self.selectors
    }

    pub fn last_pool_snapshot(&self) -> Option<&HintPoolSnapshot> {
        self.last_pool_snapshot.as_ref()
    }

    /// Node of the element carrying `id`, for tests and scenarios.
    pub fn node_by_id(&self, id: &str) -> Option<NodeId> {
        self.doc.find_by_id(id)
    }

    pub fn label_of_id(&self, id: &str) -> Option<&HintLabel> {
        self.node_by_id(id).and_then(|n| self.registry.label_of(n))
    }

    fn send(&self, message: FrameMessage) {
        trace!(tab = self.tab, frame = self.frame, ?message, "to coordinator");
        let envelope = FrameEnvelope {
            tab: self.tab,
            frame: self.frame,
            message,
        };
        if self.coordinator.send(envelope).is_err() {
            warn!(tab = self.tab, frame = self.frame, "coordinator channel closed");
        }
    }

    fn release(&self, labels: Vec<HintLabel>) {
        if labels.is_empty() {
            return;
        }
        debug!(tab = self.tab, frame = self.frame, count = labels.len(), "releasing hints");
        self.send(FrameMessage::ReleaseHints { labels });
    }

    fn forget(&mut self, removal: Removal) {
        self.tracker.unobserve(&removal.nodes);
        self.release(removal.labels);
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Document-ready.
    pub fn start(&mut self) {
        info!(tab = self.tab, frame = self.frame, url = self.doc.url(), "document context started");
        self.send(FrameMessage::InitStack);
        // Records from building the page are covered by the initial scan.
        self.doc.take_records();
        self.tracker.start(&self.doc, &mut self.registry, &self.filter);
        self.animation_frame();
        self.pump_events();
    }

    /// Feed pending mutation records to the tracker.
    pub fn process_mutations(&mut self) {
        let records = self.doc.take_records();
        if records.is_empty() {
            return;
        }
        self.scroll_cache.clear();
        self.tracker.on_mutations(&self.doc, &records, &mut self.registry, &self.filter);
        self.pump_events();
    }

    /// Run the intersection observer for this frame.
    pub fn animation_frame(&mut self) {
        self.tracker.on_animation_frame(&self.doc, &mut self.registry);
        self.pump_events();
    }

    fn pump_events(&mut self) {
        let mut refresh = false;
        while let Some(event) = self.tracker.events_mut().pop() {
            match event {
                TrackerEvent::RefreshRequested => refresh = true,
                other => trace!(frame = self.frame, event = ?other, "tracker event"),
            }
        }
        if refresh {
            self.refresh_hints();
        }
    }

    /// Apply a host page change, then let the observers see it.
    pub fn mutate<F>(&mut self, change: F)
    where
        F: FnOnce(&mut Document),
    {
        change(&mut self.doc);
        self.process_mutations();
        self.animation_frame();
    }

    // ------------------------------------------------------------------
    // Allocation
    // ------------------------------------------------------------------

    /// Reconcile labels with the current candidate set: drop labels of
    /// elements that can no longer show one and claim for those that want one.
    pub fn refresh_hints(&mut self) {
        if !self.hints_enabled {
            return;
        }
        self.allocator.expire(self.reply_timeout);

        let stale: Vec<NodeId> = self
            .registry
            .wrappers()
            .filter(|w| w.hint.is_some() && (!w.is_hintable() || !w.is_visible))
            .map(|w| w.node)
            .collect();
        let released: Vec<HintLabel> = stale.into_iter().filter_map(|n| self.registry.release_hint(n)).collect();
        self.release(released);

        if let Some((correlation, amount)) = self.allocator.plan_claim(&self.registry) {
            self.send(FrameMessage::ClaimHints { correlation, amount });
        }
    }

    /// Continuation of a claim or sibling reclaim round trip.
    pub fn handle_claim_reply(&mut self, correlation: CorrelationId, labels: Vec<HintLabel>) {
        let Some(claim) = self.allocator.complete(correlation) else {
            debug!(correlation = correlation.0, count = labels.len(), "reply for unknown claim, returning labels");
            self.release(labels);
            return;
        };
        if !self.hints_enabled {
            self.release(labels);
            return;
        }

        let outcome = HintAllocator::bind(&mut self.registry, &self.doc, &claim.nodes, labels);
        debug!(
            correlation = correlation.0,
            bound = outcome.bound.len(),
            leftover = outcome.leftover.len(),
            unserved = outcome.unserved.len(),
            "claim reply bound"
        );
        self.release(outcome.leftover);

        if outcome.unserved.is_empty() {
            return;
        }
        match claim.phase {
            ClaimPhase::Stack => {
                let reclaimed = self.registry.reclaim(outcome.unserved.len());
                let local = HintAllocator::bind(&mut self.registry, &self.doc, &outcome.unserved, reclaimed);
                self.release(local.leftover);
                if !local.unserved.is_empty() {
                    let (correlation, amount) = self.allocator.open(ClaimPhase::Siblings, local.unserved);
                    self.send(FrameMessage::ReclaimFromOthers { correlation, amount });
                }
            }
            ClaimPhase::Siblings => {
                debug!(unlabeled = outcome.unserved.len(), "hint alphabet exhausted");
            }
        }
    }

    /// A sibling ran dry; give up off-screen labels. The coordinator moves
    /// ownership, so nothing is released here.
    pub fn reclaim_for_sibling(&mut self, amount: usize) -> Vec<HintLabel> {
        let labels = self.registry.reclaim(amount);
        debug!(frame = self.frame, requested = amount, given = labels.len(), "reclaimed for sibling");
        labels
    }

    /// Explicitly delete a tracked element and everything under it.
    pub fn delete_element(&mut self, node: NodeId) {
        let removal = self.registry.remove(&self.doc, node);
        self.forget(removal);
    }

    /// Drop every wrapper and return every label. Safe to call repeatedly.
    pub fn clear_all(&mut self) {
        let removal = self.registry.clear_all();
        self.allocator.reset();
        self.forget(removal);
    }

    /// Re-derive everything under new settings, starting from no labels.
    pub fn full_refresh(&mut self, enabled: bool, selectors: CustomSelectors) {
        self.hints_enabled = enabled;
        self.selectors = selectors;
        self.filter = SelectorFilter::compile(&self.selectors);
        self.allocator.reset();

        let nodes = self.registry.nodes();
        let released: Vec<HintLabel> = nodes.iter().filter_map(|n| self.registry.release_hint(*n)).collect();
        // One batch: the stack puts it back in alphabet order.
        self.release(released);
        for node in nodes {
            if self.doc.is_connected(node) {
                self.registry.upsert(&self.doc, node, &self.filter);
            }
        }
        if self.tracker.is_started() {
            let root = self.doc.root();
            self.tracker.observe_subtree(&self.doc, root, &mut self.registry, &self.filter);
        }

        info!(tab = self.tab, frame = self.frame, enabled, "full hints refresh");
        self.animation_frame();
        self.refresh_hints();
    }

    pub fn request_pool_snapshot(&mut self) -> CorrelationId {
        self.next_snapshot += 1;
        let correlation = CorrelationId(self.next_snapshot);
        self.snapshot_request = Some(correlation);
        self.send(FrameMessage::GetPoolSnapshot { correlation });
        correlation
    }

    /// Only the reply to the latest request is kept.
    pub fn handle_pool_snapshot(&mut self, correlation: CorrelationId, snapshot: HintPoolSnapshot) {
        if self.snapshot_request == Some(correlation) {
            self.snapshot_request = None;
            self.last_pool_snapshot = Some(snapshot);
        } else {
            debug!(frame = self.frame, correlation = correlation.0, "stale pool snapshot ignored");
        }
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    /// Resolve and execute one action. Never fails: misses and faults
    /// become "no action" (or the typed fallback).
    pub fn dispatch_action(&mut self, request: &ActionRequest) -> ActionResult {
        if request.kind.is_background() {
            return ActionResult::NoAction;
        }

        let nodes = if request.kind.is_untargeted_content() {
            Vec::new()
        } else {
            let labels = request.labels();
            let resolved = resolve_targets(&mut self.registry, &self.doc, &labels);
            let reaped = self.registry.take_reaped();
            self.forget(reaped);
            if resolved.is_empty() {
                return unresolved_result(request);
            }
            select_targets(request.kind, resolved)
        };

        let env = EffectEnv {
            scroll_cache: &mut self.scroll_cache,
            scroll_factor: self.scroll_factor,
        };
        let result = match effects::execute(&mut self.doc, env, request, &nodes) {
            Ok(effect) => {
                for side_effect in effect.side_effects {
                    self.apply_side_effect(side_effect);
                }
                effect.result
            }
            Err(e) => {
                warn!(tab = self.tab, frame = self.frame, kind = ?request.kind, error = %e, "action failed");
                self.send(FrameMessage::Notify {
                    text: e.to_string(),
                    level: NotifyLevel::Error,
                });
                ActionResult::NoAction
            }
        };

        self.process_mutations();
        self.animation_frame();
        result
    }

    fn apply_side_effect(&mut self, side_effect: SideEffect) {
        match side_effect {
            SideEffect::OpenTabs { urls, active } => self.send(FrameMessage::OpenTabs { urls, active }),
            SideEffect::Notify { text, level } => self.send(FrameMessage::Notify { text, level }),
            SideEffect::IncludeSelectors(added) => {
                let mut selectors = self.selectors.clone();
                for selector in added {
                    selectors.exclude.retain(|s| *s != selector);
                    if !selectors.include.contains(&selector) {
                        selectors.include.push(selector);
                    }
                }
                self.store_selectors(selectors);
            }
            SideEffect::ExcludeSelectors(added) => {
                let mut selectors = self.selectors.clone();
                for selector in added {
                    selectors.include.retain(|s| *s != selector);
                    if !selectors.exclude.contains(&selector) {
                        selectors.exclude.push(selector);
                    }
                }
                self.store_selectors(selectors);
            }
        }
    }

    fn store_selectors(&mut self, selectors: CustomSelectors) {
        self.send(FrameMessage::StoreCustomSelectors {
            host: self.doc.host().to_string(),
            selectors: selectors.clone(),
        });
        self.full_refresh(self.hints_enabled, selectors);
    }

    // ------------------------------------------------------------------
    // Event loop
    // ------------------------------------------------------------------

    pub fn handle_request(&mut self, request: ContextRequest) -> ContextReply {
        match request {
            ContextRequest::Action(action) => ContextReply::Action(self.dispatch_action(&action)),
            ContextRequest::ReclaimHints { amount } => ContextReply::Labels(self.reclaim_for_sibling(amount)),
            ContextRequest::FullHintsRefresh { enabled, selectors } => {
                self.full_refresh(enabled, selectors);
                ContextReply::Done
            }
            ContextRequest::MarkKeyboardReachable { letter } => {
                let marked = self.registry.mark_keyboard_reachable(letter);
                trace!(frame = self.frame, %letter, marked, "marked keyboard reachable");
                ContextReply::Done
            }
            ContextRequest::RestoreKeyboardReachable => {
                self.registry.restore_keyboard_reachable();
                ContextReply::Done
            }
            ContextRequest::CheckDocumentFocus => ContextReply::Focus(self.doc.has_focus()),
            ContextRequest::GetLabelsInUse => ContextReply::Labels(self.registry.labels()),
            ContextRequest::RefreshPoolSnapshot => {
                self.request_pool_snapshot();
                ContextReply::Done
            }
            ContextRequest::GetStatus => ContextReply::Status(self.status()),
        }
    }

    pub fn status(&self) -> ContextStatus {
        ContextStatus {
            labels: self.registry.labels(),
            pending_claims: self.allocator.pending_len(),
            tracked: self.registry.len(),
            keyboard_reachable: self.registry.wrappers().filter(|w| w.keyboard_reachable).count(),
            snapshot_pending: self.snapshot_request.is_some(),
            pool_snapshot: self.last_pool_snapshot.clone(),
        }
    }

    /// Process one queued event. Returns false once the context has shut down.
    pub fn handle_event(&mut self, event: ContextEvent) -> bool {
        match event {
            ContextEvent::Request { request, reply } => {
                let answer = self.handle_request(request);
                if reply.send(answer).is_err() {
                    debug!(frame = self.frame, "requester went away before the reply");
                }
            }
            ContextEvent::ClaimReply { correlation, labels } => self.handle_claim_reply(correlation, labels),
            ContextEvent::PoolSnapshot { correlation, snapshot } => self.handle_pool_snapshot(correlation, snapshot),
            ContextEvent::Host(change) => self.mutate(change),
            ContextEvent::Shutdown => {
                self.unload();
                return false;
            }
        }
        true
    }

    fn unload(&mut self) {
        self.clear_all();
        self.tracker.stop();
        self.send(FrameMessage::Unloaded);
        info!(tab = self.tab, frame = self.frame, "document context unloaded");
    }

    /// Start the document and serve events until shutdown or until every
    /// sender is gone.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<ContextEvent>) {
        self.start();
        while let Some(event) = events.recv().await {
            if !self.handle_event(event) {
                return;
            }
        }
        self.unload();
    }
}
