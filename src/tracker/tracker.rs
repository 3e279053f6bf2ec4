use tracing::{debug, trace};

use crate::dom::classify::{clickable_kind, has_text_node_children};
use crate::dom::document::{Document, MutationRecord, NodeId};
use crate::dom::selector::SelectorFilter;
use crate::registry::registry::WrapperRegistry;
use crate::tracker::events::{EventQueue, TrackerEvent};
use crate::tracker::intersection::IntersectionObserver;

/// Elements carrying this id prefix belong to the hint overlay itself.
pub const OVERLAY_ID_PREFIX: &str = "hints-overlay";

/// Clickable, text-bearing, or pulled in by a custom include selector.
pub fn is_candidate(doc: &Document, node: NodeId, filter: &SelectorFilter) -> bool {
    clickable_kind(doc, node).is_clickable()
        || has_text_node_children(doc, node)
        || filter.is_included(doc, node)
}

fn is_overlay(doc: &Document, node: NodeId) -> bool {
    doc.element(node)
        .ok()
        .and_then(|el| el.attr("id"))
        .is_some_and(|id| id.starts_with(OVERLAY_ID_PREFIX))
}

/// Watches one document for membership, attribute and viewport changes and
/// keeps the wrapper registry current.
///
/// Removed nodes are deliberately not swept: their wrappers stay until a
/// resolution finds them detached or the registry deletes them explicitly.
#[derive(Debug)]
pub struct VisibilityTracker {
    intersection: IntersectionObserver,
    events: EventQueue,
    started: bool,
}

impl Default for VisibilityTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl VisibilityTracker {
    pub fn new() -> Self {
        let mut events = EventQueue::new();
        events.subscribe_all();
        VisibilityTracker {
            intersection: IntersectionObserver::new(),
            events,
            started: false,
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn events_mut(&mut self) -> &mut EventQueue {
        &mut self.events
    }

    pub fn is_observing(&self, node: NodeId) -> bool {
        self.intersection.is_observing(node)
    }

    /// Document-ready: register everything under the root once.
    pub fn start(&mut self, doc: &Document, registry: &mut WrapperRegistry, filter: &SelectorFilter) {
        self.started = true;
        let registered = self.observe_subtree(doc, doc.root(), registry, filter);
        debug!(registered, "tracker started");
        self.events.push(TrackerEvent::RefreshRequested);
    }

    /// Forget every observation; `start` must run again to track anything.
    pub fn stop(&mut self) {
        self.intersection.disconnect();
        self.events.drain();
        self.started = false;
    }

    pub fn unobserve(&mut self, nodes: &[NodeId]) {
        for node in nodes {
            self.intersection.unobserve(*node);
        }
    }

    /// Register `root` and every candidate below it. Returns how many
    /// elements were registered.
    pub fn observe_subtree(
        &mut self,
        doc: &Document,
        root: NodeId,
        registry: &mut WrapperRegistry,
        filter: &SelectorFilter,
    ) -> usize {
        let mut registered = 0;
        for node in std::iter::once(root).chain(doc.descendants(root)) {
            if is_overlay(doc, node) || !is_candidate(doc, node, filter) {
                continue;
            }
            registry.upsert(doc, node, filter);
            self.intersection.observe(node);
            self.events.push(TrackerEvent::Registered(node));
            registered += 1;
        }
        registered
    }

    /// Mutation-observer callback for one batch of records.
    pub fn on_mutations(
        &mut self,
        doc: &Document,
        records: &[MutationRecord],
        registry: &mut WrapperRegistry,
        filter: &SelectorFilter,
    ) {
        if !self.started {
            return;
        }

        let mut changed = false;
        for record in records {
            match record {
                MutationRecord::ChildList { added, .. } => {
                    for node in added {
                        if doc.is_connected(*node) && !is_overlay(doc, *node) {
                            changed |= self.observe_subtree(doc, *node, registry, filter) > 0;
                        }
                    }
                }
                MutationRecord::Attributes { target, name } => {
                    trace!(node = ?target, attribute = %name, "attribute mutation");
                    changed |= self.on_attribute_mutation(doc, *target, registry, filter);
                }
            }
        }

        if changed {
            self.events.push(TrackerEvent::RefreshRequested);
        }
    }

    fn on_attribute_mutation(
        &mut self,
        doc: &Document,
        target: NodeId,
        registry: &mut WrapperRegistry,
        filter: &SelectorFilter,
    ) -> bool {
        let mut changed = false;

        if registry.contains(target) {
            registry.upsert(doc, target, filter);
            self.events.push(TrackerEvent::AttributesChanged(target));
            changed = true;
        } else if doc.is_connected(target) && is_candidate(doc, target, filter) {
            registry.upsert(doc, target, filter);
            self.intersection.observe(target);
            self.events.push(TrackerEvent::Registered(target));
            changed = true;
        }

        // Inherited style can change the visibility of the whole subtree.
        for descendant in doc.descendants(target) {
            if let Some(wrapper) = registry.get_mut(descendant) {
                wrapper.refresh_visibility(doc);
                self.events.push(TrackerEvent::AttributesChanged(descendant));
                changed = true;
            }
        }

        changed
    }

    /// Animation-frame callback: apply the batch of intersection changes and
    /// request a single refresh for the whole batch.
    pub fn on_animation_frame(&mut self, doc: &Document, registry: &mut WrapperRegistry) {
        if !self.started {
            return;
        }

        let entries = self.intersection.take_records(doc);
        if entries.is_empty() {
            return;
        }

        for entry in &entries {
            if let Some(wrapper) = registry.get_mut(entry.node) {
                wrapper.is_intersecting_viewport = entry.is_intersecting;
                wrapper.refresh_visibility(doc);
            }
            self.events.push(TrackerEvent::IntersectionChanged {
                node: entry.node,
                intersecting: entry.is_intersecting,
            });
        }
        trace!(changed = entries.len(), "intersection batch");
        self.events.push(TrackerEvent::RefreshRequested);
    }
}
