use std::collections::HashMap;

use tracing::{debug, trace};

use crate::dom::document::{Document, NodeId};
use crate::dom::selector::SelectorFilter;
use crate::hints::label::HintLabel;
use crate::registry::wrapper::ElementWrapper;

/// What a removal took out of the registry: the wrappers deleted and the
/// labels that must go back to the pool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Removal {
    pub nodes: Vec<NodeId>,
    pub labels: Vec<HintLabel>,
}

impl Removal {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.labels.is_empty()
    }

    pub fn merge(&mut self, other: Removal) {
        self.nodes.extend(other.nodes);
        self.labels.extend(other.labels);
    }
}

/// Element -> wrapper, plus label -> element for O(1) resolution of labels
/// named by the controller.
///
/// Every key of `hinted` points at a wrapper whose `hint` equals that key.
/// Only `assign`, `release_hint` and the removal paths mutate either map.
#[derive(Debug, Default)]
pub struct WrapperRegistry {
    all: HashMap<NodeId, ElementWrapper>,
    hinted: HashMap<HintLabel, NodeId>,
    next_seq: u64,
    reaped: Removal,
}

impl WrapperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the wrapper or re-derive an existing one.
    pub fn upsert(&mut self, doc: &Document, node: NodeId, filter: &SelectorFilter) -> &mut ElementWrapper {
        self.all
            .entry(node)
            .and_modify(|w| w.refresh(doc, filter))
            .or_insert_with(|| ElementWrapper::new(doc, node, filter))
    }

    pub fn get(&self, node: NodeId) -> Option<&ElementWrapper> {
        self.all.get(&node)
    }

    pub fn get_mut(&mut self, node: NodeId) -> Option<&mut ElementWrapper> {
        self.all.get_mut(&node)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.all.contains_key(&node)
    }

    /// Resolve one label. A wrapper whose element has since left the
    /// document is reaped here and never returned.
    pub fn get_by_label(&mut self, doc: &Document, label: &HintLabel) -> Option<&ElementWrapper> {
        let node = *self.hinted.get(label)?;
        if !doc.is_connected(node) {
            self.reap(doc, node);
            return None;
        }
        self.all.get(&node)
    }

    /// Resolve labels in order, silently dropping the ones that do not map
    /// to a live wrapper.
    pub fn get_by_labels(&mut self, doc: &Document, labels: &[HintLabel]) -> Vec<&ElementWrapper> {
        for label in labels {
            if let Some(node) = self.hinted.get(label).copied() {
                if !doc.is_connected(node) {
                    self.reap(doc, node);
                }
            }
        }

        labels
            .iter()
            .filter_map(|l| self.hinted.get(l))
            .filter_map(|node| self.all.get(node))
            .collect()
    }

    /// Tracked wrappers whose element is `container` or inside it, in node order.
    pub fn get_within(&self, doc: &Document, container: NodeId) -> Vec<&ElementWrapper> {
        let mut out: Vec<&ElementWrapper> = self
            .all
            .values()
            .filter(|w| doc.contains(container, w.node))
            .collect();
        out.sort_by_key(|w| w.node);
        out
    }

    pub fn wrappers(&self) -> impl Iterator<Item = &ElementWrapper> {
        self.all.values()
    }

    pub fn nodes(&self) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = self.all.keys().copied().collect();
        nodes.sort();
        nodes
    }

    /// Bind `label` to the wrapper for `node`. Refuses (returns false) if the
    /// label is already bound, the wrapper is missing, or it already has one.
    pub fn assign(&mut self, node: NodeId, label: HintLabel) -> bool {
        if self.hinted.contains_key(&label) {
            return false;
        }
        let Some(wrapper) = self.all.get_mut(&node) else {
            return false;
        };
        if wrapper.hint.is_some() {
            return false;
        }

        self.next_seq += 1;
        wrapper.hint = Some(label.clone());
        wrapper.hint_seq = self.next_seq;
        trace!(%label, ?node, "hint assigned");
        self.hinted.insert(label, node);
        true
    }

    /// Unbind whatever label `node` holds.
    pub fn release_hint(&mut self, node: NodeId) -> Option<HintLabel> {
        let wrapper = self.all.get_mut(&node)?;
        let label = wrapper.hint.take()?;
        wrapper.keyboard_reachable = false;
        self.hinted.remove(&label);
        Some(label)
    }

    /// Delete `node` and every tracked descendant, releasing their labels.
    pub fn remove(&mut self, doc: &Document, node: NodeId) -> Removal {
        let mut removal = Removal::default();
        for id in std::iter::once(node).chain(doc.descendants(node)) {
            if let Some(label) = self.release_hint(id) {
                removal.labels.push(label);
            }
            if self.all.remove(&id).is_some() {
                removal.nodes.push(id);
            }
        }
        removal
    }

    fn reap(&mut self, doc: &Document, node: NodeId) {
        let removal = self.remove(doc, node);
        debug!(?node, labels = removal.labels.len(), "reaped detached wrapper");
        self.reaped.merge(removal);
    }

    /// Wrappers reaped lazily during resolution since the last call.
    pub fn take_reaped(&mut self) -> Removal {
        std::mem::take(&mut self.reaped)
    }

    /// Release every label and forget every wrapper.
    pub fn clear_all(&mut self) -> Removal {
        let mut labels: Vec<HintLabel> = self.hinted.keys().cloned().collect();
        labels.sort();
        let mut nodes: Vec<NodeId> = self.all.keys().copied().collect();
        nodes.sort();

        self.all.clear();
        self.hinted.clear();
        self.reaped = Removal::default();
        Removal { nodes, labels }
    }

    /// Force-release up to `amount` labels held by wrappers that are off
    /// screen, oldest assignment first. On-screen wrappers are never touched.
    pub fn reclaim(&mut self, amount: usize) -> Vec<HintLabel> {
        let mut candidates: Vec<(u64, NodeId)> = self
            .all
            .values()
            .filter(|w| w.hint.is_some() && !w.is_intersecting_viewport)
            .map(|w| (w.hint_seq, w.node))
            .collect();
        candidates.sort();

        candidates
            .into_iter()
            .take(amount)
            .filter_map(|(_, node)| self.release_hint(node))
            .collect()
    }

    /// Flag every hinted wrapper whose label starts with `letter`.
    pub fn mark_keyboard_reachable(&mut self, letter: char) -> usize {
        let mut marked = 0;
        for wrapper in self.all.values_mut() {
            if wrapper.hint.as_ref().is_some_and(|h| h.starts_with(letter)) {
                wrapper.keyboard_reachable = true;
                marked += 1;
            }
        }
        marked
    }

    pub fn restore_keyboard_reachable(&mut self) {
        for wrapper in self.all.values_mut() {
            wrapper.keyboard_reachable = false;
        }
    }

    pub fn label_of(&self, node: NodeId) -> Option<&HintLabel> {
        self.all.get(&node).and_then(|w| w.hint.as_ref())
    }

    /// Labels currently bound in this document, sorted.
    pub fn labels(&self) -> Vec<HintLabel> {
        let mut labels: Vec<HintLabel> = self.hinted.keys().cloned().collect();
        labels.sort();
        labels
    }

    pub fn hinted_len(&self) -> usize {
        self.hinted.len()
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    /// Both maps agree: each label key maps to a wrapper carrying that label,
    /// and each hinted wrapper is indexed under its label.
    pub fn is_consistent(&self) -> bool {
        let forward = self
            .hinted
            .iter()
            .all(|(label, node)| self.all.get(node).and_then(|w| w.hint.as_ref()) == Some(label));
        let backward = self
            .all
            .values()
            .filter_map(|w| w.hint.as_ref().map(|l| (l, w.node)))
            .all(|(label, node)| self.hinted.get(label) == Some(&node));
        forward && backward
    }
}
