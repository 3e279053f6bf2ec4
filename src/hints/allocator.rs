use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::context::messages::CorrelationId;
use crate::dom::document::{Document, NodeId};
use crate::hints::label::HintLabel;
use crate::registry::registry::WrapperRegistry;

/// Where the labels for a pending claim are coming from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimPhase {
    /// The tab's free stack
    Stack,
    /// Off-screen labels of sibling frames
    Siblings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingClaim {
    pub phase: ClaimPhase,
    pub nodes: Vec<NodeId>,
    pub opened_at: Instant,
}

/// Result of binding a claim reply to the elements that asked for it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindOutcome {
    pub bound: Vec<(NodeId, HintLabel)>,
    /// Labels nobody could use; they must go back to the tab stack
    pub leftover: Vec<HintLabel>,
    /// Elements that still want a label after this reply
    pub unserved: Vec<NodeId>,
}

/// Per-context bookkeeping for claims in flight.
///
/// A claim is a round trip to the coordinating process; while it is out the
/// document keeps changing. Elements covered by an outstanding claim are not
/// asked for twice, and a reply is bound only to elements that still want a
/// label when it arrives.
#[derive(Debug, Default)]
pub struct HintAllocator {
    pending: HashMap<CorrelationId, PendingClaim>,
    awaiting: HashSet<NodeId>,
    next_correlation: u64,
}

impl HintAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a claim for every wrapper that wants a label and is not already
    /// covered. Returns the correlation id and amount to request.
    pub fn plan_claim(&mut self, registry: &WrapperRegistry) -> Option<(CorrelationId, usize)> {
        let mut nodes: Vec<NodeId> = registry
            .wrappers()
            .filter(|w| w.wants_hint() && !self.awaiting.contains(&w.node))
            .map(|w| w.node)
            .collect();
        if nodes.is_empty() {
            return None;
        }
        nodes.sort();
        Some(self.open(ClaimPhase::Stack, nodes))
    }

    /// Open a follow-up claim for elements a previous reply could not serve.
    pub fn open(&mut self, phase: ClaimPhase, nodes: Vec<NodeId>) -> (CorrelationId, usize) {
        self.next_correlation += 1;
        let correlation = CorrelationId(self.next_correlation);
        let amount = nodes.len();
        self.awaiting.extend(nodes.iter().copied());
        self.pending.insert(
            correlation,
            PendingClaim {
                phase,
                nodes,
                opened_at: Instant::now(),
            },
        );
        debug!(correlation = correlation.0, amount, ?phase, "claim opened");
        (correlation, amount)
    }

    /// Close a claim. Unknown ids (duplicate or very late replies) yield `None`.
    pub fn complete(&mut self, correlation: CorrelationId) -> Option<PendingClaim> {
        let claim = self.pending.remove(&correlation)?;
        for node in &claim.nodes {
            self.awaiting.remove(node);
        }
        Some(claim)
    }

    /// Bind `labels` to the claim's nodes that are still attached, still
    /// tracked and still without a label.
    pub fn bind(
        registry: &mut WrapperRegistry,
        doc: &Document,
        nodes: &[NodeId],
        labels: Vec<HintLabel>,
    ) -> BindOutcome {
        let mut outcome = BindOutcome::default();
        let mut labels = labels.into_iter();

        for node in nodes {
            let wants = doc.is_connected(*node) && registry.get(*node).is_some_and(|w| w.wants_hint());
            if !wants {
                continue;
            }
            match labels.next() {
                Some(label) => {
                    if registry.assign(*node, label.clone()) {
                        outcome.bound.push((*node, label));
                    } else {
                        outcome.leftover.push(label);
                    }
                }
                None => outcome.unserved.push(*node),
            }
        }

        outcome.leftover.extend(labels);
        outcome
    }

    /// Give up on claims older than `timeout`. Their nodes become eligible
    /// again and a reply that still arrives is treated as unknown.
    pub fn expire(&mut self, timeout: Duration) -> Vec<CorrelationId> {
        let expired: Vec<CorrelationId> = self
            .pending
            .iter()
            .filter(|(_, claim)| claim.opened_at.elapsed() >= timeout)
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            self.complete(*id);
        }
        if !expired.is_empty() {
            debug!(expired = expired.len(), "claims timed out");
        }
        expired
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_awaiting(&self, node: NodeId) -> bool {
        self.awaiting.contains(&node)
    }

    /// Forget every claim in flight; their replies will be treated as unknown.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.awaiting.clear();
    }
}
