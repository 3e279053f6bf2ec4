use tracing::debug;

use crate::dispatch::action::{ActionKind, ActionRequest, ActionResult, TargetMode};
use crate::dom::document::{Document, NodeId};
use crate::hints::label::HintLabel;
use crate::registry::registry::WrapperRegistry;

/// Resolve labels to the elements they name, in label order. Labels that no
/// longer map to a live wrapper, and wrappers that are off screen, are
/// dropped without complaint.
pub fn resolve_targets(registry: &mut WrapperRegistry, doc: &Document, labels: &[HintLabel]) -> Vec<NodeId> {
    let nodes: Vec<NodeId> = registry
        .get_by_labels(doc, labels)
        .into_iter()
        .filter(|w| w.is_intersecting_viewport)
        .map(|w| w.node)
        .collect();

    if nodes.len() < labels.len() {
        debug!(requested = labels.len(), resolved = nodes.len(), "some targets did not resolve");
    }
    nodes
}

/// Narrow the resolved set to what the action operates on.
pub fn select_targets(kind: ActionKind, nodes: Vec<NodeId>) -> Vec<NodeId> {
    match kind.target_mode() {
        TargetMode::First => nodes.into_iter().take(1).collect(),
        TargetMode::All => nodes,
    }
}

/// A single spoken letter that names nothing was probably meant as text.
pub fn is_typed_fallback(request: &ActionRequest) -> bool {
    let labels = request.labels();
    request.kind == ActionKind::DirectClickElement && labels.len() == 1 && labels[0].char_len() == 1
}

/// Reply for a request whose targets resolved to nothing.
pub fn unresolved_result(request: &ActionRequest) -> ActionResult {
    if is_typed_fallback(request) {
        ActionResult::type_target_characters()
    } else {
        ActionResult::NoAction
    }
}
