use serde::{Deserialize, Serialize};

use crate::dom::document::{Display, Document, NodeId, Visibility};

/// Why an element counts as clickable, if it does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClickableKind {
    Button,
    Link,
    Input,
    Summary,
    AriaRole,
    OnclickHandler,
    None,
}

impl ClickableKind {
    pub fn is_clickable(self) -> bool {
        self != ClickableKind::None
    }
}

const CLICKABLE_ROLES: [&str; 4] = ["button", "link", "treeitem", "tab"];

pub const MIN_OPACITY: f64 = 0.1;
pub const MIN_BOX_EXTENT: f64 = 10.0;

pub fn clickable_kind(doc: &Document, node: NodeId) -> ClickableKind {
    let Ok(el) = doc.element(node) else {
        return ClickableKind::None;
    };

    match el.tag.as_str() {
        "button" => return ClickableKind::Button,
        "a" => return ClickableKind::Link,
        "summary" => return ClickableKind::Summary,
        "input" | "textarea" | "select" => {
            if el.attr("type") != Some("hidden") {
                return ClickableKind::Input;
            }
        }
        _ => {}
    }

    if el.attr("role").is_some_and(|r| CLICKABLE_ROLES.contains(&r)) {
        return ClickableKind::AriaRole;
    }

    if el.has_onclick {
        return ClickableKind::OnclickHandler;
    }

    ClickableKind::None
}

/// Layout visibility at this instant. `display:none` anywhere up the chain
/// hides the box, `visibility` inherits unless overridden, and opacity
/// multiplies down the tree.
pub fn is_visible(doc: &Document, node: NodeId) -> bool {
    let Ok(el) = doc.element(node) else {
        return false;
    };

    let chain: Vec<NodeId> = std::iter::once(node).chain(doc.ancestors(node)).collect();

    let mut visibility = Visibility::Inherit;
    let mut opacity = 1.0;
    for id in &chain {
        let Ok(style) = doc.element(*id).map(|e| &e.style) else {
            continue;
        };
        if style.display == Display::None {
            return false;
        }
        if visibility == Visibility::Inherit {
            visibility = style.visibility;
        }
        opacity *= style.opacity;
    }

    visibility != Visibility::Hidden
        && opacity > MIN_OPACITY
        && el.rect.width + el.rect.height > MIN_BOX_EXTENT
}

pub fn has_text_node_children(doc: &Document, node: NodeId) -> bool {
    doc.element(node)
        .map(|el| el.text.iter().any(|t| !t.trim().is_empty()))
        .unwrap_or(false)
}

pub fn is_editable(doc: &Document, node: NodeId) -> bool {
    let Ok(el) = doc.element(node) else {
        return false;
    };

    match el.tag.as_str() {
        "textarea" => true,
        "input" => matches!(
            el.attr("type"),
            None | Some("text")
                | Some("email")
                | Some("password")
                | Some("search")
                | Some("number")
                | Some("tel")
                | Some("url")
        ),
        _ => el.attr("contenteditable").is_some_and(|v| v != "false"),
    }
}

pub fn is_focusable(doc: &Document, node: NodeId) -> bool {
    let Ok(el) = doc.element(node) else {
        return false;
    };

    if el.attr("disabled").is_some() {
        return false;
    }

    matches!(el.tag.as_str(), "input" | "textarea" | "select" | "button")
        || (el.tag == "a" && el.attr("href").is_some())
        || el.attr("tabindex").is_some()
        || is_editable(doc, node)
}

pub fn href(doc: &Document, node: NodeId) -> Option<String> {
    doc.element(node)
        .ok()
        .filter(|el| el.tag == "a")
        .and_then(|el| el.attr("href"))
        .map(str::to_string)
}
