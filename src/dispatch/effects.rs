use tracing::debug;

use crate::context::messages::NotifyLevel;
use crate::dispatch::action::{ActionKind, ActionRequest, ActionResult};
use crate::dispatch::scroll::{
    self, ScrollContainerCache, ScrollDirection, SnapPosition, DEFAULT_SCROLL_FACTOR,
};
use crate::dom::classify::{href, is_editable, is_focusable};
use crate::dom::document::{Caret, Document, NodeId};
use crate::dom::selector::selector_for;
use crate::error::EffectError;

/// Something an effect needs done outside the document.
#[derive(Debug, Clone, PartialEq)]
pub enum SideEffect {
    OpenTabs { urls: Vec<String>, active: bool },
    Notify { text: String, level: NotifyLevel },
    IncludeSelectors(Vec<String>),
    ExcludeSelectors(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Effect {
    pub result: ActionResult,
    pub side_effects: Vec<SideEffect>,
}

impl Effect {
    fn done() -> Self {
        Effect {
            result: ActionResult::Done,
            side_effects: Vec::new(),
        }
    }

    fn with_result(result: ActionResult) -> Self {
        Effect {
            result,
            side_effects: Vec::new(),
        }
    }

    fn with_side_effect(side_effect: SideEffect) -> Self {
        Effect {
            result: ActionResult::Done,
            side_effects: vec![side_effect],
        }
    }
}

/// Everything an effect may touch besides the document.
pub struct EffectEnv<'a> {
    pub scroll_cache: &'a mut ScrollContainerCache,
    /// Used when the request carries no factor of its own
    pub scroll_factor: f64,
}

/// Run `request` against already resolved and narrowed `nodes`. Untargeted
/// content actions ignore `nodes`.
pub fn execute(
    doc: &mut Document,
    env: EffectEnv<'_>,
    request: &ActionRequest,
    nodes: &[NodeId],
) -> Result<Effect, EffectError> {
    let factor = request
        .arg_number()
        .filter(|f| *f > 0.0)
        .unwrap_or(if env.scroll_factor > 0.0 { env.scroll_factor } else { DEFAULT_SCROLL_FACTOR });
    debug!(kind = ?request.kind, targets = nodes.len(), "executing action");

    match request.kind {
        ActionKind::ClickElement | ActionKind::DirectClickElement => {
            for node in nodes {
                doc.click(*node)?;
            }
            Ok(Effect::done())
        }

        ActionKind::FocusElement => {
            let node = nodes
                .iter()
                .find(|n| is_focusable(doc, **n))
                .ok_or(EffectError::NotFocusable)?;
            doc.focus(*node)?;
            Ok(Effect::done())
        }

        ActionKind::ShowLink => {
            let lines: Vec<String> = nodes
                .iter()
                .filter_map(|n| href(doc, *n).map(|h| (n, h)))
                .map(|(n, h)| {
                    let title = doc
                        .element(*n)
                        .ok()
                        .and_then(|el| el.attr("title"))
                        .map(str::to_string)
                        .unwrap_or_else(|| doc.text_content(*n));
                    format!("{title}\n{h}")
                })
                .collect();
            if lines.is_empty() {
                return Err(EffectError::NoLink);
            }
            Ok(Effect::with_side_effect(SideEffect::Notify {
                text: lines.join("\n\n"),
                level: NotifyLevel::Info,
            }))
        }

        ActionKind::OpenInNewTab | ActionKind::OpenInBackgroundTab => {
            let urls = links(doc, nodes)?;
            Ok(Effect::with_side_effect(SideEffect::OpenTabs {
                urls,
                active: request.kind == ActionKind::OpenInNewTab,
            }))
        }

        ActionKind::HoverElement => {
            doc.clear_hover();
            for node in nodes {
                doc.hover(*node)?;
            }
            Ok(Effect::done())
        }

        ActionKind::UnhoverAll => {
            doc.clear_hover();
            Ok(Effect::done())
        }

        ActionKind::CopyLink => {
            let urls = links(doc, nodes)?;
            Ok(Effect::with_result(ActionResult::CopyToClipboard(urls.join("\n"))))
        }

        ActionKind::CopyMarkdownLink => {
            let links: Vec<String> = nodes
                .iter()
                .filter_map(|n| href(doc, *n).map(|h| format!("[{}]({})", doc.text_content(*n), h)))
                .collect();
            if links.is_empty() {
                return Err(EffectError::NoLink);
            }
            Ok(Effect::with_result(ActionResult::CopyToClipboard(links.join("\n"))))
        }

        ActionKind::CopyElementTextContent => {
            let texts: Vec<String> = nodes.iter().map(|n| doc.text_content(*n).trim().to_string()).collect();
            Ok(Effect::with_result(ActionResult::CopyToClipboard(texts.join("\n"))))
        }

        ActionKind::InsertToField => {
            let text = request.arg_text().ok_or(EffectError::MissingArgument("text"))?;
            let fields: Vec<NodeId> = nodes.iter().copied().filter(|n| is_editable(doc, *n)).collect();
            let Some(first) = nodes.first() else {
                return Ok(Effect::with_result(ActionResult::NoAction));
            };
            if fields.is_empty() {
                return Err(EffectError::NotEditable(*first));
            }
            for field in &fields {
                doc.set_value(*field, text)?;
            }
            if let Some(last) = fields.last() {
                doc.focus(*last)?;
            }
            Ok(Effect::done())
        }

        ActionKind::SetSelectionBefore | ActionKind::SetSelectionAfter => {
            let Some(node) = nodes.first().copied() else {
                return Ok(Effect::with_result(ActionResult::NoAction));
            };
            let offset = if request.kind == ActionKind::SetSelectionBefore {
                0
            } else {
                match doc.value(node)? {
                    Some(value) => value.chars().count(),
                    None => doc.text_content(node).chars().count(),
                }
            };
            if is_focusable(doc, node) {
                doc.focus(node)?;
            }
            doc.set_selection(Caret { node, offset })?;
            Ok(Effect::done())
        }

        ActionKind::FocusAndDeleteContents => {
            let Some(node) = nodes.first().copied() else {
                return Ok(Effect::with_result(ActionResult::NoAction));
            };
            if !is_editable(doc, node) {
                return Err(EffectError::NotEditable(node));
            }
            doc.focus(node)?;
            doc.set_value(node, "")?;
            Ok(Effect::done())
        }

        ActionKind::ScrollUpAtElement
        | ActionKind::ScrollDownAtElement
        | ActionKind::ScrollLeftAtElement
        | ActionKind::ScrollRightAtElement => {
            let direction = match request.kind {
                ActionKind::ScrollUpAtElement => ScrollDirection::Up,
                ActionKind::ScrollDownAtElement => ScrollDirection::Down,
                ActionKind::ScrollLeftAtElement => ScrollDirection::Left,
                _ => ScrollDirection::Right,
            };
            if let Some(node) = nodes.first() {
                scroll::scroll_at(doc, env.scroll_cache, *node, direction, factor)?;
            }
            Ok(Effect::done())
        }

        ActionKind::ScrollUpPage | ActionKind::ScrollDownPage => {
            let direction = if request.kind == ActionKind::ScrollUpPage {
                ScrollDirection::Up
            } else {
                ScrollDirection::Down
            };
            let root = doc.root();
            scroll::scroll_container(doc, root, direction, factor)?;
            Ok(Effect::done())
        }

        ActionKind::ScrollElementToTop | ActionKind::ScrollElementToBottom | ActionKind::ScrollElementToCenter => {
            let position = match request.kind {
                ActionKind::ScrollElementToTop => SnapPosition::Top,
                ActionKind::ScrollElementToBottom => SnapPosition::Bottom,
                _ => SnapPosition::Center,
            };
            if let Some(node) = nodes.first() {
                scroll::snap_scroll(doc, env.scroll_cache, *node, position)?;
            }
            Ok(Effect::done())
        }

        ActionKind::IncludeExtraSelectors | ActionKind::ExcludeExtraSelectors => {
            let mut selectors = Vec::with_capacity(nodes.len());
            for node in nodes {
                let selector = selector_for(doc, *node)?;
                if !selectors.contains(&selector) {
                    selectors.push(selector);
                }
            }
            let side_effect = if request.kind == ActionKind::IncludeExtraSelectors {
                SideEffect::IncludeSelectors(selectors)
            } else {
                SideEffect::ExcludeSelectors(selectors)
            };
            Ok(Effect::with_side_effect(side_effect))
        }

        // Background and unknown kinds never reach a document.
        _ => Ok(Effect::with_result(ActionResult::NoAction)),
    }
}

fn links(doc: &Document, nodes: &[NodeId]) -> Result<Vec<String>, EffectError> {
    let urls: Vec<String> = nodes.iter().filter_map(|n| href(doc, *n)).collect();
    if urls.is_empty() {
        return Err(EffectError::NoLink);
    }
    Ok(urls)
}
