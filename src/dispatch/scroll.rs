use std::collections::HashMap;

use crate::dom::document::{Document, NodeId, Position, Rect};
use crate::error::DomError;

/// Fraction of the container's client size scrolled when no factor is given.
pub const DEFAULT_SCROLL_FACTOR: f64 = 0.66;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

impl ScrollDirection {
    pub fn axis(self) -> Axis {
        match self {
            ScrollDirection::Up | ScrollDirection::Down => Axis::Vertical,
            ScrollDirection::Left | ScrollDirection::Right => Axis::Horizontal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapPosition {
    Top,
    Bottom,
    Center,
}

/// Memoized "which container would the user scroll for this element".
///
/// Every element walked past on the way to an answer is cached with that
/// answer. Layout changes invalidate everything, so the owner clears the
/// cache whenever the document mutates.
#[derive(Debug, Default)]
pub struct ScrollContainerCache {
    containers: HashMap<(NodeId, Option<Axis>), NodeId>,
}

impl ScrollContainerCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.containers.clear();
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    /// Nearest ancestor (or the element itself) that overflows along `axis`
    /// and lets the user scroll it. Falls back to the document element.
    pub fn container_for(&mut self, doc: &Document, node: NodeId, axis: Option<Axis>) -> Result<NodeId, DomError> {
        let absolute = doc.element(node)?.style.position == Position::Absolute;
        let root_box = doc.scroll_box(doc.root())?;

        let mut checked = Vec::new();
        let mut current = Some(node);

        while let Some(candidate) = current {
            if let Some(cached) = self.containers.get(&(candidate, axis)) {
                let cached = *cached;
                self.remember(&checked, axis, cached);
                return Ok(cached);
            }

            let el = doc.element(candidate)?;
            current = doc.parent(candidate);
            if candidate == doc.root() {
                break;
            }

            // An absolutely positioned element does not move with static ancestors.
            if absolute && el.style.position == Position::Static {
                continue;
            }

            checked.push(candidate);
            let scroll = doc.scroll_box(candidate)?;

            if candidate == doc.body()
                && scroll.scroll_width == root_box.scroll_width
                && scroll.scroll_height == root_box.scroll_height
            {
                continue;
            }

            let horizontal = axis != Some(Axis::Vertical) && scroll.overflows_x() && el.style.overflow_x.is_user_scrollable();
            let vertical = axis != Some(Axis::Horizontal) && scroll.overflows_y() && el.style.overflow_y.is_user_scrollable();
            if horizontal || vertical {
                self.remember(&checked, axis, candidate);
                return Ok(candidate);
            }
        }

        self.remember(&checked, axis, doc.root());
        Ok(doc.root())
    }

    fn remember(&mut self, nodes: &[NodeId], axis: Option<Axis>, container: NodeId) {
        for node in nodes {
            self.containers.insert((*node, axis), container);
        }
    }
}

/// Scroll the element's container by `factor` times its client size.
/// Returns the container that moved.
pub fn scroll_at(
    doc: &mut Document,
    cache: &mut ScrollContainerCache,
    node: NodeId,
    direction: ScrollDirection,
    factor: f64,
) -> Result<NodeId, DomError> {
    let container = cache.container_for(doc, node, Some(direction.axis()))?;
    scroll_container(doc, container, direction, factor)?;
    Ok(container)
}

pub fn scroll_container(doc: &mut Document, container: NodeId, direction: ScrollDirection, factor: f64) -> Result<(), DomError> {
    let scroll = doc.scroll_box(container)?;
    let (dx, dy) = match direction {
        ScrollDirection::Up => (0.0, -scroll.client_height * factor),
        ScrollDirection::Down => (0.0, scroll.client_height * factor),
        ScrollDirection::Left => (-scroll.client_width * factor, 0.0),
        ScrollDirection::Right => (scroll.client_width * factor, 0.0),
    };
    doc.scroll_by(container, dx, dy)
}

/// Scroll the element's vertical container so the element sits at its top,
/// bottom or center.
pub fn snap_scroll(
    doc: &mut Document,
    cache: &mut ScrollContainerCache,
    node: NodeId,
    position: SnapPosition,
) -> Result<NodeId, DomError> {
    let container = cache.container_for(doc, node, Some(Axis::Vertical))?;
    let target = doc.visible_rect(node)?;
    let frame: Rect = if container == doc.root() {
        doc.viewport()
    } else {
        doc.visible_rect(container)?
    };

    let dy = match position {
        SnapPosition::Top => target.y - frame.y,
        SnapPosition::Bottom => target.bottom() - frame.bottom(),
        SnapPosition::Center => target.center_y() - frame.center_y(),
    };
    doc.scroll_by(container, 0.0, dy)?;
    Ok(container)
}
