use std::collections::VecDeque;

use crate::dom::document::NodeId;

/// Facts the tracker emits, in the order they were observed.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    /// A candidate element was registered (initial scan or added subtree)
    Registered(NodeId),
    /// Classification or visibility of a tracked element was re-derived
    AttributesChanged(NodeId),
    /// A tracked element entered or left the viewport
    IntersectionChanged { node: NodeId, intersecting: bool },
    /// The candidate set changed; labels should be reconciled once
    RefreshRequested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Registered,
    AttributesChanged,
    IntersectionChanged,
    RefreshRequested,
}

impl TrackerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            TrackerEvent::Registered(_) => EventKind::Registered,
            TrackerEvent::AttributesChanged(_) => EventKind::AttributesChanged,
            TrackerEvent::IntersectionChanged { .. } => EventKind::IntersectionChanged,
            TrackerEvent::RefreshRequested => EventKind::RefreshRequested,
        }
    }
}

/// Ordered single-consumer queue. Only kinds somebody subscribed to are
/// kept; a refresh request is never queued twice in a row.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<TrackerEvent>,
    subscribed: Vec<EventKind>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, kind: EventKind) {
        if !self.subscribed.contains(&kind) {
            self.subscribed.push(kind);
        }
    }

    pub fn subscribe_all(&mut self) {
        for kind in [
            EventKind::Registered,
            EventKind::AttributesChanged,
            EventKind::IntersectionChanged,
            EventKind::RefreshRequested,
        ] {
            self.subscribe(kind);
        }
    }

    pub fn push(&mut self, event: TrackerEvent) {
        if !self.subscribed.contains(&event.kind()) {
            return;
        }
        if event == TrackerEvent::RefreshRequested
            && self.events.back() == Some(&TrackerEvent::RefreshRequested)
        {
            return;
        }
        self.events.push_back(event);
    }

    pub fn pop(&mut self) -> Option<TrackerEvent> {
        self.events.pop_front()
    }

    pub fn drain(&mut self) -> Vec<TrackerEvent> {
        self.events.drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}
