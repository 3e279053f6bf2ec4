use voice_hints::config::CustomSelectors;
use voice_hints::dom::document::{Document, Element, ElementTree, NodeId, Style};
use voice_hints::dom::selector::SelectorFilter;
use voice_hints::hints::label::{labels, HintLabel};
use voice_hints::registry::registry::WrapperRegistry;
use voice_hints::tracker::events::{EventKind, EventQueue, TrackerEvent};
use voice_hints::tracker::tracker::{VisibilityTracker, OVERLAY_ID_PREFIX};

mod common;
use crate::common::fixtures::{button, link, page, paragraph};

struct Tracked {
    doc: Document,
    registry: WrapperRegistry,
    tracker: VisibilityTracker,
    filter: SelectorFilter,
}

impl Tracked {
    fn start(doc: Document) -> Self {
        Tracked::with_filter(doc, SelectorFilter::default())
    }

    fn with_filter(mut doc: Document, filter: SelectorFilter) -> Self {
        let mut registry = WrapperRegistry::new();
        let mut tracker = VisibilityTracker::new();
        doc.take_records();
        tracker.start(&doc, &mut registry, &filter);
        tracker.on_animation_frame(&doc, &mut registry);
        Tracked {
            doc,
            registry,
            tracker,
            filter,
        }
    }

    fn node(&self, id: &str) -> NodeId {
        self.doc.find_by_id(id).expect("fixture node")
    }

    fn flush(&mut self) {
        let records = self.doc.take_records();
        self.tracker.on_mutations(&self.doc, &records, &mut self.registry, &self.filter);
        self.tracker.on_animation_frame(&self.doc, &mut self.registry);
    }

    /// Bind labels in node order to every wrapper that wants one.
    fn assign_all(&mut self, pool: &[&str]) {
        let mut free = labels(pool).into_iter();
        for node in self.registry.nodes() {
            if self.registry.get(node).is_some_and(|w| w.wants_hint()) {
                if let Some(label) = free.next() {
                    self.registry.assign(node, label);
                }
            }
        }
    }
}

// =========================================================================
// Tracker
// =========================================================================

#[test]
fn start_registers_candidates_and_computes_intersection() {
    let t = Tracked::start(page(
        "https://example.com/",
        vec![link("a", 10.0), paragraph("p", 50.0, "text"), link("far", 3000.0)],
    ));

    assert_eq!(t.registry.len(), 3);
    assert!(t.registry.get(t.node("a")).unwrap().is_intersecting_viewport);
    assert!(!t.registry.get(t.node("far")).unwrap().is_intersecting_viewport);
    assert!(!t.registry.get(t.node("p")).unwrap().is_hintable(), "text is tracked, not labeled");
}

#[test]
fn overlay_elements_are_ignored() {
    let mut doc = page("https://example.com/", vec![link("a", 10.0)]);
    let body = doc.body();
    doc.append_tree(
        body,
        &ElementTree::new(
            Element::new("div")
                .with_attr("id", &format!("{OVERLAY_ID_PREFIX}-badge"))
                .with_text("aa")
                .with_onclick(),
        ),
    )
    .expect("append");

    let t = Tracked::start(doc);
    assert_eq!(t.registry.len(), 1, "only the page link");
}

#[test]
fn added_subtree_is_registered_and_observed() {
    let mut t = Tracked::start(page("https://example.com/", vec![link("a", 10.0)]));
    t.tracker.events_mut().drain();

    let body = t.doc.body();
    t.doc
        .append_tree(
            body,
            &ElementTree::new(Element::new("nav")).child(button("late", 50.0)),
        )
        .expect("append");
    t.flush();

    let late = t.node("late");
    assert!(t.registry.contains(late));
    assert!(t.tracker.is_observing(late));
    assert!(t.registry.get(late).unwrap().is_intersecting_viewport);

    let events = t.tracker.events_mut().drain();
    assert!(events.contains(&TrackerEvent::Registered(late)));
    assert!(events.contains(&TrackerEvent::RefreshRequested));
}

#[test]
fn attribute_change_on_an_ancestor_refreshes_descendants() {
    let mut doc = page("https://example.com/", vec![]);
    let body = doc.body();
    let wrapper = doc
        .append_tree(body, &ElementTree::new(Element::new("div")).child(link("inner", 10.0)))
        .expect("append");
    let mut t = Tracked::start(doc);
    let inner = t.node("inner");
    assert!(t.registry.get(inner).unwrap().is_visible);

    t.doc
        .set_style(
            wrapper,
            Style {
                opacity: 0.0,
                ..Style::default()
            },
        )
        .expect("style");
    t.flush();

    assert!(!t.registry.get(inner).unwrap().is_visible);
}

#[test]
fn attribute_change_can_make_an_element_a_candidate() {
    let mut doc = page("https://example.com/", vec![]);
    let body = doc.body();
    let div = doc
        .append_tree(body, &ElementTree::new(Element::new("div").with_rect(10.0, 10.0, 50.0, 20.0)))
        .expect("append");
    let mut t = Tracked::start(doc);
    assert!(!t.registry.contains(div));

    t.doc.set_attribute(div, "role", "button").expect("attribute");
    t.flush();

    assert!(t.registry.contains(div));
    assert!(t.registry.get(div).unwrap().is_hintable());
}

#[test]
fn removed_elements_are_not_swept_by_the_tracker() {
    let mut t = Tracked::start(page("https://example.com/", vec![link("a", 10.0)]));
    let a = t.node("a");
    t.doc.remove(a).expect("remove");
    t.flush();
    assert!(t.registry.contains(a), "wrapper stays until resolution reaps it");
}

#[test]
fn include_selector_pulls_in_non_clickable_elements() {
    let mut doc = page("https://example.com/", vec![]);
    let body = doc.body();
    doc.append_tree(
        body,
        &ElementTree::new(
            Element::new("div")
                .with_attr("class", "card")
                .with_rect(10.0, 10.0, 100.0, 50.0),
        ),
    )
    .expect("append");
    let filter = SelectorFilter::compile(&CustomSelectors {
        include: vec!["div.card".into()],
        exclude: vec![],
    });

    let t = Tracked::with_filter(doc, filter);
    assert_eq!(t.registry.len(), 1);
    let wrapper = t.registry.wrappers().next().unwrap();
    assert!(wrapper.included);
    assert!(wrapper.wants_hint());
}

#[test]
fn event_queue_keeps_subscribed_kinds_and_collapses_refreshes() {
    let mut queue = EventQueue::new();
    queue.subscribe(EventKind::RefreshRequested);
    queue.push(TrackerEvent::Registered(NodeId(3)));
    queue.push(TrackerEvent::RefreshRequested);
    queue.push(TrackerEvent::RefreshRequested);

    assert_eq!(queue.len(), 1);
    assert_eq!(queue.pop(), Some(TrackerEvent::RefreshRequested));
    assert!(queue.is_empty());
}

// =========================================================================
// Registry
// =========================================================================

#[test]
fn assign_refuses_duplicates() {
    let mut t = Tracked::start(page("https://example.com/", vec![link("a", 10.0), link("b", 50.0)]));
    let (a, b) = (t.node("a"), t.node("b"));

    assert!(t.registry.assign(a, HintLabel::from("aa")));
    assert!(!t.registry.assign(b, HintLabel::from("aa")), "label already bound");
    assert!(!t.registry.assign(a, HintLabel::from("ab")), "element already labeled");
    assert!(t.registry.is_consistent());
}

#[test]
fn resolution_reaps_detached_wrappers() {
    let mut t = Tracked::start(page("https://example.com/", vec![link("a", 10.0), link("b", 50.0)]));
    t.assign_all(&["aa", "ab"]);
    let a = t.node("a");
    t.doc.remove(a).expect("remove");

    let found: Vec<NodeId> = t
        .registry
        .get_by_labels(&t.doc, &labels(&["aa", "ab"]))
        .iter()
        .map(|w| w.node)
        .collect();
    assert_eq!(found, vec![t.node("b")]);

    let reaped = t.registry.take_reaped();
    assert_eq!(reaped.nodes, vec![a]);
    assert_eq!(reaped.labels, labels(&["aa"]));
    assert!(t.registry.take_reaped().is_empty(), "reaped set is handed out once");
    assert!(t.registry.is_consistent());
}

#[test]
fn reclaim_takes_oldest_off_screen_labels_only() {
    let mut t = Tracked::start(page(
        "https://example.com/",
        vec![link("a", 10.0), link("b", 50.0), link("c", 90.0), paragraph("tail", 3000.0, "end")],
    ));
    t.assign_all(&["aa", "ab", "ac"]);

    t.doc.scroll_viewport_to(0.0, 60.0);
    t.flush();
    assert!(!t.registry.get(t.node("a")).unwrap().is_intersecting_viewport);

    let reclaimed = t.registry.reclaim(5);
    assert_eq!(reclaimed, labels(&["aa"]), "b and c are still on screen");
    assert_eq!(t.registry.label_of(t.node("a")), None);
    assert_eq!(t.registry.hinted_len(), 2);
}

#[test]
fn removing_a_container_releases_every_label_below_it() {
    let mut doc = page("https://example.com/", vec![]);
    let body = doc.body();
    let menu = doc
        .append_tree(
            body,
            &ElementTree::new(Element::new("div"))
                .child(link("one", 10.0))
                .child(link("two", 50.0)),
        )
        .expect("append");
    let mut t = Tracked::start(doc);
    t.assign_all(&["aa", "ab"]);

    let removal = t.registry.remove(&t.doc, menu);
    let mut released = removal.labels.clone();
    released.sort();
    assert_eq!(released, labels(&["aa", "ab"]));
    assert_eq!(t.registry.hinted_len(), 0);
}

#[test]
fn keyboard_reachable_marks_labels_by_first_letter() {
    let mut t = Tracked::start(page(
        "https://example.com/",
        vec![link("a", 10.0), link("b", 50.0), link("c", 90.0)],
    ));
    t.assign_all(&["aa", "ab", "ba"]);

    assert_eq!(t.registry.mark_keyboard_reachable('a'), 2);
    t.registry.restore_keyboard_reachable();
    assert!(t.registry.wrappers().all(|w| !w.keyboard_reachable));
}

#[test]
fn clear_all_returns_every_label() {
    let mut t = Tracked::start(page("https://example.com/", vec![link("a", 10.0), link("b", 50.0)]));
    t.assign_all(&["aa", "ab"]);

    let removal = t.registry.clear_all();
    assert_eq!(removal.labels, labels(&["aa", "ab"]));
    assert!(t.registry.is_empty());
    assert!(t.registry.clear_all().is_empty(), "second clear is a no-op");
}
