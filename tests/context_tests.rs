use voice_hints::config::CustomSelectors;
use voice_hints::context::messages::{
    ContextReply, ContextRequest, CorrelationId, FrameMessage, NotifyLevel,
};
use voice_hints::hints::pool::HintPoolSnapshot;
use voice_hints::dispatch::action::{ActionArg, ActionKind, ActionRequest, ActionResult};
use voice_hints::dom::document::{Display, Element, ElementTree, Overflow, ScrollBox, Style};
use voice_hints::hints::label::labels;
use voice_hints::hints::alphabet::HintAlphabet;
use voice_hints::hints::pool::HintPool;

mod common;
use crate::common::fixtures::{button, link, page, paragraph, settings, text_input, Harness};

fn two_links_and_far() -> Harness {
    let doc = page(
        "https://example.com/",
        vec![link("a", 10.0), button("b", 50.0), link("far", 3000.0)],
    );
    Harness::started(doc, &settings("abcdefghijklmnopqrstuvwxyz"))
}

fn click(labels: &[&str]) -> ActionRequest {
    ActionRequest::new(ActionKind::ClickElement).with_target(labels)
}

// =========================================================================
// Allocation
// =========================================================================

#[test]
fn start_labels_visible_elements_in_document_order() {
    let h = two_links_and_far();

    assert_eq!(h.label("a").as_deref(), Some("aa"), "first element gets the first label");
    assert_eq!(h.label("b").as_deref(), Some("ab"));
    assert_eq!(h.label("far"), None, "off-screen element gets no label");
    assert_eq!(h.pool.assigned_len(), 2);
    assert!(h.pool.is_conserved());
    assert_eq!(h.ctx.allocator().pending_len(), 0, "all claims answered");
}

#[test]
fn text_containers_are_tracked_but_not_labeled() {
    let doc = page(
        "https://example.com/",
        vec![paragraph("p", 10.0, "Some prose"), link("a", 50.0)],
    );
    let h = Harness::started(doc, &settings("ab"));

    assert_eq!(h.ctx.registry().len(), 2, "paragraph and link both tracked");
    assert_eq!(h.label("p"), None);
    assert_eq!(h.label("a").as_deref(), Some("aa"));
}

#[test]
fn labels_are_unique_across_many_elements() {
    let elements = (0..30).map(|i| link(&format!("l{i}"), 10.0 + 22.0 * i as f64)).collect();
    let h = Harness::started(page("https://example.com/", elements), &settings("abcdef"));

    let labels = h.labels();
    let mut deduped = labels.clone();
    deduped.dedup();
    assert_eq!(labels, deduped, "no label is bound twice");
    assert_eq!(h.pool.assigned_len(), labels.len(), "pool and registry agree");
    assert!(h.ctx.registry().is_consistent());
    assert!(h.pool.is_conserved());
}

#[test]
fn leaving_the_viewport_keeps_the_label() {
    let mut h = two_links_and_far();
    h.mutate(|doc| doc.scroll_viewport_to(0.0, 2300.0));

    assert_eq!(h.label("a").as_deref(), Some("aa"), "scrolled away, still labeled");
    assert_eq!(h.label("far").as_deref(), Some("ac"), "newly visible element claims the next label");
    assert_eq!(h.pool.assigned_len(), 3);
}

#[test]
fn hiding_an_element_releases_its_label() {
    let mut h = two_links_and_far();
    h.mutate(|doc| {
        let node = doc.find_by_id("b").unwrap();
        doc.set_style(
            node,
            Style {
                display: Display::None,
                ..Style::default()
            },
        )
        .unwrap();
    });

    assert_eq!(h.label("b"), None);
    assert_eq!(h.pool.assigned_len(), 1, "label went back to the tab stack");
}

#[test]
fn exhausted_stack_reclaims_oldest_offscreen_label() {
    let elements = vec![
        link("l1", 10.0),
        link("l2", 50.0),
        link("l3", 90.0),
        link("l4", 130.0),
        link("l5", 3000.0),
    ];
    let mut h = Harness::started(page("https://example.com/", elements), &settings("ab"));
    assert_eq!(h.pool.free_len(), 0, "four labels, four visible links");

    h.mutate(|doc| doc.scroll_viewport_to(0.0, 2300.0));

    assert_eq!(h.label("l5").as_deref(), Some("aa"), "oldest assignment is reclaimed first");
    assert_eq!(h.label("l1"), None);
    assert_eq!(h.label("l2").as_deref(), Some("ab"), "other off-screen labels untouched");
    assert_eq!(h.pool.assigned_len(), 4);
    assert!(h.pool.is_conserved());
}

#[test]
fn reply_for_unknown_claim_returns_labels() {
    let mut h = two_links_and_far();
    let stray = h.pool.claim(0, 1);
    assert_eq!(h.pool.assigned_len(), 3);

    h.ctx.handle_claim_reply(CorrelationId(999), stray);
    h.pump();

    assert_eq!(h.pool.assigned_len(), 2, "stray labels released");
    assert_eq!(h.labels(), vec!["aa", "ab"]);
}

// =========================================================================
// Removal and reaping
// =========================================================================

#[test]
fn delete_element_releases_subtree_labels() {
    let mut h = two_links_and_far();
    let node = h.ctx.node_by_id("b").unwrap();

    h.ctx.delete_element(node);
    h.pump();

    assert_eq!(h.labels(), vec!["aa"]);
    assert_eq!(h.pool.assigned_len(), 1);
    assert!(!h.ctx.registry().contains(node));
}

#[test]
fn detached_element_is_reaped_on_resolution() {
    let mut h = two_links_and_far();
    h.mutate(|doc| {
        let node = doc.find_by_id("b").unwrap();
        doc.remove(node).unwrap();
    });
    assert_eq!(h.labels(), vec!["aa", "ab"], "removal alone does not sweep the registry");

    let result = h.ctx.dispatch_action(&click(&["ab"]));
    h.pump();

    assert_eq!(result, ActionResult::NoAction, "a reaped target resolves to nothing");
    assert_eq!(h.labels(), vec!["aa"]);
    assert_eq!(h.pool.assigned_len(), 1, "reaped label released");
    assert!(h.ctx.document().clicks().is_empty());
}

#[test]
fn clear_all_is_idempotent() {
    let mut h = two_links_and_far();

    h.ctx.clear_all();
    h.pump();
    h.ctx.clear_all();
    h.pump();

    assert!(h.ctx.registry().is_empty());
    assert_eq!(h.pool.assigned_len(), 0);
    assert!(h.pool.is_conserved(), "second clear released nothing twice");
    let fresh = HintPool::new(&HintAlphabet::from_settings(&settings("abcdefghijklmnopqrstuvwxyz")));
    assert_eq!(h.pool.snapshot(), fresh.snapshot(), "stack is back to its initial order");
}

#[test]
fn full_refresh_follows_enabled_flag() {
    let mut h = two_links_and_far();

    h.ctx.full_refresh(false, CustomSelectors::default());
    h.pump();
    assert!(h.labels().is_empty(), "disabled context shows no labels");
    assert_eq!(h.pool.assigned_len(), 0);

    h.ctx.full_refresh(true, CustomSelectors::default());
    h.pump();
    assert_eq!(h.label("a").as_deref(), Some("aa"), "same label as before the toggle");
    assert_eq!(h.label("b").as_deref(), Some("ab"));
}

#[test]
fn toggling_keeps_labels_with_unordered_letters() {
    let doc = page(
        "https://example.com/",
        vec![link("one", 10.0), link("two", 50.0), link("three", 90.0)],
    );
    let mut h = Harness::started(doc, &settings("sad"));
    let before: Vec<Option<String>> = ["one", "two", "three"].iter().map(|id| h.label(id)).collect();
    assert_eq!(before[0].as_deref(), Some("ss"), "letters keep their configured order");

    h.ctx.full_refresh(false, CustomSelectors::default());
    h.pump();
    h.ctx.full_refresh(true, CustomSelectors::default());
    h.pump();

    let after: Vec<Option<String>> = ["one", "two", "three"].iter().map(|id| h.label(id)).collect();
    assert_eq!(before, after);
}

// =========================================================================
// Dispatch
// =========================================================================

#[test]
fn click_batch_hits_every_target() {
    let mut h = two_links_and_far();
    let result = h.ctx.dispatch_action(&click(&["aa", "ab"]));

    assert_eq!(result, ActionResult::Done);
    assert_eq!(h.ctx.document().clicks().len(), 2);
}

#[test]
fn focus_takes_first_focusable_target() {
    let mut h = two_links_and_far();
    let request = ActionRequest::new(ActionKind::FocusElement).with_target(&["ab", "aa"]);

    assert_eq!(h.ctx.dispatch_action(&request), ActionResult::Done);
    assert_eq!(h.ctx.document().focused(), h.ctx.node_by_id("b"));
}

#[test]
fn single_unknown_letter_falls_back_to_typing() {
    let mut h = two_links_and_far();

    let direct = ActionRequest::new(ActionKind::DirectClickElement).with_target(&["q"]);
    assert_eq!(h.ctx.dispatch_action(&direct), ActionResult::type_target_characters());

    let longer = ActionRequest::new(ActionKind::DirectClickElement).with_target(&["qq"]);
    assert_eq!(h.ctx.dispatch_action(&longer), ActionResult::NoAction, "two letters are never typed");

    let plain = click(&["q"]);
    assert_eq!(h.ctx.dispatch_action(&plain), ActionResult::NoAction, "only direct clicks fall back");
}

#[test]
fn offscreen_label_does_not_resolve() {
    let mut h = two_links_and_far();
    h.mutate(|doc| doc.scroll_viewport_to(0.0, 2300.0));

    assert_eq!(h.ctx.dispatch_action(&click(&["aa"])), ActionResult::NoAction);
    assert!(h.ctx.document().clicks().is_empty());
}

#[test]
fn copy_link_joins_targets() {
    let doc = page("https://example.com/", vec![link("a", 10.0), link("b", 50.0)]);
    let mut h = Harness::started(doc, &settings("ab"));
    let request = ActionRequest::new(ActionKind::CopyLink).with_target(&["aa", "ab"]);

    assert_eq!(
        h.ctx.dispatch_action(&request),
        ActionResult::CopyToClipboard("https://example.com/a\nhttps://example.com/b".into())
    );
}

/// Three short scrollable lists stacked down the page, each holding one link.
fn three_lists() -> Harness {
    let mut doc = page("https://example.com/", vec![]);
    let body = doc.body();
    for (i, top) in [0.0, 250.0, 500.0].into_iter().enumerate() {
        let list = ElementTree::new(
            Element::new("div")
                .with_attr("id", &format!("list{i}"))
                .with_rect(0.0, top, 300.0, 200.0)
                .with_style(Style {
                    overflow_y: Overflow::Auto,
                    ..Style::default()
                })
                .with_scroll(ScrollBox {
                    scroll_width: 300.0,
                    scroll_height: 1000.0,
                    client_width: 300.0,
                    client_height: 200.0,
                    ..ScrollBox::default()
                }),
        )
        .child(link(&format!("item{i}"), top + 10.0));
        doc.append_tree(body, &list).expect("append");
    }
    Harness::started(doc, &settings("abcdefghijklmnopqrstuvwxyz"))
}

#[test]
fn batch_actions_use_every_target_and_single_actions_the_first() {
    let mut h = three_lists();
    assert_eq!(h.labels(), vec!["aa", "ab", "ac"]);

    let copy = ActionRequest::new(ActionKind::CopyLink).with_target(&["aa", "ab", "ac"]);
    assert_eq!(
        h.ctx.dispatch_action(&copy),
        ActionResult::CopyToClipboard(
            "https://example.com/item0\nhttps://example.com/item1\nhttps://example.com/item2".into()
        )
    );

    let scroll = ActionRequest::new(ActionKind::ScrollDownAtElement).with_target(&["aa", "ab", "ac"]);
    assert_eq!(h.ctx.dispatch_action(&scroll), ActionResult::Done);

    let tops: Vec<f64> = (0..3)
        .map(|i| {
            let list = h.ctx.node_by_id(&format!("list{i}")).unwrap();
            h.ctx.document().scroll_box(list).unwrap().top
        })
        .collect();
    assert!(tops[0] > 0.0, "first target's list scrolled");
    assert_eq!(&tops[1..], &[0.0, 0.0], "other lists untouched");
    let root = h.ctx.document().root();
    assert_eq!(h.ctx.document().scroll_box(root).unwrap().top, 0.0, "page not scrolled");
}

#[test]
fn insert_to_field_sets_value_and_focus() {
    let doc = page("https://example.com/", vec![text_input("name", 10.0, "old")]);
    let mut h = Harness::started(doc, &settings("ab"));
    let request = ActionRequest::new(ActionKind::InsertToField)
        .with_target(&["aa"])
        .with_arg(ActionArg::Text("hello".into()));

    assert_eq!(h.ctx.dispatch_action(&request), ActionResult::Done);
    let node = h.ctx.node_by_id("name").unwrap();
    assert_eq!(h.ctx.document().value(node).unwrap(), Some("hello"));
    assert_eq!(h.ctx.document().focused(), Some(node));
}

#[test]
fn effect_failure_notifies_and_replies_no_action() {
    let mut h = two_links_and_far();
    let request = ActionRequest::new(ActionKind::FocusAndDeleteContents).with_target(&["ab"]);

    assert_eq!(h.ctx.dispatch_action(&request), ActionResult::NoAction);
    h.pump();
    assert!(
        h.other
            .iter()
            .any(|m| matches!(m, FrameMessage::Notify { level: NotifyLevel::Error, .. })),
        "failure surfaced as an error notification"
    );
}

#[test]
fn link_side_effects_reach_the_coordinator() {
    let mut h = two_links_and_far();

    h.ctx.dispatch_action(&ActionRequest::new(ActionKind::ShowLink).with_target(&["aa"]));
    h.ctx.dispatch_action(&ActionRequest::new(ActionKind::OpenInBackgroundTab).with_target(&["aa"]));
    h.pump();

    assert!(h.other.iter().any(
        |m| matches!(m, FrameMessage::Notify { text, .. } if text.contains("https://example.com/a"))
    ));
    assert!(h.other.contains(&FrameMessage::OpenTabs {
        urls: vec!["https://example.com/a".into()],
        active: false,
    }));
}

#[test]
fn exclude_selector_removes_label_and_is_stored() {
    let mut h = two_links_and_far();
    let request = ActionRequest::new(ActionKind::ExcludeExtraSelectors).with_target(&["ab"]);

    assert_eq!(h.ctx.dispatch_action(&request), ActionResult::Done);
    h.pump();

    assert_eq!(h.label("b"), None, "excluded element loses its label");
    assert!(h.label("a").is_some());
    assert_eq!(h.ctx.selectors().exclude.len(), 1);
    assert!(h.other.iter().any(|m| matches!(
        m,
        FrameMessage::StoreCustomSelectors { host, selectors } if host == "example.com" && selectors.exclude.len() == 1
    )));
}

#[test]
fn background_commands_do_nothing_in_a_document() {
    let mut h = two_links_and_far();
    let result = h.ctx.dispatch_action(&ActionRequest::new(ActionKind::ToggleHints));
    assert_eq!(result, ActionResult::NoAction);
}

// =========================================================================
// Requests
// =========================================================================

#[test]
fn keyboard_reachable_marking_round_trip() {
    let mut h = two_links_and_far();

    let reply = h.ctx.handle_request(ContextRequest::MarkKeyboardReachable { letter: 'a' });
    assert_eq!(reply, ContextReply::Done);
    let marked = h.ctx.registry().wrappers().filter(|w| w.keyboard_reachable).count();
    assert_eq!(marked, 2);

    h.ctx.handle_request(ContextRequest::RestoreKeyboardReachable);
    assert!(h.ctx.registry().wrappers().all(|w| !w.keyboard_reachable));
}

#[test]
fn status_reports_labels_and_pending_claims() {
    let mut h = two_links_and_far();
    match h.ctx.handle_request(ContextRequest::GetStatus) {
        ContextReply::Status(status) => {
            assert_eq!(status.pending_claims, 0);
            assert_eq!(status.labels.len(), 2);
            assert_eq!(status.tracked, 3, "far link is tracked without a label");
        }
        other => panic!("unexpected reply {other:?}"),
    }
}

#[test]
fn reclaim_for_sibling_gives_up_only_offscreen_labels() {
    let mut h = two_links_and_far();
    assert!(h.ctx.reclaim_for_sibling(2).is_empty(), "everything labeled is on screen");

    h.mutate(|doc| doc.scroll_viewport_to(0.0, 2300.0));
    let given = h.ctx.reclaim_for_sibling(5);

    assert_eq!(given.len(), 2, "both scrolled-away labels given up");
    assert_eq!(h.labels(), vec!["ac"], "on-screen label kept");
}

#[test]
fn pool_snapshot_round_trip_keeps_only_the_latest_reply() {
    let mut h = two_links_and_far();
    let first = h.ctx.request_pool_snapshot();
    let second = h.ctx.request_pool_snapshot();
    assert_ne!(first, second);

    h.ctx.handle_pool_snapshot(first, HintPoolSnapshot::default());
    assert!(h.ctx.last_pool_snapshot().is_none(), "reply to an older request is ignored");
    assert!(h.ctx.status().snapshot_pending);

    h.pump();
    assert_eq!(h.ctx.last_pool_snapshot(), Some(&h.pool.snapshot()));
    assert!(!h.ctx.status().snapshot_pending);
    assert_eq!(
        h.ctx.last_pool_snapshot().unwrap().assigned.iter().map(|(l, _)| l.clone()).collect::<Vec<_>>(),
        labels(&["aa", "ab"])
    );
}

#[test]
fn refresh_pool_snapshot_request_asks_the_coordinator() {
    let mut h = two_links_and_far();
    assert_eq!(h.ctx.handle_request(ContextRequest::RefreshPoolSnapshot), ContextReply::Done);
    assert!(h.ctx.status().snapshot_pending);

    h.pump();
    assert_eq!(h.ctx.status().pool_snapshot, Some(h.pool.snapshot()));
}
