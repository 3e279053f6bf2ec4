use std::time::Duration;

use voice_hints::dom::selector::SelectorFilter;
use voice_hints::hints::allocator::{ClaimPhase, HintAllocator};
use voice_hints::hints::alphabet::HintAlphabet;
use voice_hints::hints::label::{labels, HintLabel};
use voice_hints::hints::pool::{HintPool, HintPoolSnapshot};
use voice_hints::registry::registry::WrapperRegistry;

mod common;
use crate::common::fixtures::{link, page};

// =========================================================================
// Alphabet
// =========================================================================

#[test]
fn alphabet_dedupes_and_lowercases_letters() {
    let alphabet = HintAlphabet::new("AbA1b", false);
    assert_eq!(alphabet.labels(), labels(&["aa", "ab", "ba", "bb"]).as_slice());
}

#[test]
fn single_letters_come_before_pairs() {
    let alphabet = HintAlphabet::new("ab", true);
    assert_eq!(alphabet.len(), 6);
    assert_eq!(&alphabet.labels()[..2], labels(&["a", "b"]).as_slice());
}

// =========================================================================
// Pool
// =========================================================================

#[test]
fn claims_follow_alphabet_order() {
    let mut pool = HintPool::new(&HintAlphabet::new("abc", false));
    assert_eq!(pool.claim(0, 3), labels(&["aa", "ab", "ac"]));
    assert_eq!(pool.assigned_to(0), labels(&["aa", "ab", "ac"]));
    assert!(pool.is_conserved());
}

#[test]
fn last_freed_label_is_handed_out_next() {
    let mut pool = HintPool::new(&HintAlphabet::new("abc", false));
    pool.claim(0, 3);
    assert_eq!(pool.release(0, &labels(&["ab"])), 1);
    assert_eq!(pool.claim(1, 1), labels(&["ab"]), "freed label reused before the untouched tail");
    assert_eq!(pool.owner(&HintLabel::from("ab")), Some(1));
}

#[test]
fn release_ignores_labels_owned_elsewhere() {
    let mut pool = HintPool::new(&HintAlphabet::new("ab", false));
    let mine = pool.claim(0, 1);
    let theirs = pool.claim(1, 1);

    assert_eq!(pool.release(0, &theirs), 0, "frame 0 cannot free frame 1's label");
    assert_eq!(pool.release(0, &labels(&["bb"])), 0, "free label stays free once");
    assert_eq!(pool.release(0, &mine), 1);
    assert_eq!(pool.assigned_len(), 1);
    assert!(pool.is_conserved());
}

#[test]
fn exhausted_pool_grants_what_it_has() {
    let mut pool = HintPool::new(&HintAlphabet::new("ab", false));
    assert_eq!(pool.claim(0, 10).len(), 4);
    assert!(pool.claim(1, 1).is_empty());
    assert_eq!(pool.free_len(), 0);
    assert_eq!(pool.capacity(), 4);
}

#[test]
fn release_frame_frees_everything_it_held() {
    let mut pool = HintPool::new(&HintAlphabet::new("ab", false));
    pool.claim(0, 2);
    pool.claim(1, 1);
    let released = pool.release_frame(0);
    assert_eq!(released.len(), 2);
    assert!(pool.assigned_to(0).is_empty());
    assert_eq!(pool.assigned_to(1).len(), 1);
    assert!(pool.is_conserved());
}

#[test]
fn snapshot_restores_the_same_pool() {
    let alphabet = HintAlphabet::new("abc", false);
    let mut pool = HintPool::new(&alphabet);
    pool.claim(2, 4);
    pool.release(2, &labels(&["ab"]));

    let restored = HintPool::from_snapshot(pool.snapshot(), &alphabet);
    assert_eq!(restored.snapshot(), pool.snapshot());
    assert_eq!(restored.assigned_to(2), labels(&["aa", "ac", "ba"]));
}

#[test]
fn snapshot_that_lost_a_label_is_discarded() {
    let alphabet = HintAlphabet::new("ab", false);
    let snapshot = HintPoolSnapshot {
        free: labels(&["aa", "ab"]),
        assigned: vec![(HintLabel::from("ba"), 0)],
    };
    let pool = HintPool::from_snapshot(snapshot, &alphabet);
    assert_eq!(pool.free_len(), 4, "fresh pool instead of a leaky one");
}

// =========================================================================
// Allocator
// =========================================================================

fn tracked(ids: &[(&str, f64)]) -> (voice_hints::dom::document::Document, WrapperRegistry) {
    let doc = page("https://example.com/", ids.iter().map(|(id, y)| link(id, *y)).collect());
    let mut registry = WrapperRegistry::new();
    let filter = SelectorFilter::default();
    for (id, _) in ids {
        let node = doc.find_by_id(id).expect("fixture node");
        let wrapper = registry.upsert(&doc, node, &filter);
        wrapper.is_intersecting_viewport = doc.intersects_viewport(node);
    }
    (doc, registry)
}

#[test]
fn plan_claim_covers_only_elements_wanting_a_label() {
    let (_doc, registry) = tracked(&[("a", 10.0), ("b", 50.0), ("far", 3000.0)]);
    let mut allocator = HintAllocator::new();

    let (_, amount) = allocator.plan_claim(&registry).expect("claim");
    assert_eq!(amount, 2, "off-screen element not asked for");
    assert_eq!(allocator.pending_len(), 1);
    assert!(allocator.plan_claim(&registry).is_none(), "covered elements are not asked for twice");
}

#[test]
fn bind_skips_elements_that_stopped_wanting_a_label() {
    let (mut doc, mut registry) = tracked(&[("a", 10.0), ("b", 50.0), ("c", 90.0)]);
    let mut allocator = HintAllocator::new();
    let (correlation, _) = allocator.plan_claim(&registry).expect("claim");
    let claim = allocator.complete(correlation).expect("pending claim");
    assert_eq!(claim.phase, ClaimPhase::Stack);

    let b = doc.find_by_id("b").expect("b");
    doc.remove(b).expect("remove");

    let outcome = HintAllocator::bind(&mut registry, &doc, &claim.nodes, labels(&["aa", "ab"]));
    assert_eq!(outcome.bound.len(), 2, "a and c bound");
    assert!(outcome.leftover.is_empty());
    assert!(outcome.unserved.is_empty());
    assert_eq!(registry.label_of(b), None);
    assert!(registry.is_consistent());
}

#[test]
fn bind_reports_leftovers_and_unserved() {
    let (doc, mut registry) = tracked(&[("a", 10.0), ("b", 50.0)]);
    let mut allocator = HintAllocator::new();
    let (correlation, _) = allocator.plan_claim(&registry).expect("claim");
    let claim = allocator.complete(correlation).expect("pending claim");

    let short = HintAllocator::bind(&mut registry, &doc, &claim.nodes, labels(&["aa"]));
    assert_eq!(short.bound.len(), 1);
    assert_eq!(short.unserved.len(), 1);

    let extra = HintAllocator::bind(&mut registry, &doc, &short.unserved, labels(&["ab", "ac"]));
    assert_eq!(extra.bound.len(), 1);
    assert_eq!(extra.leftover, labels(&["ac"]), "surplus goes back to the stack");
}

#[test]
fn unknown_or_expired_claims_complete_to_nothing() {
    let (_doc, registry) = tracked(&[("a", 10.0)]);
    let mut allocator = HintAllocator::new();
    let (correlation, _) = allocator.plan_claim(&registry).expect("claim");

    let expired = allocator.expire(Duration::ZERO);
    assert_eq!(expired, vec![correlation]);
    assert_eq!(allocator.pending_len(), 0);
    assert!(allocator.complete(correlation).is_none(), "late reply is unknown");
    assert!(allocator.plan_claim(&registry).is_some(), "element eligible again");
}
