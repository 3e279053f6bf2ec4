use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::context::messages::FrameId;
use crate::hints::alphabet::HintAlphabet;
use crate::hints::label::HintLabel;

/// Serializable form of a pool, persisted per tab so a reloaded frame or a
/// new frame does not collide with labels already on screen.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HintPoolSnapshot {
    pub free: Vec<HintLabel>,
    pub assigned: Vec<(HintLabel, FrameId)>,
}

/// Label stack of one tab.
///
/// `free` is used as a stack: claims pop from the end and releases push onto
/// the end, so the most recently freed label is the next one handed out and
/// the never-used tail of the alphabet is only reached when nothing was
/// freed. Within one release the labels go back in alphabet order, so a
/// frame that returns everything leaves the stack as it found it. Every
/// alphabet label is either in `free` or in `assigned`.
#[derive(Debug, Clone)]
pub struct HintPool {
    free: Vec<HintLabel>,
    assigned: HashMap<HintLabel, FrameId>,
    /// Position of each label in the alphabet
    rank: HashMap<HintLabel, usize>,
}

fn ranks(alphabet: &HintAlphabet) -> HashMap<HintLabel, usize> {
    alphabet.labels().iter().cloned().enumerate().map(|(i, l)| (l, i)).collect()
}

impl HintPool {
    pub fn new(alphabet: &HintAlphabet) -> Self {
        HintPool {
            free: alphabet.labels().iter().rev().cloned().collect(),
            assigned: HashMap::new(),
            rank: ranks(alphabet),
        }
    }

    /// Restore a persisted pool. A snapshot that does not partition this
    /// alphabet exactly is discarded in favour of a fresh pool.
    pub fn from_snapshot(snapshot: HintPoolSnapshot, alphabet: &HintAlphabet) -> Self {
        let pool = HintPool {
            free: snapshot.free,
            assigned: snapshot.assigned.into_iter().collect(),
            rank: ranks(alphabet),
        };

        let all_known = pool.free.iter().chain(pool.assigned.keys()).all(|l| alphabet.contains(l));
        if all_known && pool.is_conserved() {
            pool
        } else {
            warn!("persisted hint pool does not match the alphabet, starting fresh");
            HintPool::new(alphabet)
        }
    }

    pub fn snapshot(&self) -> HintPoolSnapshot {
        let mut assigned: Vec<(HintLabel, FrameId)> =
            self.assigned.iter().map(|(l, f)| (l.clone(), *f)).collect();
        assigned.sort();
        HintPoolSnapshot {
            free: self.free.clone(),
            assigned,
        }
    }

    /// Hand out up to `amount` labels to `frame`. Returns fewer (possibly
    /// none) when the pool runs dry.
    pub fn claim(&mut self, frame: FrameId, amount: usize) -> Vec<HintLabel> {
        let take = amount.min(self.free.len());
        let claimed: Vec<HintLabel> = self.free.drain(self.free.len() - take..).rev().collect();
        for label in &claimed {
            self.assigned.insert(label.clone(), frame);
        }

        if claimed.len() < amount {
            debug!(frame, requested = amount, granted = claimed.len(), "hint pool exhausted");
        }
        claimed
    }

    /// Return labels held by `frame`. Labels the frame does not own (stale
    /// or already reassigned) are ignored. Returns how many were released.
    pub fn release(&mut self, frame: FrameId, labels: &[HintLabel]) -> usize {
        let mut owned: Vec<&HintLabel> = labels.iter().filter(|l| self.assigned.get(*l) == Some(&frame)).collect();
        owned.sort_by_key(|l| std::cmp::Reverse(self.rank.get(*l).copied().unwrap_or(usize::MAX)));
        owned.dedup();
        for label in &owned {
            self.assigned.remove(*label);
            self.free.push((*label).clone());
        }
        owned.len()
    }

    /// Move labels to a new owner without passing through `free`.
    /// Only labels currently owned by `from` move.
    pub fn transfer(&mut self, from: FrameId, to: FrameId, labels: &[HintLabel]) -> Vec<HintLabel> {
        let moved: Vec<HintLabel> = labels
            .iter()
            .filter(|l| self.assigned.get(*l) == Some(&from))
            .cloned()
            .collect();
        for label in &moved {
            self.assigned.insert(label.clone(), to);
        }
        moved
    }

    /// Release everything a frame holds, e.g. when it unloads.
    pub fn release_frame(&mut self, frame: FrameId) -> Vec<HintLabel> {
        let held = self.assigned_to(frame);
        self.release(frame, &held);
        held
    }

    /// Labels the pool has on record for `frame` that the frame no longer
    /// shows, e.g. after it gave them up for a sibling whose request timed out.
    pub fn stray_labels(&self, frame: FrameId, shown: &[HintLabel]) -> Vec<HintLabel> {
        self.assigned_to(frame)
            .into_iter()
            .filter(|l| !shown.contains(l))
            .collect()
    }

    pub fn owner(&self, label: &HintLabel) -> Option<FrameId> {
        self.assigned.get(label).copied()
    }

    pub fn assigned_to(&self, frame: FrameId) -> Vec<HintLabel> {
        let mut out: Vec<HintLabel> = self
            .assigned
            .iter()
            .filter(|(_, f)| **f == frame)
            .map(|(l, _)| l.clone())
            .collect();
        out.sort();
        out
    }

    pub fn free_len(&self) -> usize {
        self.free.len()
    }

    pub fn assigned_len(&self) -> usize {
        self.assigned.len()
    }

    pub fn capacity(&self) -> usize {
        self.rank.len()
    }

    /// `|free| + |assigned| == |alphabet|` with no label in both sets and
    /// no duplicate in `free`.
    pub fn is_conserved(&self) -> bool {
        let mut seen = std::collections::HashSet::new();
        let free_unique = self.free.iter().all(|l| seen.insert(l));
        free_unique
            && self.free.iter().all(|l| !self.assigned.contains_key(l))
            && self.free.len() + self.assigned.len() == self.capacity()
    }
}
