//! Deferred world mutations
//!
//! Staggered sequences (spawner then object, animation then reset) are
//! queued here with an absolute due time and executed by the runtime on the
//! world thread. Nested delays compose by addition: callers pass the sum of
//! every enclosing delay.
//!
//! Nothing here can be cancelled mid-flight. The runtime re-checks the owning
//! product before executing each action. Actions of a paused owner stay
//! queued and are shifted by the paused time on resume, so plays and their
//! resets keep their spacing.

use crate::time::Millis;
use crate::{ObjectId, ProductId};
use std::collections::BTreeMap;

/// A world mutation to run later
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferredAction {
    /// Place if needed, show, and start the object's own lifetime
    RevealObject(ObjectId),
    /// Hide, deregister and remove the object
    DespawnObject(ObjectId),
    PlayObjectAnimation {
        object: ObjectId,
        animation: u32,
        looping: bool,
    },
    /// Back to the idle animation
    ResetObjectAnimation(ObjectId),
    PlayerAnimation(u32),
    ResetPlayerAnimation,
    PlayerGraphic(u32),
    ResetPlayerGraphic,
}

/// An action that has come due
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledAction {
    pub owner: ProductId,
    pub due_at: Millis,
    pub action: DeferredAction,
}

/// Time-ordered queue of deferred actions
///
/// Actions due at the same instant run in the order they were scheduled.
#[derive(Debug, Clone, Default)]
pub struct DeferredSequencer {
    queue: BTreeMap<(Millis, u64), (ProductId, DeferredAction)>,
    next_seq: u64,
}

impl DeferredSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `action` on behalf of `owner` once `delay_ms` has passed
    ///
    /// Negative delays run on the next drain. Returns the due instant.
    pub fn schedule(
        &mut self,
        owner: ProductId,
        action: DeferredAction,
        delay_ms: Millis,
        now: Millis,
    ) -> Millis {
        let due_at = now.saturating_add(delay_ms.max(0));
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.insert((due_at, seq), (owner, action));
        due_at
    }

    /// Remove and return every action due at or before `now`
    pub fn drain_due(&mut self, now: Millis) -> Vec<ScheduledAction> {
        self.drain_due_except(now, |_| false)
    }

    /// Like `drain_due`, but actions whose owner is `held` stay queued
    pub fn drain_due_except(
        &mut self,
        now: Millis,
        held: impl Fn(ProductId) -> bool,
    ) -> Vec<ScheduledAction> {
        let later = match now.checked_add(1) {
            Some(bound) => self.queue.split_off(&(bound, 0)),
            None => BTreeMap::new(),
        };
        let due = std::mem::replace(&mut self.queue, later);
        let mut drained = Vec::with_capacity(due.len());
        for ((due_at, seq), (owner, action)) in due {
            if held(owner) {
                self.queue.insert((due_at, seq), (owner, action));
            } else {
                drained.push(ScheduledAction {
                    owner,
                    due_at,
                    action,
                });
            }
        }
        drained
    }

    /// Push every action of `owner` back by `delay_ms`; returns how many moved
    pub fn postpone_owner(&mut self, owner: ProductId, delay_ms: Millis) -> usize {
        if delay_ms <= 0 {
            return 0;
        }
        let keys: Vec<(Millis, u64)> = self
            .queue
            .iter()
            .filter(|(_, (queued_owner, _))| *queued_owner == owner)
            .map(|(key, _)| *key)
            .collect();
        for (due_at, seq) in &keys {
            if let Some(entry) = self.queue.remove(&(*due_at, *seq)) {
                self.queue
                    .insert((due_at.saturating_add(delay_ms), *seq), entry);
            }
        }
        keys.len()
    }

    /// Drop every action of `owner`; returns how many were dropped
    pub fn forget_owner(&mut self, owner: ProductId) -> usize {
        let before = self.queue.len();
        self.queue.retain(|_, (queued_owner, _)| *queued_owner != owner);
        before - self.queue.len()
    }

    pub fn next_due_at(&self) -> Option<Millis> {
        self.queue.keys().next().map(|(due_at, _)| *due_at)
    }

    pub fn pending_for(&self, owner: ProductId) -> usize {
        self.queue
            .values()
            .filter(|(queued_owner, _)| *queued_owner == owner)
            .count()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
