//! Product instances: one per accepted transaction

use crate::definition::{ProductDefinition, StreamerConfig};
use crate::notification::TemplateContext;
use crate::spawn::SpawnedObject;
use crate::time::Millis;
use crate::transaction::TransactionRecord;
use crate::{ObjectId, ProductId};
use indexmap::IndexMap;
use std::sync::Arc;

/// Lifecycle status of a product
///
/// `Active` and `Paused` alternate freely; `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductStatus {
    Active,
    Paused,
    Stopped,
}

/// Trigger bookkeeping of one spawn behaviour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BehaviourState {
    pub last_trigger_at: Option<Millis>,
    /// Triggers so far, counted whether or not the chance roll spawned
    pub trigger_count: u32,
}

/// A running, time-bounded instance of a product definition
#[derive(Debug, Clone)]
pub struct Product {
    pub id: ProductId,
    pub transaction: Arc<TransactionRecord>,
    /// Bound at acceptance; later definition reloads do not affect it
    pub definition: Arc<ProductDefinition>,
    pub config: StreamerConfig,
    pub started_at: Millis,
    /// Fixed at creation, never recomputed
    pub expired_at: Millis,
    status: ProductStatus,
    started: bool,
    paused_at: Option<Millis>,
    movement_issued: bool,
    behaviour_states: Vec<BehaviourState>,
    objects: IndexMap<ObjectId, SpawnedObject>,
}

impl Product {
    /// Create an active product
    ///
    /// Expiry is `transaction timestamp + duration + correction`.
    pub fn new(
        id: ProductId,
        transaction: Arc<TransactionRecord>,
        definition: Arc<ProductDefinition>,
        config: StreamerConfig,
        now: Millis,
        correction_ms: Millis,
    ) -> Self {
        let expired_at = transaction.timestamp_ms + config.duration_ms + correction_ms;
        let behaviour_states =
            vec![BehaviourState::default(); definition.behaviour.spawn_behaviours.len()];
        Self {
            id,
            transaction,
            definition,
            config,
            started_at: now,
            expired_at,
            status: ProductStatus::Active,
            started: false,
            paused_at: None,
            movement_issued: false,
            behaviour_states,
            objects: IndexMap::new(),
        }
    }

    pub fn status(&self) -> ProductStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == ProductStatus::Active
    }

    pub fn is_stopped(&self) -> bool {
        self.status == ProductStatus::Stopped
    }

    pub fn is_expired(&self, now: Millis) -> bool {
        now >= self.expired_at
    }

    /// Remaining life, never negative
    pub fn expires_in_ms(&self, now: Millis) -> Millis {
        (self.expired_at - now).max(0)
    }

    /// Returns false unless the product was active
    pub fn pause(&mut self, now: Millis) -> bool {
        if self.status != ProductStatus::Active {
            return false;
        }
        self.status = ProductStatus::Paused;
        self.paused_at = Some(now);
        true
    }

    /// Returns how long the product was paused, or `None` unless it was
    pub fn resume(&mut self, now: Millis) -> Option<Millis> {
        if self.status != ProductStatus::Paused {
            return None;
        }
        self.status = ProductStatus::Active;
        let paused_at = self.paused_at.take().unwrap_or(now);
        Some((now - paused_at).max(0))
    }

    /// Returns false when already stopped
    pub fn stop(&mut self) -> bool {
        if self.status == ProductStatus::Stopped {
            return false;
        }
        self.status = ProductStatus::Stopped;
        true
    }

    /// Whether the start phase has run
    pub fn has_started(&self) -> bool {
        self.started
    }

    /// Whether the movement override was registered once already
    pub fn movement_issued(&self) -> bool {
        self.movement_issued
    }

    pub(crate) fn mark_movement_issued(&mut self) {
        self.movement_issued = true;
    }

    pub(crate) fn mark_started(&mut self) {
        self.started = true;
    }

    pub fn behaviour_state(&self, index: usize) -> Option<&BehaviourState> {
        self.behaviour_states.get(index)
    }

    pub(crate) fn behaviour_state_mut(&mut self, index: usize) -> Option<&mut BehaviourState> {
        self.behaviour_states.get_mut(index)
    }

    pub fn objects(&self) -> impl Iterator<Item = &SpawnedObject> {
        self.objects.values()
    }

    pub fn objects_mut(&mut self) -> impl Iterator<Item = &mut SpawnedObject> {
        self.objects.values_mut()
    }

    pub fn object(&self, id: ObjectId) -> Option<&SpawnedObject> {
        self.objects.get(&id)
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut SpawnedObject> {
        self.objects.get_mut(&id)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub(crate) fn add_object(&mut self, object: SpawnedObject) {
        self.objects.insert(object.id, object);
    }

    pub(crate) fn remove_object(&mut self, id: ObjectId) -> Option<SpawnedObject> {
        self.objects.shift_remove(&id)
    }

    pub(crate) fn take_objects(&mut self) -> Vec<SpawnedObject> {
        self.objects.drain(..).map(|(_, object)| object).collect()
    }

    /// Values for notification templates
    pub fn template_context(&self, now: Millis) -> TemplateContext {
        let cost = self.transaction.cost.as_ref();
        TemplateContext {
            buyer: self.transaction.buyer.clone(),
            product: self.definition.name.clone(),
            amount: cost.map(|cost| cost.amount),
            currency: cost.map(|cost| cost.currency.clone()),
            remaining_ms: self.expires_in_ms(now),
        }
    }
}
