//! Product lifecycle runtime
//!
//! The runtime owns every piece of mutable state and is driven from the
//! world thread, one `tick` per game tick:
//!
//! ```text
//! inbox ─► accept ─► products ──► start ─► scheduler ─► overlays ─► teardown
//!                        ▲            │          │
//!                        │            ▼          ▼
//!                        └──── deferred sequencer (reveals, animations)
//! ```
//!
//! Stopping is cooperative: `cancel`, `stop_all` and expiry only flip the
//! status, and the next tick restores overlays and releases objects.

use crate::config::RuntimeConfig;
use crate::error::{Error, Result};
use crate::host::{swallow, Host};
use crate::identity::IdAllocator;
use crate::notification::{Notification, NotificationDispatcher, NotificationTiming};
use crate::overlay::{MenuClick, Overlays};
use crate::product::{Product, ProductStatus};
use crate::scheduler::{BehaviourScheduler, TickContext};
use crate::sequencer::{DeferredAction, DeferredSequencer, ScheduledAction};
use crate::spawn::SpawnAllocator;
use crate::store::DefinitionStore;
use crate::time::{Clock, Millis, SystemClock};
use crate::transaction::{TransactionId, TransactionInbox, TransactionRecord};
use crate::{GameRng, ProductId};
use indexmap::{IndexMap, IndexSet};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Deferred actions scheduled while draining run in the same tick, up to
/// this many passes
const MAX_ACTION_PASSES: usize = 8;

/// Outcome of offering a transaction to the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    Accepted(ProductId),
    /// Same transaction id seen before
    Duplicate,
    /// No streamer config or definition for the sku
    Unresolved,
    /// The product would already be over
    Expired,
    /// A free trigger of this sku arrived within its cooldown
    CoolingDown,
    /// Product cap reached
    AtCapacity,
}

impl Acceptance {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Acceptance::Accepted(_))
    }

    pub fn product(&self) -> Option<ProductId> {
        match self {
            Acceptance::Accepted(id) => Some(*id),
            _ => None,
        }
    }
}

/// What happened during one tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub accepted: usize,
    pub started: usize,
    pub stopped: usize,
    pub actions_run: usize,
    pub notifications_delivered: usize,
}

/// The marketplace effect runtime
#[derive(Debug)]
pub struct Runtime {
    config: RuntimeConfig,
    store: DefinitionStore,
    inbox: TransactionInbox,
    products: IndexMap<ProductId, Product>,
    /// Recently accepted transaction ids, oldest first
    seen: IndexSet<TransactionId>,
    /// Last free trigger per sku
    free_triggers: HashMap<String, Millis>,
    allocator: SpawnAllocator,
    overlays: Overlays,
    sequencer: DeferredSequencer,
    notifications: NotificationDispatcher,
    scheduler: BehaviourScheduler,
    rng: GameRng,
    ids: IdAllocator,
    player_animation_owner: Option<ProductId>,
    player_graphic_owner: Option<ProductId>,
}

impl Runtime {
    pub fn new(config: RuntimeConfig, store: DefinitionStore) -> Self {
        let seed = config
            .rng_seed
            .unwrap_or_else(|| SystemClock.now_ms() as u64);
        Self {
            store,
            inbox: TransactionInbox::new(),
            products: IndexMap::new(),
            seen: IndexSet::new(),
            free_triggers: HashMap::new(),
            allocator: SpawnAllocator::new(),
            overlays: Overlays::new(&config.overlay_caps),
            sequencer: DeferredSequencer::new(),
            notifications: NotificationDispatcher::new(
                config.notification_cooldown_ms,
                config.max_queued_notifications,
            ),
            scheduler: BehaviourScheduler::new(config.roll_attempts, config.placement.clone()),
            rng: GameRng::new(seed),
            ids: IdAllocator::default(),
            player_animation_owner: None,
            player_graphic_owner: None,
            config,
        }
    }

    /// Offer a transaction
    ///
    /// Never fails: anything that cannot become a product is dropped and the
    /// reason returned.
    pub fn accept(&mut self, record: TransactionRecord, now: Millis) -> Acceptance {
        if self.seen.contains(&record.id) {
            debug!(transaction = %record.id, "duplicate transaction ignored");
            return Acceptance::Duplicate;
        }
        let sku = record.sku().to_string();
        let (config, definition) = match self.store.resolve(&sku) {
            Ok(resolved) => resolved,
            Err(error) => {
                warn!(transaction = %record.id, %sku, %error, "transaction dropped");
                return Acceptance::Unresolved;
            }
        };

        let expired_at =
            record.timestamp_ms + config.duration_ms + self.config.expiry_correction_ms;
        if now >= expired_at {
            debug!(transaction = %record.id, expired_at, "transaction already expired");
            self.remember(record.id.clone());
            return Acceptance::Expired;
        }

        let paid = record.origin.is_paid();
        if !paid && config.cooldown_ms > 0 {
            if let Some(last) = self.free_triggers.get(&sku) {
                if record.timestamp_ms - last < config.cooldown_ms {
                    debug!(transaction = %record.id, %sku, "sku cooling down");
                    return Acceptance::CoolingDown;
                }
            }
        }

        if self.products.len() >= self.config.max_products {
            debug!(
                transaction = %record.id,
                cap = self.config.max_products,
                "product cap reached, dropping transaction"
            );
            return Acceptance::AtCapacity;
        }

        if !paid {
            self.free_triggers.insert(sku, record.timestamp_ms);
        }
        self.remember(record.id.clone());

        let id = self.ids.next_product();
        let product = Product::new(
            id,
            Arc::new(record),
            definition,
            config,
            now,
            self.config.expiry_correction_ms,
        );
        self.notify(&product, NotificationTiming::Now, now);
        info!(
            product = %id,
            transaction = %product.transaction.id,
            buyer = %product.transaction.buyer,
            definition = %product.definition.id,
            expired_at = product.expired_at,
            "product accepted"
        );
        self.products.insert(id, product);
        Acceptance::Accepted(id)
    }

    /// Advance every product by one tick
    pub fn tick<H: Host + ?Sized>(&mut self, now: Millis, host: &mut H) -> TickReport {
        let mut report = TickReport::default();

        for record in self.inbox.drain() {
            if self.accept(record, now).is_accepted() {
                report.accepted += 1;
            }
        }
        self.flag_respawns();
        report.actions_run += self.run_due_actions(now, host);
        self.expire_products(now);
        report.started += self.start_products(now);
        self.run_scheduler(now, host);
        report.actions_run += self.run_due_actions(now, host);
        self.update_overlays(now, host);
        report.stopped += self.teardown_stopped(now, host);
        if self.notifications.flush(now, host) {
            report.notifications_delivered += 1;
        }

        if report.accepted + report.started + report.stopped > 0 {
            debug!(
                now,
                accepted = report.accepted,
                started = report.started,
                stopped = report.stopped,
                active = self.products.len(),
                "tick"
            );
        }
        report
    }

    /// Pause a product; its queued actions are held until it resumes
    pub fn pause(&mut self, id: ProductId, now: Millis) -> Result<()> {
        if self.product_mut(id)?.pause(now) {
            info!(product = %id, "product paused");
        }
        Ok(())
    }

    pub fn resume(&mut self, id: ProductId, now: Millis) -> Result<()> {
        if let Some(paused_for) = self.product_mut(id)?.resume(now) {
            let postponed = self.sequencer.postpone_owner(id, paused_for);
            info!(product = %id, paused_for, postponed, "product resumed");
        }
        Ok(())
    }

    /// Stop a product; its resources are released on the next tick
    pub fn cancel(&mut self, id: ProductId) -> Result<()> {
        if self.product_mut(id)?.stop() {
            info!(product = %id, "product cancelled");
        }
        Ok(())
    }

    /// Stop every product; returns how many were running
    pub fn stop_all(&mut self) -> usize {
        let stopped = self
            .products
            .values_mut()
            .map(|product| product.stop())
            .filter(|stopped| *stopped)
            .count();
        if stopped > 0 {
            info!(stopped, "all products stopped");
        }
        stopped
    }

    /// The host reloaded the visible region and cleared every spawned visual
    pub fn handle_region_reload(&mut self) {
        self.allocator.mark_all_respawn_required();
        debug!(objects = self.allocator.len(), "region reloaded");
    }

    /// Offer a menu click to active menu overlays
    ///
    /// Returns true when the click is consumed and must not reach the host.
    pub fn on_menu_click(&mut self, click: &MenuClick, now: Millis) -> bool {
        let Some(overlay) = self.overlays.menu_options.intercept(click) else {
            return false;
        };
        let owner = overlay.product;
        if let Some(product) = self.products.get(&owner) {
            let context = product.template_context(now);
            for def in &overlay.frame.notifications {
                self.notifications
                    .enqueue(Notification::render(def, &context));
            }
        }
        debug!(product = %owner, option = %click.option, "menu click consumed");
        true
    }

    fn product_mut(&mut self, id: ProductId) -> Result<&mut Product> {
        self.products
            .get_mut(&id)
            .ok_or_else(|| Error::ProductNotFound(id.to_string()))
    }

    fn remember(&mut self, id: TransactionId) {
        self.seen.insert(id);
        while self.seen.len() > self.config.dedupe_window {
            self.seen.shift_remove_index(0);
        }
    }

    fn notify(&mut self, product: &Product, timing: NotificationTiming, now: Millis) {
        let context = product.template_context(now);
        for def in &product.definition.behaviour.notifications {
            if def.timing == timing {
                self.notifications
                    .enqueue(Notification::render(def, &context));
            }
        }
    }

    fn flag_respawns(&mut self) {
        let flagged = self.allocator.drain_respawn_required();
        if flagged.is_empty() {
            return;
        }
        for object in self.products.values_mut().flat_map(|product| product.objects_mut()) {
            if flagged.contains(&object.id) {
                object.needs_respawn = true;
            }
        }
    }

    fn expire_products(&mut self, now: Millis) {
        for product in self.products.values_mut() {
            if product.is_expired(now) && product.stop() {
                info!(product = %product.id, "product expired");
            }
        }
    }

    fn start_products(&mut self, now: Millis) -> usize {
        let pending: Vec<ProductId> = self
            .products
            .values()
            .filter(|product| product.is_active() && !product.has_started())
            .map(|product| product.id)
            .collect();

        for id in &pending {
            let Some(product) = self.products.get_mut(id) else {
                continue;
            };
            product.mark_started();
            let product = &self.products[id];
            add_overlays(&mut self.overlays, product, now);
            let context = product.template_context(now);
            for def in &product.definition.behaviour.notifications {
                if def.timing == NotificationTiming::OnStart {
                    self.notifications
                        .enqueue(Notification::render(def, &context));
                }
            }
            info!(product = %id, "product started");
        }
        pending.len()
    }

    fn run_scheduler<H: Host + ?Sized>(&mut self, now: Millis, host: &mut H) {
        let Runtime {
            products,
            scheduler,
            allocator,
            sequencer,
            overlays,
            rng,
            ids,
            ..
        } = self;
        let mut ctx = TickContext {
            now,
            host,
            allocator,
            sequencer,
            movement: &mut overlays.movement,
            rng,
            ids,
        };
        for product in products.values_mut() {
            if product.is_stopped() {
                continue;
            }
            scheduler.sync_visibility(product, &mut ctx);
            scheduler.tick(product, &mut ctx);
        }
    }

    fn run_due_actions<H: Host + ?Sized>(&mut self, now: Millis, host: &mut H) -> usize {
        let paused: HashSet<ProductId> = self
            .products
            .values()
            .filter(|product| product.status() == ProductStatus::Paused)
            .map(|product| product.id)
            .collect();
        let mut executed = 0;
        for _ in 0..MAX_ACTION_PASSES {
            let due = self
                .sequencer
                .drain_due_except(now, |owner| paused.contains(&owner));
            if due.is_empty() {
                break;
            }
            for scheduled in due {
                if self.execute(scheduled, now, host) {
                    executed += 1;
                }
            }
        }
        executed
    }

    /// Run one deferred action after re-validating its owner
    fn execute<H: Host + ?Sized>(
        &mut self,
        scheduled: ScheduledAction,
        now: Millis,
        host: &mut H,
    ) -> bool {
        let Runtime {
            products,
            scheduler,
            allocator,
            sequencer,
            overlays,
            rng,
            ids,
            player_animation_owner,
            player_graphic_owner,
            ..
        } = self;
        let ScheduledAction { owner, action, .. } = scheduled;

        let Some(product) = products.get_mut(&owner) else {
            trace!(product = %owner, ?action, "owner gone, dropping action");
            return false;
        };
        if product.status() != ProductStatus::Active {
            return false;
        }

        match action {
            DeferredAction::RevealObject(id) => {
                let mut ctx = TickContext {
                    now,
                    host,
                    allocator,
                    sequencer,
                    movement: &mut overlays.movement,
                    rng,
                    ids,
                };
                scheduler.reveal_object(product, id, &mut ctx);
            }
            DeferredAction::DespawnObject(id) => {
                if let Some(mut object) = product.remove_object(id) {
                    object.despawn(host, allocator);
                }
            }
            DeferredAction::PlayObjectAnimation {
                object,
                animation,
                looping,
            } => {
                if let Some(object) = product.object_mut(object) {
                    object.play_animation(host, animation, looping);
                }
            }
            DeferredAction::ResetObjectAnimation(id) => {
                if let Some(object) = product.object_mut(id) {
                    object.reset_animation(host);
                }
            }
            DeferredAction::PlayerAnimation(animation) => {
                swallow("set_player_animation", host.set_player_animation(Some(animation)));
                *player_animation_owner = Some(owner);
            }
            DeferredAction::ResetPlayerAnimation => {
                if *player_animation_owner == Some(owner) {
                    swallow("set_player_animation", host.set_player_animation(None));
                    *player_animation_owner = None;
                }
            }
            DeferredAction::PlayerGraphic(graphic) => {
                swallow("set_player_graphic", host.set_player_graphic(Some(graphic)));
                *player_graphic_owner = Some(owner);
            }
            DeferredAction::ResetPlayerGraphic => {
                if *player_graphic_owner == Some(owner) {
                    swallow("set_player_graphic", host.set_player_graphic(None));
                    *player_graphic_owner = None;
                }
            }
        }
        true
    }

    fn update_overlays<H: Host + ?Sized>(&mut self, now: Millis, host: &mut H) {
        let products = &self.products;
        let status = |id: ProductId| {
            products
                .get(&id)
                .map_or(ProductStatus::Stopped, Product::status)
        };
        self.overlays.update(now, &status, host);
    }

    /// Release everything held by stopped products and drop them
    fn teardown_stopped<H: Host + ?Sized>(&mut self, now: Millis, host: &mut H) -> usize {
        let stopped: Vec<ProductId> = self
            .products
            .values()
            .filter(|product| product.is_stopped())
            .map(|product| product.id)
            .collect();

        for id in &stopped {
            let Some(mut product) = self.products.shift_remove(id) else {
                continue;
            };
            for mut object in product.take_objects() {
                object.despawn(host, &mut self.allocator);
            }
            if self.player_animation_owner == Some(*id) {
                swallow("set_player_animation", host.set_player_animation(None));
                self.player_animation_owner = None;
            }
            if self.player_graphic_owner == Some(*id) {
                swallow("set_player_graphic", host.set_player_graphic(None));
                self.player_graphic_owner = None;
            }
            let dropped_actions = self.sequencer.forget_owner(*id);
            if product.has_started() {
                self.notify(&product, NotificationTiming::OnEnd, now);
            }
            info!(product = %id, dropped_actions, "product stopped");
        }
        stopped.len()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Handle for feed tasks to push transactions through
    pub fn inbox(&self) -> TransactionInbox {
        self.inbox.clone()
    }

    pub fn store(&self) -> &DefinitionStore {
        &self.store
    }

    pub fn product(&self, id: ProductId) -> Option<&Product> {
        self.products.get(&id)
    }

    pub fn products(&self) -> impl Iterator<Item = &Product> {
        self.products.values()
    }

    pub fn product_count(&self) -> usize {
        self.products.len()
    }

    pub fn allocator(&self) -> &SpawnAllocator {
        &self.allocator
    }

    pub fn overlays(&self) -> &Overlays {
        &self.overlays
    }

    pub fn sequencer(&self) -> &DeferredSequencer {
        &self.sequencer
    }

    pub fn notifications(&self) -> &NotificationDispatcher {
        &self.notifications
    }
}

/// Register the overlays a product holds for its whole life
///
/// Movement overrides are kept registered by the scheduler instead.
fn add_overlays(overlays: &mut Overlays, product: &Product, now: Millis) {
    let behaviour = &product.definition.behaviour;
    if let Some(frame) = &behaviour.equipment {
        overlays.equipment.add_effect(product, frame.clone(), now);
    }
    for frame in &behaviour.widgets {
        overlays.widgets.add_effect(product, frame.clone(), now);
    }
    for frame in &behaviour.menu_options {
        overlays.menu_options.add_effect(product, frame.clone(), now);
    }
    if let Some(frame) = &behaviour.visibility {
        overlays.visibility.add_effect(product, frame.clone(), now);
    }
    if let Some(frame) = &behaviour.overhead_text {
        let mut frame = frame.clone();
        frame.text = product.template_context(now).render(&frame.text);
        overlays.overhead_text.add_effect(product, frame, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{
        AnimationFrame, ModelSet, ProductDefinition, RandomRange, SpawnBehaviour, SpawnDef,
        SpawnInterval, SpawnOption, StreamerConfig, VisualEffect,
    };
    use crate::notification::NotificationDef;
    use crate::overlay::{
        EquipmentFrame, EquipmentSlot, MenuOptionFrame, MovementAnimations, MovementFrame,
        OverheadTarget, OverheadTextFrame, SlotOverride, WidgetFrame, WidgetId, WidgetState,
    };
    use crate::store::Catalog;
    use crate::test_host::FakeHost;
    use crate::transaction::TransactionOrigin;
    use crate::DefId;

    const SKU: &str = "sku-test";

    fn config() -> RuntimeConfig {
        RuntimeConfig::default()
            .with_seed(7)
            .with_expiry_correction(0)
            .with_notification_cooldown(0)
    }

    fn store_with(definition: ProductDefinition, duration_ms: Millis, cooldown_ms: Millis) -> DefinitionStore {
        let mut catalog = Catalog::new();
        catalog.insert_streamer_config(StreamerConfig {
            sku: SKU.into(),
            product_id: definition.id.clone(),
            duration_ms,
            cooldown_ms,
        });
        catalog.insert_definition(definition);
        DefinitionStore::with_catalog(catalog)
    }

    fn runtime_with(definition: ProductDefinition, duration_ms: Millis) -> Runtime {
        Runtime::new(config(), store_with(definition, duration_ms, 0))
    }

    fn purchase(id: &str, timestamp_ms: Millis) -> TransactionRecord {
        TransactionRecord::purchase(id, timestamp_ms, "Zezima", SKU)
    }

    fn spawn_behaviour(interval: Option<SpawnInterval>) -> SpawnBehaviour {
        SpawnBehaviour {
            interval,
            options: vec![SpawnOption::new(vec![SpawnDef::new(vec![ModelSet::new(vec![100])])])],
        }
    }

    fn definition() -> ProductDefinition {
        ProductDefinition::new("test", "Snowfall")
    }

    fn widget_frame() -> WidgetFrame {
        WidgetFrame {
            widget: WidgetId::new(1, 2),
            text: Some("bought".into()),
            color: None,
            hidden: None,
            duration_ms: None,
        }
    }

    fn host_with_widget() -> FakeHost {
        let mut host = FakeHost::new();
        host.widgets.insert(
            WidgetId::new(1, 2),
            WidgetState {
                text: "original".into(),
                color: 0,
                hidden: false,
            },
        );
        host
    }

    fn run(runtime: &mut Runtime, host: &mut FakeHost, from: Millis, to: Millis, step: Millis) {
        let mut now = from;
        while now <= to {
            runtime.tick(now, host);
            now += step;
        }
    }

    #[test]
    fn test_duplicates_are_idempotent() {
        let mut runtime = runtime_with(definition(), 10_000);
        assert!(runtime.accept(purchase("tx-1", 0), 0).is_accepted());
        assert_eq!(runtime.accept(purchase("tx-1", 0), 10), Acceptance::Duplicate);
        assert_eq!(runtime.product_count(), 1);
    }

    #[test]
    fn test_dedupe_window_is_bounded() {
        let mut config = config();
        config.dedupe_window = 2;
        let mut runtime = Runtime::new(config, store_with(definition(), 10_000, 0));
        for id in ["a", "b", "c"] {
            runtime.accept(purchase(id, 0), 0);
        }
        assert_eq!(runtime.seen.len(), 2);
        assert!(!runtime.seen.contains(&TransactionId::new("a")));
    }

    #[test]
    fn test_unresolved_and_expired_are_dropped() {
        let mut runtime = runtime_with(definition(), 10_000);
        let unknown = TransactionRecord::purchase("tx-1", 0, "Zezima", "nope");
        assert_eq!(runtime.accept(unknown, 0), Acceptance::Unresolved);
        assert_eq!(runtime.accept(purchase("tx-2", 0), 10_000), Acceptance::Expired);
        assert_eq!(runtime.accept(purchase("tx-2", 0), 10_000), Acceptance::Duplicate);
        assert_eq!(runtime.product_count(), 0);
    }

    #[test]
    fn test_product_cap_drops_newest() {
        let mut runtime = Runtime::new(config().with_max_products(1), store_with(definition(), 10_000, 0));
        let first = runtime.accept(purchase("tx-1", 0), 0).product().unwrap();
        assert_eq!(runtime.accept(purchase("tx-2", 0), 0), Acceptance::AtCapacity);
        assert_eq!(runtime.products().map(|p| p.id).collect::<Vec<_>>(), vec![first]);
    }

    #[test]
    fn test_free_triggers_respect_cooldown() {
        let mut runtime = Runtime::new(config(), store_with(definition(), 60_000, 5_000));
        let free = |id: &str, at: Millis| {
            TransactionRecord::with_origin(id, at, "Zezima", TransactionOrigin::Free(SKU.into()))
        };
        assert!(runtime.accept(free("a", 0), 0).is_accepted());
        assert_eq!(runtime.accept(free("b", 1_000), 1_000), Acceptance::CoolingDown);
        assert!(runtime.accept(purchase("c", 1_000), 1_000).is_accepted());
        assert!(runtime.accept(free("d", 5_000), 5_000).is_accepted());
    }

    #[test]
    fn test_spawn_count_independent_of_tick_rate() {
        let mut definition = definition();
        definition.behaviour.spawn_behaviours = vec![
            spawn_behaviour(None),
            spawn_behaviour(Some(SpawnInterval {
                chance: None,
                delay_ms: 1_000,
                repeat: 2,
            })),
        ];

        for step in [100, 600, 1_000, 2_500, 3_000] {
            let mut runtime = runtime_with(definition.clone(), 10_000);
            let mut host = FakeHost::new();
            runtime.inbox().push(purchase("tx-1", 0));

            run(&mut runtime, &mut host, 0, 9_999, step);
            assert_eq!(host.placements_total, 3, "tick step {}", step);
            let product = runtime.products().next().unwrap();
            assert_eq!(product.behaviour_state(0).unwrap().trigger_count, 1);
            assert_eq!(product.behaviour_state(1).unwrap().trigger_count, 2);

            run(&mut runtime, &mut host, 10_000, 14_000, step);
            assert_eq!(host.placements_total, 3, "tick step {}", step);
            assert_eq!(runtime.product_count(), 0);
            assert_eq!(host.placed_objects(), 0);
            assert!(runtime.allocator().is_empty());
        }
    }

    #[test]
    fn test_notification_timings() {
        let mut definition = definition();
        definition.behaviour.notifications = vec![
            NotificationDef::new(NotificationTiming::Now, "thanks {buyer}"),
            NotificationDef::new(NotificationTiming::OnStart, "{product} started"),
            NotificationDef::new(NotificationTiming::OnEnd, "{product} ended"),
        ];
        let mut runtime = runtime_with(definition, 5_000);
        let mut host = FakeHost::new();
        runtime.accept(purchase("tx-1", 0), 0);

        run(&mut runtime, &mut host, 0, 8_000, 500);
        let delivered: Vec<_> = host.delivered.iter().map(|n| n.message.as_str()).collect();
        assert_eq!(
            delivered,
            vec!["thanks Zezima", "Snowfall started", "Snowfall ended"]
        );
    }

    #[test]
    fn test_cancel_releases_everything() {
        let mut definition = definition();
        definition.behaviour.spawn_behaviours = vec![spawn_behaviour(None)];
        definition.behaviour.widgets = vec![widget_frame()];
        definition.behaviour.equipment = Some(EquipmentFrame {
            slots: vec![SlotOverride {
                slot: EquipmentSlot::Head,
                item: Some(42),
            }],
            duration_ms: None,
        });
        let mut runtime = runtime_with(definition, 60_000);
        let mut host = host_with_widget();
        host.equipment.insert(EquipmentSlot::Head, 1);
        let id = runtime.accept(purchase("tx-1", 0), 0).product().unwrap();

        runtime.tick(0, &mut host);
        assert_eq!(host.visible_objects(), 1);
        assert_eq!(host.widget_text(WidgetId::new(1, 2)), "bought");
        assert_eq!(host.equipment.get(&EquipmentSlot::Head), Some(&42));

        runtime.cancel(id).unwrap();
        let report = runtime.tick(600, &mut host);
        assert_eq!(report.stopped, 1);
        assert_eq!(host.placed_objects(), 0);
        assert!(runtime.allocator().is_empty());
        assert_eq!(host.widget_text(WidgetId::new(1, 2)), "original");
        assert_eq!(host.equipment.get(&EquipmentSlot::Head), Some(&1));
        assert_eq!(runtime.overlays().total_active(), 0);
        assert!(matches!(runtime.cancel(id), Err(Error::ProductNotFound(_))));
    }

    #[test]
    fn test_pause_and_resume() {
        let mut definition = definition();
        definition.behaviour.spawn_behaviours = vec![spawn_behaviour(None)];
        definition.behaviour.widgets = vec![widget_frame()];
        let mut runtime = runtime_with(definition, 60_000);
        let mut host = host_with_widget();
        let id = runtime.accept(purchase("tx-1", 0), 0).product().unwrap();
        runtime.tick(0, &mut host);

        runtime.pause(id, 300).unwrap();
        runtime.tick(600, &mut host);
        assert_eq!(host.visible_objects(), 0);
        assert_eq!(host.widget_text(WidgetId::new(1, 2)), "original");
        assert_eq!(runtime.product(id).unwrap().status(), ProductStatus::Paused);

        runtime.resume(id, 1_000).unwrap();
        runtime.tick(1_200, &mut host);
        assert_eq!(host.visible_objects(), 1);
        assert_eq!(host.widget_text(WidgetId::new(1, 2)), "bought");
    }

    #[test]
    fn test_paused_effect_keeps_its_reset() {
        let mut definition = definition();
        let mut behaviour = spawn_behaviour(None);
        behaviour.options[0].spawns[0].show_effect = Some(VisualEffect {
            player_animation: Some(AnimationFrame::new(77).delayed(600).lasting(1_200)),
            ..VisualEffect::default()
        });
        definition.behaviour.spawn_behaviours = vec![behaviour];
        let mut runtime = runtime_with(definition, 60_000);
        let mut host = FakeHost::new();
        let id = runtime.accept(purchase("tx-1", 0), 0).product().unwrap();
        runtime.tick(0, &mut host);

        runtime.pause(id, 300).unwrap();
        run(&mut runtime, &mut host, 600, 2_400, 600);
        assert_eq!(host.player_animation, None);
        assert_eq!(runtime.sequencer().pending_for(id), 2);

        // Play and reset both move back by the 2100ms spent paused
        runtime.resume(id, 2_400).unwrap();
        runtime.tick(3_000, &mut host);
        assert_eq!(host.player_animation, Some(77));
        runtime.tick(3_600, &mut host);
        assert_eq!(host.player_animation, Some(77));
        run(&mut runtime, &mut host, 4_200, 20_000, 600);
        assert_eq!(host.player_animation, None);
        assert!(runtime.sequencer().is_empty());
    }

    #[test]
    fn test_pending_reveal_of_cancelled_product_never_runs() {
        let mut definition = definition();
        let mut behaviour = spawn_behaviour(None);
        behaviour.options[0].spawn_delay_ms = RandomRange::fixed(5_000);
        definition.behaviour.spawn_behaviours = vec![behaviour];
        let mut runtime = runtime_with(definition, 60_000);
        let mut host = FakeHost::new();
        let id = runtime.accept(purchase("tx-1", 0), 0).product().unwrap();

        runtime.tick(0, &mut host);
        assert_eq!(host.placed_objects(), 1);
        assert_eq!(host.visible_objects(), 0);

        runtime.cancel(id).unwrap();
        runtime.tick(600, &mut host);
        run(&mut runtime, &mut host, 1_200, 7_000, 600);
        assert_eq!(host.placed_objects(), 0);
        assert!(runtime.sequencer().is_empty());
    }

    #[test]
    fn test_menu_click_consumed() {
        let mut definition = definition();
        definition.behaviour.menu_options = vec![MenuOptionFrame {
            option: "Walk here".into(),
            target: None,
            notifications: vec![NotificationDef::new(NotificationTiming::Now, "{buyer} says no")],
            duration_ms: None,
        }];
        let mut runtime = runtime_with(definition, 60_000);
        let mut host = FakeHost::new();
        runtime.accept(purchase("tx-1", 0), 0);
        runtime.tick(0, &mut host);

        assert!(runtime.on_menu_click(&MenuClick::new("walk here", ""), 100));
        assert!(!runtime.on_menu_click(&MenuClick::new("Attack", "Goblin"), 100));
        let pending: Vec<_> = runtime
            .notifications()
            .pending()
            .map(|n| n.message.clone())
            .collect();
        assert_eq!(pending, vec!["Zezima says no"]);
    }

    #[test]
    fn test_region_reload_respawns_objects() {
        let mut definition = definition();
        definition.behaviour.spawn_behaviours = vec![spawn_behaviour(None)];
        let mut runtime = runtime_with(definition, 60_000);
        let mut host = FakeHost::new();
        runtime.accept(purchase("tx-1", 0), 0);
        runtime.tick(0, &mut host);
        assert_eq!(host.visible_objects(), 1);

        host.clear_objects();
        runtime.handle_region_reload();
        runtime.tick(600, &mut host);
        assert_eq!(host.visible_objects(), 1);
        assert_eq!(host.placements_total, 2);
    }

    #[test]
    fn test_movement_override_reverted_on_stop() {
        let mut definition = definition();
        definition.behaviour.movement_animations = Some(MovementFrame {
            animations: MovementAnimations {
                walk: Some(500),
                ..MovementAnimations::default()
            },
            duration_ms: None,
        });
        let mut runtime = runtime_with(definition, 60_000);
        let mut host = FakeHost::new();
        host.movement.walk = Some(819);
        let id = runtime.accept(purchase("tx-1", 0), 0).product().unwrap();

        runtime.tick(0, &mut host);
        assert_eq!(host.movement.walk, Some(500));
        assert_eq!(runtime.overlays().movement.active_owner(), Some(id));

        runtime.stop_all();
        runtime.tick(600, &mut host);
        assert_eq!(host.movement.walk, Some(819));
        assert_eq!(runtime.overlays().movement.active_owner(), None);
    }

    #[test]
    fn test_movement_override_ends_after_its_duration() {
        let mut definition = definition();
        definition.behaviour.movement_animations = Some(MovementFrame {
            animations: MovementAnimations {
                walk: Some(500),
                ..MovementAnimations::default()
            },
            duration_ms: Some(1_200),
        });
        let mut runtime = runtime_with(definition, 60_000);
        let mut host = FakeHost::new();
        host.movement.walk = Some(819);
        let id = runtime.accept(purchase("tx-1", 0), 0).product().unwrap();

        runtime.tick(0, &mut host);
        assert_eq!(host.movement.walk, Some(500));
        run(&mut runtime, &mut host, 600, 6_000, 600);
        assert_eq!(host.movement.walk, Some(819));
        assert_eq!(runtime.overlays().movement.active_owner(), None);
        assert!(runtime.product(id).unwrap().is_active());
    }

    #[test]
    fn test_overhead_text_is_rendered() {
        let mut definition = definition();
        definition.behaviour.overhead_text = Some(OverheadTextFrame {
            target: OverheadTarget::LocalPlayer,
            text: "Thanks {buyer}!".into(),
            duration_ms: Some(3_000),
        });
        let mut runtime = runtime_with(definition, 60_000);
        let mut host = FakeHost::new();
        runtime.accept(purchase("tx-1", 0), 0);

        runtime.tick(0, &mut host);
        assert_eq!(
            host.overhead.get(&OverheadTarget::LocalPlayer),
            Some(&Some("Thanks Zezima!".to_string()))
        );
        runtime.tick(3_000, &mut host);
        assert_eq!(host.overhead.get(&OverheadTarget::LocalPlayer), Some(&None));
    }

    #[test]
    fn test_reload_keeps_bound_definition() {
        let mut runtime = runtime_with(definition(), 60_000);
        let first = runtime.accept(purchase("tx-1", 0), 0).product().unwrap();

        let mut updated = definition();
        updated.version = 2;
        let mut catalog = Catalog::new();
        catalog.insert_streamer_config(StreamerConfig {
            sku: SKU.into(),
            product_id: DefId::new("test"),
            duration_ms: 60_000,
            cooldown_ms: 0,
        });
        catalog.insert_definition(updated);
        runtime.store().publish(catalog);

        let second = runtime.accept(purchase("tx-2", 0), 0).product().unwrap();
        assert_eq!(runtime.product(first).unwrap().definition.version, 0);
        assert_eq!(runtime.product(second).unwrap().definition.version, 2);
    }

    #[test]
    fn test_failing_host_does_not_abort_tick() {
        let mut definition = definition();
        definition.behaviour.spawn_behaviours = vec![spawn_behaviour(None)];
        definition.behaviour.notifications =
            vec![NotificationDef::new(NotificationTiming::Now, "hi")];
        let mut runtime = runtime_with(definition, 5_000);
        let mut host = FakeHost::new();
        host.fail_placement = true;
        host.fail_delivery = true;
        runtime.accept(purchase("tx-1", 0), 0);

        runtime.tick(0, &mut host);
        assert_eq!(host.placed_objects(), 0);
        assert_eq!(runtime.products().next().unwrap().object_count(), 1);

        // Placement recovers on a later tick
        host.fail_placement = false;
        runtime.tick(600, &mut host);
        assert_eq!(host.visible_objects(), 1);
    }
}
