// Copyright 2025 herald contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The per-event-type binding registry and its dispatch loop.

use std::any::type_name;
use std::cell::{Cell, RefCell};
use std::panic::Location;
use std::rc::Rc;

use crate::diagnostics::Diagnostics;
use crate::event::binding::{Binding, BindingId, ClosureListener, EventListener, RemovalReason};
use crate::event::subscription::EventSubscription;
use crate::event::Event;
use crate::owner::{OwnerDirectory, OwnerId};

/// Type-erased view of a bus, used by the hub for bulk operations.
pub(crate) trait AnyBus {
    fn clear_bindings(&self, expected: bool);
    fn prune_dead(&self);
}

/// Shared core of one bus. The registry `Vec` is the authoritative holder of
/// binding records; everything else references them weakly.
pub(crate) struct BusCore<E: Event> {
    bindings: RefCell<Vec<Rc<Binding<E>>>>,
    next_id: Cell<u64>,
    owners: Rc<RefCell<OwnerDirectory>>,
    diagnostics: Rc<Diagnostics>,
}

impl<E: Event> BusCore<E> {
    pub(crate) fn new(owners: Rc<RefCell<OwnerDirectory>>, diagnostics: Rc<Diagnostics>) -> Self {
        Self {
            bindings: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
            owners,
            diagnostics,
        }
    }

    pub(crate) fn attach(
        self: &Rc<Self>,
        listener: Rc<dyn EventListener<E>>,
        owner: Option<OwnerId>,
        auto_prune: bool,
        origin: Option<&'static Location<'static>>,
    ) -> EventSubscription<E> {
        self.prune();

        let id = BindingId(self.next_id.get());
        self.next_id.set(id.0 + 1);

        let binding = Rc::new(Binding::new(id, listener, owner, auto_prune, origin));
        let subscription = EventSubscription::new(Rc::downgrade(self), Rc::downgrade(&binding));
        self.bindings.borrow_mut().push(binding);
        log::trace!("subscribed {} to {}", id, type_name::<E>());
        subscription
    }

    pub(crate) fn register(
        self: &Rc<Self>,
        listener: Rc<dyn EventListener<E>>,
        owner: Option<OwnerId>,
        auto_prune: bool,
        origin: Option<&'static Location<'static>>,
    ) -> EventSubscription<E> {
        self.prune();

        // Registering an already-registered listener instance is a silent
        // no-op; the caller gets a handle to the existing entry.
        let existing = self
            .bindings
            .borrow()
            .iter()
            .find(|binding| binding.listener_is(&listener))
            .cloned();
        if let Some(binding) = existing {
            return EventSubscription::new(Rc::downgrade(self), Rc::downgrade(&binding));
        }

        self.attach(listener, owner, auto_prune, origin)
    }

    /// Removes one entry by identity, marking it manually disposed.
    /// Unknown or foreign entries are a no-op.
    pub(crate) fn remove_entry(&self, target: &Rc<Binding<E>>) {
        let removed = {
            let mut bindings = self.bindings.borrow_mut();
            bindings
                .iter()
                .position(|binding| Rc::ptr_eq(binding, target))
                .map(|index| bindings.remove(index))
        };
        if let Some(binding) = removed {
            binding.mark_disposed(RemovalReason::Manual, false, false, &self.diagnostics);
        }
    }

    /// Prunes, snapshots the live list, then invokes every snapshot entry in
    /// registration order.
    ///
    /// The snapshot is what makes reentrancy safe: handlers may subscribe or
    /// unsubscribe (on this bus or any other) while the pass runs, and those
    /// mutations only affect future `raise` calls.
    pub(crate) fn raise(&self, event: &E) {
        self.prune();

        let snapshot: Vec<Rc<Binding<E>>> = self.bindings.borrow().clone();
        log::trace!(
            "raising {} to {} binding(s)",
            type_name::<E>(),
            snapshot.len()
        );
        for binding in &snapshot {
            binding.invoke(event);
        }
    }

    /// Removes every binding whose owner has died, marking each
    /// `OwnerDestroyed`. This is what turns a forgotten dispose into a
    /// diagnosable event instead of a silent leak.
    pub(crate) fn prune(&self) {
        let pruned: Vec<Rc<Binding<E>>> = {
            let owners = self.owners.borrow();
            let mut bindings = self.bindings.borrow_mut();
            let mut pruned = Vec::new();
            bindings.retain(|binding| {
                if binding.should_auto_prune(&owners) {
                    pruned.push(Rc::clone(binding));
                    false
                } else {
                    true
                }
            });
            pruned
        };

        for binding in pruned {
            binding.mark_disposed(RemovalReason::OwnerDestroyed, false, false, &self.diagnostics);
        }
    }

    /// Disposes every remaining binding with reason `Cleared`. `expected`
    /// suppresses leak warnings for planned resets.
    pub(crate) fn clear(&self, expected: bool) {
        let drained: Vec<Rc<Binding<E>>> = self.bindings.borrow_mut().drain(..).collect();
        if drained.is_empty() {
            return;
        }
        log::debug!(
            "clearing {} binding(s) from {} (expected: {expected})",
            drained.len(),
            type_name::<E>()
        );

        let liveness: Vec<bool> = {
            let owners = self.owners.borrow();
            drained
                .iter()
                .map(|binding| binding.owner().map_or(false, |owner| owners.is_alive(owner)))
                .collect()
        };
        for (binding, owner_alive) in drained.iter().zip(liveness) {
            binding.mark_disposed(
                RemovalReason::Cleared,
                owner_alive,
                expected,
                &self.diagnostics,
            );
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.bindings.borrow().len()
    }
}

impl<E: Event> AnyBus for BusCore<E> {
    fn clear_bindings(&self, expected: bool) {
        self.clear(expected);
    }

    fn prune_dead(&self) {
        self.prune();
    }
}

/// The registry for one event type: subscribe, register, raise, clear.
///
/// Buses are created lazily by [`EventHub::bus`](crate::EventHub::bus) and
/// live for the hub's lifetime. The handle is cheap to clone; all clones
/// share one registry.
pub struct EventBus<E: Event> {
    core: Rc<BusCore<E>>,
}

impl<E: Event> EventBus<E> {
    pub(crate) fn from_core(core: Rc<BusCore<E>>) -> Self {
        Self { core }
    }

    /// Subscribes a handler receiving the event payload. The binding has no
    /// owner and lives until disposed or cleared.
    #[track_caller]
    pub fn subscribe(&self, handler: impl Fn(&E) + 'static) -> EventSubscription<E> {
        let origin = self.capture_origin();
        self.core
            .attach(Rc::new(ClosureListener::with_event(handler)), None, true, origin)
    }

    /// Subscribes a no-argument handler. The binding has no owner and lives
    /// until disposed or cleared.
    #[track_caller]
    pub fn subscribe_signal(&self, handler: impl Fn() + 'static) -> EventSubscription<E> {
        let origin = self.capture_origin();
        self.core
            .attach(Rc::new(ClosureListener::with_signal(handler)), None, true, origin)
    }

    /// Subscribes a handler bound to `owner`. With `auto_prune` the binding
    /// self-removes once the owner dies.
    #[track_caller]
    pub fn subscribe_with_owner(
        &self,
        handler: impl Fn(&E) + 'static,
        owner: OwnerId,
        auto_prune: bool,
    ) -> EventSubscription<E> {
        let origin = self.capture_origin();
        self.core.attach(
            Rc::new(ClosureListener::with_event(handler)),
            Some(owner),
            auto_prune,
            origin,
        )
    }

    /// Subscribes a no-argument handler bound to `owner`.
    #[track_caller]
    pub fn subscribe_signal_with_owner(
        &self,
        handler: impl Fn() + 'static,
        owner: OwnerId,
        auto_prune: bool,
    ) -> EventSubscription<E> {
        let origin = self.capture_origin();
        self.core.attach(
            Rc::new(ClosureListener::with_signal(handler)),
            Some(owner),
            auto_prune,
            origin,
        )
    }

    /// Registers a pre-built listener object.
    ///
    /// De-duplicates by instance identity: registering the same `Rc` twice
    /// is a silent no-op that returns a handle to the existing entry, so a
    /// listener can never receive double delivery by accident.
    #[track_caller]
    pub fn register(
        &self,
        listener: Rc<dyn EventListener<E>>,
        owner: Option<OwnerId>,
        auto_prune: bool,
    ) -> EventSubscription<E> {
        let origin = self.capture_origin();
        self.core.register(listener, owner, auto_prune, origin)
    }

    /// Removes the subscription's binding with reason `Manual`.
    ///
    /// Stale handles and handles from other buses are silent no-ops;
    /// removal is idempotent by design, not an error condition.
    pub fn unsubscribe(&self, subscription: &EventSubscription<E>) {
        subscription.dispose();
    }

    /// Dispatches `event` to every live binding, in registration order.
    ///
    /// Bindings present when the call starts are invoked exactly once, even
    /// if a handler disposes them mid-pass; bindings added by handlers are
    /// first invoked on the next `raise`. Dispatch is synchronous and runs
    /// to completion. A handler that raises the same event type recursively
    /// can recurse unboundedly; that is the caller's responsibility.
    pub fn raise(&self, event: &E) {
        self.core.raise(event);
    }

    /// Removes dead-owner bindings now instead of waiting for the next
    /// subscribe or raise.
    pub fn prune(&self) {
        self.core.prune();
    }

    /// Disposes every remaining binding with reason `Cleared`.
    ///
    /// Intended for test isolation and host shutdown. `expected` marks the
    /// clear as a planned reset and suppresses leak warnings.
    pub fn clear(&self, expected: bool) {
        self.core.clear(expected);
    }

    /// Returns the number of registered bindings, including any not yet
    /// pruned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.core.len()
    }

    /// Returns `true` if no bindings are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.core.len() == 0
    }

    #[track_caller]
    fn capture_origin(&self) -> Option<&'static Location<'static>> {
        if self.core.diagnostics.enabled() {
            Some(Location::caller())
        } else {
            None
        }
    }
}

impl<E: Event> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            core: Rc::clone(&self.core),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticsConfig;
    use crate::event::EventHub;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[derive(Debug, PartialEq)]
    struct Ping;
    impl Event for Ping {}

    struct Damage {
        amount: u32,
    }
    impl Event for Damage {}

    fn hub() -> EventHub {
        EventHub::with_config(DiagnosticsConfig { enabled: true })
    }

    #[test]
    fn subscribe_and_raise_invokes_handler() {
        let hub = hub();
        let bus = hub.bus::<Damage>();

        let total = Rc::new(Cell::new(0u32));
        let seen = Rc::clone(&total);
        bus.subscribe(move |event: &Damage| seen.set(seen.get() + event.amount));

        bus.raise(&Damage { amount: 7 });
        bus.raise(&Damage { amount: 3 });
        assert_eq!(total.get(), 10);
    }

    #[test]
    fn unsubscribe_stops_future_delivery() {
        let hub = hub();
        let bus = hub.bus::<Ping>();

        let count = Rc::new(Cell::new(0u32));
        let seen = Rc::clone(&count);
        let subscription = bus.subscribe(move |_: &Ping| seen.set(seen.get() + 1));

        bus.raise(&Ping);
        assert_eq!(count.get(), 1);

        subscription.dispose();
        bus.raise(&Ping);
        assert_eq!(count.get(), 1);
        assert!(bus.is_empty());
    }

    #[test]
    fn dispose_is_idempotent_across_clones() {
        let hub = hub();
        let bus = hub.bus::<Ping>();

        let subscription = bus.subscribe_signal(|| {});
        let clone = subscription.clone();

        subscription.dispose();
        subscription.dispose();
        clone.dispose();

        assert!(subscription.is_disposed());
        assert!(clone.is_disposed());
        assert!(bus.is_empty());
        // Manual disposal never produces a leak report.
        assert!(hub.take_leak_reports().is_empty());
    }

    #[test]
    fn raise_runs_in_registration_order() {
        let hub = hub();
        let bus = hub.bus::<Ping>();

        let order = Rc::new(RefCell::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let order = Rc::clone(&order);
            bus.subscribe_signal(move || order.borrow_mut().push(tag));
        }

        bus.raise(&Ping);
        assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn handler_subscribing_mid_dispatch_is_deferred_to_next_raise() {
        let hub = hub();
        let bus = hub.bus::<Ping>();

        let late_calls = Rc::new(Cell::new(0u32));
        {
            let bus = bus.clone();
            let late_calls = Rc::clone(&late_calls);
            bus.clone().subscribe_signal(move || {
                let late_calls = Rc::clone(&late_calls);
                bus.subscribe_signal(move || late_calls.set(late_calls.get() + 1));
            });
        }

        bus.raise(&Ping);
        assert_eq!(late_calls.get(), 0);

        bus.raise(&Ping);
        assert_eq!(late_calls.get(), 1);
    }

    #[test]
    fn handler_disposed_mid_dispatch_still_runs_this_pass() {
        let hub = hub();
        let bus = hub.bus::<Ping>();

        // The disposer runs first and removes the victim mid-pass; snapshot
        // semantics still deliver this pass, but not the next.
        let victim_slot: Rc<RefCell<Option<EventSubscription<Ping>>>> =
            Rc::new(RefCell::new(None));
        {
            let victim_slot = Rc::clone(&victim_slot);
            bus.subscribe_signal(move || {
                if let Some(victim) = victim_slot.borrow().as_ref() {
                    victim.dispose();
                }
            });
        }

        let victim_calls = Rc::new(Cell::new(0u32));
        let victim = {
            let victim_calls = Rc::clone(&victim_calls);
            bus.subscribe_signal(move || victim_calls.set(victim_calls.get() + 1))
        };
        *victim_slot.borrow_mut() = Some(victim);

        bus.raise(&Ping);
        assert_eq!(victim_calls.get(), 1);

        bus.raise(&Ping);
        assert_eq!(victim_calls.get(), 1);
    }

    #[test]
    fn handler_may_raise_another_event_type_mid_dispatch() {
        let hub = hub();
        let pings = hub.bus::<Ping>();
        let damage = hub.bus::<Damage>();

        let total = Rc::new(Cell::new(0u32));
        let seen = Rc::clone(&total);
        damage.subscribe(move |event: &Damage| seen.set(seen.get() + event.amount));

        {
            let damage = damage.clone();
            pings.subscribe_signal(move || damage.raise(&Damage { amount: 4 }));
        }

        pings.raise(&Ping);
        assert_eq!(total.get(), 4);
    }

    #[test]
    fn handler_may_raise_the_same_event_type_recursively() {
        let hub = hub();
        let bus = hub.bus::<Damage>();

        // Each level re-raises with one less until the payload bottoms out.
        let total = Rc::new(Cell::new(0u32));
        {
            let bus = bus.clone();
            let total = Rc::clone(&total);
            bus.clone().subscribe(move |event: &Damage| {
                total.set(total.get() + event.amount);
                if event.amount > 1 {
                    bus.raise(&Damage {
                        amount: event.amount - 1,
                    });
                }
            });
        }

        bus.raise(&Damage { amount: 3 });
        assert_eq!(total.get(), 3 + 2 + 1);
    }

    #[test]
    fn auto_prune_removes_binding_once_owner_dies() {
        let hub = hub();
        let bus = hub.bus::<Ping>();
        let owner = hub.spawn_owner();

        let count = Rc::new(Cell::new(0u32));
        let seen = Rc::clone(&count);
        bus.subscribe_with_owner(move |_: &Ping| seen.set(seen.get() + 1), owner, true);

        bus.raise(&Ping);
        assert_eq!(count.get(), 1);

        hub.despawn_owner(owner).unwrap();
        bus.raise(&Ping);
        assert_eq!(count.get(), 1);
        assert!(bus.is_empty());

        let reports = hub.take_leak_reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].reason, RemovalReason::OwnerDestroyed);
        assert!(reports[0].origin.is_some());
    }

    #[test]
    fn leak_report_is_emitted_exactly_once() {
        let hub = hub();
        let bus = hub.bus::<Ping>();
        let owner = hub.spawn_owner();
        bus.subscribe_signal_with_owner(|| {}, owner, true);

        hub.despawn_owner(owner).unwrap();
        bus.prune();
        bus.prune();
        bus.raise(&Ping);

        assert_eq!(hub.take_leak_reports().len(), 1);
    }

    #[test]
    fn auto_prune_disabled_survives_owner_death() {
        let hub = hub();
        let bus = hub.bus::<Ping>();
        let owner = hub.spawn_owner();

        let count = Rc::new(Cell::new(0u32));
        let seen = Rc::clone(&count);
        bus.subscribe_with_owner(move |_: &Ping| seen.set(seen.get() + 1), owner, false);

        hub.despawn_owner(owner).unwrap();
        bus.raise(&Ping);

        assert_eq!(count.get(), 1);
        assert_eq!(bus.len(), 1);
        assert!(hub.take_leak_reports().is_empty());
    }

    #[test]
    fn register_deduplicates_by_listener_identity() {
        struct CountingListener {
            calls: Cell<u32>,
        }
        impl EventListener<Ping> for CountingListener {
            fn on_signal(&self) {
                self.calls.set(self.calls.get() + 1);
            }
        }

        let hub = hub();
        let bus = hub.bus::<Ping>();
        let listener = Rc::new(CountingListener {
            calls: Cell::new(0),
        });

        bus.register(listener.clone(), None, true);
        bus.register(listener.clone(), None, true);

        assert_eq!(bus.len(), 1);
        bus.raise(&Ping);
        assert_eq!(listener.calls.get(), 1);
    }

    #[test]
    fn listener_with_both_callbacks_runs_both() {
        struct DualListener {
            events: Cell<u32>,
            signals: Cell<u32>,
        }
        impl EventListener<Ping> for DualListener {
            fn on_event(&self, _event: &Ping) {
                self.events.set(self.events.get() + 1);
            }
            fn on_signal(&self) {
                self.signals.set(self.signals.get() + 1);
            }
        }

        let hub = hub();
        let bus = hub.bus::<Ping>();
        let listener = Rc::new(DualListener {
            events: Cell::new(0),
            signals: Cell::new(0),
        });
        bus.register(listener.clone(), None, true);

        bus.raise(&Ping);
        assert_eq!(listener.events.get(), 1);
        assert_eq!(listener.signals.get(), 1);
    }

    #[test]
    fn expected_clear_disposes_without_warnings() {
        let hub = hub();
        let bus = hub.bus::<Ping>();
        let owner = hub.spawn_owner();
        bus.subscribe_signal_with_owner(|| {}, owner, true);
        bus.subscribe_signal(|| {});

        bus.clear(true);

        assert!(bus.is_empty());
        assert!(hub.take_leak_reports().is_empty());
    }

    #[test]
    fn unexpected_clear_reports_live_owner_bindings() {
        let hub = hub();
        let bus = hub.bus::<Ping>();
        let owner = hub.spawn_owner();
        bus.subscribe_signal_with_owner(|| {}, owner, true);
        bus.subscribe_signal(|| {});

        bus.clear(false);

        let reports = hub.take_leak_reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].reason, RemovalReason::Cleared);
    }
}
