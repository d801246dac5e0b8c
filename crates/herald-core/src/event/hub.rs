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

//! The explicit process-wide registry of buses, owners and diagnostics.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::diagnostics::{Diagnostics, DiagnosticsConfig, LeakReport};
use crate::event::bus::{AnyBus, BusCore, EventBus};
use crate::event::Event;
use crate::owner::{OwnerDirectory, OwnerError, OwnerId};

/// Each bus is stored twice-referenced: typed for `bus::<E>()` downcasts,
/// erased for bulk clear/prune passes.
struct BusSlot {
    typed: Rc<dyn Any>,
    erased: Rc<dyn AnyBus>,
}

struct HubCore {
    owners: Rc<RefCell<OwnerDirectory>>,
    buses: RefCell<HashMap<TypeId, BusSlot>>,
    diagnostics: Rc<Diagnostics>,
}

/// The root object of the event system: a type-map of lazily created
/// [`EventBus`]es, the [`OwnerDirectory`], and the leak-report recorder.
///
/// Rather than hiding per-event-type state in statics, all of it hangs off a
/// hub instance with an explicit lifecycle: created where the host decides,
/// resettable via [`clear_all`](EventHub::clear_all), and droppable for test
/// isolation. The handle is cheap to clone; all clones share one registry.
pub struct EventHub {
    core: Rc<HubCore>,
}

impl EventHub {
    /// Creates a hub with the default diagnostics configuration
    /// (leak detection on in debug builds).
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(DiagnosticsConfig::default())
    }

    /// Creates a hub with an explicit diagnostics configuration.
    #[must_use]
    pub fn with_config(config: DiagnosticsConfig) -> Self {
        Self {
            core: Rc::new(HubCore {
                owners: Rc::new(RefCell::new(OwnerDirectory::new())),
                buses: RefCell::new(HashMap::new()),
                diagnostics: Rc::new(Diagnostics::new(config)),
            }),
        }
    }

    /// Returns the bus for event type `E`, creating it on first use.
    pub fn bus<E: Event>(&self) -> EventBus<E> {
        let typed = {
            let mut buses = self.core.buses.borrow_mut();
            let slot = buses.entry(TypeId::of::<E>()).or_insert_with(|| {
                log::trace!("creating bus for {}", std::any::type_name::<E>());
                let core = Rc::new(BusCore::<E>::new(
                    Rc::clone(&self.core.owners),
                    Rc::clone(&self.core.diagnostics),
                ));
                BusSlot {
                    typed: Rc::clone(&core) as Rc<dyn Any>,
                    erased: core,
                }
            });
            Rc::clone(&slot.typed)
        };
        let core = typed
            .downcast::<BusCore<E>>()
            .expect("bus map keyed by TypeId always holds the matching bus type");
        EventBus::from_core(core)
    }

    /// Dispatches `event` on the bus for its type. See
    /// [`EventBus::raise`] for the delivery contract.
    pub fn raise<E: Event>(&self, event: E) {
        self.bus::<E>().raise(&event);
    }

    /// Clears every bus, disposing all bindings with reason `Cleared`.
    ///
    /// `expected` marks this as a planned reset (end of a test run, host
    /// shutdown, domain reload) and suppresses leak warnings for the pass.
    pub fn clear_all(&self, expected: bool) {
        let erased: Vec<Rc<dyn AnyBus>> = self
            .core
            .buses
            .borrow()
            .values()
            .map(|slot| Rc::clone(&slot.erased))
            .collect();
        for bus in erased {
            bus.clear_bindings(expected);
        }
    }

    /// Prunes dead-owner bindings on every bus.
    pub fn prune_all(&self) {
        let erased: Vec<Rc<dyn AnyBus>> = self
            .core
            .buses
            .borrow()
            .values()
            .map(|slot| Rc::clone(&slot.erased))
            .collect();
        for bus in erased {
            bus.prune_dead();
        }
    }

    /// Registers a new owner. Owners start active.
    pub fn spawn_owner(&self) -> OwnerId {
        self.core.owners.borrow_mut().spawn()
    }

    /// Invalidates an owner's handle. Its auto-pruned bindings are removed
    /// on the next subscribe, raise or prune touching their bus.
    pub fn despawn_owner(&self, owner: OwnerId) -> Result<(), OwnerError> {
        self.core.owners.borrow_mut().despawn(owner)
    }

    /// Sets an owner's active flag, as observed by lifecycle trackers.
    pub fn set_owner_active(&self, owner: OwnerId, active: bool) -> Result<(), OwnerError> {
        self.core.owners.borrow_mut().set_active(owner, active)
    }

    /// Returns `true` if the owner is alive.
    #[must_use]
    pub fn owner_is_alive(&self, owner: OwnerId) -> bool {
        self.core.owners.borrow().is_alive(owner)
    }

    /// Returns `true` if the owner is alive and active.
    #[must_use]
    pub fn owner_is_active(&self, owner: OwnerId) -> bool {
        self.core.owners.borrow().is_active(owner)
    }

    /// Drains and returns all leak reports recorded so far.
    pub fn take_leak_reports(&self) -> Vec<LeakReport> {
        self.core.diagnostics.take_reports()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventHub {
    fn clone(&self) -> Self {
        Self {
            core: Rc::clone(&self.core),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Ping;
    impl Event for Ping {}

    struct Pong;
    impl Event for Pong {}

    #[test]
    fn bus_is_created_once_per_event_type() {
        let hub = EventHub::new();

        let first = hub.bus::<Ping>();
        first.subscribe_signal(|| {});

        // A second lookup must observe the same registry.
        assert_eq!(hub.bus::<Ping>().len(), 1);
        assert!(hub.bus::<Pong>().is_empty());
    }

    #[test]
    fn raise_reaches_only_the_matching_bus() {
        let hub = EventHub::new();

        let pings = Rc::new(Cell::new(0u32));
        let pongs = Rc::new(Cell::new(0u32));
        {
            let pings = Rc::clone(&pings);
            hub.bus::<Ping>().subscribe_signal(move || pings.set(pings.get() + 1));
        }
        {
            let pongs = Rc::clone(&pongs);
            hub.bus::<Pong>().subscribe_signal(move || pongs.set(pongs.get() + 1));
        }

        hub.raise(Ping);
        hub.raise(Ping);
        hub.raise(Pong);

        assert_eq!(pings.get(), 2);
        assert_eq!(pongs.get(), 1);
    }

    #[test]
    fn clear_all_empties_every_bus() {
        let hub = EventHub::with_config(DiagnosticsConfig { enabled: true });
        hub.bus::<Ping>().subscribe_signal(|| {});
        hub.bus::<Pong>().subscribe_signal(|| {});

        hub.clear_all(true);

        assert!(hub.bus::<Ping>().is_empty());
        assert!(hub.bus::<Pong>().is_empty());
        assert!(hub.take_leak_reports().is_empty());
    }

    #[test]
    fn prune_all_sweeps_dead_owners_everywhere() {
        let hub = EventHub::with_config(DiagnosticsConfig { enabled: true });
        let owner = hub.spawn_owner();
        hub.bus::<Ping>().subscribe_signal_with_owner(|| {}, owner, true);
        hub.bus::<Pong>().subscribe_signal_with_owner(|| {}, owner, true);

        hub.despawn_owner(owner).unwrap();
        hub.prune_all();

        assert!(hub.bus::<Ping>().is_empty());
        assert!(hub.bus::<Pong>().is_empty());
        assert_eq!(hub.take_leak_reports().len(), 2);
    }

    #[test]
    fn clones_share_state() {
        let hub = EventHub::new();
        let alias = hub.clone();

        hub.bus::<Ping>().subscribe_signal(|| {});
        assert_eq!(alias.bus::<Ping>().len(), 1);

        let owner = alias.spawn_owner();
        assert!(hub.owner_is_alive(owner));
    }
}
