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

//! Cooperative per-tick polling of owner lifecycles.
//!
//! A [`LifecycleTracker`] watches the owners it hands groups out for and
//! drives disposal transitions from their state: deactivation disposes the
//! flagged entries of the owner's group, destruction disposes everything.
//! Polling runs once per host tick, so owners never have to implement
//! lifecycle callbacks; the price is up to one tick of latency between an
//! owner state change and subscription teardown. That latency is part of the
//! contract, not an implementation detail.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::event::group::SubscriptionGroup;
use crate::event::hub::EventHub;
use crate::owner::OwnerId;

thread_local! {
    /// All live trackers on this thread, for process-level teardown.
    static ACTIVE_TRACKERS: RefCell<Vec<Weak<TrackerCore>>> = RefCell::new(Vec::new());
}

struct OwnerEntry {
    group: Rc<SubscriptionGroup>,
    last_known_active: bool,
}

struct TrackerCore {
    hub: EventHub,
    entries: RefCell<HashMap<OwnerId, OwnerEntry>>,
}

enum Transition {
    Destroyed(Rc<SubscriptionGroup>),
    Deactivated(Rc<SubscriptionGroup>),
}

impl TrackerCore {
    fn group_for(&self, owner: OwnerId) -> Rc<SubscriptionGroup> {
        let mut entries = self.entries.borrow_mut();
        let entry = entries.entry(owner).or_insert_with(|| OwnerEntry {
            group: Rc::new(SubscriptionGroup::new(self.hub.clone(), Some(owner))),
            last_known_active: self.hub.owner_is_active(owner),
        });
        Rc::clone(&entry.group)
    }

    fn poll(&self) {
        let owners: Vec<OwnerId> = self.entries.borrow().keys().copied().collect();
        for owner in owners {
            let transition = self.observe(owner);
            // The entries borrow is released before disposal runs, since a
            // tracked disposable may call back into this tracker.
            match transition {
                Some(Transition::Destroyed(group)) => group.dispose_all(),
                Some(Transition::Deactivated(group)) => group.dispose_on_deactivate(),
                None => {}
            }
        }
    }

    fn observe(&self, owner: OwnerId) -> Option<Transition> {
        let mut entries = self.entries.borrow_mut();
        if !self.hub.owner_is_alive(owner) {
            return entries
                .remove(&owner)
                .map(|entry| Transition::Destroyed(entry.group));
        }

        let entry = entries.get_mut(&owner)?;
        let active = self.hub.owner_is_active(owner);
        let transition = if !active && entry.last_known_active {
            Some(Transition::Deactivated(Rc::clone(&entry.group)))
        } else {
            None
        };
        entry.last_known_active = active;
        transition
    }

    fn dispose_entries(&self, deactivate_only: bool) {
        let owners: Vec<OwnerId> = self.entries.borrow().keys().copied().collect();
        for owner in owners {
            let group = {
                let mut entries = self.entries.borrow_mut();
                if deactivate_only {
                    match entries.get_mut(&owner) {
                        Some(entry) => {
                            entry.last_known_active = false;
                            Rc::clone(&entry.group)
                        }
                        None => continue,
                    }
                } else {
                    match entries.remove(&owner) {
                        Some(entry) => entry.group,
                        None => continue,
                    }
                }
            };
            if deactivate_only {
                group.dispose_on_deactivate();
            } else {
                group.dispose_all();
            }
        }
    }
}

/// Watches owner liveness once per tick and disposes their groups on
/// deactivation or destruction.
///
/// Per tracked owner, the state machine is: first
/// [`group_for`](LifecycleTracker::group_for) records the owner's current
/// active state; each [`poll`](LifecycleTracker::poll) then reacts to
/// changes. Active to inactive runs the group's `dispose_on_deactivate`;
/// inactive to active only records (disposed bindings are never
/// resurrected; the owner re-subscribes if it needs to); a dead owner has
/// its group fully disposed and is dropped from the map.
///
/// The host is expected to create one tracker per owner-holding container
/// and call `poll` once per update cycle. Dropping a tracker disposes every
/// group it still tracks and removes it from the thread's registry.
pub struct LifecycleTracker {
    core: Rc<TrackerCore>,
}

impl LifecycleTracker {
    /// Creates a tracker operating on `hub` and adds it to the thread's
    /// tracker registry.
    #[must_use]
    pub fn new(hub: EventHub) -> Self {
        let core = Rc::new(TrackerCore {
            hub,
            entries: RefCell::new(HashMap::new()),
        });
        ACTIVE_TRACKERS.with(|trackers| trackers.borrow_mut().push(Rc::downgrade(&core)));
        Self { core }
    }

    /// Returns the subscription group for `owner`, creating it on first use
    /// and recording the owner's current active state.
    pub fn group_for(&self, owner: OwnerId) -> Rc<SubscriptionGroup> {
        self.core.group_for(owner)
    }

    /// Scans all tracked owners once. Call once per host tick.
    pub fn poll(&self) {
        self.core.poll();
    }

    /// Runs `dispose_on_deactivate` on every tracked group, as when the
    /// tracker's own container is disabled. Entries stay tracked.
    pub fn suspend(&self) {
        self.core.dispose_entries(true);
    }

    /// Number of owners currently tracked.
    #[must_use]
    pub fn tracked_owner_count(&self) -> usize {
        self.core.entries.borrow().len()
    }
}

impl Drop for LifecycleTracker {
    fn drop(&mut self) {
        self.core.dispose_entries(false);
        // The tracker must vacate its registry slot itself; leaving dead
        // weaks to accumulate until shutdown would grow without bound under
        // tracker churn.
        let dropping = Rc::downgrade(&self.core);
        ACTIVE_TRACKERS.with(|trackers| {
            trackers
                .borrow_mut()
                .retain(|weak| weak.strong_count() > 0 && !weak.ptr_eq(&dropping));
        });
    }
}

/// Fully disposes the entries of every live tracker on this thread.
///
/// Used at application shutdown to guarantee no dangling bindings survive a
/// full reset, independent of per-owner tick-based detection. Trackers
/// themselves stay usable afterwards.
pub fn dispose_all_trackers() {
    let cores: Vec<Rc<TrackerCore>> = ACTIVE_TRACKERS.with(|trackers| {
        let mut trackers = trackers.borrow_mut();
        trackers.retain(|weak| weak.strong_count() > 0);
        trackers.iter().filter_map(Weak::upgrade).collect()
    });
    for core in cores {
        core.dispose_entries(false);
    }
}
